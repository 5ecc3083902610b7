//! 日志级别定义

/// 日志级别，数值越小越紧急
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// 系统不可用
    Emergency = 0,
    /// 必须立即处理
    Alert = 1,
    /// 严重状况
    Critical = 2,
    /// 错误状况
    Error = 3,
    /// 警告状况
    Warning = 4,
    /// 正常但重要
    Notice = 5,
    /// 一般信息
    Info = 6,
    /// 调试信息
    Debug = 7,
}

impl LogLevel {
    /// 级别前缀字符串
    pub const fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Emergency => "[EMERG]",
            LogLevel::Alert => "[ALERT]",
            LogLevel::Critical => "[CRIT]",
            LogLevel::Error => "[ERR]",
            LogLevel::Warning => "[WARNING]",
            LogLevel::Notice => "[NOTICE]",
            LogLevel::Info => "[INFO]",
            LogLevel::Debug => "[DEBUG]",
        }
    }

    /// ANSI 颜色码
    pub const fn color_code(&self) -> &'static str {
        match self {
            Self::Emergency | Self::Alert | Self::Critical => "\x1b[1;31m",
            Self::Error => "\x1b[31m",
            Self::Warning => "\x1b[33m",
            Self::Notice => "\x1b[1;37m",
            Self::Info => "\x1b[37m",
            Self::Debug => "\x1b[90m",
        }
    }

    /// 颜色复位码
    pub const fn reset_color_code(&self) -> &'static str {
        "\x1b[0m"
    }
}
