//! 内核日志
//!
//! 全局日志级别过滤 + HAL 控制台输出。
//! 未安装 HAL 后端时日志被静默丢弃（启动极早期或纯宿主测试）。

mod level;
#[macro_use]
mod macros;

pub use level::LogLevel;

use core::fmt::{self, Write};

use spin::RwLock;

use crate::hal;

/// 全局日志级别，低于（更不紧急）该级别的日志被过滤
static LOG_LEVEL: RwLock<LogLevel> = RwLock::new(LogLevel::Debug);

/// 查询某个级别当前是否开启
pub fn is_level_enabled(level: LogLevel) -> bool {
    level <= *LOG_LEVEL.read()
}

/// 设置全局日志级别
pub fn set_log_level(level: LogLevel) {
    *LOG_LEVEL.write() = level;
}

/// 把格式化输出逐段写入 HAL 控制台的适配器
struct ConsoleWriter;

impl fmt::Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if let Some(h) = hal::try_get() {
            h.console_write(s);
        }
        Ok(())
    }
}

/// 日志实现，由 `pr_*` 宏在通过级别过滤后调用
pub fn log_impl(level: LogLevel, args: fmt::Arguments<'_>) {
    let mut w = ConsoleWriter;
    // 控制台写失败无处上报，忽略
    let _ = write!(
        w,
        "{}{} {}{}\n",
        level.color_code(),
        level.as_str(),
        args,
        level.reset_color_code()
    );
}
