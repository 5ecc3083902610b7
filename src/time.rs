//! 时间基准类型
//!
//! 调度器维护一个单调不减的时间戳 [`TimeStamp`]，
//! 每次调度按时间片 [`TimeSpan`] 推进。两者都以毫秒为单位。

use core::ops::{Add, AddAssign};

/// 自内核启动以来的单调时间戳（毫秒）
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeStamp(u64);

/// 一段时间（毫秒）
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeSpan(u64);

impl TimeStamp {
    /// 启动时刻
    pub const ZERO: TimeStamp = TimeStamp(0);

    /// 从毫秒数构造
    pub const fn from_ms(ms: u64) -> Self {
        TimeStamp(ms)
    }

    /// 毫秒数
    pub const fn as_ms(self) -> u64 {
        self.0
    }
}

impl TimeSpan {
    /// 零时间片（用于显式让出 CPU 的重调度）
    pub const ZERO: TimeSpan = TimeSpan(0);

    /// 从毫秒数构造
    pub const fn from_ms(ms: u64) -> Self {
        TimeSpan(ms)
    }

    /// 毫秒数
    pub const fn as_ms(self) -> u64 {
        self.0
    }
}

impl Add<TimeSpan> for TimeStamp {
    type Output = TimeStamp;

    fn add(self, span: TimeSpan) -> TimeStamp {
        // 时间戳只增不减，溢出时饱和而不是回绕
        TimeStamp(self.0.saturating_add(span.0))
    }
}

impl AddAssign<TimeSpan> for TimeStamp {
    fn add_assign(&mut self, span: TimeSpan) {
        *self = *self + span;
    }
}
