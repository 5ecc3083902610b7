//! 任务状态与特权模式

use bitflags::bitflags;

/// 一次调度评估得到的任务状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// 可执行。正在执行或可被调度执行
    Runnable,
    /// 阻塞中。等待条件满足，不参与候选
    Blocked,
    /// 终态。本轮评估后即被移出活跃集
    Exited,
}

/// 任务特权模式
///
/// 模式决定陷入帧的特权级，以及上下文装载时是否激活任务自己的
/// 地址空间。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// 空转任务，只在没有其它可运行任务时被选中
    Idle,
    /// 内核特权
    #[default]
    Super,
    /// 用户态
    User,
}

bitflags! {
    /// 任务信号位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Sigs: u32 {
        /// 任务已结束，评估报告终态
        const EXITED  = 1 << 0;
        /// 结束原因是故障而不是正常退出
        const CRASHED = 1 << 1;
    }
}
