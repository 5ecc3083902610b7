//! 任务能力位
//!
//! 每个任务携带一组 pledge 位，系统调用分发器在动任何内核状态
//! 之前先检查对应的位。pledge 只能收窄、不能放宽，是一个单向的
//! 能力丢弃模型。

use bitflags::bitflags;

bitflags! {
    /// 任务能力位标志
    ///
    /// 新任务默认持有全部能力，由其自身或父任务逐步收窄。
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Pledges: u64 {
        /// 写内核控制台
        const CONSOLE  = 1 << 0;
        /// 创建内存对象与操作映射
        const MEMORY   = 1 << 1;
        /// 创建与启动任务
        const TASK     = 1 << 2;
        /// 网络操作
        const NETWORK  = 1 << 3;
        /// 存储操作
        const STORAGE  = 1 << 4;
        /// 直接访问硬件资源
        const HARDWARE = 1 << 5;
        /// 绑定与等待中断
        const IRQ      = 1 << 6;
    }
}
