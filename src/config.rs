//! 内核编译期配置
//!
//! 集中存放页大小、栈大小等全局常量，避免散落在各个子系统中。

/// 平台页大小（字节）
pub const PAGE_SIZE: usize = 4096;

/// 时钟中断的调度时间片（毫秒）
pub const TICK_MS: u64 = 1;

/// 定时器使用的中断号，由陷入胶水直通调度器
pub const TIMER_IRQ: u32 = 0;

/// 初始用户程序的用户栈大小（字节）
pub const USER_STACK_SIZE: usize = 64 * 1024;

/// 地址空间自动选址的起始虚拟地址
///
/// `Space::map` 未指定虚拟范围时从这里向上寻找空洞，
/// 保留给内核代为选址的映射（栈、handover 等），
/// 避开用户程序显式映射的低地址区域。
pub const SPACE_AUTO_BASE: usize = 0x7000_0000_0000;

/// handover 载荷中初始用户程序的文件记录名
pub const INIT_BUNDLE: &str = "bundle://init/_bin";

/// 单条用户日志系统调用允许的最大字节数
pub const LOG_MSG_MAX: usize = 512;
