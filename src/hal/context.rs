//! 用户态入口上下文
//!
//! 内核核心只关心任务恢复执行所需的最小信息：
//! 入口地址、栈顶和少量入口参数。寄存器级别的完整陷入帧
//! 由体系结构后端自行维护，不进入核心数据结构。

use crate::mm::addr::VirtAddr;

/// 任务进入用户态时的初始机器状态
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UserContext {
    /// 入口指令地址
    pub ip: VirtAddr,
    /// 初始栈顶
    pub sp: VirtAddr,
    /// 通过入口寄存器传递的参数
    pub args: [usize; 6],
}

impl UserContext {
    /// 以给定入口与栈顶构造上下文，参数全零
    pub const fn new(ip: VirtAddr, sp: VirtAddr) -> Self {
        UserContext {
            ip,
            sp,
            args: [0; 6],
        }
    }
}
