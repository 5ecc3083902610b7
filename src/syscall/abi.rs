//! 系统调用 ABI
//!
//! 调用约定是固定元数的：一个操作选择子加至多 5 个机器字参数，
//! 返回一个机器字。返回字编码 Ok(结果) 或 Err(错误码)：错误是
//! 小的负数，正数和零是成功结果。陷入边界上只传标量，
//! 绝不传富错误对象。

use crate::error::{KernelError, KernelResult};
use crate::task::Pledges;

/// 系统调用参数个数
pub const SYSCALL_ARG_COUNT: usize = 5;

/// 操作选择子，封闭集合
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// 向内核控制台写一行日志
    Log = 1,
    /// 读当前逻辑时间（毫秒）
    Now = 2,
    /// 显式让出 CPU
    Yield = 3,
    /// 挂起到给定毫秒数之后
    Sleep = 4,
    /// 结束当前任务
    Exit = 5,
    /// 收窄当前任务的能力位
    Pledge = 6,
    /// 创建一个能力域
    CreateDomain = 7,
    /// 分配一个内存对象
    CreateVmo = 8,
    /// 把内存对象映射进当前空间
    Map = 9,
    /// 撤销一条映射
    Unmap = 10,
    /// 创建一个任务
    CreateTask = 11,
    /// 装上入口上下文并入队
    Start = 12,
    /// 复制一条句柄
    Dup = 13,
    /// 删除一条句柄
    Drop = 14,
}

impl Selector {
    /// 从原始选择子字解码
    pub const fn from_raw(raw: usize) -> Option<Selector> {
        Some(match raw {
            1 => Selector::Log,
            2 => Selector::Now,
            3 => Selector::Yield,
            4 => Selector::Sleep,
            5 => Selector::Exit,
            6 => Selector::Pledge,
            7 => Selector::CreateDomain,
            8 => Selector::CreateVmo,
            9 => Selector::Map,
            10 => Selector::Unmap,
            11 => Selector::CreateTask,
            12 => Selector::Start,
            13 => Selector::Dup,
            14 => Selector::Drop,
            _ => return None,
        })
    }

    /// 操作要求的能力位
    ///
    /// 空集合表示任何任务都可调用（时间查询、让出、自我了断、
    /// 自我收窄和句柄簿记不需要额外授权）。
    pub const fn required_pledge(self) -> Pledges {
        match self {
            Selector::Log => Pledges::CONSOLE,
            Selector::CreateVmo | Selector::Map | Selector::Unmap => Pledges::MEMORY,
            Selector::CreateDomain | Selector::CreateTask | Selector::Start => Pledges::TASK,
            Selector::Now
            | Selector::Yield
            | Selector::Sleep
            | Selector::Exit
            | Selector::Pledge
            | Selector::Dup
            | Selector::Drop => Pledges::empty(),
        }
    }

    /// 日志用的短名字
    pub const fn name(self) -> &'static str {
        match self {
            Selector::Log => "log",
            Selector::Now => "now",
            Selector::Yield => "yield",
            Selector::Sleep => "sleep",
            Selector::Exit => "exit",
            Selector::Pledge => "pledge",
            Selector::CreateDomain => "create-domain",
            Selector::CreateVmo => "create-vmo",
            Selector::Map => "map",
            Selector::Unmap => "unmap",
            Selector::CreateTask => "create-task",
            Selector::Start => "start",
            Selector::Dup => "dup",
            Selector::Drop => "drop",
        }
    }
}

/// 把内核结果编码成一个返回字
pub const fn encode_ret(res: KernelResult<usize>) -> usize {
    match res {
        Ok(v) => v,
        Err(e) => -(e.code() as isize) as usize,
    }
}

/// 从返回字还原结果，用户态运行时和测试使用
pub const fn decode_ret(word: usize) -> KernelResult<usize> {
    let v = word as isize;
    if v < 0 {
        Err(KernelError::from_code(-v as usize))
    } else {
        Ok(word)
    }
}
