//! 内核错误类型
//!
//! 所有可失败的内核操作统一返回 [`KernelResult`]。
//! 错误是一个封闭的枚举；跨越陷入边界时只传递一个标量错误码
//! （见 [`KernelError::code`]），绝不跨边界传递富错误对象。

use core::fmt;

/// 可失败内核操作的统一返回类型
pub type KernelResult<T> = Result<T, KernelError>;

/// 内核错误的封闭枚举
///
/// 分类对应五类故障：能力错误、资源耗尽、无效输入、
/// 硬件故障之外的句柄/调用号错误、以及有界轮询超时。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// 任务缺少操作所要求的 pledge
    PermissionDenied,
    /// 物理内存或虚拟地址范围分配失败
    OutOfMemory,
    /// 输入不合法（畸形载荷、未对齐地址、非法标志位等）
    InvalidInput,
    /// 句柄在所属 domain 中不存在
    BadHandle,
    /// 未知的系统调用号
    InvalidSyscall,
    /// 有界等待超时
    Timeout,
    /// 目标已存在（重复入队、映射范围重叠等）
    AlreadyExists,
    /// 目标不存在（未找到文件记录、未安装的映射等）
    NotFound,
    /// 操作将会阻塞
    WouldBlock,
}

impl KernelError {
    /// 错误的标量编码，用于系统调用边界
    ///
    /// 0 保留给成功，错误码从 1 开始。
    pub const fn code(self) -> usize {
        match self {
            KernelError::PermissionDenied => 1,
            KernelError::OutOfMemory => 2,
            KernelError::InvalidInput => 3,
            KernelError::BadHandle => 4,
            KernelError::InvalidSyscall => 5,
            KernelError::Timeout => 6,
            KernelError::AlreadyExists => 7,
            KernelError::NotFound => 8,
            KernelError::WouldBlock => 9,
        }
    }

    /// 从标量编码还原错误，未知编码视为 [`KernelError::InvalidInput`]
    pub const fn from_code(code: usize) -> Self {
        match code {
            1 => KernelError::PermissionDenied,
            2 => KernelError::OutOfMemory,
            4 => KernelError::BadHandle,
            5 => KernelError::InvalidSyscall,
            6 => KernelError::Timeout,
            7 => KernelError::AlreadyExists,
            8 => KernelError::NotFound,
            9 => KernelError::WouldBlock,
            _ => KernelError::InvalidInput,
        }
    }

    /// 便于日志输出的短名字
    pub const fn as_str(self) -> &'static str {
        match self {
            KernelError::PermissionDenied => "permission-denied",
            KernelError::OutOfMemory => "out-of-memory",
            KernelError::InvalidInput => "invalid-input",
            KernelError::BadHandle => "bad-handle",
            KernelError::InvalidSyscall => "invalid-syscall",
            KernelError::Timeout => "timeout",
            KernelError::AlreadyExists => "already-exists",
            KernelError::NotFound => "not-found",
            KernelError::WouldBlock => "would-block",
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kassert, test_case};

    // 错误码与枚举的往返转换
    test_case!(test_error_code_round_trip, {
        let all = [
            KernelError::PermissionDenied,
            KernelError::OutOfMemory,
            KernelError::InvalidInput,
            KernelError::BadHandle,
            KernelError::InvalidSyscall,
            KernelError::Timeout,
            KernelError::AlreadyExists,
            KernelError::NotFound,
            KernelError::WouldBlock,
        ];
        for e in all {
            kassert!(e.code() != 0);
            kassert!(KernelError::from_code(e.code()) == e);
        }
    });
}
