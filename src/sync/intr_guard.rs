//! 中断保护

use crate::hal;

/// 中断保护器，基于 RAII 实现中断保护。
/// 在创建时原子地禁用中断并保存之前的状态；
/// 在销毁时自动恢复之前的中断状态。
/// 不可重入 (即不能嵌套调用 IntrGuard::new())。
pub struct IntrGuard {
    flags: usize,
}

impl IntrGuard {
    /// 原子地禁用中断并返回一个 IntrGuard 实例。
    /// 该实例在离开作用域时会自动恢复中断状态。
    pub fn new() -> Self {
        let flags = unsafe { hal::read_and_disable_interrupts() };
        IntrGuard { flags }
    }

    /// 检查进入临界区前，中断是否处于启用状态。
    pub fn was_enabled(&self) -> bool {
        match hal::try_get() {
            Some(h) => h.interrupts_were_enabled(self.flags),
            None => false,
        }
    }
}

impl Default for IntrGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// 当 IntrGuard 离开作用域时，自动恢复中断状态。
impl Drop for IntrGuard {
    fn drop(&mut self) {
        unsafe { hal::restore_interrupts(self.flags) };
    }
}
