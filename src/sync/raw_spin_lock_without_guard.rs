//! 不返回 Guard 的原始自旋锁，专为全局分配器集成设计
//!
//! 实现 `lock_api::RawMutex`，供 `talc` 分配器的 `Talck` 使用。
//!
//! 与 [`crate::sync::SpinLock`] 的区别：
//! - 实现 `lock_api::RawMutex` trait
//! - `lock()` 不返回 Guard
//! - 中断状态内部保存在 `AtomicUsize` 中，解锁时恢复
//!
//! 持有分配器锁时若被中断打断、而中断处理路径又申请内存，
//! 没有中断保护就会在本 CPU 上死锁。

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::hal;

/// 自旋锁结构体，不返回 Guard，集成了中断状态保存与恢复功能。
pub struct RawSpinLockWithoutGuard {
    locked: AtomicBool,
    saved_intr_flags: AtomicUsize,
}

impl RawSpinLockWithoutGuard {
    /// 创建一个新的 RawSpinLockWithoutGuard 实例。
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            saved_intr_flags: AtomicUsize::new(0),
        }
    }
}

impl Default for RawSpinLockWithoutGuard {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl lock_api::RawMutex for RawSpinLockWithoutGuard {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    type GuardMarker = lock_api::GuardNoSend;

    /// 获取锁，禁用中断并保存状态。
    fn lock(&self) {
        let flags = unsafe { hal::read_and_disable_interrupts() };

        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }

        self.saved_intr_flags.store(flags, Ordering::Release);
    }

    /// 尝试获取锁，成功则禁用中断并保存状态。
    fn try_lock(&self) -> bool {
        let flags = unsafe { hal::read_and_disable_interrupts() };

        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            self.saved_intr_flags.store(flags, Ordering::Release);
            true
        } else {
            // 获取失败，立即恢复中断
            unsafe { hal::restore_interrupts(flags) };
            false
        }
    }

    /// 释放锁，恢复之前的中断状态。
    unsafe fn unlock(&self) {
        let flags = self.saved_intr_flags.load(Ordering::Acquire);
        self.locked.store(false, Ordering::Release);
        unsafe { hal::restore_interrupts(flags) };
    }
}

#[cfg(test)]
mod tests {
    use lock_api::RawMutex;

    use super::*;
    use crate::{kassert, test_case};

    // 使用 lock_api::Mutex 包装进行基本功能测试
    test_case!(test_mutex_wrapper_guard_basic, {
        let m = lock_api::Mutex::<RawSpinLockWithoutGuard, usize>::new(0);

        {
            let mut g = m.lock();
            *g = 42;
        } // guard drop -> 解锁

        {
            let g = m.lock();
            kassert!(*g == 42);
        }
    });

    // try_lock 成功/失败与解锁后的可重入获取
    test_case!(test_try_lock_and_unlock_roundtrip, {
        let raw = RawSpinLockWithoutGuard::new();

        let ok = raw.try_lock();
        kassert!(ok);

        let fail = raw.try_lock();
        kassert!(!fail);

        unsafe {
            raw.unlock();
        }

        let ok2 = raw.try_lock();
        kassert!(ok2);

        unsafe {
            raw.unlock();
        }
    });
}
