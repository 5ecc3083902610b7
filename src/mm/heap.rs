//! 内核堆全局分配器
//!
//! 使用 **talc** 分配器提供动态堆内存分配功能。
//!
//! - 基于 **talc::Talck** 的全局堆分配器。
//! - 堆内存区域由体系结构后端在启动时交给 [`init_heap`] 声明。
//!
//! 宿主测试直接使用测试进程自带的分配器，本模块在
//! `cfg(test)` 下不参与编译。

#![cfg(not(test))]

use talc::{Span, Talc, Talck};

use crate::sync::RawSpinLockWithoutGuard;

/// 全局堆分配器实例
///
/// 使用 talc 的基于锁的分配器 (**Talck**) 和自定义的
/// **`RawSpinLockWithoutGuard`**。此锁实现了 `lock_api::RawMutex`
/// 并提供中断保护，防止中断处理路径申请内存时在本 CPU 上死锁。
///
/// 初始化时使用一个空范围 (**Span::empty()**)；
/// 实际内存在 [`init_heap`] 中声明。
#[global_allocator]
static ALLOCATOR: Talck<RawSpinLockWithoutGuard, talc::ClaimOnOom> =
    Talc::new(unsafe { talc::ClaimOnOom::new(Span::empty()) }).lock();

/// 向全局分配器声明堆内存区域
///
/// 必须在 BSS 清零之后、任何堆分配之前由启动路径调用一次。
///
/// # Safety
///
/// - 只能调用一次。
/// - `[start, start + size)` 必须是一段有效且未被他用的内存。
pub unsafe fn init_heap(start: *mut u8, size: usize) {
    unsafe {
        ALLOCATOR
            .lock()
            .claim(Span::new(start, start.add(size)))
            .expect("heap region claim failed");
    }
}
