//! 物理帧分配
//!
//! 整个内核唯一的物理页来源。分配出的页用 [`FrameTracker`]
//! 以 RAII 方式持有，Drop 时自动归还。账本同时维护用量计数，
//! 供测试和诊断核对内存是否泄漏。

use alloc::vec::Vec;

use lazy_static::lazy_static;

use crate::config::PAGE_SIZE;
use crate::error::{KernelError, KernelResult};
use crate::hal;
use crate::mm::addr::PhysAddr;
use crate::sync::SpinLock;

/// 一个物理页的 RAII 持有者，Drop 时归还给分配器
#[derive(Debug)]
pub struct FrameTracker(PhysAddr);

impl FrameTracker {
    fn new(base: PhysAddr) -> Self {
        clear_frame(base);
        FrameTracker(base)
    }

    /// 页基址
    pub fn base(&self) -> PhysAddr {
        self.0
    }
}

/// 把整页清零，避免把上一个持有者的数据泄漏给新用途
fn clear_frame(base: PhysAddr) {
    let va = hal::get().phys_to_virt(base);
    unsafe {
        core::ptr::write_bytes(va, 0, PAGE_SIZE);
    }
}

impl Drop for FrameTracker {
    fn drop(&mut self) {
        PMM.lock().dealloc_frame(self.0);
    }
}

lazy_static! {
    static ref PMM: SpinLock<FrameAllocator> = SpinLock::new(FrameAllocator::new());
}

/// 帧分配器：顺序分配 + 回收栈
struct FrameAllocator {
    start: PhysAddr,
    end: PhysAddr,
    cur: PhysAddr,
    /// 已归还可复用的页
    recycled: Vec<PhysAddr>,
    used: usize,
}

impl FrameAllocator {
    fn new() -> Self {
        FrameAllocator {
            start: PhysAddr::null(),
            end: PhysAddr::null(),
            cur: PhysAddr::null(),
            recycled: Vec::new(),
            used: 0,
        }
    }

    fn init(&mut self, start: PhysAddr, end: PhysAddr) {
        debug_assert!(start.is_page_aligned() && end.is_page_aligned());
        self.start = start;
        self.end = end;
        self.cur = start;
        self.recycled.clear();
        self.used = 0;
    }

    fn alloc_frame(&mut self) -> KernelResult<PhysAddr> {
        let base = if let Some(base) = self.recycled.pop() {
            base
        } else if self.cur < self.end {
            let base = self.cur;
            self.cur = self.cur.add_by(PAGE_SIZE);
            base
        } else {
            return Err(KernelError::OutOfMemory);
        };
        self.used += 1;
        Ok(base)
    }

    fn dealloc_frame(&mut self, base: PhysAddr) {
        debug_assert!(self.start <= base && base < self.cur);
        self.used -= 1;
        self.recycled.push(base);
    }

    fn stats(&self) -> PmmStats {
        PmmStats {
            total_pages: (self.end.as_usize() - self.start.as_usize()) / PAGE_SIZE,
            used_pages: self.used,
        }
    }
}

/// 物理内存用量快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmmStats {
    /// 托管的总页数
    pub total_pages: usize,
    /// 当前已分配出去的页数
    pub used_pages: usize,
}

/// 用一段可分配的物理内存初始化帧分配器
pub fn init(start: PhysAddr, end: PhysAddr) {
    PMM.lock().init(start, end);
    pr_info!(
        "pmm: managing {:#x}..{:#x} ({} pages)",
        start.as_usize(),
        end.as_usize(),
        (end.as_usize() - start.as_usize()) / PAGE_SIZE
    );
}

/// 分配一个清零的物理页
pub fn alloc_frame() -> KernelResult<FrameTracker> {
    let base = PMM.lock().alloc_frame()?;
    // 清零在锁外做，避免持锁做整页写
    Ok(FrameTracker::new(base))
}

/// 分配 `num` 个清零的物理页，不要求连续
///
/// 任何一页分配失败时，已分配的页随 Vec 的 Drop 全部归还。
pub fn alloc_frames(num: usize) -> KernelResult<Vec<FrameTracker>> {
    let mut frames = Vec::with_capacity(num);
    for _ in 0..num {
        frames.push(alloc_frame()?);
    }
    Ok(frames)
}

/// 当前用量快照
pub fn stats() -> PmmStats {
    PMM.lock().stats()
}

/// 在宿主堆上租一块新的页对齐区域并重置账本
#[cfg(test)]
pub fn reset_for_tests() {
    use std::alloc::{Layout, alloc_zeroed};

    const ARENA_PAGES: usize = 512;

    let layout = Layout::from_size_align(ARENA_PAGES * PAGE_SIZE, PAGE_SIZE).unwrap();
    // 上一块区域随旧账本一起被遗忘，测试进程结束时由宿主回收
    let ptr = unsafe { alloc_zeroed(layout) };
    assert!(!ptr.is_null());

    let start = PhysAddr::from_usize(ptr as usize);
    let end = start.add_by(ARENA_PAGES * PAGE_SIZE);
    PMM.lock().init(start, end);
}
