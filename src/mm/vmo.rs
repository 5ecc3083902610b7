//! 内存对象（VMO）
//!
//! VMO 是一段可被映射进地址空间的物理内存，分两类：
//!
//! - [`VmoKind::Pmm`]：从物理帧分配器取得、由 VMO 拥有的页，
//!   最后一个引用消失时随 [`FrameTracker`] 的 Drop 归还；
//! - [`VmoKind::Dma`]：一段外部给定的物理范围（设备寄存器、
//!   启动载荷等），VMO 只是借用，不负责释放。
//!
//! VMO 创建后不可变，共享直接用 `Arc`：映射和句柄各持有一个
//! 强引用，引用计数就是 `Arc` 的强计数。

use alloc::sync::Arc;
use alloc::vec::Vec;

use bitflags::bitflags;

use crate::config::PAGE_SIZE;
use crate::error::{KernelError, KernelResult};
use crate::hal;
use crate::mm::addr::{PhysAddr, PhysRange, pages_of};
use crate::mm::pmm::{self, FrameTracker};

bitflags! {
    /// VMO 属性标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VmoFlags: u8 {
        /// 布局提示：倾向从托管区域的高端取页
        const UPPER = 1 << 0;
        /// 借用的外部物理范围，只能由 [`Vmo::dma`] 打上
        const DMA   = 1 << 1;
    }
}

/// VMO 的后备存储
#[derive(Debug)]
pub enum VmoKind {
    /// 拥有的物理页，不要求连续
    Pmm(Vec<FrameTracker>),
    /// 借用的连续物理范围
    Dma(PhysRange),
}

/// 引用计数的内存对象
#[derive(Debug)]
pub struct Vmo {
    kind: VmoKind,
    flags: VmoFlags,
    len: usize,
}

impl Vmo {
    /// 分配一个 `len` 字节的内存对象，长度向上取整到整页
    ///
    /// 页来自物理帧分配器且已清零。`len` 为零时拒绝；
    /// `flags` 是布局提示，分配器绝不产出 DMA 对象，
    /// 带 [`VmoFlags::DMA`] 的请求被拒绝。
    pub fn alloc(len: usize, flags: VmoFlags) -> KernelResult<Arc<Vmo>> {
        if len == 0 || flags.contains(VmoFlags::DMA) {
            return Err(KernelError::InvalidInput);
        }
        let pages = pages_of(len);
        let frames = pmm::alloc_frames(pages)?;
        Ok(Arc::new(Vmo {
            kind: VmoKind::Pmm(frames),
            flags,
            len: pages * PAGE_SIZE,
        }))
    }

    /// 把一段外部物理范围包装成内存对象
    ///
    /// 范围必须按页对齐且非空。典型用途是设备内存和启动载荷，
    /// 这段内存不归 VMO 所有，Drop 时不释放。
    pub fn dma(range: PhysRange) -> KernelResult<Arc<Vmo>> {
        if !range.is_valid() {
            return Err(KernelError::InvalidInput);
        }
        Ok(Arc::new(Vmo {
            kind: VmoKind::Dma(range),
            flags: VmoFlags::DMA,
            len: range.len(),
        }))
    }

    /// 对象的属性标志
    pub fn flags(&self) -> VmoFlags {
        self.flags
    }

    /// 是否是借用的 DMA 范围
    pub fn is_dma(&self) -> bool {
        self.flags.contains(VmoFlags::DMA)
    }

    /// 字节长度，恒为整页
    pub fn len(&self) -> usize {
        self.len
    }

    /// 长度是否为零（构造保证非零，恒为 false）
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 页数
    pub fn page_count(&self) -> usize {
        self.len / PAGE_SIZE
    }

    /// 第 `index` 页的物理基址
    pub fn page_at(&self, index: usize) -> KernelResult<PhysAddr> {
        if index >= self.page_count() {
            return Err(KernelError::InvalidInput);
        }
        Ok(match &self.kind {
            VmoKind::Pmm(frames) => frames[index].base(),
            VmoKind::Dma(range) => range.start().add_by(index * PAGE_SIZE),
        })
    }

    /// 把 `data` 写入对象内偏移 `offset` 处
    ///
    /// 跨页写入逐页进行，越界时整个写入被拒绝、不做部分写。
    pub fn write(&self, offset: usize, data: &[u8]) -> KernelResult<()> {
        self.check_span(offset, data.len())?;
        let mut done = 0;
        while done < data.len() {
            let pos = offset + done;
            let in_page = pos % PAGE_SIZE;
            let chunk = (PAGE_SIZE - in_page).min(data.len() - done);
            let pa = self.page_at(pos / PAGE_SIZE)?.add_by(in_page);
            let va = hal::get().phys_to_virt(pa);
            unsafe {
                core::ptr::copy_nonoverlapping(data[done..].as_ptr(), va, chunk);
            }
            done += chunk;
        }
        Ok(())
    }

    /// 从对象内偏移 `offset` 处读出 `buf.len()` 字节
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> KernelResult<()> {
        self.check_span(offset, buf.len())?;
        let mut done = 0;
        while done < buf.len() {
            let pos = offset + done;
            let in_page = pos % PAGE_SIZE;
            let chunk = (PAGE_SIZE - in_page).min(buf.len() - done);
            let pa = self.page_at(pos / PAGE_SIZE)?.add_by(in_page);
            let va = hal::get().phys_to_virt(pa);
            unsafe {
                core::ptr::copy_nonoverlapping(va, buf[done..].as_mut_ptr(), chunk);
            }
            done += chunk;
        }
        Ok(())
    }

    fn check_span(&self, offset: usize, len: usize) -> KernelResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(KernelError::InvalidInput),
        }
    }
}
