//! 任务地址空间
//!
//! [`Space`] 维护一张权威的逻辑映射表：哪些虚拟页区间映射到
//! 哪个 VMO 的哪个偏移、带什么权限。硬件页表如何编码这张表
//! 是体系结构后端的事，核心只通过 [`Space::activate`] 通知后端
//! 当前应当生效的空间根。
//!
//! 表内区间互不重叠，按起始地址有序，自动布局从
//! [`SPACE_AUTO_BASE`] 向上找第一个足够大的空洞。

use alloc::sync::Arc;
use alloc::vec::Vec;

use bitflags::bitflags;

use crate::config::{PAGE_SIZE, SPACE_AUTO_BASE};
use crate::error::{KernelError, KernelResult};
use crate::hal;
use crate::mm::addr::{PhysAddr, VirtAddr, VirtRange};
use crate::mm::pmm::{self, FrameTracker};
use crate::mm::vmo::Vmo;
use crate::sync::SpinLock;

bitflags! {
    /// 映射权限
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MapFlags: u8 {
        /// 可读
        const READ = 1 << 0;
        /// 可写
        const WRITE = 1 << 1;
        /// 可执行
        const EXEC = 1 << 2;
    }
}

/// 映射表中的一条记录
#[derive(Debug, Clone)]
pub struct Mapping {
    range: VirtRange,
    vmo: Arc<Vmo>,
    /// VMO 内的起始偏移
    offset: usize,
    flags: MapFlags,
}

impl Mapping {
    /// 映射的虚拟区间
    pub fn range(&self) -> VirtRange {
        self.range
    }

    /// 映射权限
    pub fn flags(&self) -> MapFlags {
        self.flags
    }

    /// 被映射的内存对象
    pub fn vmo(&self) -> &Arc<Vmo> {
        &self.vmo
    }
}

/// 共享的地址空间引用
pub type SharedSpace = Arc<SpinLock<Space>>;

/// 一个任务地址空间
#[derive(Debug)]
pub struct Space {
    /// 顶级页表帧，交给后端安装
    root: FrameTracker,
    /// 按起始地址有序、互不重叠
    mappings: Vec<Mapping>,
}

impl Space {
    /// 创建一个空的地址空间
    pub fn create() -> KernelResult<SharedSpace> {
        let root = pmm::alloc_frame()?;
        Ok(Arc::new(SpinLock::new(Space {
            root,
            mappings: Vec::new(),
        })))
    }

    /// 空间根帧的物理基址
    pub fn root(&self) -> PhysAddr {
        self.root.base()
    }

    /// 当前映射条数
    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }

    /// 把 `vmo` 的 `[offset, offset + len)` 映射进本空间
    ///
    /// `at` 给定时映射在指定地址，与现有区间有任何页重叠都会被
    /// 整体拒绝（`AlreadyExists`）；为 `None` 时自动选址。
    /// 成功返回实际占用的虚拟区间。
    pub fn map(
        &mut self,
        at: Option<VirtAddr>,
        vmo: Arc<Vmo>,
        offset: usize,
        len: usize,
        flags: MapFlags,
    ) -> KernelResult<VirtRange> {
        if len == 0
            || len % PAGE_SIZE != 0
            || offset % PAGE_SIZE != 0
            || flags.is_empty()
            || offset.checked_add(len).is_none_or(|end| end > vmo.len())
        {
            return Err(KernelError::InvalidInput);
        }

        let range = match at {
            Some(start) => {
                // 区间不得回绕地址空间顶端，否则 end() 失去意义，
                // 重叠判定会被悄悄绕过
                if !start.is_page_aligned()
                    || start.is_null()
                    || start.as_usize().checked_add(len).is_none()
                {
                    return Err(KernelError::InvalidInput);
                }
                let range = VirtRange::new(start, len);
                if self.mappings.iter().any(|m| m.range.overlaps(range)) {
                    return Err(KernelError::AlreadyExists);
                }
                range
            }
            None => self.find_slot(len)?,
        };

        let pos = self
            .mappings
            .partition_point(|m| m.range.start() < range.start());
        self.mappings.insert(
            pos,
            Mapping {
                range,
                vmo,
                offset,
                flags,
            },
        );
        Ok(range)
    }

    /// 从 [`SPACE_AUTO_BASE`] 向上找第一个能放下 `len` 字节的空洞
    fn find_slot(&self, len: usize) -> KernelResult<VirtRange> {
        let mut candidate = VirtAddr::from_usize(SPACE_AUTO_BASE);
        for m in &self.mappings {
            let range = VirtRange::new(candidate, len);
            if m.range.overlaps(range) {
                candidate = m.range.end();
            }
        }
        match candidate.as_usize().checked_add(len) {
            Some(_) => Ok(VirtRange::new(candidate, len)),
            None => Err(KernelError::OutOfMemory),
        }
    }

    /// 撤销一条映射，`range` 必须与安装时返回的区间完全一致
    pub fn unmap(&mut self, range: VirtRange) -> KernelResult<()> {
        match self.mappings.iter().position(|m| m.range == range) {
            Some(pos) => {
                self.mappings.remove(pos);
                Ok(())
            }
            None => Err(KernelError::NotFound),
        }
    }

    /// 撤销全部映射，任务退出路径使用
    pub fn clear(&mut self) {
        self.mappings.clear();
    }

    /// 把虚拟地址翻译成物理地址和所在映射的权限
    pub fn resolve(&self, va: VirtAddr) -> KernelResult<(PhysAddr, MapFlags)> {
        let m = self
            .mappings
            .iter()
            .find(|m| m.range.contains(va))
            .ok_or(KernelError::NotFound)?;
        let delta = va.as_usize() - m.range.start().as_usize();
        let pos = m.offset + delta;
        let pa = m.vmo.page_at(pos / PAGE_SIZE)?.add_by(pos % PAGE_SIZE);
        Ok((pa, m.flags))
    }

    /// 按本空间的映射读出一段用户内存
    ///
    /// 每一页都要求 `READ` 权限，越过未映射页时整体失败。
    pub fn read_bytes(&self, va: VirtAddr, buf: &mut [u8]) -> KernelResult<()> {
        let mut done = 0;
        while done < buf.len() {
            let cur = va.add_by(done);
            let (pa, flags) = self.resolve(cur)?;
            if !flags.contains(MapFlags::READ) {
                return Err(KernelError::PermissionDenied);
            }
            let in_page = cur.page_offset();
            let chunk = (PAGE_SIZE - in_page).min(buf.len() - done);
            let src = hal::get().phys_to_virt(pa);
            unsafe {
                core::ptr::copy_nonoverlapping(src, buf[done..].as_mut_ptr(), chunk);
            }
            done += chunk;
        }
        Ok(())
    }

    /// 通知后端激活本空间
    pub fn activate(&self) {
        hal::get().activate_space(self.root());
    }
}

impl Drop for Space {
    fn drop(&mut self) {
        // 映射持有 VMO 引用，悄悄连带释放会掩盖任务清理路径的缺陷
        if !self.mappings.is_empty() {
            panic!("address space dropped with {} live mappings", self.mappings.len());
        }
    }
}
