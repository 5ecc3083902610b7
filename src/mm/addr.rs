//! 强类型地址
//!
//! 物理地址与虚拟地址各用一个 newtype 区分，
//! 避免两者在接口上被混用。按页对齐的辅助方法集中在这里。

use core::fmt;
use core::ops::Range;

use crate::config::PAGE_SIZE;

/// 物理地址
#[repr(transparent)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysAddr(usize);

/// 虚拟地址
#[repr(transparent)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtAddr(usize);

macro_rules! impl_addr_common {
    ($type:ty) => {
        impl $type {
            /// 空地址
            pub const fn null() -> Self {
                Self(0)
            }

            /// 从 usize 构造
            pub const fn from_usize(value: usize) -> Self {
                Self(value)
            }

            /// 数值形式
            pub const fn as_usize(self) -> usize {
                self.0
            }

            /// 是否为空地址
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }

            /// 页内偏移
            pub const fn page_offset(self) -> usize {
                self.0 & (PAGE_SIZE - 1)
            }

            /// 是否按页对齐
            pub const fn is_page_aligned(self) -> bool {
                self.page_offset() == 0
            }

            /// 向下对齐到页边界
            pub const fn align_down(self) -> Self {
                Self(self.0 & !(PAGE_SIZE - 1))
            }

            /// 向上对齐到页边界
            pub const fn align_up(self) -> Self {
                Self((self.0 + PAGE_SIZE - 1) & !(PAGE_SIZE - 1))
            }

            /// 偏移 `offset` 字节后的地址
            pub const fn add_by(self, offset: usize) -> Self {
                Self(self.0 + offset)
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

impl_addr_common!(PhysAddr);
impl_addr_common!(VirtAddr);

/// 把字节数向上取整为整页数
pub const fn pages_of(len: usize) -> usize {
    len.div_ceil(PAGE_SIZE)
}

/// 一段按页对齐的物理地址范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysRange {
    start: PhysAddr,
    len: usize,
}

impl PhysRange {
    /// 构造一段物理范围
    pub const fn new(start: PhysAddr, len: usize) -> Self {
        PhysRange { start, len }
    }

    /// 起始地址
    pub const fn start(self) -> PhysAddr {
        self.start
    }

    /// 结束地址（不含）
    pub const fn end(self) -> PhysAddr {
        PhysAddr(self.start.0 + self.len)
    }

    /// 字节长度
    pub const fn len(self) -> usize {
        self.len
    }

    /// 长度是否为零
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    /// 起点和长度是否都按页对齐且长度非零
    pub const fn is_valid(self) -> bool {
        self.start.is_page_aligned() && self.len != 0 && self.len % PAGE_SIZE == 0
    }
}

/// 一段按页对齐的虚拟地址范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtRange {
    start: VirtAddr,
    len: usize,
}

impl VirtRange {
    /// 构造一段范围，起点与长度都必须按页对齐且长度非零
    pub const fn new(start: VirtAddr, len: usize) -> Self {
        VirtRange { start, len }
    }

    /// 起始地址
    pub const fn start(self) -> VirtAddr {
        self.start
    }

    /// 结束地址（不含）
    pub const fn end(self) -> VirtAddr {
        VirtAddr(self.start.0 + self.len)
    }

    /// 字节长度
    pub const fn len(self) -> usize {
        self.len
    }

    /// 长度是否为零
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    /// 起点和长度是否都按页对齐且长度非零
    pub const fn is_valid(self) -> bool {
        self.start.is_page_aligned() && self.len != 0 && self.len % PAGE_SIZE == 0
    }

    /// 某个地址是否落在范围内
    pub const fn contains(self, addr: VirtAddr) -> bool {
        self.start.0 <= addr.0 && addr.0 < self.end().0
    }

    /// 两段范围是否有任何页重叠
    pub const fn overlaps(self, other: VirtRange) -> bool {
        self.start.0 < other.end().0 && other.start.0 < self.end().0
    }

    /// usize 形式的半开区间
    pub fn as_usize_range(self) -> Range<usize> {
        self.start.0..self.end().0
    }
}
