//! 启动交接（handover）载荷
//!
//! 引导器把发现的物理内存区域（空闲/保留/文件）整理成一张记录
//! 表交给内核。内核在启动时校验一次、据此初始化物理内存账本并
//! 定位初始用户程序，此后不再回头解析引导器的线格式。

use crate::config::PAGE_SIZE;
use crate::error::{KernelError, KernelResult};
use crate::mm::addr::{PhysAddr, PhysRange};

/// 载荷魔数
pub const HANDOVER_MAGIC: u64 = 0xc001_b001;

/// 记录类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// 可分配的空闲内存
    Free,
    /// 固件/设备保留，不可触碰
    Reserved,
    /// 引导器装载的文件
    File,
}

/// 一条内存记录
#[derive(Debug, Clone, Copy)]
pub struct Record {
    /// 类别
    pub tag: Tag,
    /// 物理起始地址
    pub start: usize,
    /// 字节长度
    pub len: usize,
    /// 文件记录的名字，其它类别为 None
    pub name: Option<&'static str>,
}

impl Record {
    /// 记录覆盖的物理范围
    pub fn range(&self) -> PhysRange {
        PhysRange::new(PhysAddr::from_usize(self.start), self.len)
    }
}

/// 校验过的启动载荷
#[derive(Debug)]
pub struct Payload {
    /// 魔数，必须等于 [`HANDOVER_MAGIC`]
    pub magic: u64,
    /// 记录表
    pub records: &'static [Record],
    /// 载荷自身占用的物理范围，映射给初始用户程序用
    pub blob: Option<PhysRange>,
}

impl Payload {
    /// 基本合法性检查
    ///
    /// 魔数、非空表、每条记录非零长且不回绕、至少一条 FREE。
    /// 启动期没有用户态可以接住错误，调用方把任何失败当作致命。
    pub fn validate(&self) -> KernelResult<()> {
        if self.magic != HANDOVER_MAGIC {
            return Err(KernelError::InvalidInput);
        }
        if self.records.is_empty() {
            return Err(KernelError::InvalidInput);
        }
        for r in self.records {
            if r.len == 0 || r.start.checked_add(r.len).is_none() {
                return Err(KernelError::InvalidInput);
            }
            if (r.tag == Tag::File) != r.name.is_some() {
                return Err(KernelError::InvalidInput);
            }
        }
        if !self.records.iter().any(|r| r.tag == Tag::Free) {
            return Err(KernelError::InvalidInput);
        }
        Ok(())
    }

    /// 打印记录表
    pub fn dump(&self) {
        pr_info!("handover: {} records", self.records.len());
        for r in self.records {
            pr_info!(
                "handover: {:?} {:#x}..{:#x}{}{}",
                r.tag,
                r.start,
                r.start + r.len,
                if r.name.is_some() { " " } else { "" },
                r.name.unwrap_or("")
            );
        }
    }

    /// 最大的一块空闲区域，按页收缩到对齐边界
    pub fn largest_free(&self) -> KernelResult<PhysRange> {
        self.records
            .iter()
            .filter(|r| r.tag == Tag::Free)
            .map(|r| {
                let start = PhysAddr::from_usize(r.start).align_up();
                let end = PhysAddr::from_usize(r.start + r.len).align_down();
                let len = end.as_usize().saturating_sub(start.as_usize());
                PhysRange::new(start, len)
            })
            .filter(|r| r.len() >= PAGE_SIZE)
            .max_by_key(|r| r.len())
            .ok_or(KernelError::InvalidInput)
    }

    /// 按名字找一条文件记录
    pub fn find_file(&self, name: &str) -> KernelResult<&Record> {
        self.records
            .iter()
            .find(|r| r.tag == Tag::File && r.name == Some(name))
            .ok_or(KernelError::NotFound)
    }
}
