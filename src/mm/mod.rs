//! 内存管理
//!
//! 与体系结构无关的内存管理抽象：
//!
//! - [`addr`]: 强类型地址与范围
//! - [`heap`]: 内核堆全局分配器
//! - [`pmm`]: 物理帧分配与用量账本
//! - [`vmo`]: 引用计数的内存对象
//! - [`space`]: 任务地址空间与映射表
//!
//! 硬件页表的编码与安装属于体系结构后端，核心只维护
//! 权威的逻辑映射表（见 [`space::Space`]）。

pub mod addr;
pub mod heap;
pub mod pmm;
pub mod space;
pub mod vmo;
