//! argon 微内核核心
//!
//! 基于能力（capability）的单核微内核：在一个 CPU 核心上复用多个任务，
//! 通过引用计数的内存对象（VMO）管理物理/虚拟内存，
//! 并在每次系统调用前执行任务级的能力检查。
//!
//! 体系结构相关的后端（中断向量表、页表编码、寄存器帧布局等）不在本 crate 内，
//! 通过 [`hal`] 边界以窄接口的形式被消费；设备驱动与用户态表示层同理。
#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
pub mod log;

pub mod config;
pub mod entry;
pub mod error;
pub mod hal;
pub mod handover;
pub mod irq;
pub mod mm;
pub mod sched;
pub mod sync;
pub mod syscall;
pub mod task;
pub mod time;
pub mod trap;

#[cfg(test)]
#[macro_use]
pub mod test_support;
