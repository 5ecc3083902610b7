//! 硬件抽象层
//!
//! 内核核心不直接触碰任何体系结构细节：中断开关、控制台输出、
//! 物理内存的内核视图、地址空间切换和让出 CPU 全部经由 [`Hal`]
//! trait 进入。具体后端在启动极早期通过 [`install`] 安装一次，
//! 之后不可替换。
//!
//! 安装槽使用 `spin::Once`，安装本身不需要堆，
//! 因此日志和锁可以在堆初始化之前就安全工作。

mod context;
#[cfg(test)]
pub mod mock;

pub use context::UserContext;

use spin::Once;

use crate::mm::addr::PhysAddr;

/// 体系结构后端必须实现的接口
pub trait Hal: Sync {
    /// 向内核控制台写一段文本
    fn console_write(&self, s: &str);

    /// 关闭本地中断并返回之前的中断状态字
    ///
    /// # Safety
    /// 调用方必须保证返回的状态字最终交还给
    /// [`Hal::restore_interrupts`]，否则中断将永久关闭。
    unsafe fn read_and_disable_interrupts(&self) -> usize;

    /// 恢复 [`Hal::read_and_disable_interrupts`] 保存的中断状态
    ///
    /// # Safety
    /// `flags` 必须来自同一 CPU 上配对的保存调用。
    unsafe fn restore_interrupts(&self, flags: usize);

    /// 状态字对应的中断是否处于开启状态
    fn interrupts_were_enabled(&self, flags: usize) -> bool;

    /// 物理地址在内核地址空间中的可访问指针
    fn phys_to_virt(&self, pa: PhysAddr) -> *mut u8;

    /// 切换当前激活的用户地址空间（安装顶级页表）
    fn activate_space(&self, root: PhysAddr);

    /// 让出 CPU，触发一次重调度
    fn yield_now(&self);

    /// 空转等待下一个中断
    fn wait_for_interrupt(&self);
}

/// 全局 HAL 安装槽
static HAL: Once<&'static dyn Hal> = Once::new();

/// 安装 HAL 后端，只有第一次调用生效
pub fn install(hal: &'static dyn Hal) {
    HAL.call_once(|| hal);
}

/// 已安装的后端，未安装时返回 `None`
pub fn try_get() -> Option<&'static dyn Hal> {
    HAL.get().copied()
}

/// 已安装的后端，未安装时 panic
pub fn get() -> &'static dyn Hal {
    match try_get() {
        Some(h) => h,
        None => panic!("HAL backend not installed"),
    }
}

/// 关中断并保存状态；HAL 未安装时视为中断本就关闭
///
/// # Safety
/// 与 [`Hal::read_and_disable_interrupts`] 相同。
pub unsafe fn read_and_disable_interrupts() -> usize {
    match try_get() {
        Some(h) => unsafe { h.read_and_disable_interrupts() },
        None => 0,
    }
}

/// 恢复中断状态；HAL 未安装时是空操作
///
/// # Safety
/// 与 [`Hal::restore_interrupts`] 相同。
pub unsafe fn restore_interrupts(flags: usize) {
    if let Some(h) = try_get() {
        unsafe { h.restore_interrupts(flags) };
    }
}
