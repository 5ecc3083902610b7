//! IRQ 触发注册表
//!
//! 设备中断号在这里绑定到事件对象：中断到来时触发事件，
//! 以该事件为阻塞条件的任务在下一趟调度被唤醒。定时器中断
//! 不走注册表，由陷入胶水直接送进调度器（见 [`crate::trap`]）。

use alloc::sync::Arc;

use hashbrown::HashMap;
use lazy_static::lazy_static;

use crate::error::{KernelError, KernelResult};
use crate::sync::SpinLock;
use crate::task::Event;

lazy_static! {
    static ref BINDINGS: SpinLock<HashMap<u32, Arc<Event>>> = SpinLock::new(HashMap::new());
}

/// 把中断号绑定到事件，一个中断号同时只有一个绑定
pub fn bind(line: u32, event: Arc<Event>) -> KernelResult<()> {
    let mut b = BINDINGS.lock();
    if b.contains_key(&line) {
        return Err(KernelError::AlreadyExists);
    }
    b.insert(line, event);
    Ok(())
}

/// 解除中断号的绑定
pub fn unbind(line: u32) -> KernelResult<()> {
    match BINDINGS.lock().remove(&line) {
        Some(_) => Ok(()),
        None => Err(KernelError::NotFound),
    }
}

/// 触发一个中断号对应的事件，返回是否有绑定
pub fn trigger(line: u32) -> bool {
    match BINDINGS.lock().get(&line) {
        Some(ev) => {
            ev.trigger();
            true
        }
        None => {
            pr_debug!("irq: spurious interrupt on line {}", line);
            false
        }
    }
}
