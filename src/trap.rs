//! 陷入胶水
//!
//! 体系结构后端把四类陷入翻译成对本模块的调用：定时器中断、
//! 其它设备中断、系统调用、以及 CPU 故障。这里是调度器唯一的
//! 外部触发点。

use crate::config::{TICK_MS, TIMER_IRQ};
use crate::error::KernelError;
use crate::irq;
use crate::sched;
use crate::syscall;
use crate::syscall::abi::{SYSCALL_ARG_COUNT, encode_ret};
use crate::task::Mode;
use crate::time::TimeSpan;

/// 定时器中断：时间基推进一个节拍并重调度
pub fn timer_tick() {
    sched::schedule(TimeSpan::from_ms(TICK_MS));
}

/// 显式让出：零时间片重调度，时间基不动
pub fn resched_now() {
    sched::schedule(TimeSpan::ZERO);
}

/// 设备中断入口
///
/// 定时器直通调度器；其余中断号触发注册表里的事件，
/// 然后零时间片重调度，让被唤醒的任务立刻参与候选。
pub fn handle_irq(line: u32) {
    if line == TIMER_IRQ {
        timer_tick();
    } else {
        irq::trigger(line);
        resched_now();
    }
}

/// 系统调用入口
///
/// 以当前任务的身份分发；进入前切到内核特权，返回前经
/// [`crate::task::Task::leave`] 回到用户态（若任务已被标记退出，
/// leave 会直接让出而不返回用户态）。
pub fn handle_syscall(selector: usize, args: [usize; SYSCALL_ARG_COUNT]) -> usize {
    let Some(task) = sched::current() else {
        return encode_ret(Err(KernelError::InvalidInput));
    };
    task.lock().enter(Mode::Super);
    let ret = syscall::dispatch(&task, selector, args);
    task.leave();
    ret
}

/// 用户态故障：当前任务标记坠毁，其它任务不受影响
pub fn user_fault(desc: &str, ip: usize) {
    if let Some(task) = sched::current() {
        pr_err!(
            "fault in task {} ({}) at ip={:#x}: {}",
            task.id(),
            task.label(),
            ip,
            desc
        );
        task.crash();
    }
    resched_now();
}

/// 内核态故障：不可恢复，诊断输出后停机
pub fn kernel_fault(desc: &str, ip: usize) -> ! {
    pr_emerg!("kernel fault at ip={:#x}: {}", ip, desc);
    pr_emerg!("stamp={} tasks={}", crate::sched::stamp().as_ms(), sched::task_count());
    loop {
        crate::hal::get().wait_for_interrupt();
    }
}
