//! 阻塞条件
//!
//! 阻塞原因是一个封闭的枚举而不是任意闭包，每种原因自带
//! 满足判定，使状态机可以被穷举测试。判定只读取当前逻辑时间
//! 和事件/信箱的原子状态，绝不在调度器锁内做别的事。

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::sync::SpinLock;
use crate::time::TimeStamp;

/// 一次性可重置的事件，IRQ 注册表和任务间通知使用
#[derive(Debug, Default)]
pub struct Event {
    signaled: AtomicBool,
}

impl Event {
    /// 创建一个未触发的事件
    pub fn new() -> Arc<Event> {
        Arc::new(Event::default())
    }

    /// 触发事件，唤醒所有以它为阻塞条件的任务
    pub fn trigger(&self) {
        self.signaled.store(true, Ordering::Release);
    }

    /// 当前是否已触发
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    /// 清除触发状态，供下一轮等待复用
    pub fn reset(&self) {
        self.signaled.store(false, Ordering::Release);
    }
}

/// 单词消息的简单信箱
#[derive(Debug, Default)]
pub struct Mailbox {
    queue: SpinLock<VecDeque<usize>>,
}

impl Mailbox {
    /// 创建一个空信箱
    pub fn new() -> Arc<Mailbox> {
        Arc::new(Mailbox::default())
    }

    /// 投递一条消息
    pub fn post(&self, msg: usize) {
        self.queue.lock().push_back(msg);
    }

    /// 取出最早的一条消息
    pub fn try_recv(&self) -> Option<usize> {
        self.queue.lock().pop_front()
    }

    /// 是否有待取消息
    pub fn has_pending(&self) -> bool {
        !self.queue.lock().is_empty()
    }
}

/// 任务被挂起的原因
#[derive(Debug, Clone)]
pub enum Blocker {
    /// 等到逻辑时间到达给定时刻
    Deadline(TimeStamp),
    /// 等待事件被触发
    Event(Arc<Event>),
    /// 等待信箱里出现消息
    Message(Arc<Mailbox>),
}

impl Blocker {
    /// 以当前逻辑时间判定条件是否已满足
    pub fn is_satisfied(&self, now: TimeStamp) -> bool {
        match self {
            Blocker::Deadline(at) => now >= *at,
            Blocker::Event(ev) => ev.is_signaled(),
            Blocker::Message(mb) => mb.has_pending(),
        }
    }
}
