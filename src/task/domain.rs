//! 能力域与句柄表
//!
//! 域是任务可触达对象的分组边界：用户态只拿到不透明的句柄值，
//! 内核在域的句柄表里把它换成对象引用。对象种类是一个封闭的
//! 枚举，不做开放式虚分发。
//!
//! 句柄表持有对象的强引用：`dup` 增加一条表项，`drop` 删除一条，
//! 最后一个引用消失时对象随 `Arc` 释放。

use alloc::sync::Arc;

use hashbrown::HashMap;

use crate::error::{KernelError, KernelResult};
use crate::mm::space::SharedSpace;
use crate::mm::vmo::Vmo;
use crate::sync::SpinLock;
use crate::task::blocker::Event;
use crate::task::task::SharedTask;

/// 用户态可见的不透明句柄值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    /// 从原始句柄字构造
    pub const fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    /// 原始句柄字
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

/// 内核向用户态暴露的对象种类
#[derive(Debug, Clone)]
pub enum Object {
    /// 任务
    Task(SharedTask),
    /// 地址空间
    Space(SharedSpace),
    /// 内存对象
    Vmo(Arc<Vmo>),
    /// 能力域
    Domain(SharedDomain),
    /// 事件
    Event(Arc<Event>),
}

impl Object {
    /// 作为 VMO 解包
    pub fn as_vmo(&self) -> KernelResult<Arc<Vmo>> {
        match self {
            Object::Vmo(v) => Ok(Arc::clone(v)),
            _ => Err(KernelError::BadHandle),
        }
    }

    /// 作为地址空间解包
    pub fn as_space(&self) -> KernelResult<SharedSpace> {
        match self {
            Object::Space(s) => Ok(Arc::clone(s)),
            _ => Err(KernelError::BadHandle),
        }
    }

    /// 作为任务解包
    pub fn as_task(&self) -> KernelResult<SharedTask> {
        match self {
            Object::Task(t) => Ok(Arc::clone(t)),
            _ => Err(KernelError::BadHandle),
        }
    }

    /// 作为域解包
    pub fn as_domain(&self) -> KernelResult<SharedDomain> {
        match self {
            Object::Domain(d) => Ok(Arc::clone(d)),
            _ => Err(KernelError::BadHandle),
        }
    }
}

/// 共享的域引用
pub type SharedDomain = Arc<SpinLock<Domain>>;

/// 一个能力域
#[derive(Debug, Default)]
pub struct Domain {
    handles: HashMap<Handle, Object>,
    next: u32,
}

impl Domain {
    /// 创建一个空域
    pub fn create() -> SharedDomain {
        Arc::new(SpinLock::new(Domain {
            handles: HashMap::new(),
            next: 1,
        }))
    }

    /// 收下一个对象，返回新句柄
    pub fn attach(&mut self, obj: Object) -> Handle {
        let h = Handle(self.next);
        self.next += 1;
        self.handles.insert(h, obj);
        h
    }

    /// 查出句柄对应的对象
    pub fn lookup(&self, h: Handle) -> KernelResult<Object> {
        self.handles.get(&h).cloned().ok_or(KernelError::BadHandle)
    }

    /// 复制一条句柄，两个句柄指向同一个对象
    pub fn dup(&mut self, h: Handle) -> KernelResult<Handle> {
        let obj = self.lookup(h)?;
        Ok(self.attach(obj))
    }

    /// 删除一条句柄
    pub fn drop_handle(&mut self, h: Handle) -> KernelResult<()> {
        match self.handles.remove(&h) {
            Some(_) => Ok(()),
            None => Err(KernelError::BadHandle),
        }
    }

    /// 表里现存的句柄条数
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }
}
