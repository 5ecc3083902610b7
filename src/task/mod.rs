//! 任务子系统
//!
//! - [`task`]: 任务结构体与生命周期状态机
//! - [`state`]: 状态、特权模式与信号位
//! - [`pledge`]: 能力位
//! - [`blocker`]: 封闭的阻塞条件
//! - [`domain`]: 能力域与句柄表

pub mod blocker;
pub mod domain;
pub mod pledge;
pub mod state;
#[allow(clippy::module_inception)]
pub mod task;

pub use blocker::{Blocker, Event, Mailbox};
pub use domain::{Domain, Handle, Object, SharedDomain};
pub use pledge::Pledges;
pub use state::{Mode, Sigs, TaskState};
pub use task::{SharedTask, Task, TaskGuard};
