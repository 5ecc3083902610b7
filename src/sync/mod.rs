//! 同步原语
//!
//! 向其它内核模块提供基本的锁和同步原语，
//! 包括自旋锁、中断保护和锁持有计数。

mod intr_guard;
mod lock_tracker;
mod raw_spin_lock_without_guard;
mod spin_lock;

pub use intr_guard::*;
pub use lock_tracker::*;
pub use raw_spin_lock_without_guard::*;
pub use spin_lock::*;
