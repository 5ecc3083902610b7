//! 锁持有计数
//!
//! 记录当前执行流持有的任务锁数量。调度器入口处断言计数为零：
//! 带着任务锁进入调度器会在切换路径上与其它 CPU 路径形成
//! 锁序颠倒，这类 bug 只在特定交错下才暴露，用计数器把它
//! 变成确定性的断言失败。

#[cfg(not(test))]
mod imp {
    use core::sync::atomic::{AtomicUsize, Ordering};

    static TASK_LOCKS: AtomicUsize = AtomicUsize::new(0);

    pub fn acquired() {
        TASK_LOCKS.fetch_add(1, Ordering::Relaxed);
    }

    pub fn released() {
        TASK_LOCKS.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn held() -> usize {
        TASK_LOCKS.load(Ordering::Relaxed)
    }
}


/// 记录获取了一把任务锁
pub fn task_lock_acquired() {
    imp::acquired();
}

/// 记录释放了一把任务锁
pub fn task_lock_released() {
    imp::released();
}

/// 当前执行流持有的任务锁数量
pub fn task_locks_held() -> usize {
    imp::held()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kassert, test_case};

    test_case!(test_lock_tracker_counts, {
        let before = task_locks_held();
        task_lock_acquired();
        task_lock_acquired();
        kassert!(task_locks_held() == before + 2);
        task_lock_released();
        task_lock_released();
        kassert!(task_locks_held() == before);
    });
}
