//! 调度器
//!
//! 单核调度：活跃任务集 + 单调时间基 + 每次重调度的一趟扫描。
//! 选择规则是最早到期优先（比较 `slice_end`），同值时先被扫描到
//! 的任务获胜；空转任务是兜底，只在没有任何可运行任务时当选。
//!
//! 约束：
//! 1. [`schedule`] 是唯一的重调度入口，只被陷入路径调用；
//! 2. 进入调度器时当前执行流不得持有任何任务锁
//!    （调试断言，见 [`crate::sync::task_locks_held`]）；
//! 3. 活跃集的淘汰与候选选择在同一趟扫描内完成，
//!    整趟扫描观察同一个 `stamp`。
// XXX: 只比较 slice_end、没有优先级字段，slice_end 持续被刷新的
//      任务可能饿死其它任务。保持现状。

use alloc::sync::Arc;
use alloc::vec::Vec;

use lazy_static::lazy_static;

use crate::error::{KernelError, KernelResult};
use crate::sync::{SpinLock, task_locks_held};
use crate::task::{Mode, SharedTask, TaskState};
use crate::time::{TimeSpan, TimeStamp};

lazy_static! {
    /// 全局调度器，entry::init 构造一次，此后只通过本模块的
    /// 函数访问
    static ref SCHED: SpinLock<Option<Sched>> = SpinLock::new(None);
}

/// 调度器状态
struct Sched {
    /// 单调逻辑时间
    stamp: TimeStamp,
    /// 活跃任务集，扫描顺序即入队顺序
    tasks: Vec<SharedTask>,
    /// 兜底的空转任务，始终存在、从不淘汰
    idle: SharedTask,
    /// 正在运行的任务
    curr: SharedTask,
    /// 上一个运行的任务
    prev: SharedTask,
}

impl Sched {
    fn new(boot: SharedTask) -> Self {
        Sched {
            stamp: TimeStamp::ZERO,
            tasks: Vec::new(),
            idle: Arc::clone(&boot),
            curr: Arc::clone(&boot),
            prev: boot,
        }
    }

    fn enqueue(&mut self, task: SharedTask) -> KernelResult<()> {
        if task.lock().ctx.is_none() {
            return Err(KernelError::InvalidInput);
        }
        if self.tasks.iter().any(|t| Arc::ptr_eq(t, &task)) {
            return Err(KernelError::InvalidInput);
        }
        pr_debug!("sched: enqueue task {} ({})", task.id(), task.label());
        self.tasks.push(task);
        Ok(())
    }

    /// 一趟扫描：推进时间、评估、淘汰、选择
    fn schedule(&mut self, span: TimeSpan) -> SharedTask {
        self.stamp += span;
        self.prev = Arc::clone(&self.curr);
        self.curr.lock().slice_end = self.stamp;
        // 空转任务永远拿一个比别人都晚一拍的合成到期时刻
        self.idle.lock().slice_end = self.stamp + TimeSpan::from_ms(1);

        let mut next = Arc::clone(&self.idle);
        let mut i = 0;
        while i < self.tasks.len() {
            let t = Arc::clone(&self.tasks[i]);
            let (state, t_end) = {
                let mut g = t.lock();
                (g.eval(self.stamp), g.slice_end)
            };
            match state {
                TaskState::Exited => {
                    // remove 保序，后续任务的同值竞争顺序不变
                    let gone = self.tasks.remove(i);
                    release(&gone);
                    continue;
                }
                TaskState::Runnable => {
                    let n_end = next.lock().slice_end;
                    // 真实任务之间严格更早才换人（先到先得）；
                    // 候选还是空转任务时任何可运行任务都接管
                    if t_end < n_end || Arc::ptr_eq(&next, &self.idle) {
                        next = t;
                    }
                }
                TaskState::Blocked => {}
            }
            i += 1;
        }

        self.curr = Arc::clone(&next);
        next
    }
}

/// 淘汰路径：释放任务占有的资源
///
/// 能力域先放（它的句柄表可能还持有空间引用），随后若本任务是
/// 空间的最后一个引用者，显式撤掉全部映射再释放空间。
fn release(task: &SharedTask) {
    pr_info!("sched: task {} ({}) evicted", task.id(), task.label());
    let (space, domain) = {
        let mut g = task.lock();
        g.ctx = None;
        (g.space.take(), g.domain.take())
    };
    drop(domain);
    if let Some(space) = space {
        if Arc::strong_count(&space) == 1 {
            space.lock().clear();
        }
    }
}

/// 以启动任务构造调度器
///
/// 启动任务同时充当空转任务和初始的 current/previous。
pub fn init(boot: SharedTask) {
    let mut guard = SCHED.lock();
    if guard.is_some() {
        panic!("scheduler already initialized");
    }
    *guard = Some(Sched::new(boot));
}

/// 调度器是否已构造
pub fn is_initialized() -> bool {
    SCHED.lock().is_some()
}

/// 把任务加入活跃集
///
/// 没有执行上下文的任务和已在集内的任务都被拒绝。
pub fn enqueue(task: SharedTask) -> KernelResult<()> {
    let mut guard = SCHED.lock();
    let sched = guard.as_mut().ok_or(KernelError::InvalidInput)?;
    sched.enqueue(task)
}

/// 唯一的重调度入口
///
/// 时间基推进 `span`，随后在同一趟扫描里淘汰终态任务并选出
/// 下一个运行者。调度器尚未构造时（启动极早期）是空操作。
pub fn schedule(span: TimeSpan) {
    debug_assert!(
        task_locks_held() == 0,
        "task lock held across scheduler entry"
    );

    let next = {
        let mut guard = SCHED.lock();
        match guard.as_mut() {
            Some(sched) => sched.schedule(span),
            None => return,
        }
    };

    // 地址空间激活在调度器锁外做
    let space = {
        let g = next.lock();
        if g.mode == Mode::User {
            g.space.clone()
        } else {
            None
        }
    };
    if let Some(space) = space {
        space.lock().activate();
    }
}

/// 当前逻辑时间
pub fn stamp() -> TimeStamp {
    match SCHED.lock().as_ref() {
        Some(s) => s.stamp,
        None => TimeStamp::ZERO,
    }
}

/// 正在运行的任务
pub fn current() -> Option<SharedTask> {
    SCHED.lock().as_ref().map(|s| Arc::clone(&s.curr))
}

/// 活跃集大小（不含空转任务）
pub fn task_count() -> usize {
    match SCHED.lock().as_ref() {
        Some(s) => s.tasks.len(),
        None => 0,
    }
}

/// 丢弃调度器单例，让下一个测试从头构造
#[cfg(test)]
pub fn reset_for_tests() {
    *SCHED.lock() = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::UserContext;
    use crate::mm::addr::VirtAddr;
    use crate::task::{Blocker, Sigs, Task};
    use crate::{kassert, test_case};

    fn boot() -> SharedTask {
        let t = Task::create("boot", Mode::Idle, None, None);
        t.lock().ready(UserContext::default());
        t
    }

    fn user_task(label: &str) -> SharedTask {
        let t = Task::create(label, Mode::Super, None, None);
        t.lock().ready(UserContext::new(
            VirtAddr::from_usize(0x1000),
            VirtAddr::from_usize(0x8000),
        ));
        t
    }

    // 入队约束：无上下文、重复入队都被拒绝
    test_case!(test_enqueue_rejections, {
        let idle = boot();
        init(Arc::clone(&idle));

        let bare = Task::create("bare", Mode::User, None, None);
        kassert!(enqueue(bare) == Err(KernelError::InvalidInput));

        let a = user_task("a");
        enqueue(Arc::clone(&a)).unwrap();
        kassert!(enqueue(a) == Err(KernelError::InvalidInput));
        kassert!(task_count() == 1);
    });

    // 同值到期并列时先入队者获胜，时间基按 span 推进
    test_case!(test_tie_break_and_stamp, {
        let idle = boot();
        init(Arc::clone(&idle));

        let a = user_task("a");
        let b = user_task("b");
        enqueue(Arc::clone(&a)).unwrap();
        enqueue(Arc::clone(&b)).unwrap();

        schedule(TimeSpan::from_ms(1));
        kassert!(stamp() == TimeStamp::from_ms(1));
        kassert!(Arc::ptr_eq(&current().unwrap(), &a));

        // a 消耗了时间片后 b 的到期更早
        schedule(TimeSpan::from_ms(1));
        kassert!(stamp() == TimeStamp::from_ms(2));
        kassert!(Arc::ptr_eq(&current().unwrap(), &b));
    });

    // 没有可运行任务时空转任务兜底
    test_case!(test_idle_fallback, {
        let idle = boot();
        init(Arc::clone(&idle));

        schedule(TimeSpan::from_ms(1));
        kassert!(Arc::ptr_eq(&current().unwrap(), &idle));

        let a = user_task("a");
        a.lock().blocker = Some(Blocker::Deadline(TimeStamp::from_ms(100)));
        enqueue(Arc::clone(&a)).unwrap();

        schedule(TimeSpan::from_ms(1));
        kassert!(Arc::ptr_eq(&current().unwrap(), &idle));
        // 任务仍在活跃集，只是被排除出候选
        kassert!(task_count() == 1);
    });

    // 终态任务当轮淘汰，绝不当选
    test_case!(test_exited_task_evicted, {
        let idle = boot();
        init(Arc::clone(&idle));

        let a = user_task("a");
        let b = user_task("b");
        enqueue(Arc::clone(&a)).unwrap();
        enqueue(Arc::clone(&b)).unwrap();

        a.lock().sigs |= Sigs::EXITED;
        schedule(TimeSpan::from_ms(1));
        kassert!(!Arc::ptr_eq(&current().unwrap(), &a));
        kassert!(task_count() == 1);

        // 淘汰发生后重复入队同一任务对象是新的一次入队
        kassert!(a.lock().ctx.is_none());
    });

    // 阻塞到 stamp >= 10 的任务恰好挂起 10 趟
    test_case!(test_blocked_until_deadline, {
        let idle = boot();
        init(Arc::clone(&idle));

        let a = user_task("a");
        a.lock().blocker = Some(Blocker::Deadline(TimeStamp::from_ms(10)));
        enqueue(Arc::clone(&a)).unwrap();

        for pass in 1..10u64 {
            schedule(TimeSpan::from_ms(1));
            kassert!(stamp() == TimeStamp::from_ms(pass));
            kassert!(Arc::ptr_eq(&current().unwrap(), &idle));
        }
        schedule(TimeSpan::from_ms(1));
        kassert!(stamp() == TimeStamp::from_ms(10));
        kassert!(Arc::ptr_eq(&current().unwrap(), &a));
        kassert!(a.lock().blocker.is_none());
    });

    // 淘汰释放空间资源：最后一个引用者退出时映射被撤掉
    test_case!(test_eviction_releases_space, {
        use crate::config::PAGE_SIZE;
        use crate::mm::space::{MapFlags, Space};
        use crate::mm::vmo::{Vmo, VmoFlags};
        use crate::mm::pmm;

        let idle = boot();
        init(Arc::clone(&idle));

        let space = Space::create().unwrap();
        let vmo = Vmo::alloc(PAGE_SIZE, VmoFlags::empty()).unwrap();
        space
            .lock()
            .map(None, vmo, 0, PAGE_SIZE, MapFlags::READ)
            .unwrap();

        let a = Task::create("a", Mode::User, Some(space), None);
        a.lock().ready(UserContext::default());
        enqueue(Arc::clone(&a)).unwrap();
        let used_before = pmm::stats().used_pages;

        a.lock().sigs |= Sigs::EXITED;
        schedule(TimeSpan::from_ms(1));
        kassert!(task_count() == 0);
        kassert!(pmm::stats().used_pages < used_before);
        kassert!(a.lock().space.is_none());
    });

    // 时间基单调不减，零时间片的显式让出不推进时间
    test_case!(test_stamp_monotonic, {
        let idle = boot();
        init(Arc::clone(&idle));

        schedule(TimeSpan::from_ms(3));
        kassert!(stamp() == TimeStamp::from_ms(3));
        schedule(TimeSpan::ZERO);
        kassert!(stamp() == TimeStamp::from_ms(3));
        schedule(TimeSpan::from_ms(2));
        kassert!(stamp() == TimeStamp::from_ms(5));
    });
}
