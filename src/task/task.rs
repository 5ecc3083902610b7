//! 任务结构体与生命周期状态机
//!
//! 任务是调度单位：执行上下文 + 地址空间 + 能力域 + pledge 位
//! + 阻塞条件。不变式：
//!
//! - 没有执行上下文的任务不能入队；
//! - 可变字段只能经由 [`Task::lock`] 的守卫访问；
//! - 任何触发让出 CPU 的操作（[`Task::block`]、[`Task::leave`] 的
//!   退出路径）都必须先释放任务锁再让出，绝不带锁穿越调度器。

use alloc::string::String;
use alloc::sync::Arc;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::{KernelError, KernelResult};
use crate::hal::{self, UserContext};
use crate::mm::space::SharedSpace;
use crate::sync::{SpinLock, SpinLockGuard, task_lock_acquired, task_lock_released};
use crate::task::blocker::Blocker;
use crate::task::domain::SharedDomain;
use crate::task::pledge::Pledges;
use crate::task::state::{Mode, Sigs, TaskState};
use crate::time::TimeStamp;

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// 共享的任务引用：调度器活跃集和句柄表各持有一个强引用
pub type SharedTask = Arc<Task>;

/// 一个任务
#[derive(Debug)]
pub struct Task {
    id: u32,
    label: String,
    inner: SpinLock<TaskInner>,
}

/// 任务的可变字段，由任务锁保护
#[derive(Debug)]
pub struct TaskInner {
    /// 特权模式
    pub mode: Mode,
    /// 执行上下文，装上之后任务才可被调度
    pub ctx: Option<UserContext>,
    /// 地址空间，内核任务为 None
    pub space: Option<SharedSpace>,
    /// 能力域
    pub domain: Option<SharedDomain>,
    /// 能力位，只能收窄
    pub pledges: Pledges,
    /// 信号位
    pub sigs: Sigs,
    /// 当前时间片的到期时刻
    pub slice_end: TimeStamp,
    /// 挂起原因，存在期间任务不参与候选
    pub blocker: Option<Blocker>,
}

impl Task {
    /// 创建一个任务，初始持有全部 pledge
    pub fn create(
        label: &str,
        mode: Mode,
        space: Option<SharedSpace>,
        domain: Option<SharedDomain>,
    ) -> SharedTask {
        Arc::new(Task {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            label: String::from(label),
            inner: SpinLock::new(TaskInner {
                mode,
                ctx: None,
                space,
                domain,
                pledges: Pledges::all(),
                sigs: Sigs::empty(),
                slice_end: TimeStamp::ZERO,
                blocker: None,
            }),
        })
    }

    /// 任务 id
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 任务名，只用于日志
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 获取任务锁
    pub fn lock(&self) -> TaskGuard<'_> {
        let inner = self.inner.lock();
        task_lock_acquired();
        TaskGuard { inner }
    }

    /// 装上阻塞条件并立即让出 CPU
    ///
    /// 让出发生在任务锁释放之后：让出会重入调度器，
    /// 调度器在评估时还要再取这把锁。
    pub fn block(&self, blocker: Blocker) {
        {
            let mut g = self.lock();
            g.blocker = Some(blocker);
        }
        hal::get().yield_now();
    }

    /// 从内核路径返回用户态
    ///
    /// 若任务在内核路径执行期间被标记退出，不再回到用户态，
    /// 而是（在锁外）直接让出给调度器回收。
    pub fn leave(&self) {
        let exiting = {
            let mut g = self.lock();
            g.mode = Mode::User;
            g.sigs.contains(Sigs::EXITED)
        };
        if exiting {
            hal::get().yield_now();
        }
    }

    /// 正常退出
    pub fn exit(&self) {
        self.lock().sigs |= Sigs::EXITED;
    }

    /// 因故障退出
    pub fn crash(&self) {
        self.lock().sigs |= Sigs::EXITED | Sigs::CRASHED;
        pr_err!("task {} ({}) crashed", self.id, self.label);
    }
}

impl TaskInner {
    /// 按当前逻辑时间评估任务状态
    ///
    /// 终态优先于一切；阻塞条件满足时就地清除并回到可运行。
    pub fn eval(&mut self, now: TimeStamp) -> TaskState {
        if self.sigs.contains(Sigs::EXITED) {
            return TaskState::Exited;
        }
        if let Some(b) = &self.blocker {
            if !b.is_satisfied(now) {
                return TaskState::Blocked;
            }
            self.blocker = None;
        }
        TaskState::Runnable
    }

    /// 装上执行上下文，任务由此变得可入队
    pub fn ready(&mut self, ctx: UserContext) {
        self.ctx = Some(ctx);
    }

    /// 切换特权模式
    pub fn enter(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// 检查任务持有 `p` 要求的全部能力位
    pub fn ensure(&self, p: Pledges) -> KernelResult<()> {
        if self.pledges.contains(p) {
            Ok(())
        } else {
            Err(KernelError::PermissionDenied)
        }
    }

    /// 用 `new` 替换能力位，只允许收窄
    pub fn pledge(&mut self, new: Pledges) -> KernelResult<()> {
        if !self.pledges.contains(new) {
            return Err(KernelError::PermissionDenied);
        }
        self.pledges = new;
        Ok(())
    }
}

/// 任务锁守卫，维护当前执行流的任务锁计数
pub struct TaskGuard<'a> {
    inner: SpinLockGuard<'a, TaskInner>,
}

impl Deref for TaskGuard<'_> {
    type Target = TaskInner;

    fn deref(&self) -> &TaskInner {
        &self.inner
    }
}

impl DerefMut for TaskGuard<'_> {
    fn deref_mut(&mut self) -> &mut TaskInner {
        &mut self.inner
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        task_lock_released();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::addr::VirtAddr;
    use crate::sync::task_locks_held;
    use crate::time::TimeSpan;
    use crate::{kassert, test_case};

    fn ctx() -> UserContext {
        UserContext::new(VirtAddr::from_usize(0x1000), VirtAddr::from_usize(0x8000))
    }

    // pledge 只能收窄：ensure/pledge 场景
    test_case!(test_pledge_narrowing_scenario, {
        let task = Task::create("net", Mode::User, None, None);
        let mut g = task.lock();

        g.pledge(Pledges::NETWORK).unwrap();
        kassert!(g.ensure(Pledges::NETWORK).is_ok());
        kassert!(g.ensure(Pledges::STORAGE) == Err(KernelError::PermissionDenied));

        // 重申当前掩码是允许的空操作
        kassert!(g.pledge(Pledges::NETWORK).is_ok());
        // 放宽被拒绝且掩码不变
        kassert!(g.pledge(Pledges::NETWORK | Pledges::STORAGE).is_err());
        kassert!(g.pledges == Pledges::NETWORK);

        g.pledge(Pledges::empty()).unwrap();
        kassert!(g.ensure(Pledges::NETWORK).is_err());
    });

    // 评估状态机：阻塞、满足后清除、终态粘滞
    test_case!(test_eval_transitions, {
        let task = Task::create("t", Mode::User, None, None);
        let mut g = task.lock();
        g.ready(ctx());

        kassert!(g.eval(TimeStamp::ZERO) == TaskState::Runnable);

        g.blocker = Some(Blocker::Deadline(TimeStamp::from_ms(10)));
        kassert!(g.eval(TimeStamp::from_ms(9)) == TaskState::Blocked);
        kassert!(g.eval(TimeStamp::from_ms(10)) == TaskState::Runnable);
        // 条件满足时被就地清除
        kassert!(g.blocker.is_none());

        g.sigs |= Sigs::EXITED;
        kassert!(g.eval(TimeStamp::from_ms(10) + TimeSpan::from_ms(1)) == TaskState::Exited);
        kassert!(g.eval(TimeStamp::from_ms(100)) == TaskState::Exited);
    });

    // 终态优先于阻塞条件
    test_case!(test_eval_exited_beats_blocker, {
        let task = Task::create("t", Mode::User, None, None);
        let mut g = task.lock();
        g.blocker = Some(Blocker::Deadline(TimeStamp::from_ms(100)));
        g.sigs |= Sigs::EXITED;
        kassert!(g.eval(TimeStamp::ZERO) == TaskState::Exited);
    });

    // block 在让出前释放任务锁
    test_case!(test_block_releases_lock_before_yield, {
        let task = Task::create("t", Mode::User, None, None);
        kassert!(task_locks_held() == 0);

        task.block(Blocker::Deadline(TimeStamp::from_ms(5)));

        // 让出已经发生，锁计数回到零，条件已装上
        kassert!(task_locks_held() == 0);
        let g = task.lock();
        kassert!(g.blocker.is_some());
    });

    // crash 同时标记 EXITED 和 CRASHED
    test_case!(test_crash_marks_both_sigs, {
        let task = Task::create("t", Mode::User, None, None);
        task.crash();
        let g = task.lock();
        kassert!(g.sigs.contains(Sigs::EXITED | Sigs::CRASHED));
    });

    // leave 总是回到用户态
    test_case!(test_enter_leave_modes, {
        let task = Task::create("t", Mode::User, None, None);
        task.lock().enter(Mode::Super);
        kassert!(task.lock().mode == Mode::Super);
        task.leave();
        kassert!(task.lock().mode == Mode::User);
    });
}
