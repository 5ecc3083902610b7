//! 系统调用分发
//!
//! 陷入路径把（选择子，参数组）交给 [`dispatch`]：未知选择子
//! 直接失败；已知选择子先经 [`crate::task::TaskInner::ensure`]
//! 检查能力位，通过之后才允许触碰任何任务/空间/VMO/域状态。
//! 返回值是一个编码过的机器字（见 [`abi`]）。

pub mod abi;

use alloc::sync::Arc;
use alloc::vec;

use abi::{SYSCALL_ARG_COUNT, Selector, encode_ret};

use crate::config::LOG_MSG_MAX;
use crate::error::{KernelError, KernelResult};
use crate::hal::{self, UserContext};
use crate::mm::addr::{VirtAddr, VirtRange};
use crate::mm::space::{MapFlags, SharedSpace};
use crate::mm::vmo::{Vmo, VmoFlags};
use crate::sched;
use crate::task::{Blocker, Domain, Handle, Mode, Object, SharedDomain, SharedTask, Task};
use crate::time::TimeSpan;

/// 以 `task` 的身份执行一次系统调用，返回编码后的返回字
pub fn dispatch(task: &SharedTask, selector: usize, args: [usize; SYSCALL_ARG_COUNT]) -> usize {
    encode_ret(dispatch_inner(task, selector, args))
}

fn dispatch_inner(
    task: &SharedTask,
    selector: usize,
    args: [usize; SYSCALL_ARG_COUNT],
) -> KernelResult<usize> {
    let sel = match Selector::from_raw(selector) {
        Some(sel) => sel,
        None => {
            pr_warn!(
                "task {} ({}): unknown syscall selector {}",
                task.id(),
                task.label(),
                selector
            );
            return Err(KernelError::InvalidSyscall);
        }
    };

    // 能力检查先于一切状态访问
    task.lock().ensure(sel.required_pledge())?;

    match sel {
        Selector::Log => sys_log(task, args[0], args[1]),
        Selector::Now => Ok(sched::stamp().as_ms() as usize),
        Selector::Yield => {
            hal::get().yield_now();
            Ok(0)
        }
        Selector::Sleep => sys_sleep(task, args[0]),
        Selector::Exit => {
            task.exit();
            hal::get().yield_now();
            Ok(0)
        }
        Selector::Pledge => sys_pledge(task, args[0]),
        Selector::CreateDomain => sys_create_domain(task),
        Selector::CreateVmo => sys_create_vmo(task, args[0], args[1]),
        Selector::Map => sys_map(task, args),
        Selector::Unmap => sys_unmap(task, args[0], args[1]),
        Selector::CreateTask => sys_create_task(task, args[0], args[1]),
        Selector::Start => sys_start(task, args[0], args[1], args[2], args[3]),
        Selector::Dup => sys_dup(task, args[0]),
        Selector::Drop => sys_drop(task, args[0]),
    }
}

/// 调用者的能力域，没有域的任务做不了句柄操作
fn caller_domain(task: &SharedTask) -> KernelResult<SharedDomain> {
    task.lock().domain.clone().ok_or(KernelError::BadHandle)
}

/// 调用者的地址空间
fn caller_space(task: &SharedTask) -> KernelResult<SharedSpace> {
    task.lock().space.clone().ok_or(KernelError::InvalidInput)
}

fn sys_log(task: &SharedTask, ptr: usize, len: usize) -> KernelResult<usize> {
    if len == 0 || len > LOG_MSG_MAX {
        return Err(KernelError::InvalidInput);
    }
    let space = caller_space(task)?;
    let mut buf = vec![0u8; len];
    space
        .lock()
        .read_bytes(VirtAddr::from_usize(ptr), &mut buf)?;
    let msg = core::str::from_utf8(&buf).map_err(|_| KernelError::InvalidInput)?;
    pr_info!("task {} ({}): {}", task.id(), task.label(), msg);
    Ok(len)
}

fn sys_sleep(task: &SharedTask, ms: usize) -> KernelResult<usize> {
    let deadline = sched::stamp() + TimeSpan::from_ms(ms as u64);
    task.block(Blocker::Deadline(deadline));
    Ok(0)
}

fn sys_pledge(task: &SharedTask, bits: usize) -> KernelResult<usize> {
    let new = crate::task::Pledges::from_bits(bits as u64).ok_or(KernelError::InvalidInput)?;
    task.lock().pledge(new)?;
    Ok(0)
}

fn sys_create_domain(task: &SharedTask) -> KernelResult<usize> {
    let domain = caller_domain(task)?;
    let new = Domain::create();
    let h = domain.lock().attach(Object::Domain(new));
    Ok(h.as_raw() as usize)
}

fn sys_create_vmo(task: &SharedTask, len: usize, flags: usize) -> KernelResult<usize> {
    let flags = u8::try_from(flags)
        .ok()
        .and_then(VmoFlags::from_bits)
        .ok_or(KernelError::InvalidInput)?;
    let domain = caller_domain(task)?;
    let vmo = Vmo::alloc(len, flags)?;
    let h = domain.lock().attach(Object::Vmo(vmo));
    Ok(h.as_raw() as usize)
}

fn sys_map(task: &SharedTask, args: [usize; SYSCALL_ARG_COUNT]) -> KernelResult<usize> {
    let [vmo_handle, at, offset, len, flags] = args;
    let flags = u8::try_from(flags)
        .ok()
        .and_then(MapFlags::from_bits)
        .ok_or(KernelError::InvalidInput)?;
    let at = if at == 0 {
        None
    } else {
        Some(VirtAddr::from_usize(at))
    };

    let domain = caller_domain(task)?;
    let vmo = domain
        .lock()
        .lookup(Handle::from_raw(vmo_handle as u32))?
        .as_vmo()?;
    let space = caller_space(task)?;
    let range = space.lock().map(at, vmo, offset, len, flags)?;
    Ok(range.start().as_usize())
}

fn sys_unmap(task: &SharedTask, at: usize, len: usize) -> KernelResult<usize> {
    let space = caller_space(task)?;
    space
        .lock()
        .unmap(VirtRange::new(VirtAddr::from_usize(at), len))?;
    Ok(0)
}

/// 创建任务：子任务继承调用者当前（可能已收窄）的能力位
fn sys_create_task(
    task: &SharedTask,
    space_handle: usize,
    domain_handle: usize,
) -> KernelResult<usize> {
    let domain = caller_domain(task)?;

    let child_space = if space_handle == 0 {
        None
    } else {
        Some(
            domain
                .lock()
                .lookup(Handle::from_raw(space_handle as u32))?
                .as_space()?,
        )
    };
    let child_domain = if domain_handle == 0 {
        None
    } else {
        Some(
            domain
                .lock()
                .lookup(Handle::from_raw(domain_handle as u32))?
                .as_domain()?,
        )
    };

    let child = Task::create("user", Mode::User, child_space, child_domain);
    // 子任务的能力位从调用者当前（可能已收窄）的位继承
    child.lock().pledges = task.lock().pledges;

    let h = domain.lock().attach(Object::Task(child));
    Ok(h.as_raw() as usize)
}

fn sys_start(
    task: &SharedTask,
    task_handle: usize,
    ip: usize,
    sp: usize,
    arg: usize,
) -> KernelResult<usize> {
    let domain = caller_domain(task)?;
    let target = domain
        .lock()
        .lookup(Handle::from_raw(task_handle as u32))?
        .as_task()?;

    let mut ctx = UserContext::new(VirtAddr::from_usize(ip), VirtAddr::from_usize(sp));
    ctx.args[0] = arg;
    target.lock().ready(ctx);
    sched::enqueue(Arc::clone(&target))?;
    Ok(0)
}

fn sys_dup(task: &SharedTask, handle: usize) -> KernelResult<usize> {
    let domain = caller_domain(task)?;
    let h = domain.lock().dup(Handle::from_raw(handle as u32))?;
    Ok(h.as_raw() as usize)
}

fn sys_drop(task: &SharedTask, handle: usize) -> KernelResult<usize> {
    let domain = caller_domain(task)?;
    domain.lock().drop_handle(Handle::from_raw(handle as u32))?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use abi::decode_ret;

    use crate::config::PAGE_SIZE;
    use crate::mm::pmm;
    use crate::mm::space::Space;
    use crate::task::{Pledges, Sigs};
    use crate::{kassert, test_case};

    const NO_ARGS: [usize; SYSCALL_ARG_COUNT] = [0; SYSCALL_ARG_COUNT];

    fn user_task() -> SharedTask {
        let t = Task::create("u", Mode::User, None, Some(Domain::create()));
        t.lock().ready(UserContext::default());
        t
    }

    fn init_sched() -> SharedTask {
        let boot = Task::create("boot", Mode::Idle, None, None);
        boot.lock().ready(UserContext::default());
        sched::init(Arc::clone(&boot));
        boot
    }

    // 未知选择子失败，且错误以负的标量编码返回
    test_case!(test_unknown_selector, {
        let t = user_task();
        let ret = dispatch(&t, 999, NO_ARGS);
        kassert!(decode_ret(ret) == Err(KernelError::InvalidSyscall));
    });

    // 能力缺失在任何状态被动之前拒绝
    test_case!(test_pledge_denied_before_action, {
        let t = user_task();
        t.lock().pledge(Pledges::empty()).unwrap();

        let baseline = pmm::stats().used_pages;
        let ret = dispatch(&t, Selector::CreateVmo as usize, [PAGE_SIZE, 0, 0, 0, 0]);
        kassert!(decode_ret(ret) == Err(KernelError::PermissionDenied));
        // 没有任何分配发生
        kassert!(pmm::stats().used_pages == baseline);
        kassert!(t.lock().domain.as_ref().unwrap().lock().handle_count() == 0);
    });

    // pledge 经系统调用收窄后再调用受限操作
    test_case!(test_pledge_syscall_narrows, {
        let t = user_task();
        let keep = Pledges::CONSOLE;
        let ret = dispatch(&t, Selector::Pledge as usize, [keep.bits() as usize, 0, 0, 0, 0]);
        kassert!(decode_ret(ret) == Ok(0));

        let ret = dispatch(&t, Selector::CreateVmo as usize, [PAGE_SIZE, 0, 0, 0, 0]);
        kassert!(decode_ret(ret) == Err(KernelError::PermissionDenied));

        // 非法位拒绝
        let ret = dispatch(&t, Selector::Pledge as usize, [usize::MAX, 0, 0, 0, 0]);
        kassert!(decode_ret(ret) == Err(KernelError::InvalidInput));
    });

    // Log 经调用者空间读出消息
    test_case!(test_log_reads_user_memory, {
        let space = Space::create().unwrap();
        let vmo = Vmo::alloc(PAGE_SIZE, VmoFlags::empty()).unwrap();
        vmo.write(0, b"hello from userspace").unwrap();
        let range = space
            .lock()
            .map(None, vmo, 0, PAGE_SIZE, MapFlags::READ)
            .unwrap();

        let t = Task::create("u", Mode::User, Some(Arc::clone(&space)), None);
        t.lock().ready(UserContext::default());

        let ret = dispatch(
            &t,
            Selector::Log as usize,
            [range.start().as_usize(), 20, 0, 0, 0],
        );
        kassert!(decode_ret(ret) == Ok(20));

        // 未映射地址与超长消息被拒绝
        let ret = dispatch(&t, Selector::Log as usize, [0xdead_0000, 8, 0, 0, 0]);
        kassert!(decode_ret(ret).is_err());
        let ret = dispatch(
            &t,
            Selector::Log as usize,
            [range.start().as_usize(), LOG_MSG_MAX + 1, 0, 0, 0],
        );
        kassert!(decode_ret(ret) == Err(KernelError::InvalidInput));

        space.lock().clear();
    });

    // VMO/映射的完整用户路径：create-vmo → map → unmap → drop
    test_case!(test_vmo_map_unmap_flow, {
        let space = Space::create().unwrap();
        let t = Task::create(
            "u",
            Mode::User,
            Some(Arc::clone(&space)),
            Some(Domain::create()),
        );
        t.lock().ready(UserContext::default());

        let h = decode_ret(dispatch(
            &t,
            Selector::CreateVmo as usize,
            [2 * PAGE_SIZE, 0, 0, 0, 0],
        ))
        .unwrap();

        let flags = (MapFlags::READ | MapFlags::WRITE).bits() as usize;
        let base = decode_ret(dispatch(
            &t,
            Selector::Map as usize,
            [h, 0, 0, 2 * PAGE_SIZE, flags],
        ))
        .unwrap();
        kassert!(base != 0);
        kassert!(space.lock().mapping_count() == 1);

        // 同一位置再映射一次被整体拒绝
        let ret = dispatch(&t, Selector::Map as usize, [h, base, 0, PAGE_SIZE, flags]);
        kassert!(decode_ret(ret) == Err(KernelError::AlreadyExists));

        let ret = dispatch(&t, Selector::Unmap as usize, [base, 2 * PAGE_SIZE, 0, 0, 0]);
        kassert!(decode_ret(ret) == Ok(0));
        kassert!(space.lock().mapping_count() == 0);

        // 句柄还活着，页不回收；删掉句柄后回收
        kassert!(pmm::stats().used_pages > 1);
        let ret = dispatch(&t, Selector::Drop as usize, [h, 0, 0, 0, 0]);
        kassert!(decode_ret(ret) == Ok(0));
        kassert!(pmm::stats().used_pages == 1);
    });

    // create-vmo 的标志字逐位校验
    test_case!(test_create_vmo_flags_checked, {
        let t = user_task();

        // DMA 位不归用户态支配
        let ret = dispatch(
            &t,
            Selector::CreateVmo as usize,
            [PAGE_SIZE, VmoFlags::DMA.bits() as usize, 0, 0, 0],
        );
        kassert!(decode_ret(ret) == Err(KernelError::InvalidInput));

        // 未定义的位被整体拒绝
        let ret = dispatch(&t, Selector::CreateVmo as usize, [PAGE_SIZE, 0xff, 0, 0, 0]);
        kassert!(decode_ret(ret) == Err(KernelError::InvalidInput));

        // 布局提示是合法的
        let ret = dispatch(
            &t,
            Selector::CreateVmo as usize,
            [PAGE_SIZE, VmoFlags::UPPER.bits() as usize, 0, 0, 0],
        );
        kassert!(decode_ret(ret).is_ok());
    });

    // dup 与坏句柄
    test_case!(test_dup_and_bad_handle, {
        let t = user_task();
        let h = decode_ret(dispatch(
            &t,
            Selector::CreateVmo as usize,
            [PAGE_SIZE, 0, 0, 0, 0],
        ))
        .unwrap();

        let h2 = decode_ret(dispatch(&t, Selector::Dup as usize, [h, 0, 0, 0, 0])).unwrap();
        kassert!(h2 != h);

        let ret = dispatch(&t, Selector::Drop as usize, [h, 0, 0, 0, 0]);
        kassert!(decode_ret(ret) == Ok(0));
        let ret = dispatch(&t, Selector::Drop as usize, [h, 0, 0, 0, 0]);
        kassert!(decode_ret(ret) == Err(KernelError::BadHandle));
        let ret = dispatch(&t, Selector::Dup as usize, [9999, 0, 0, 0, 0]);
        kassert!(decode_ret(ret) == Err(KernelError::BadHandle));
    });

    // Sleep 装上截止条件；Exit 标记终态并在下一趟被淘汰
    test_case!(test_sleep_and_exit, {
        init_sched();
        let t = user_task();
        sched::enqueue(Arc::clone(&t)).unwrap();

        let ret = dispatch(&t, Selector::Sleep as usize, [10, 0, 0, 0, 0]);
        kassert!(decode_ret(ret) == Ok(0));
        // mock 的让出已同步执行了一趟调度，任务应当被排除出候选
        kassert!(t.lock().blocker.is_some() || sched::stamp().as_ms() >= 10);

        let ret = dispatch(&t, Selector::Exit as usize, NO_ARGS);
        kassert!(decode_ret(ret) == Ok(0));
        kassert!(t.lock().sigs.contains(Sigs::EXITED));
        sched::schedule(TimeSpan::from_ms(1));
        kassert!(sched::task_count() == 0);
    });

    // create-task → start：子任务继承收窄后的能力位并入队
    test_case!(test_create_and_start_task, {
        init_sched();
        let t = user_task();
        t.lock()
            .pledge(Pledges::TASK | Pledges::CONSOLE)
            .unwrap();

        let h = decode_ret(dispatch(&t, Selector::CreateTask as usize, NO_ARGS)).unwrap();

        let ret = dispatch(
            &t,
            Selector::Start as usize,
            [h, 0x40_0000, 0x50_0000, 7, 0],
        );
        kassert!(decode_ret(ret) == Ok(0));
        kassert!(sched::task_count() == 1);

        let child = t
            .lock()
            .domain
            .as_ref()
            .unwrap()
            .lock()
            .lookup(Handle::from_raw(h as u32))
            .unwrap()
            .as_task()
            .unwrap();
        let g = child.lock();
        kassert!(g.pledges == (Pledges::TASK | Pledges::CONSOLE));
        kassert!(g.ctx.unwrap().args[0] == 7);

        // 重复启动同一任务是重复入队
        drop(g);
        let ret = dispatch(
            &t,
            Selector::Start as usize,
            [h, 0x40_0000, 0x50_0000, 7, 0],
        );
        kassert!(decode_ret(ret) == Err(KernelError::InvalidInput));
    });

    // Now 返回调度器时间基
    test_case!(test_now_tracks_stamp, {
        init_sched();
        let t = user_task();
        kassert!(decode_ret(dispatch(&t, Selector::Now as usize, NO_ARGS)) == Ok(0));
        sched::schedule(TimeSpan::from_ms(5));
        kassert!(decode_ret(dispatch(&t, Selector::Now as usize, NO_ARGS)) == Ok(5));
    });
}
