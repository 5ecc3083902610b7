//! 启动入口
//!
//! 体系结构后端完成自身初始化（陷入向量、堆区移交）后带着
//! handover 载荷进入 [`init`]：校验载荷、建立物理内存账本、
//! 构造调度器、装载初始用户程序。启动路径上的任何失败都被
//! 视为致命，错误原样返回给后端停机。
//!
//! [`init`] 返回后引导任务退化为空转任务，后端开定时器中断并
//! 进入 [`run`] 的空转循环，此后内核只经由陷入路径被动运行。

use alloc::sync::Arc;

use xmas_elf::ElfFile;
use xmas_elf::program::{SegmentData, Type};

use crate::config::{INIT_BUNDLE, PAGE_SIZE, USER_STACK_SIZE};
use crate::error::{KernelError, KernelResult};
use crate::hal::{self, UserContext};
use crate::handover::Payload;
use crate::mm::addr::{PhysAddr, PhysRange, VirtAddr, pages_of};
use crate::mm::pmm;
use crate::mm::space::{MapFlags, Space};
use crate::mm::vmo::{Vmo, VmoFlags};
use crate::sched;
use crate::task::{Domain, Mode, Object, SharedTask, Task};

/// 内核初始化
///
/// 依次：校验并打印载荷、用最大的空闲区域初始化帧分配器、
/// 以引导任务构造调度器、装载并入队初始用户程序。全部完成后
/// 引导任务转为空转模式，等待第一个定时器中断交出 CPU。
pub fn init(payload: &Payload) -> KernelResult<()> {
    payload.validate()?;
    payload.dump();

    let free = payload.largest_free()?;
    pmm::init(free.start(), free.end());

    let boot = Task::create("boot", Mode::Super, None, None);
    boot.lock().ready(UserContext::default());
    sched::init(Arc::clone(&boot));

    let init_task = load_init(payload)?;
    sched::enqueue(init_task)?;

    boot.lock().enter(Mode::Idle);
    pr_info!("entry: boot complete");
    Ok(())
}

/// 空转循环，初始化完成后由后端进入
pub fn run() -> ! {
    loop {
        hal::get().wait_for_interrupt();
    }
}

/// 从 handover 的文件记录装载初始用户程序
///
/// 解析 ELF、搭好地址空间（代码/数据段 + 用户栈 + 载荷映射）、
/// 创建持有自身空间句柄的能力域，返回就绪可入队的任务。
pub fn load_init(payload: &Payload) -> KernelResult<SharedTask> {
    let record = payload.find_file(INIT_BUNDLE)?;
    let base = PhysAddr::from_usize(record.start);
    let data = unsafe {
        core::slice::from_raw_parts(hal::get().phys_to_virt(base) as *const u8, record.len)
    };
    let elf = ElfFile::new(data).map_err(|_| KernelError::InvalidInput)?;

    // 文件本体起点按页对齐时包一个 DMA VMO，只读段可以零拷贝映射
    let file_vmo = if base.is_page_aligned() {
        Some(Vmo::dma(PhysRange::new(
            base,
            pages_of(record.len) * PAGE_SIZE,
        ))?)
    } else {
        None
    };

    let space = Space::create()?;
    let ctx = {
        let mut s = space.lock();
        match build_image(&mut s, &elf, record.len, file_vmo.as_ref(), payload.blob) {
            Ok(ctx) => ctx,
            Err(e) => {
                // 半成品映射不能留在空间里
                s.clear();
                return Err(e);
            }
        }
    };

    let domain = Domain::create();
    let task = Task::create(
        "init",
        Mode::User,
        Some(Arc::clone(&space)),
        Some(Arc::clone(&domain)),
    );
    {
        let mut d = domain.lock();
        d.attach(Object::Space(space));
        d.attach(Object::Task(Arc::clone(&task)));
    }
    task.lock().ready(ctx);
    pr_info!(
        "entry: init loaded, entry={:#x} sp={:#x}",
        ctx.ip.as_usize(),
        ctx.sp.as_usize()
    );
    Ok(task)
}

/// 把 ELF 镜像、用户栈和载荷映射搭进空间，返回入口上下文
///
/// 只读且 memsz == filesz 的段直接映射文件 VMO；可写段（含 bss）
/// 拷进新分配的 VMO。载荷映射的基址和长度经入口参数交给用户程序。
fn build_image(
    s: &mut Space,
    elf: &ElfFile,
    file_len: usize,
    file_vmo: Option<&Arc<Vmo>>,
    blob: Option<PhysRange>,
) -> KernelResult<UserContext> {
    let entry = elf.header.pt2.entry_point() as usize;
    if entry == 0 {
        return Err(KernelError::InvalidInput);
    }

    for ph in elf.program_iter() {
        if ph.get_type() != Ok(Type::Load) {
            continue;
        }
        let vaddr = ph.virtual_addr() as usize;
        let offset = ph.offset() as usize;
        let filesz = ph.file_size() as usize;
        let memsz = ph.mem_size() as usize;
        // 装载语义要求文件偏移与虚拟地址同余于页大小
        if memsz < filesz || vaddr % PAGE_SIZE != offset % PAGE_SIZE {
            return Err(KernelError::InvalidInput);
        }

        let mut flags = MapFlags::empty();
        if ph.flags().is_read() {
            flags |= MapFlags::READ;
        }
        if ph.flags().is_write() {
            flags |= MapFlags::WRITE;
        }
        if ph.flags().is_execute() {
            flags |= MapFlags::EXEC;
        }
        if flags.is_empty() {
            return Err(KernelError::InvalidInput);
        }

        let page_off = vaddr % PAGE_SIZE;
        let map_base = VirtAddr::from_usize(vaddr - page_off);
        let map_len = pages_of(page_off + memsz) * PAGE_SIZE;

        let direct = file_vmo.filter(|v| {
            !flags.contains(MapFlags::WRITE)
                && memsz == filesz
                && offset + filesz <= file_len
                && offset - page_off + map_len <= v.len()
        });
        match direct {
            Some(v) => {
                s.map(Some(map_base), Arc::clone(v), offset - page_off, map_len, flags)?;
            }
            None => {
                let vmo = Vmo::alloc(page_off + memsz, VmoFlags::UPPER)?;
                if filesz > 0 {
                    let seg = match ph.get_data(elf) {
                        Ok(SegmentData::Undefined(seg)) => seg,
                        _ => return Err(KernelError::InvalidInput),
                    };
                    vmo.write(page_off, seg)?;
                }
                let len = vmo.len();
                s.map(Some(map_base), vmo, 0, len, flags)?;
            }
        }
    }

    let stack = Vmo::alloc(USER_STACK_SIZE, VmoFlags::UPPER)?;
    let stack_range = s.map(None, stack, 0, USER_STACK_SIZE, MapFlags::READ | MapFlags::WRITE)?;
    let mut ctx = UserContext::new(VirtAddr::from_usize(entry), stack_range.end());

    if let Some(blob) = blob {
        let vmo = Vmo::dma(blob)?;
        let len = vmo.len();
        let range = s.map(None, vmo, 0, len, MapFlags::READ)?;
        ctx.args[0] = range.start().as_usize();
        ctx.args[1] = blob.len();
    }
    Ok(ctx)
}
