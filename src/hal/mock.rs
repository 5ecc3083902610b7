//! 宿主测试用的 HAL 后端
//!
//! 在普通用户态进程里模拟内核核心需要的机器能力：
//! 中断开关退化为线程局部的布尔标志，物理地址恒等映射为
//! 宿主指针（物理帧就是测试进程里的真实内存），
//! 让出 CPU 退化为同步执行一次调度器评估。

use std::cell::Cell;
use std::sync::Mutex;

use super::Hal;
use crate::mm::addr::PhysAddr;

std::thread_local! {
    /// 模拟的本地中断开关，true 表示开启
    static INTR_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// 宿主后端
pub struct MockHal {
    /// 最近一次激活的地址空间根，供测试断言
    activated_root: Mutex<Option<PhysAddr>>,
}

/// 全局唯一的宿主后端实例
pub static MOCK_HAL: MockHal = MockHal {
    activated_root: Mutex::new(None),
};

/// 安装宿主后端，可在每个测试里重复调用
pub fn install_mock() {
    super::install(&MOCK_HAL);
}

impl MockHal {
    /// 最近一次 `activate_space` 的根帧
    pub fn last_activated_root(&self) -> Option<PhysAddr> {
        *self.activated_root.lock().unwrap()
    }
}

impl Hal for MockHal {
    fn console_write(&self, s: &str) {
        print!("{s}");
    }

    unsafe fn read_and_disable_interrupts(&self) -> usize {
        INTR_ENABLED.with(|e| {
            let was = e.get();
            e.set(false);
            was as usize
        })
    }

    unsafe fn restore_interrupts(&self, flags: usize) {
        INTR_ENABLED.with(|e| e.set(flags != 0));
    }

    fn interrupts_were_enabled(&self, flags: usize) -> bool {
        flags != 0
    }

    fn phys_to_virt(&self, pa: PhysAddr) -> *mut u8 {
        // 测试里的物理帧来自宿主堆，物理地址就是宿主指针
        pa.as_usize() as *mut u8
    }

    fn activate_space(&self, root: PhysAddr) {
        *self.activated_root.lock().unwrap() = Some(root);
    }

    fn yield_now(&self) {
        crate::trap::resched_now();
    }

    fn wait_for_interrupt(&self) {
        std::thread::yield_now();
    }
}

/// 模拟的中断当前是否开启，供测试断言
pub fn interrupts_enabled() -> bool {
    INTR_ENABLED.with(|e| e.get())
}
