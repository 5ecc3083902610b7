//! 宿主测试支撑
//!
//! 测试在普通用户态进程里运行，内核全局状态（HAL 槽、物理帧
//! 账本、调度器单例）被所有测试共享。[`KernelEnvGuard`] 用一把
//! 进程级互斥锁把触碰全局状态的测试串行化，并在进入时安装
//! mock HAL、把可复位的全局账本恢复到初始状态。

use std::sync::{Mutex, MutexGuard};

/// 串行化内核全局状态访问的测试环境守卫
pub struct KernelEnvGuard {
    _lock: MutexGuard<'static, ()>,
}

static ENV_LOCK: Mutex<()> = Mutex::new(());

impl KernelEnvGuard {
    /// 进入一个干净的内核测试环境
    pub fn enter() -> Self {
        // 其它测试 panic 导致的毒化不影响环境本身
        let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        crate::hal::mock::install_mock();
        unsafe { crate::hal::restore_interrupts(1) };
        crate::mm::pmm::reset_for_tests();
        crate::sched::reset_for_tests();

        KernelEnvGuard { _lock: lock }
    }
}

/// 定义一个标准的测试用例。
///
/// 语法：`test_case!(test_name, { code });`
/// 展开为一个普通 `#[test]`，并在用例体之前进入 [`KernelEnvGuard`]。
#[macro_export]
macro_rules! test_case {
    (
        $func_name:ident,
        $body:block
    ) => {
        #[doc = concat!("Test case: ", stringify!($func_name))]
        #[test]
        fn $func_name() {
            let _env = $crate::test_support::KernelEnvGuard::enter();
            $body
        }
    };
}

/// 判断条件是否为真，为假则让当前用例失败。
#[macro_export]
macro_rules! kassert {
    ($cond:expr) => {
        assert!($cond, "kassert failed: {}", stringify!($cond))
    };
    ($cond:expr, $($arg:tt)+) => {
        assert!($cond, $($arg)+)
    };
}
