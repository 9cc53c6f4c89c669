//! # 设备驱动宏
//!
//! 提供便捷的宏来定义寄存器块和中断入口。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use neon_uart::device_driver;
//!
//! device_driver! {
//!     /// 某个外设
//!     name: Periph,
//!     registers: {
//!         data: u32, 0x00;
//!         status: u32, 0x04;
//!     }
//! }
//!
//! let periph = unsafe { Periph::new(0x4000_0000) };
//! let status = periph.status();
//! periph.data_write(0x55);
//! ```

/// 定义寄存器块的宏
///
/// 自动生成寄存器块结构体和 volatile 访问方法。
///
/// # 语法
///
/// ```rust,ignore
/// device_driver! {
///     name: DeviceName,
///     registers: {
///         reg_name: reg_type, offset;
///         ...
///     }
/// }
/// ```
///
/// # 生成内容
///
/// - 结构体 `DeviceName`，由 `unsafe fn new(base)` 构造
/// - 每个寄存器的读取方法 `reg_name()`
/// - 每个寄存器的写入方法 `reg_name_write()`
/// - 每个寄存器的地址方法 `reg_name_addr()`
#[macro_export]
macro_rules! device_driver {
    (
        $(#[$meta:meta])*
        name: $name:ident,
        registers: {
            $($reg_name:ident : $reg_type:ty , $offset:expr);* $(;)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            base: usize,
        }

        // 寄存器块本身没有状态，访问的并发语义由驱动负责
        unsafe impl Sync for $name {}

        impl $name {
            /// 在给定基地址上创建寄存器块
            ///
            /// # Safety
            ///
            /// `base` 必须指向一个有效、对齐、在整个程序生命周期内
            /// 都可访问的寄存器块。
            pub const unsafe fn new(base: usize) -> Self {
                Self { base }
            }

            /// 获取基地址
            pub const fn base_addr(&self) -> usize {
                self.base
            }

            $(
                $crate::paste::paste! {
                    /// 读取寄存器值
                    #[inline]
                    pub fn $reg_name(&self) -> $reg_type {
                        unsafe { core::ptr::read_volatile((self.base + $offset) as *const $reg_type) }
                    }

                    /// 写入寄存器值
                    #[inline]
                    pub fn [<$reg_name _write>](&self, value: $reg_type) {
                        unsafe { core::ptr::write_volatile((self.base + $offset) as *mut $reg_type, value) }
                    }

                    /// 获取寄存器地址
                    #[inline]
                    pub const fn [<$reg_name _addr>](&self) -> usize {
                        self.base + $offset
                    }
                }
            )*
        }
    };
}

/// 定义 UART 中断入口的宏
///
/// 生成一个 `extern "C"` 函数，把中断转发给驱动的
/// [`UartDriver::isr`](crate::uart::UartDriver::isr)。
///
/// # 示例
///
/// ```rust,ignore
/// static UART: UartDriver<DwApbUart, NoDma> = ...;
///
/// uart_interrupt_handler! {
///     name: UART0_IRQHandler,
///     driver: UART,
///     uart: UartId::Uart0,
/// }
/// ```
#[macro_export]
macro_rules! uart_interrupt_handler {
    (
        name: $name:ident,
        driver: $driver:expr,
        uart: $uart:expr $(,)?
    ) => {
        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub extern "C" fn $name() {
            $driver.isr($uart)
        }
    };
}

// ============================================================================
// 单元测试
// ============================================================================
