//! # 设备驱动框架
//!
//! - [`traits`]: 阻塞字节流 trait（`Device` / `Read` / `Write`）
//! - [`macros`]: 寄存器块与中断入口宏
//! - [`mock`]: 模拟的 UART 与 DMA 硬件，供测试和无硬件开发使用
//!
//! ## 使用示例
//!
//! ```rust
//! use neon_uart::drivers::mock::{MockDma, MockUart};
//! use neon_uart::drivers::{Device, Write};
//! use neon_uart::uart::{BaudDivisor, LineControl, UartConfig, UartDriver, UartId};
//!
//! let driver = UartDriver::new(MockUart::new(), MockUart::new(), MockDma::new());
//! let config = UartConfig::new(LineControl::Lc8N1, BaudDivisor::pack(0, 208, 5));
//!
//! let mut port = driver.serial(UartId::Uart0).with_config(config);
//! port.init().unwrap();
//! port.write_all(b"Hello").unwrap();
//!
//! let mut wire = [0u8; 8];
//! let n = driver.registers(UartId::Uart0).take_transmitted_to(&mut wire);
//! assert_eq!(&wire[..n], b"Hello");
//! ```

pub mod traits;
pub mod macros;

#[cfg(feature = "spin")]
pub mod mock;

pub use traits::{Device, Read, ReadWrite, Write};
