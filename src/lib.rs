#![cfg_attr(not(test), no_std)]
#[cfg(test)]
extern crate std;

pub mod error;
pub mod config;
pub mod log;
pub mod hal;
pub mod drivers;
pub mod uart;

pub use paste;

// 提供 critical-section 的单核实现
#[cfg(feature = "cortex_m3")]
use cortex_m as _;

pub use error::{Result, UartError};
pub use uart::{UartDriver, UartId};
