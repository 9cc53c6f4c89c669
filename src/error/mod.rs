//! 错误类型
//!
//! 驱动所有操作统一返回 [`Result`]，失败时携带 [`UartError`]。
//! 每个错误都可以通过 [`UartError::errno`] 转换为 POSIX 风格的负错误码。

pub mod types;

pub use types::{Result, UartError};
