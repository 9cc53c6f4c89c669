//! # 模拟硬件
//!
//! | 类型 | 实现 | 说明 |
//! |------|------|------|
//! | [`MockUart`] | `Registers` | DesignWare APB UART 的行为模型 |
//! | [`MockDma`] | `DmaController` | 单控制器、8 通道的 DMA 模型 |
//!
//! 两者内部状态都由 `spin::Mutex` 保护，可以放进 `static`。

mod mock_uart;
mod mock_dma;

pub use mock_uart::MockUart;
pub use mock_dma::MockDma;
