//! 硬件抽象层 (HAL)
//!
//! 驱动核心与外部协作者之间的接口：
//!
//! - [`Registers`]: UART 寄存器访问（真实 MMIO 或模拟硬件）
//! - [`DmaController`]: DMA 子系统（通道配置、单次传输的启动/停止）
//!
//! 中断控制器的向量分发不在此处抽象，由板级代码直接调用
//! [`UartDriver::isr`](crate::uart::UartDriver::isr)。

pub mod traits;
pub mod dma;
pub mod mmio;

// 重新导出 traits
pub use traits::*;
pub use dma::{
    DmaControllerId,
    DmaChannelId,
    DmaDirection,
    DmaChannelConfig,
    DmaTransfer,
    DmaCompletion,
    TransferWidth,
    BurstLength,
    HandshakePolarity,
};
pub use mmio::DwApbUart;
