//! 硬件抽象层 Trait 定义
//!
//! 驱动核心只通过这些 trait 访问硬件，板级代码提供真实实现，
//! 测试使用 [`crate::drivers::mock`] 中的模拟实现。

use crate::error::Result;
use crate::hal::dma::{DmaChannelConfig, DmaChannelId, DmaControllerId, DmaTransfer};
use crate::uart::regs::Reg;

/// UART 寄存器访问 trait
///
/// 一个实现对应一个 UART 实例的寄存器块。实现本身不保存驱动状态，
/// 但要注意部分寄存器读操作带有硬件副作用：
///
/// - 读 `Lsr` 会清除锁存的 OE/PE/FE/BI 错误位
/// - 读 `RbrThrDll`（DLAB=0 时）会从 RX FIFO 弹出一个字节
/// - 同一偏移的读写可能对应不同寄存器（IIR/FCR）
pub trait Registers: Sync {
    /// 读取寄存器
    fn read(&self, reg: Reg) -> u32;

    /// 写入寄存器
    fn write(&self, reg: Reg, value: u32);

    /// 寄存器的总线地址，用作 DMA 的外设端地址
    fn address_of(&self, reg: Reg) -> usize;

    /// 读-改-写
    ///
    /// 不能用于 `IirFcr`（读写对应不同寄存器）和 `Lsr`（读清除）。
    fn modify<F>(&self, reg: Reg, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(reg);
        self.write(reg, f(value));
    }
}

/// DMA 子系统 trait
///
/// 通道的分配由调用方负责；驱动只对已经初始化的控制器配置通道、
/// 启动和停止单次传输。传输完成后，DMA 中断处理程序应调用
/// [`UartDriver::dma_transfer_complete`](crate::uart::UartDriver::dma_transfer_complete)。
pub trait DmaController: Sync {
    /// 控制器是否已初始化
    fn is_initialized(&self, controller: DmaControllerId) -> bool;

    /// 配置通道（宽度、突发长度、握手接口等不常变化的参数）
    fn configure_channel(
        &self,
        controller: DmaControllerId,
        channel: DmaChannelId,
        config: &DmaChannelConfig,
    ) -> Result<()>;

    /// 启动一次单块传输
    fn start_transfer(
        &self,
        controller: DmaControllerId,
        channel: DmaChannelId,
        transfer: &DmaTransfer,
    ) -> Result<()>;

    /// 停止通道上的传输
    ///
    /// # 返回值
    ///
    /// 停止前已经搬运的字节数
    fn stop_transfer(&self, controller: DmaControllerId, channel: DmaChannelId) -> Result<usize>;
}

/// 没有 DMA 控制器的板子使用的占位实现
///
/// 控制器永远处于未初始化状态，所以 `dma_channel_config` 总是返回
/// `InvalidState`。
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDma;

impl DmaController for NoDma {
    fn is_initialized(&self, _controller: DmaControllerId) -> bool {
        false
    }

    fn configure_channel(
        &self,
        _controller: DmaControllerId,
        _channel: DmaChannelId,
        _config: &DmaChannelConfig,
    ) -> Result<()> {
        Err(crate::error::UartError::InvalidState)
    }

    fn start_transfer(
        &self,
        _controller: DmaControllerId,
        _channel: DmaChannelId,
        _transfer: &DmaTransfer,
    ) -> Result<()> {
        Err(crate::error::UartError::InvalidState)
    }

    fn stop_transfer(&self, _controller: DmaControllerId, _channel: DmaChannelId) -> Result<usize> {
        Err(crate::error::UartError::InvalidState)
    }
}
