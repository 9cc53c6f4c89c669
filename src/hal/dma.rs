//! DMA 子系统的数据类型

use crate::error::Result;

/// DMA 控制器编号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaControllerId(pub u8);

/// DMA 通道编号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaChannelId(pub u8);

impl DmaChannelId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// 传输方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDirection {
    MemoryToMemory,
    /// UART 发送
    MemoryToPeripheral,
    /// UART 接收
    PeripheralToMemory,
}

/// 单次搬运宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferWidth {
    Bits8,
    Bits16,
    Bits32,
}

/// 突发长度（数据项个数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstLength {
    Items1,
    Items4,
    Items8,
    Items16,
}

/// 硬件握手信号极性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePolarity {
    High,
    Low,
}

/// 通道配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaChannelConfig {
    pub direction: DmaDirection,
    /// 外设握手接口号
    pub handshake_interface: u8,
    pub handshake_polarity: HandshakePolarity,
    pub source_width: TransferWidth,
    pub destination_width: TransferWidth,
    pub source_burst: BurstLength,
    pub destination_burst: BurstLength,
}

/// 一次单块传输
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaTransfer {
    /// 源地址
    pub source: usize,
    /// 目的地址
    pub destination: usize,
    /// 字节数
    pub len: usize,
}

/// DMA 子系统上报的完成事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaCompletion {
    /// 已搬运的字节数
    pub transferred: usize,
    /// `Ok` 表示正常完成
    pub result: Result<()>,
}

impl DmaCompletion {
    pub const fn done(transferred: usize) -> Self {
        Self { transferred, result: Ok(()) }
    }

    pub const fn failed(transferred: usize, error: crate::error::UartError) -> Self {
        Self { transferred, result: Err(error) }
    }
}
