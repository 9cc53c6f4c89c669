//! # UART 配置
//!
//! - [`LineControl`]: 24 种固定的 LCR 编码（数据位 / 校验 / 停止位）
//! - [`BaudDivisor`]: 24 位打包分频值 `(DLH << 16) | (DLL << 8) | DLF`
//! - [`FifoThreshold`]: FIFO 触发阈值预设
//! - [`UartConfig`]: 一次 `set_config` 应用的完整配置

use crate::config::DLF_BITS;
use crate::error::{Result, UartError};
use crate::uart::regs::Fcr;

/// 线路控制
///
/// 判别值就是写入 LCR 的原始编码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LineControl {
    /// 5 数据位，无校验，1 停止位
    Lc5N1 = 0x00,
    /// 5 数据位，无校验，1.5 停止位
    Lc5N1_5 = 0x04,
    /// 5 数据位，偶校验，1 停止位
    Lc5E1 = 0x18,
    /// 5 数据位，偶校验，1.5 停止位
    Lc5E1_5 = 0x1C,
    /// 5 数据位，奇校验，1 停止位
    Lc5O1 = 0x08,
    /// 5 数据位，奇校验，1.5 停止位
    Lc5O1_5 = 0x0C,
    Lc6N1 = 0x01,
    Lc6N2 = 0x05,
    Lc6E1 = 0x19,
    Lc6E2 = 0x1D,
    Lc6O1 = 0x09,
    Lc6O2 = 0x0D,
    Lc7N1 = 0x02,
    Lc7N2 = 0x06,
    Lc7E1 = 0x1A,
    Lc7E2 = 0x1E,
    Lc7O1 = 0x0A,
    Lc7O2 = 0x0E,
    /// 8 数据位，无校验，1 停止位
    #[default]
    Lc8N1 = 0x03,
    Lc8N2 = 0x07,
    Lc8E1 = 0x1B,
    Lc8E2 = 0x1F,
    Lc8O1 = 0x0B,
    Lc8O2 = 0x0F,
}

impl LineControl {
    pub const ALL: [LineControl; 24] = [
        LineControl::Lc5N1,
        LineControl::Lc5N1_5,
        LineControl::Lc5E1,
        LineControl::Lc5E1_5,
        LineControl::Lc5O1,
        LineControl::Lc5O1_5,
        LineControl::Lc6N1,
        LineControl::Lc6N2,
        LineControl::Lc6E1,
        LineControl::Lc6E2,
        LineControl::Lc6O1,
        LineControl::Lc6O2,
        LineControl::Lc7N1,
        LineControl::Lc7N2,
        LineControl::Lc7E1,
        LineControl::Lc7E2,
        LineControl::Lc7O1,
        LineControl::Lc7O2,
        LineControl::Lc8N1,
        LineControl::Lc8N2,
        LineControl::Lc8E1,
        LineControl::Lc8E2,
        LineControl::Lc8O1,
        LineControl::Lc8O2,
    ];

    /// 从 LCR 原始编码解析，未知编码返回 `None`
    pub fn from_bits(bits: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|lc| lc.bits() == bits)
    }

    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// 数据位数 (5..=8)
    pub const fn data_bits(self) -> u8 {
        (self.bits() & 0x03) + 5
    }
}

const DLH_OFFS: u32 = 16;
const DLL_OFFS: u32 = 8;
const DLF_OFFS: u32 = 0;
const BYTE_MASK: u32 = 0xFF;

/// 打包的波特率分频值
///
/// 整数部分拆成 DLH/DLL，小数部分放在 DLF。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudDivisor(u32);

impl BaudDivisor {
    pub const fn pack(dlh: u8, dll: u8, dlf: u8) -> Self {
        Self(((dlh as u32) << DLH_OFFS) | ((dll as u32) << DLL_OFFS) | ((dlf as u32) << DLF_OFFS))
    }

    /// 从 24 位原始值构造，高 8 位非零时返回 `InvalidArgument`
    pub const fn from_raw(raw: u32) -> Result<Self> {
        if raw >> 24 != 0 {
            return Err(UartError::InvalidArgument);
        }
        Ok(Self(raw))
    }

    /// 由时钟频率和目标波特率计算分频
    ///
    /// 整数部分为 `clock / (16 * baud)`，余数按 [`DLF_BITS`] 位小数四舍五入。
    pub fn from_baud_rate(clock_hz: u32, baud: u32) -> Result<Self> {
        if baud == 0 {
            return Err(UartError::InvalidArgument);
        }
        let denom = 16 * baud as u64;
        let clock = clock_hz as u64;
        let mut integer = clock / denom;
        let scale = 1u64 << DLF_BITS;
        let mut fraction = ((clock % denom) * scale + denom / 2) / denom;
        if fraction == scale {
            integer += 1;
            fraction = 0;
        }
        if integer == 0 || integer > 0xFFFF {
            return Err(UartError::InvalidArgument);
        }
        Ok(Self::pack((integer >> 8) as u8, integer as u8, fraction as u8))
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn dlh(self) -> u8 {
        ((self.0 >> DLH_OFFS) & BYTE_MASK) as u8
    }

    pub const fn dll(self) -> u8 {
        ((self.0 >> DLL_OFFS) & BYTE_MASK) as u8
    }

    pub const fn dlf(self) -> u8 {
        ((self.0 >> DLF_OFFS) & BYTE_MASK) as u8
    }

    pub const fn unpack(self) -> (u8, u8, u8) {
        (self.dlh(), self.dll(), self.dlf())
    }

    /// 整数分频部分 `(DLH << 8) | DLL`
    pub const fn integer(self) -> u16 {
        ((self.dlh() as u16) << 8) | self.dll() as u16
    }
}

/// FIFO 触发阈值预设
///
/// 只影响中断频率与延迟的取舍，不影响正确性。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FifoThreshold {
    /// TX 半空、RX 半满
    #[default]
    TxHalfRxHalf,
    /// TX 半空、RX 1 字节
    TxHalfRxOneByte,
    /// TX 全空、RX 半满
    TxEmptyRxHalf,
}

impl FifoThreshold {
    /// FCR 中的阈值位
    pub const fn fcr_bits(self) -> u32 {
        match self {
            FifoThreshold::TxHalfRxHalf => Fcr::TET_HALF.union(Fcr::RT_HALF).bits(),
            // RT 为 0 时每收到 1 字节触发
            FifoThreshold::TxHalfRxOneByte => Fcr::TET_HALF.bits(),
            // TET 为 0 时 FIFO 全空才触发
            FifoThreshold::TxEmptyRxHalf => Fcr::RT_HALF.bits(),
        }
    }

    /// 一次 THR 空中断最多补充的字节数
    pub const fn tx_refill(self) -> usize {
        match self {
            FifoThreshold::TxEmptyRxHalf => crate::config::FIFO_DEPTH,
            _ => crate::config::FIFO_HALF_DEPTH,
        }
    }
}

/// UART 配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    pub line_control: LineControl,
    pub baud_divisor: BaudDivisor,
    /// 硬件自动流控 (RTS/CTS)
    pub hw_flow_control: bool,
    /// 是否允许中断驱动传输
    pub interrupts_enabled: bool,
    pub fifo_threshold: FifoThreshold,
}

impl UartConfig {
    pub const fn new(line_control: LineControl, baud_divisor: BaudDivisor) -> Self {
        Self {
            line_control,
            baud_divisor,
            hw_flow_control: false,
            interrupts_enabled: true,
            fifo_threshold: FifoThreshold::TxHalfRxHalf,
        }
    }

    /// 从原始数值构造并校验
    pub fn from_raw(line_control: u8, baud_divisor: u32, hw_fc: bool, int_en: bool) -> Result<Self> {
        let line_control = LineControl::from_bits(line_control).ok_or(UartError::InvalidArgument)?;
        let baud_divisor = BaudDivisor::from_raw(baud_divisor)?;
        Ok(Self {
            hw_flow_control: hw_fc,
            interrupts_enabled: int_en,
            ..Self::new(line_control, baud_divisor)
        })
    }

    pub const fn with_flow_control(mut self, enabled: bool) -> Self {
        self.hw_flow_control = enabled;
        self
    }

    pub const fn with_interrupts(mut self, enabled: bool) -> Self {
        self.interrupts_enabled = enabled;
        self
    }

    pub const fn with_fifo_threshold(mut self, threshold: FifoThreshold) -> Self {
        self.fifo_threshold = threshold;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.baud_divisor.integer() == 0 {
            return Err(UartError::InvalidArgument);
        }
        Ok(())
    }
}
