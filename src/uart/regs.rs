//! 寄存器偏移与位定义
//!
//! 位编码是硬件契约，这里只做命名，不做任何抽象。

use bitflags::bitflags;

/// 寄存器（按字节偏移）
///
/// 部分偏移在不同条件下对应不同寄存器：
/// `RbrThrDll` 在 DLAB=1 时是 DLL，否则读为 RBR、写为 THR；
/// `IerDlh` 在 DLAB=1 时是 DLH；`IirFcr` 读为 IIR、写为 FCR。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Reg {
    RbrThrDll = 0x00,
    IerDlh = 0x04,
    IirFcr = 0x08,
    Lcr = 0x0C,
    Mcr = 0x10,
    Lsr = 0x14,
    Msr = 0x18,
    Scr = 0x1C,
    /// UART 状态寄存器（FIFO 状态）
    Usr = 0x7C,
    /// TX FIFO 水位
    Tfl = 0x80,
    /// RX FIFO 水位
    Rfl = 0x84,
    /// 小数分频
    Dlf = 0xC0,
}

impl Reg {
    pub const fn offset(self) -> usize {
        self as usize
    }
}

bitflags! {
    /// 线路控制寄存器
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lcr: u32 {
        /// 分频锁存访问位
        const DLAB = 1 << 7;
    }
}

bitflags! {
    /// Modem 控制寄存器
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mcr: u32 {
        const RTS = 1 << 1;
        const LOOPBACK = 1 << 4;
        /// 自动流控使能
        const AFCE = 1 << 5;
    }
}

bitflags! {
    /// FIFO 控制寄存器（只写）
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Fcr: u32 {
        const FIFOE = 1 << 0;
        const RFIFOR = 1 << 1;
        const XFIFOR = 1 << 2;
        /// TX 空阈值 (TET) 字段
        const TET = 0b11 << 4;
        /// TET：TX FIFO 半空
        const TET_HALF = 0b11 << 4;
        /// RX 触发阈值 (RT) 字段
        const RT = 0b11 << 6;
        /// RT：RX FIFO 半满
        const RT_HALF = 0b10 << 6;
    }
}

bitflags! {
    /// 中断使能寄存器
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ier: u32 {
        /// 接收数据可用中断
        const ERBFI = 1 << 0;
        /// THR 空中断
        const ETBEI = 1 << 1;
        /// 接收线路状态中断
        const ELSI = 1 << 2;
        /// 可编程 THRE 中断模式
        const PTIME = 1 << 7;

        const SOURCES = Self::ERBFI.bits() | Self::ETBEI.bits() | Self::ELSI.bits();
    }
}

bitflags! {
    /// 线路状态寄存器
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lsr: u32 {
        /// 数据就绪
        const DR = 1 << 0;
        /// 溢出错误
        const OE = 1 << 1;
        /// 校验错误
        const PE = 1 << 2;
        /// 帧错误
        const FE = 1 << 3;
        /// Break 中断
        const BI = 1 << 4;
        /// THR 空（PTIME 模式下表示 TX FIFO 满）
        const THRE = 1 << 5;
        /// 发送器空
        const TEMT = 1 << 6;
        /// RX FIFO 错误
        const RFE = 1 << 7;

        const ERRORS = Self::OE.bits() | Self::PE.bits() | Self::FE.bits() | Self::BI.bits();
    }
}

bitflags! {
    /// UART 状态寄存器
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Usr: u32 {
        const BUSY = 1 << 0;
        /// TX FIFO 未满
        const TFNF = 1 << 1;
        /// TX FIFO 空
        const TFE = 1 << 2;
        /// RX FIFO 非空
        const RFNE = 1 << 3;
        /// RX FIFO 满
        const RFF = 1 << 4;
    }
}

/// IIR 中断 ID 掩码
pub const IIR_IID_MASK: u32 = 0x0F;

/// IIR 低 4 位给出的中断源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptId {
    NoInterrupt,
    ThrEmpty,
    RecvDataAvailable,
    RecvLineStatus,
    BusyDetect,
    CharTimeout,
}

impl InterruptId {
    /// 解码 IIR；未知编码返回 `None`
    pub const fn from_iir(iir: u32) -> Option<Self> {
        match iir & IIR_IID_MASK {
            0x01 => Some(InterruptId::NoInterrupt),
            0x02 => Some(InterruptId::ThrEmpty),
            0x04 => Some(InterruptId::RecvDataAvailable),
            0x06 => Some(InterruptId::RecvLineStatus),
            0x07 => Some(InterruptId::BusyDetect),
            0x0C => Some(InterruptId::CharTimeout),
            _ => None,
        }
    }

    pub const fn code(self) -> u32 {
        match self {
            InterruptId::NoInterrupt => 0x01,
            InterruptId::ThrEmpty => 0x02,
            InterruptId::RecvDataAvailable => 0x04,
            InterruptId::RecvLineStatus => 0x06,
            InterruptId::BusyDetect => 0x07,
            InterruptId::CharTimeout => 0x0C,
        }
    }
}
