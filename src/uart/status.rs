//! UART 状态
//!
//! [`StatusFlags`] 由每次状态查询新生成。四个错误位与 LSR 中的位置
//! 相同，由硬件锁存，直到读 LSR 时被清除。

use bitflags::bitflags;

use crate::uart::regs::{Lsr, Usr};

bitflags! {
    /// UART 状态位
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusFlags: u32 {
        /// 接收溢出
        const OVERRUN = 1 << 1;
        /// 校验错误
        const PARITY_ERROR = 1 << 2;
        /// 帧错误
        const FRAMING_ERROR = 1 << 3;
        /// Break 中断
        const BREAK_INTERRUPT = 1 << 4;
        /// 发送器忙
        const TX_BUSY = 1 << 5;
        /// 接收器有数据
        const RX_BUSY = 1 << 6;
        /// TX FIFO 未满
        const TX_NOT_FULL = 1 << 7;
        /// RX FIFO 非空
        const RX_NOT_EMPTY = 1 << 8;

        /// 线路错误的合集
        const LINE_ERRORS = Self::OVERRUN.bits()
            | Self::PARITY_ERROR.bits()
            | Self::FRAMING_ERROR.bits()
            | Self::BREAK_INTERRUPT.bits();
    }
}

impl StatusFlags {
    /// 只取 LSR 中的错误位
    pub const fn from_lsr(lsr: Lsr) -> Self {
        // 错误位与 LSR 位置一一对应
        Self::from_bits_truncate(lsr.bits() & Lsr::ERRORS.bits())
    }

    /// 由同一时刻的 LSR 与 USR 采样生成完整状态
    pub fn decode(lsr: Lsr, usr: Usr) -> Self {
        let mut status = Self::from_lsr(lsr);
        status.set(Self::TX_BUSY, !lsr.contains(Lsr::TEMT));
        status.set(Self::RX_BUSY, lsr.contains(Lsr::DR));
        status.set(Self::TX_NOT_FULL, usr.contains(Usr::TFNF));
        status.set(Self::RX_NOT_EMPTY, usr.contains(Usr::RFNE));
        status
    }

    pub const fn has_line_error(&self) -> bool {
        self.intersects(Self::LINE_ERRORS)
    }

    /// 只保留错误位
    pub const fn line_errors(&self) -> Self {
        self.intersection(Self::LINE_ERRORS)
    }

    pub const fn is_overrun(&self) -> bool {
        self.contains(Self::OVERRUN)
    }

    pub const fn is_parity_error(&self) -> bool {
        self.contains(Self::PARITY_ERROR)
    }

    pub const fn is_framing_error(&self) -> bool {
        self.contains(Self::FRAMING_ERROR)
    }

    pub const fn is_break(&self) -> bool {
        self.contains(Self::BREAK_INTERRUPT)
    }

    pub const fn is_tx_busy(&self) -> bool {
        self.contains(Self::TX_BUSY)
    }

    pub const fn is_rx_busy(&self) -> bool {
        self.contains(Self::RX_BUSY)
    }

    pub const fn tx_not_full(&self) -> bool {
        self.contains(Self::TX_NOT_FULL)
    }

    pub const fn rx_not_empty(&self) -> bool {
        self.contains(Self::RX_NOT_EMPTY)
    }
}
