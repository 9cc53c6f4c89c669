//! # Mock UART
//!
//! 寄存器级的 DesignWare APB UART 模型：
//!
//! - 16 字节 TX/RX FIFO，RX 满时再收到数据锁存溢出错误
//! - 每次读 LSR 或 USR 时，TX FIFO 向线路移出一个字节（`auto_shift`，
//!   可关闭后用 [`MockUart::shift`] 手动推进）
//! - MCR.LOOPBACK 打开时移出的字节回到 RX FIFO
//! - 读 LSR 清除锁存的 OE/PE/FE/BI
//! - IIR 按优先级给出当前挂起的中断，中断条件按电平计算
//! - PTIME + FIFO 使能时 LSR.THRE 表示 TX FIFO 满，THR 空中断在 TX
//!   水位不高于 TET 阈值时挂起
//!
//! ## 使用示例
//!
//! ```rust
//! use neon_uart::drivers::mock::MockUart;
//! use neon_uart::hal::Registers;
//! use neon_uart::uart::regs::{Lsr, Reg};
//!
//! let uart = MockUart::new();
//! uart.receive(b"A");
//!
//! let lsr = Lsr::from_bits_retain(uart.read(Reg::Lsr));
//! assert!(lsr.contains(Lsr::DR));
//! assert_eq!(uart.read(Reg::RbrThrDll), b'A' as u32);
//! ```

use spin::Mutex;

use crate::config::FIFO_DEPTH;
use crate::hal::Registers;
use crate::uart::regs::{Fcr, Ier, InterruptId, Lcr, Lsr, Mcr, Reg, Usr};

/// 线路记录缓冲区大小
const WIRE_SIZE: usize = 256;

/// 环形缓冲区，保留一个空槽区分空与满
#[derive(Clone, Copy)]
struct Ring<const N: usize> {
    buffer: [u8; N],
    head: usize,
    tail: usize,
}

impl<const N: usize> Ring<N> {
    const fn new() -> Self {
        Self { buffer: [0; N], head: 0, tail: 0 }
    }

    fn push(&mut self, byte: u8) -> bool {
        let next = (self.head + 1) % N;
        if next == self.tail {
            return false; // 满
        }
        self.buffer[self.head] = byte;
        self.head = next;
        true
    }

    fn pop(&mut self) -> Option<u8> {
        if self.tail == self.head {
            return None;
        }
        let byte = self.buffer[self.tail];
        self.tail = (self.tail + 1) % N;
        Some(byte)
    }

    fn len(&self) -> usize {
        (self.head + N - self.tail) % N
    }

    fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    fn is_full(&self) -> bool {
        self.len() == N - 1
    }

    fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }
}

type Fifo = Ring<{ FIFO_DEPTH + 1 }>;

struct State {
    tx: Fifo,
    rx: Fifo,
    wire: Ring<WIRE_SIZE>,
    /// 锁存的线路错误
    errors: Lsr,
    ier: u32,
    lcr: u32,
    fcr: u32,
    mcr: u32,
    scr: u32,
    dll: u32,
    dlh: u32,
    dlf: u32,
    auto_shift: bool,
}

impl State {
    const fn new() -> Self {
        Self {
            tx: Fifo::new(),
            rx: Fifo::new(),
            wire: Ring::new(),
            errors: Lsr::empty(),
            ier: 0,
            lcr: 0,
            fcr: 0,
            mcr: 0,
            scr: 0,
            dll: 0,
            dlh: 0,
            dlf: 0,
            auto_shift: true,
        }
    }

    fn dlab(&self) -> bool {
        self.lcr & Lcr::DLAB.bits() != 0
    }

    fn ier(&self) -> Ier {
        Ier::from_bits_retain(self.ier)
    }

    fn fifo_enabled(&self) -> bool {
        self.fcr & Fcr::FIFOE.bits() != 0
    }

    fn ptime_mode(&self) -> bool {
        self.fifo_enabled() && self.ier().contains(Ier::PTIME)
    }

    /// RX 触发水位 (FCR.RT)
    fn rx_trigger(&self) -> usize {
        if !self.fifo_enabled() {
            return 1;
        }
        match (self.fcr & Fcr::RT.bits()) >> 6 {
            0b00 => 1,
            0b01 => FIFO_DEPTH / 4,
            0b10 => FIFO_DEPTH / 2,
            _ => FIFO_DEPTH - 2,
        }
    }

    /// TX 空阈值 (FCR.TET)
    fn tx_empty_trigger(&self) -> usize {
        match (self.fcr & Fcr::TET.bits()) >> 4 {
            0b00 => 0,
            0b01 => 2,
            0b10 => FIFO_DEPTH / 4,
            _ => FIFO_DEPTH / 2,
        }
    }

    fn receive_byte(&mut self, byte: u8) -> bool {
        if self.rx.push(byte) {
            true
        } else {
            self.errors.insert(Lsr::OE);
            false
        }
    }

    /// TX FIFO 移出一个字节到线路
    fn shift(&mut self) -> bool {
        let Some(byte) = self.tx.pop() else {
            return false;
        };
        if !self.wire.push(byte) {
            // 线路记录满时丢弃最旧的
            self.wire.pop();
            self.wire.push(byte);
        }
        if self.mcr & Mcr::LOOPBACK.bits() != 0 {
            self.receive_byte(byte);
        }
        true
    }

    fn lsr(&self) -> Lsr {
        let mut lsr = self.errors;
        lsr.set(Lsr::DR, !self.rx.is_empty());
        let thre = if self.ptime_mode() {
            self.tx.is_full()
        } else {
            self.tx.is_empty()
        };
        lsr.set(Lsr::THRE, thre);
        lsr.set(Lsr::TEMT, self.tx.is_empty());
        lsr.set(Lsr::RFE, self.fifo_enabled() && !self.errors.is_empty());
        lsr
    }

    fn usr(&self) -> Usr {
        let mut usr = Usr::empty();
        usr.set(Usr::BUSY, !self.tx.is_empty());
        usr.set(Usr::TFNF, !self.tx.is_full());
        usr.set(Usr::TFE, self.tx.is_empty());
        usr.set(Usr::RFNE, !self.rx.is_empty());
        usr.set(Usr::RFF, self.rx.is_full());
        usr
    }

    fn iir(&self) -> u32 {
        let ier = self.ier();
        let thr_empty = if self.ptime_mode() {
            self.tx.len() <= self.tx_empty_trigger()
        } else {
            self.tx.is_empty()
        };

        let id = if ier.contains(Ier::ELSI) && !self.errors.is_empty() {
            InterruptId::RecvLineStatus
        } else if ier.contains(Ier::ERBFI) && self.rx.len() >= self.rx_trigger() {
            InterruptId::RecvDataAvailable
        } else if ier.contains(Ier::ERBFI) && !self.rx.is_empty() {
            InterruptId::CharTimeout
        } else if ier.contains(Ier::ETBEI) && thr_empty {
            InterruptId::ThrEmpty
        } else {
            InterruptId::NoInterrupt
        };

        let fifo_bits = if self.fifo_enabled() { 0xC0 } else { 0 };
        id.code() | fifo_bits
    }
}

/// Mock UART
pub struct MockUart {
    state: Mutex<State>,
}

impl MockUart {
    pub const fn new() -> Self {
        Self { state: Mutex::new(State::new()) }
    }

    /// 模拟从线路收到数据，返回放入 RX FIFO 的字节数
    ///
    /// FIFO 满后的数据被丢弃并锁存溢出错误。
    pub fn receive(&self, data: &[u8]) -> usize {
        let mut state = self.state.lock();
        data.iter().filter(|&&byte| state.receive_byte(byte)).count()
    }

    /// 锁存线路错误（只取 OE/PE/FE/BI）
    pub fn inject_error(&self, errors: Lsr) {
        self.state.lock().errors.insert(errors & Lsr::ERRORS);
    }

    pub fn set_loopback(&self, enabled: bool) {
        let mut state = self.state.lock();
        if enabled {
            state.mcr |= Mcr::LOOPBACK.bits();
        } else {
            state.mcr &= !Mcr::LOOPBACK.bits();
        }
    }

    /// 关闭后 TX FIFO 只在调用 [`shift`](Self::shift) 时推进
    pub fn set_auto_shift(&self, enabled: bool) {
        self.state.lock().auto_shift = enabled;
    }

    /// 移出最多 `n` 个字节，返回实际移出的数量
    pub fn shift(&self, n: usize) -> usize {
        let mut state = self.state.lock();
        (0..n).take_while(|_| state.shift()).count()
    }

    pub fn shift_all(&self) -> usize {
        self.shift(FIFO_DEPTH)
    }

    /// 取出已经发到线路上的数据
    pub fn take_transmitted_to(&self, buf: &mut [u8]) -> usize {
        let mut state = self.state.lock();
        let mut count = 0;
        while count < buf.len() {
            match state.wire.pop() {
                Some(byte) => buf[count] = byte,
                None => break,
            }
            count += 1;
        }
        count
    }

    pub fn tx_level(&self) -> usize {
        self.state.lock().tx.len()
    }

    pub fn rx_level(&self) -> usize {
        self.state.lock().rx.len()
    }

    pub fn ier(&self) -> u32 {
        self.state.lock().ier
    }

    pub fn lcr(&self) -> u32 {
        self.state.lock().lcr
    }

    pub fn mcr(&self) -> u32 {
        self.state.lock().mcr
    }

    /// 最近写入的 FCR（不含自清除的复位位）
    pub fn fcr(&self) -> u32 {
        self.state.lock().fcr
    }

    /// `(DLH, DLL, DLF)`
    pub fn divisor(&self) -> (u8, u8, u8) {
        let state = self.state.lock();
        (state.dlh as u8, state.dll as u8, state.dlf as u8)
    }

    /// THR 的总线地址，DMA 发送的目的地址
    pub fn thr_address(&self) -> usize {
        self.address_of(Reg::RbrThrDll)
    }
}

impl Default for MockUart {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers for MockUart {
    fn read(&self, reg: Reg) -> u32 {
        let mut state = self.state.lock();
        match reg {
            Reg::RbrThrDll if state.dlab() => state.dll,
            Reg::RbrThrDll => state.rx.pop().map_or(0, u32::from),
            Reg::IerDlh if state.dlab() => state.dlh,
            Reg::IerDlh => state.ier,
            Reg::IirFcr => state.iir(),
            Reg::Lcr => state.lcr,
            Reg::Mcr => state.mcr,
            Reg::Lsr => {
                if state.auto_shift {
                    state.shift();
                }
                let lsr = state.lsr();
                state.errors = Lsr::empty();
                lsr.bits()
            }
            Reg::Msr => 0,
            Reg::Scr => state.scr,
            Reg::Usr => {
                if state.auto_shift {
                    state.shift();
                }
                state.usr().bits()
            }
            Reg::Tfl => state.tx.len() as u32,
            Reg::Rfl => state.rx.len() as u32,
            Reg::Dlf => state.dlf,
        }
    }

    fn write(&self, reg: Reg, value: u32) {
        let mut state = self.state.lock();
        match reg {
            Reg::RbrThrDll if state.dlab() => state.dll = value & 0xFF,
            Reg::RbrThrDll => {
                // FIFO 满时硬件丢弃写入
                let _ = state.tx.push(value as u8);
            }
            Reg::IerDlh if state.dlab() => state.dlh = value & 0xFF,
            Reg::IerDlh => state.ier = value & (Ier::SOURCES | Ier::PTIME).bits(),
            Reg::IirFcr => {
                let fcr = Fcr::from_bits_retain(value);
                if fcr.contains(Fcr::RFIFOR) {
                    state.rx.clear();
                }
                if fcr.contains(Fcr::XFIFOR) {
                    state.tx.clear();
                }
                state.fcr = (fcr - (Fcr::RFIFOR | Fcr::XFIFOR)).bits();
            }
            Reg::Lcr => state.lcr = value & 0xFF,
            Reg::Mcr => state.mcr = value,
            Reg::Scr => state.scr = value & 0xFF,
            Reg::Dlf => state.dlf = value,
            // 只读寄存器
            Reg::Lsr | Reg::Msr | Reg::Usr | Reg::Tfl | Reg::Rfl => {}
        }
    }

    fn address_of(&self, reg: Reg) -> usize {
        self as *const Self as usize + reg.offset()
    }
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ptime_fifo(uart: &MockUart) {
        uart.write(Reg::IirFcr, (Fcr::FIFOE | Fcr::RFIFOR | Fcr::XFIFOR).bits() | 0xB0);
        uart.write(Reg::IerDlh, Ier::PTIME.bits());
    }

    #[test]
    fn test_divisor_latch() {
        let uart = MockUart::new();
        uart.write(Reg::Lcr, Lcr::DLAB.bits());
        uart.write(Reg::RbrThrDll, 0x34);
        uart.write(Reg::IerDlh, 0x12);
        uart.write(Reg::Lcr, 0x03);

        assert_eq!(uart.divisor(), (0x12, 0x34, 0));
        assert_eq!(uart.read(Reg::IerDlh), 0);
        assert_eq!(uart.tx_level(), 0);
    }

    #[test]
    fn test_rx_overflow_latches_overrun() {
        let uart = MockUart::new();
        let data = [0xA5u8; 20];
        assert_eq!(uart.receive(&data), 16);
        assert_eq!(uart.read(Reg::Rfl), 16);

        let lsr = Lsr::from_bits_retain(uart.read(Reg::Lsr));
        assert!(lsr.contains(Lsr::OE | Lsr::DR));
        let lsr = Lsr::from_bits_retain(uart.read(Reg::Lsr));
        assert!(!lsr.contains(Lsr::OE));
    }

    #[test]
    fn test_thre_means_full_in_ptime_mode() {
        let uart = MockUart::new();
        uart.set_auto_shift(false);
        ptime_fifo(&uart);

        let lsr = Lsr::from_bits_retain(uart.read(Reg::Lsr));
        assert!(!lsr.contains(Lsr::THRE));
        assert!(lsr.contains(Lsr::TEMT));

        for byte in 0..16 {
            uart.write(Reg::RbrThrDll, byte);
        }
        let lsr = Lsr::from_bits_retain(uart.read(Reg::Lsr));
        assert!(lsr.contains(Lsr::THRE));
        assert!(!Usr::from_bits_retain(uart.read(Reg::Usr)).contains(Usr::TFNF));
    }

    #[test]
    fn test_iir_priority() {
        let uart = MockUart::new();
        uart.set_auto_shift(false);
        ptime_fifo(&uart);
        uart.write(Reg::IerDlh, (Ier::PTIME | Ier::SOURCES).bits());

        // TX 空
        assert_eq!(uart.read(Reg::IirFcr), 0xC2);

        uart.receive(b"abc");
        assert_eq!(uart.read(Reg::IirFcr), 0xCC);

        uart.receive(b"defgh");
        assert_eq!(uart.read(Reg::IirFcr), 0xC4);

        uart.inject_error(Lsr::PE);
        assert_eq!(uart.read(Reg::IirFcr), 0xC6);
    }

    #[test]
    fn test_loopback_and_wire() {
        let uart = MockUart::new();
        uart.set_loopback(true);
        uart.write(Reg::RbrThrDll, b'x' as u32);
        uart.write(Reg::RbrThrDll, b'y' as u32);

        assert_eq!(uart.shift_all(), 2);
        assert_eq!(uart.read(Reg::RbrThrDll), b'x' as u32);
        assert_eq!(uart.read(Reg::RbrThrDll), b'y' as u32);

        let mut wire = [0u8; 4];
        assert_eq!(uart.take_transmitted_to(&mut wire), 2);
        assert_eq!(&wire[..2], b"xy");
    }

    #[test]
    fn test_fifo_reset() {
        let uart = MockUart::new();
        uart.set_auto_shift(false);
        uart.receive(b"stale");
        uart.write(Reg::RbrThrDll, 1);
        uart.write(Reg::IirFcr, (Fcr::FIFOE | Fcr::RFIFOR | Fcr::XFIFOR).bits());

        assert_eq!(uart.rx_level(), 0);
        assert_eq!(uart.tx_level(), 0);
        assert_eq!(uart.fcr(), Fcr::FIFOE.bits());
    }
}
