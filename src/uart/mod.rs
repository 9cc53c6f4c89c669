//! # UART 驱动核心
//!
//! [`UartDriver`] 持有全部 UART 实例的状态，按 [`UartId`] 索引。
//! 每个实例可以分别为 TX、RX 选择一个传输引擎：
//!
//! | 引擎 | 操作 | 完成方式 |
//! |------|------|----------|
//! | 轮询 | `write` / `read` / `write_buffer` | 调用返回 |
//! | 中断 | `irq_write` / `irq_read` | [`TransferClient`] 回调 |
//! | DMA | `dma_write` / `dma_read` | [`TransferClient`] 回调 |
//!
//! 同一实例同一方向上同时只能有一个异步传输，重复启动返回 `Busy`。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! static UART: UartDriver<DwApbUart, NoDma> = UartDriver::new(
//!     unsafe { DwApbUart::new(0xB000_2000) },
//!     unsafe { DwApbUart::new(0xB000_2400) },
//!     NoDma,
//! );
//!
//! let config = UartConfig::new(LineControl::Lc8N1, BaudDivisor::from_baud_rate(32_000_000, 115_200)?);
//! UART.set_config(UartId::Uart0, &config)?;
//! UART.write_buffer(UartId::Uart0, b"hello\r\n")?;
//! ```

pub mod regs;
pub mod config;
pub mod status;
pub mod transfer;
pub mod completion;
pub mod serial;

mod poll;
mod irq;
mod dma;

use core::cell::Cell;

use critical_section::Mutex;

use crate::config::NUM_UARTS;
use crate::error::{Result, UartError};
use crate::hal::{DmaChannelId, DmaController, DmaControllerId, DmaDirection, Registers};
use crate::uart::regs::{Fcr, Ier, Lcr, Lsr, Mcr, Reg, Usr};
use crate::uart::transfer::{ActiveTransfer, Engine, SlotState, TransferSlot};

pub use config::{BaudDivisor, FifoThreshold, LineControl, UartConfig};
pub use completion::CompletionSignal;
pub use serial::SerialPort;
pub use status::StatusFlags;
pub use transfer::{Completion, Direction, Rejected, StartResult, Transfer, TransferClient};

/// UART 实例编号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartId {
    Uart0 = 0,
    Uart1 = 1,
}

impl UartId {
    pub const ALL: [UartId; NUM_UARTS] = [UartId::Uart0, UartId::Uart1];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            UartId::Uart0 => "UART0",
            UartId::Uart1 => "UART1",
        }
    }
}

impl TryFrom<usize> for UartId {
    type Error = UartError;

    fn try_from(index: usize) -> Result<Self> {
        UartId::ALL.get(index).copied().ok_or(UartError::InvalidArgument)
    }
}

/// 某个方向上绑定的 DMA 通道
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaChannelBinding {
    pub controller: DmaControllerId,
    pub channel: DmaChannelId,
    pub direction: DmaDirection,
}

/// 单个 UART 实例的状态
pub(crate) struct Port<R> {
    regs: R,
    config: Mutex<Cell<Option<UartConfig>>>,
    tx: TransferSlot,
    rx: TransferSlot,
    tx_dma: Mutex<Cell<Option<DmaChannelBinding>>>,
    rx_dma: Mutex<Cell<Option<DmaChannelBinding>>>,
}

impl<R: Registers> Port<R> {
    const fn new(regs: R) -> Self {
        Self {
            regs,
            config: Mutex::new(Cell::new(None)),
            tx: TransferSlot::new(),
            rx: TransferSlot::new(),
            tx_dma: Mutex::new(Cell::new(None)),
            rx_dma: Mutex::new(Cell::new(None)),
        }
    }

    fn config(&self) -> Option<UartConfig> {
        critical_section::with(|cs| self.config.borrow(cs).get())
    }

    fn slot(&self, direction: Direction) -> &TransferSlot {
        match direction {
            Direction::Tx => &self.tx,
            Direction::Rx => &self.rx,
        }
    }

    fn dma_binding(&self, direction: Direction) -> Option<DmaChannelBinding> {
        let cell = match direction {
            Direction::Tx => &self.tx_dma,
            Direction::Rx => &self.rx_dma,
        };
        critical_section::with(|cs| cell.borrow(cs).get())
    }

    fn set_dma_binding(&self, direction: Direction, binding: DmaChannelBinding) {
        let cell = match direction {
            Direction::Tx => &self.tx_dma,
            Direction::Rx => &self.rx_dma,
        };
        critical_section::with(|cs| cell.borrow(cs).set(Some(binding)));
    }
}

/// UART 驱动
///
/// - `R`: 寄存器访问实现（[`DwApbUart`](crate::hal::DwApbUart) 或模拟硬件）
/// - `D`: DMA 子系统（没有 DMA 时用 [`NoDma`](crate::hal::NoDma)）
///
/// 所有操作都只需要 `&self`，驱动可以放在 `static` 中，
/// 同时被前台代码和中断处理程序使用。
pub struct UartDriver<R: Registers, D: DmaController> {
    ports: [Port<R>; NUM_UARTS],
    dma: D,
}

impl<R: Registers, D: DmaController> UartDriver<R, D> {
    pub const fn new(uart0: R, uart1: R, dma: D) -> Self {
        Self {
            ports: [Port::new(uart0), Port::new(uart1)],
            dma,
        }
    }

    pub(crate) fn port(&self, id: UartId) -> &Port<R> {
        &self.ports[id.index()]
    }

    /// 实例的寄存器块
    pub fn registers(&self, id: UartId) -> &R {
        &self.port(id).regs
    }

    /// DMA 子系统
    pub fn dma(&self) -> &D {
        &self.dma
    }

    /// 应用配置
    ///
    /// 编程过程中屏蔽本实例的中断源，结束后恢复原来的使能位
    /// （`interrupts_enabled` 为假时只保留 PTIME）。
    ///
    /// 修改流控模式时不应有传输在进行。
    pub fn set_config(&self, id: UartId, config: &UartConfig) -> Result<()> {
        config.validate()?;

        let port = self.port(id);
        let regs = &port.regs;
        let (dlh, dll, dlf) = config.baud_divisor.unpack();

        critical_section::with(|cs| {
            regs.write(Reg::Lcr, 0);
            let saved = Ier::from_bits_retain(regs.read(Reg::IerDlh));
            regs.write(Reg::IerDlh, 0);

            regs.write(Reg::Lcr, Lcr::DLAB.bits());
            regs.write(Reg::IerDlh, dlh as u32);
            regs.write(Reg::RbrThrDll, dll as u32);
            regs.write(Reg::Dlf, dlf as u32);

            regs.write(Reg::Lcr, config.line_control.bits() as u32);

            regs.modify(Reg::Mcr, |mcr| {
                let mut mcr = Mcr::from_bits_retain(mcr);
                mcr.remove(Mcr::AFCE | Mcr::RTS);
                if config.hw_flow_control {
                    mcr.insert(Mcr::AFCE | Mcr::RTS);
                }
                mcr.bits()
            });

            let fcr = Fcr::FIFOE | Fcr::RFIFOR | Fcr::XFIFOR;
            regs.write(Reg::IirFcr, fcr.bits() | config.fifo_threshold.fcr_bits());

            let mut ier = Ier::PTIME;
            if config.interrupts_enabled {
                ier |= saved & Ier::SOURCES;
            }
            regs.write(Reg::IerDlh, ier.bits());

            port.config.borrow(cs).set(Some(*config));
        });

        crate::debug!(
            "{}: lcr={:#04x} divisor={:#08x} fc={} int={}",
            id.name(),
            config.line_control.bits(),
            config.baud_divisor.raw(),
            config.hw_flow_control,
            config.interrupts_enabled
        );
        Ok(())
    }

    /// 最近一次成功应用的配置
    pub fn get_config(&self, id: UartId) -> Option<UartConfig> {
        self.port(id).config()
    }

    /// 读取状态
    ///
    /// 读 LSR 会清除锁存的错误位，错误只会被报告一次。
    pub fn get_status(&self, id: UartId) -> Result<StatusFlags> {
        let regs = &self.port(id).regs;
        let lsr = Lsr::from_bits_retain(regs.read(Reg::Lsr));
        let usr = Usr::from_bits_retain(regs.read(Reg::Usr));
        Ok(StatusFlags::decode(lsr, usr))
    }

    /// 方向上的传输槽位状态
    pub fn transfer_state(&self, id: UartId, direction: Direction) -> SlotState {
        self.port(id).slot(direction).state()
    }

    /// 在屏蔽中断源的情况下修改 IER
    pub(crate) fn update_ier(&self, id: UartId, f: impl FnOnce(Ier) -> Ier) {
        let regs = &self.port(id).regs;
        critical_section::with(|_| {
            let saved = Ier::from_bits_retain(regs.read(Reg::IerDlh));
            regs.write(Reg::IerDlh, 0);
            regs.write(Reg::IerDlh, f(saved).bits());
        });
    }

    /// 抢占某个引擎的传输并关闭它使用的中断源
    ///
    /// 两步在同一个临界区内完成，避免关掉回调里新启动传输的中断。
    pub(crate) fn finish(
        &self,
        id: UartId,
        direction: Direction,
        engine: Engine,
        sources: Ier,
    ) -> Option<ActiveTransfer> {
        critical_section::with(|_| {
            let xfer = self.port(id).slot(direction).claim_for(engine)?;
            if !sources.is_empty() {
                self.update_ier(id, |ier| ier - sources);
            }
            Some(xfer)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mock::{MockDma, MockUart};

    fn driver() -> UartDriver<MockUart, MockDma> {
        UartDriver::new(MockUart::new(), MockUart::new(), MockDma::new())
    }

    #[test]
    fn test_uart_id_conversion() {
        assert_eq!(UartId::try_from(0), Ok(UartId::Uart0));
        assert_eq!(UartId::try_from(1), Ok(UartId::Uart1));
        assert_eq!(UartId::try_from(2), Err(UartError::InvalidArgument));
        assert_eq!(UartId::Uart1.name(), "UART1");
    }

    #[test]
    fn test_set_config_programs_registers() {
        let driver = driver();
        let config = UartConfig::new(LineControl::Lc7E2, BaudDivisor::pack(0x01, 0xA0, 0x03))
            .with_flow_control(true);
        driver.set_config(UartId::Uart0, &config).unwrap();

        let uart = driver.registers(UartId::Uart0);
        assert_eq!(uart.divisor(), (0x01, 0xA0, 0x03));
        assert_eq!(uart.lcr(), LineControl::Lc7E2.bits() as u32);
        assert_eq!(uart.mcr() & (Mcr::AFCE | Mcr::RTS).bits(), (Mcr::AFCE | Mcr::RTS).bits());
        assert_eq!(uart.fcr(), 0xB1);
        assert_eq!(uart.ier(), Ier::PTIME.bits());
        assert_eq!(driver.get_config(UartId::Uart0), Some(config));
        assert_eq!(driver.get_config(UartId::Uart1), None);
    }

    #[test]
    fn test_set_config_restores_enabled_sources() {
        let driver = driver();
        let config = UartConfig::new(LineControl::Lc8N1, BaudDivisor::pack(0, 17, 6));
        driver.set_config(UartId::Uart0, &config).unwrap();
        driver.update_ier(UartId::Uart0, |ier| ier | Ier::ERBFI | Ier::ELSI);

        let uart = driver.registers(UartId::Uart0);
        driver.set_config(UartId::Uart0, &config).unwrap();
        assert_eq!(uart.ier(), (Ier::PTIME | Ier::ERBFI | Ier::ELSI).bits());

        driver.set_config(UartId::Uart0, &config.with_interrupts(false)).unwrap();
        assert_eq!(uart.ier(), Ier::PTIME.bits());
    }

    #[test]
    fn test_set_config_keeps_loopback() {
        let driver = driver();
        let uart = driver.registers(UartId::Uart1);
        uart.set_loopback(true);

        let config = UartConfig::new(LineControl::Lc8N1, BaudDivisor::pack(0, 208, 5));
        driver.set_config(UartId::Uart1, &config).unwrap();
        assert_ne!(uart.mcr() & Mcr::LOOPBACK.bits(), 0);
        assert_eq!(uart.mcr() & Mcr::AFCE.bits(), 0);
    }

    #[test]
    fn test_set_config_rejects_zero_divisor() {
        let driver = driver();
        let config = UartConfig::new(LineControl::Lc8N1, BaudDivisor::pack(0, 0, 9));
        assert_eq!(driver.set_config(UartId::Uart0, &config), Err(UartError::InvalidArgument));
        assert_eq!(driver.get_config(UartId::Uart0), None);
    }

    #[test]
    fn test_get_status_reports_errors_once() {
        let driver = driver();
        let uart = driver.registers(UartId::Uart0);
        uart.receive(b"x");
        uart.inject_error(Lsr::FE);

        let status = driver.get_status(UartId::Uart0).unwrap();
        assert!(status.is_framing_error());
        assert!(status.rx_not_empty());
        assert!(status.is_rx_busy());

        let status = driver.get_status(UartId::Uart0).unwrap();
        assert!(!status.has_line_error());
        assert!(!status.is_tx_busy());
    }
}
