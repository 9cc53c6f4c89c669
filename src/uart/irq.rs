//! 中断驱动传输
//!
//! ```text
//! Idle ──irq_write/irq_read──▶ Active ──┬─ 完成 ────▶ Idle (Ok)
//!                                       ├─ 线路错误 ─▶ Idle (LineError)
//!                                       └─ 终止 ────▶ Idle (Cancelled)
//! ```
//!
//! TX 每次 THR 空中断补充一批字节（FIFO 半深或全深，取决于阈值预设），
//! 最后一批写入 FIFO 时传输即完成。RX 在数据可用或字符超时中断时
//! 一直读到 LSR.DR 清零或缓冲区写满。

use crate::config::FIFO_HALF_DEPTH;
use crate::error::{Result, UartError};
use crate::hal::{DmaController, Registers};
use crate::uart::regs::{Ier, InterruptId, Lsr, Reg};
use crate::uart::transfer::{ActiveTransfer, Engine, StartResult};
use crate::uart::{Direction, StatusFlags, Transfer, UartDriver, UartId};

/// 一次 RX 排空的结果
enum RxDrain {
    Pending,
    Complete,
    Error(StatusFlags),
}

impl<R: Registers, D: DmaController> UartDriver<R, D> {
    /// 启动中断驱动的发送
    ///
    /// 需要已应用且允许中断的配置，否则返回 `InvalidState`。
    /// 被拒绝时缓冲区随错误一起交还。
    pub fn irq_write(&self, id: UartId, xfer: Transfer) -> StartResult {
        self.irq_start(id, Direction::Tx, xfer)?;
        self.update_ier(id, |ier| ier | Ier::ETBEI | Ier::PTIME);
        Ok(())
    }

    /// 启动中断驱动的接收
    pub fn irq_read(&self, id: UartId, xfer: Transfer) -> StartResult {
        self.irq_start(id, Direction::Rx, xfer)?;
        self.update_ier(id, |ier| ier | Ier::ERBFI | Ier::ELSI);
        Ok(())
    }

    fn irq_start(&self, id: UartId, direction: Direction, xfer: Transfer) -> StartResult {
        let xfer = xfer.check(usize::MAX)?;
        match self.port(id).config() {
            Some(config) if config.interrupts_enabled => {}
            _ => return Err(xfer.reject(UartError::InvalidState)),
        }
        self.port(id)
            .slot(direction)
            .begin(ActiveTransfer::new(xfer, Engine::Irq))?;
        crate::trace!("{}: irq {:?} started", id.name(), direction);
        Ok(())
    }

    /// 终止中断驱动的发送
    ///
    /// 空闲或当前传输属于 DMA 引擎时什么也不做。
    pub fn irq_write_terminate(&self, id: UartId) -> Result<()> {
        if let Some(xfer) = self.finish(id, Direction::Tx, Engine::Irq, Ier::ETBEI) {
            xfer.dispatch(Err(UartError::Cancelled), StatusFlags::empty());
        }
        Ok(())
    }

    /// 终止中断驱动的接收
    pub fn irq_read_terminate(&self, id: UartId) -> Result<()> {
        if let Some(xfer) = self.finish(id, Direction::Rx, Engine::Irq, Ier::ERBFI | Ier::ELSI) {
            xfer.dispatch(Err(UartError::Cancelled), StatusFlags::empty());
        }
        Ok(())
    }

    /// 中断入口
    ///
    /// 每次调用处理 IIR 报告的一个事件，由中断控制器在中断仍挂起时
    /// 重新进入。
    pub fn isr(&self, id: UartId) {
        let regs = self.registers(id);
        let iir = regs.read(Reg::IirFcr);
        match InterruptId::from_iir(iir) {
            Some(InterruptId::ThrEmpty) => self.isr_tx_refill(id),
            Some(InterruptId::RecvDataAvailable | InterruptId::CharTimeout) => self.isr_rx_drain(id),
            Some(InterruptId::RecvLineStatus) => {
                let lsr = Lsr::from_bits_retain(regs.read(Reg::Lsr));
                let errors = StatusFlags::from_lsr(lsr);
                if errors.has_line_error() {
                    self.rx_line_error(id, errors);
                }
            }
            Some(InterruptId::BusyDetect) => {
                // 读 USR 清除
                let _ = regs.read(Reg::Usr);
            }
            Some(InterruptId::NoInterrupt) => {}
            None => crate::trace!("{}: unknown iir {:#x}", id.name(), iir),
        }
    }

    fn isr_tx_refill(&self, id: UartId) {
        let port = self.port(id);
        let regs = &port.regs;
        let quantum = port
            .config()
            .map_or(FIFO_HALF_DEPTH, |config| config.fifo_threshold.tx_refill());

        let progress = port.tx.with_active(|xfer| {
            if xfer.engine != Engine::Irq {
                return false;
            }
            let end = xfer.done + quantum.min(xfer.remaining());
            for &byte in &xfer.buffer[xfer.done..end] {
                regs.write(Reg::RbrThrDll, byte as u32);
            }
            xfer.done = end;
            xfer.is_complete()
        });

        match progress {
            Some(true) => {
                if let Some(xfer) = self.finish(id, Direction::Tx, Engine::Irq, Ier::ETBEI) {
                    crate::trace!("{}: irq tx done, {} bytes", id.name(), xfer.done);
                    xfer.dispatch(Ok(()), StatusFlags::empty());
                }
            }
            Some(false) => {}
            // 没有发送任务时关掉 THR 空中断
            None => self.update_ier(id, |ier| ier - Ier::ETBEI),
        }
    }

    fn isr_rx_drain(&self, id: UartId) {
        let port = self.port(id);
        let regs = &port.regs;

        let drain = port.rx.with_active(|xfer| {
            if xfer.engine != Engine::Irq {
                return RxDrain::Pending;
            }
            while !xfer.is_complete() {
                let lsr = Lsr::from_bits_retain(regs.read(Reg::Lsr));
                let errors = StatusFlags::from_lsr(lsr);
                if errors.has_line_error() {
                    return RxDrain::Error(errors);
                }
                if !lsr.contains(Lsr::DR) {
                    return RxDrain::Pending;
                }
                xfer.buffer[xfer.done] = regs.read(Reg::RbrThrDll) as u8;
                xfer.done += 1;
            }
            RxDrain::Complete
        });

        match drain {
            Some(RxDrain::Complete) => {
                if let Some(xfer) = self.finish(id, Direction::Rx, Engine::Irq, Ier::ERBFI | Ier::ELSI) {
                    crate::trace!("{}: irq rx done, {} bytes", id.name(), xfer.done);
                    xfer.dispatch(Ok(()), StatusFlags::empty());
                }
            }
            Some(RxDrain::Error(errors)) => self.rx_line_error(id, errors),
            Some(RxDrain::Pending) => {}
            // 没有接收任务时关掉接收相关中断
            None => self.update_ier(id, |ier| ier - (Ier::ERBFI | Ier::ELSI)),
        }
    }

    /// 接收线路错误：以 `LineError` 结束当前接收，交付已收到的部分
    pub(crate) fn rx_line_error(&self, id: UartId, errors: StatusFlags) {
        crate::warn!("{}: line error {:?}", id.name(), errors);
        match self.port(id).rx.engine() {
            Some(Engine::Irq) => {
                if let Some(xfer) = self.finish(id, Direction::Rx, Engine::Irq, Ier::ERBFI | Ier::ELSI) {
                    xfer.dispatch(Err(UartError::LineError), errors);
                }
            }
            Some(Engine::Dma) => self.dma_abort_read(id, errors),
            None => {}
        }
    }
}
