//! DMA 传输
//!
//! 每个方向先用 [`dma_channel_config`](UartDriver::dma_channel_config)
//! 绑定一个通道，之后每次 `dma_write`/`dma_read` 只需要启动一次单块传输。
//! 传输完成由 DMA 子系统的中断调用
//! [`dma_transfer_complete`](UartDriver::dma_transfer_complete) 报告。

use crate::config::{DMA_MAX_TRANSFER, NUM_DMA_CHANNELS};
use crate::error::{Result, UartError};
use crate::hal::{
    BurstLength, DmaChannelConfig, DmaChannelId, DmaCompletion, DmaController, DmaControllerId,
    DmaDirection, DmaTransfer, HandshakePolarity, Registers, TransferWidth,
};
use crate::uart::regs::{Ier, Reg};
use crate::uart::transfer::{ActiveTransfer, Engine, StartResult};
use crate::uart::{DmaChannelBinding, Direction, StatusFlags, Transfer, UartDriver, UartId};

impl<R: Registers, D: DmaController> UartDriver<R, D> {
    /// 为一个方向绑定 DMA 通道
    ///
    /// `MemoryToPeripheral` 对应发送，`PeripheralToMemory` 对应接收。
    /// 绑定一直有效，直到同一方向再次配置。
    pub fn dma_channel_config(
        &self,
        id: UartId,
        controller: DmaControllerId,
        channel: DmaChannelId,
        direction: DmaDirection,
    ) -> Result<()> {
        let (uart_direction, handshake) = match direction {
            DmaDirection::MemoryToPeripheral => (Direction::Tx, 0),
            DmaDirection::PeripheralToMemory => (Direction::Rx, 1),
            DmaDirection::MemoryToMemory => return Err(UartError::InvalidArgument),
        };
        if channel.index() >= NUM_DMA_CHANNELS {
            return Err(UartError::InvalidArgument);
        }
        if !self.dma.is_initialized(controller) {
            return Err(UartError::InvalidState);
        }

        let config = DmaChannelConfig {
            direction,
            handshake_interface: 2 * id.index() as u8 + handshake,
            handshake_polarity: HandshakePolarity::High,
            source_width: TransferWidth::Bits8,
            destination_width: TransferWidth::Bits8,
            source_burst: BurstLength::Items1,
            destination_burst: BurstLength::Items1,
        };
        self.dma.configure_channel(controller, channel, &config)?;

        self.port(id).set_dma_binding(
            uart_direction,
            DmaChannelBinding { controller, channel, direction },
        );
        crate::info!(
            "{}: {:?} bound to dma{} channel {}",
            id.name(),
            uart_direction,
            controller.0,
            channel.0
        );
        Ok(())
    }

    /// 启动 DMA 发送，最多 [`DMA_MAX_TRANSFER`] 字节
    ///
    /// 被拒绝时缓冲区随错误一起交还。
    pub fn dma_write(&self, id: UartId, xfer: Transfer) -> StartResult {
        let xfer = xfer.check(DMA_MAX_TRANSFER)?;
        let Some(binding) = self.port(id).dma_binding(Direction::Tx) else {
            return Err(xfer.reject(UartError::InvalidState));
        };
        let transfer = DmaTransfer {
            source: xfer.buffer.as_ptr() as usize,
            destination: self.registers(id).address_of(Reg::RbrThrDll),
            len: xfer.len,
        };
        self.dma_start(id, Direction::Tx, binding, &transfer, xfer)
    }

    /// 启动 DMA 接收
    ///
    /// 同时打开线路状态中断，线路错误会中止接收。
    pub fn dma_read(&self, id: UartId, xfer: Transfer) -> StartResult {
        let xfer = xfer.check(DMA_MAX_TRANSFER)?;
        let Some(binding) = self.port(id).dma_binding(Direction::Rx) else {
            return Err(xfer.reject(UartError::InvalidState));
        };
        let transfer = DmaTransfer {
            source: self.registers(id).address_of(Reg::RbrThrDll),
            destination: xfer.buffer.as_ptr() as usize,
            len: xfer.len,
        };
        self.dma_start(id, Direction::Rx, binding, &transfer, xfer)?;
        self.update_ier(id, |ier| ier | Ier::ELSI);
        Ok(())
    }

    fn dma_start(
        &self,
        id: UartId,
        direction: Direction,
        binding: DmaChannelBinding,
        transfer: &DmaTransfer,
        xfer: Transfer,
    ) -> StartResult {
        let slot = self.port(id).slot(direction);
        slot.begin(ActiveTransfer::new(xfer, Engine::Dma))?;

        if let Err(err) = self.dma.start_transfer(binding.controller, binding.channel, transfer) {
            crate::warn!("{}: dma {:?} start failed: {}", id.name(), direction, err);
            // 启动失败不回调，缓冲区退回给调用方
            return match slot.claim() {
                Some(active) => Err(active.reject(err)),
                // 已被并发的终止结束，缓冲区经回调交还
                None => Ok(()),
            };
        }
        crate::trace!("{}: dma {:?} started, {} bytes", id.name(), direction, transfer.len);
        Ok(())
    }

    /// DMA 传输完成
    ///
    /// 由 DMA 子系统的完成中断调用。与终止竞争时只有一方产生回调。
    pub fn dma_transfer_complete(&self, id: UartId, direction: Direction, completion: DmaCompletion) {
        let Some(mut xfer) = self.finish(id, direction, Engine::Dma, Self::dma_sources(direction)) else {
            return;
        };
        match completion.result {
            Ok(()) => {
                xfer.done = xfer.len;
                xfer.dispatch(Ok(()), StatusFlags::empty());
            }
            Err(err) => {
                crate::warn!("{}: dma {:?} failed: {}", id.name(), direction, err);
                xfer.done = completion.transferred.min(xfer.len);
                xfer.dispatch(Err(err), StatusFlags::empty());
            }
        }
    }

    /// 终止 DMA 发送
    ///
    /// 空闲或当前传输属于中断引擎时什么也不做。
    pub fn dma_write_terminate(&self, id: UartId) -> Result<()> {
        self.dma_terminate(id, Direction::Tx)
    }

    /// 终止 DMA 接收
    pub fn dma_read_terminate(&self, id: UartId) -> Result<()> {
        self.dma_terminate(id, Direction::Rx)
    }

    fn dma_terminate(&self, id: UartId, direction: Direction) -> Result<()> {
        let port = self.port(id);
        if port.slot(direction).engine() != Some(Engine::Dma) {
            return Ok(());
        }
        let binding = port.dma_binding(direction).ok_or(UartError::InvalidState)?;
        let moved = self.dma.stop_transfer(binding.controller, binding.channel)?;

        if let Some(mut xfer) = self.finish(id, direction, Engine::Dma, Self::dma_sources(direction)) {
            xfer.done = moved.min(xfer.len);
            xfer.dispatch(Err(UartError::Cancelled), StatusFlags::empty());
        }
        Ok(())
    }

    /// 线路错误中止 DMA 接收
    pub(crate) fn dma_abort_read(&self, id: UartId, errors: StatusFlags) {
        let moved = self
            .port(id)
            .dma_binding(Direction::Rx)
            .and_then(|b| self.dma.stop_transfer(b.controller, b.channel).ok())
            .unwrap_or(0);

        if let Some(mut xfer) = self.finish(id, Direction::Rx, Engine::Dma, Ier::ELSI) {
            xfer.done = moved.min(xfer.len);
            xfer.dispatch(Err(UartError::LineError), errors);
        }
    }

    const fn dma_sources(direction: Direction) -> Ier {
        match direction {
            Direction::Tx => Ier::empty(),
            Direction::Rx => Ier::ELSI,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::boxed::Box;
    use std::sync::Mutex as StdMutex;
    use std::vec;
    use std::vec::Vec;

    use crate::drivers::mock::{MockDma, MockUart};
    use crate::error::UartError;
    use crate::hal::{
        DmaChannelId, DmaCompletion, DmaControllerId, DmaDirection, HandshakePolarity, TransferWidth,
    };
    use crate::uart::regs::{Ier, Lsr};
    use crate::uart::transfer::SlotState;
    use crate::uart::{
        BaudDivisor, Completion, Direction, LineControl, Transfer, TransferClient, UartConfig,
        UartDriver, UartId,
    };

    const DMA0: DmaControllerId = DmaControllerId(0);

    struct Recorder {
        calls: StdMutex<Vec<(Vec<u8>, Completion)>>,
    }

    impl TransferClient for Recorder {
        fn transfer_done(&self, buffer: &'static mut [u8], completion: Completion) {
            self.calls.lock().unwrap().push((buffer.to_vec(), completion));
        }
    }

    fn recorder() -> &'static Recorder {
        Box::leak(Box::new(Recorder { calls: StdMutex::new(Vec::new()) }))
    }

    fn buffer(len: usize) -> &'static mut [u8] {
        Box::leak(vec![0u8; len].into_boxed_slice())
    }

    fn driver() -> UartDriver<MockUart, MockDma> {
        let dma = MockDma::new();
        dma.init();
        let driver = UartDriver::new(MockUart::new(), MockUart::new(), dma);
        let config = UartConfig::new(LineControl::Lc8N1, BaudDivisor::pack(0, 17, 6));
        driver.set_config(UartId::Uart1, &config).unwrap();
        driver
    }

    #[test]
    fn test_channel_config() {
        let driver = driver();
        driver
            .dma_channel_config(UartId::Uart1, DMA0, DmaChannelId(3), DmaDirection::PeripheralToMemory)
            .unwrap();

        let config = driver.dma().configured(DmaChannelId(3)).unwrap();
        assert_eq!(config.handshake_interface, 3);
        assert_eq!(config.handshake_polarity, HandshakePolarity::High);
        assert_eq!(config.source_width, TransferWidth::Bits8);

        assert_eq!(
            driver.dma_channel_config(UartId::Uart1, DMA0, DmaChannelId(8), DmaDirection::MemoryToPeripheral),
            Err(UartError::InvalidArgument)
        );
        assert_eq!(
            driver.dma_channel_config(UartId::Uart1, DMA0, DmaChannelId(0), DmaDirection::MemoryToMemory),
            Err(UartError::InvalidArgument)
        );
    }

    #[test]
    fn test_uninitialized_controller() {
        let driver = UartDriver::new(MockUart::new(), MockUart::new(), MockDma::new());
        assert_eq!(
            driver.dma_channel_config(UartId::Uart0, DMA0, DmaChannelId(0), DmaDirection::MemoryToPeripheral),
            Err(UartError::InvalidState)
        );
    }

    #[test]
    fn test_write_without_binding() {
        let driver = driver();
        let xfer = Transfer::new(buffer(4), recorder());
        assert_eq!(driver.dma_write(UartId::Uart1, xfer).map_err(UartError::from), Err(UartError::InvalidState));
    }

    #[test]
    fn test_transfer_length_bound() {
        let driver = driver();
        let client = recorder();
        driver
            .dma_channel_config(UartId::Uart1, DMA0, DmaChannelId(0), DmaDirection::MemoryToPeripheral)
            .unwrap();

        let xfer = Transfer::new(buffer(4097), client);
        assert_eq!(driver.dma_write(UartId::Uart1, xfer).map_err(UartError::from), Err(UartError::InvalidArgument));

        let xfer = Transfer::new(buffer(4096), client);
        driver.dma_write(UartId::Uart1, xfer).unwrap();
        let armed = driver.dma().armed(DmaChannelId(0)).unwrap();
        assert_eq!(armed.len, 4096);
        assert_eq!(armed.destination, driver.registers(UartId::Uart1).thr_address());

        let xfer = Transfer::new(buffer(1), client);
        assert_eq!(driver.dma_write(UartId::Uart1, xfer).map_err(UartError::from), Err(UartError::Busy));
    }

    #[test]
    fn test_read_length_bound() {
        let driver = driver();
        let client = recorder();
        driver
            .dma_channel_config(UartId::Uart1, DMA0, DmaChannelId(7), DmaDirection::PeripheralToMemory)
            .unwrap();

        let rejected = driver.dma_read(UartId::Uart1, Transfer::new(buffer(4097), client)).unwrap_err();
        assert_eq!(rejected.error, UartError::InvalidArgument);
        assert_eq!(rejected.buffer.len(), 4097);
        assert!(driver.dma().armed(DmaChannelId(7)).is_none());

        driver.dma_read(UartId::Uart1, Transfer::new(buffer(4096), client)).unwrap();
        let armed = driver.dma().armed(DmaChannelId(7)).unwrap();
        assert_eq!(armed.len, 4096);
        assert_eq!(armed.source, driver.registers(UartId::Uart1).thr_address());
    }

    #[test]
    fn test_write_completion() {
        let driver = driver();
        let client = recorder();
        driver
            .dma_channel_config(UartId::Uart1, DMA0, DmaChannelId(1), DmaDirection::MemoryToPeripheral)
            .unwrap();

        let buf = buffer(5);
        buf.copy_from_slice(b"hello");
        driver.dma_write(UartId::Uart1, Transfer::new(buf, client)).unwrap();

        let mut out = [0u8; 8];
        let n = driver.dma().copy_source(DmaChannelId(1), &mut out);
        assert_eq!(&out[..n], b"hello");

        driver.dma_transfer_complete(UartId::Uart1, Direction::Tx, DmaCompletion::done(5));
        driver.dma_transfer_complete(UartId::Uart1, Direction::Tx, DmaCompletion::done(5));
        assert_eq!(driver.dma_write_terminate(UartId::Uart1), Ok(()));

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.result, Ok(()));
        assert_eq!(calls[0].1.len, 5);
        assert_eq!(driver.transfer_state(UartId::Uart1, Direction::Tx), SlotState::Idle);
    }

    #[test]
    fn test_read_terminate_reports_partial_count() {
        let driver = driver();
        let client = recorder();
        driver
            .dma_channel_config(UartId::Uart1, DMA0, DmaChannelId(2), DmaDirection::PeripheralToMemory)
            .unwrap();

        driver.dma_read(UartId::Uart1, Transfer::new(buffer(32), client)).unwrap();
        assert_ne!(driver.registers(UartId::Uart1).ier() & Ier::ELSI.bits(), 0);

        driver.dma().deliver(DmaChannelId(2), b"abcdef");
        driver.dma_read_terminate(UartId::Uart1).unwrap();
        driver.dma_transfer_complete(UartId::Uart1, Direction::Rx, DmaCompletion::done(32));

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.result, Err(UartError::Cancelled));
        assert_eq!(calls[0].1.len, 6);
        assert_eq!(&calls[0].0[..6], b"abcdef");
        assert_eq!(driver.registers(UartId::Uart1).ier() & Ier::ELSI.bits(), 0);
        assert!(driver.dma().armed(DmaChannelId(2)).is_none());
    }

    #[test]
    fn test_read_aborted_by_line_error() {
        let driver = driver();
        let client = recorder();
        driver
            .dma_channel_config(UartId::Uart1, DMA0, DmaChannelId(4), DmaDirection::PeripheralToMemory)
            .unwrap();
        driver.dma_read(UartId::Uart1, Transfer::new(buffer(16), client)).unwrap();

        driver.dma().deliver(DmaChannelId(4), b"xyz");
        driver.registers(UartId::Uart1).inject_error(Lsr::BI);
        driver.isr(UartId::Uart1);

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.result, Err(UartError::LineError));
        assert!(calls[0].1.status.is_break());
        assert_eq!(calls[0].1.len, 3);
    }

    #[test]
    fn test_failed_start_leaves_slot_idle() {
        let driver = driver();
        let client = recorder();
        driver
            .dma_channel_config(UartId::Uart1, DMA0, DmaChannelId(5), DmaDirection::MemoryToPeripheral)
            .unwrap();
        driver.dma().fail_next_start();

        let buf = buffer(8);
        buf.copy_from_slice(b"retry-me");
        let rejected = driver.dma_write(UartId::Uart1, Transfer::new(buf, client)).unwrap_err();
        assert_eq!(rejected.error, UartError::InvalidState);
        assert_eq!(driver.transfer_state(UartId::Uart1, Direction::Tx), SlotState::Idle);
        assert!(client.calls.lock().unwrap().is_empty());

        // 同一个缓冲区重试
        driver.dma_write(UartId::Uart1, Transfer::new(rejected.buffer, client)).unwrap();
        let mut out = [0u8; 8];
        assert_eq!(driver.dma().copy_source(DmaChannelId(5), &mut out), 8);
        assert_eq!(&out, b"retry-me");
    }

    #[test]
    fn test_engines_do_not_cancel_each_other() {
        let driver = driver();
        let client = recorder();
        driver
            .dma_channel_config(UartId::Uart1, DMA0, DmaChannelId(6), DmaDirection::MemoryToPeripheral)
            .unwrap();
        driver.dma_write(UartId::Uart1, Transfer::new(buffer(8), client)).unwrap();

        assert_eq!(driver.irq_write_terminate(UartId::Uart1), Ok(()));
        assert_eq!(driver.transfer_state(UartId::Uart1, Direction::Tx), SlotState::Active);
        let xfer = Transfer::new(buffer(8), client);
        assert_eq!(driver.irq_write(UartId::Uart1, xfer).map_err(UartError::from), Err(UartError::Busy));

        driver.dma_transfer_complete(
            UartId::Uart1,
            Direction::Tx,
            DmaCompletion::failed(3, UartError::LineError),
        );
        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.len, 3);
        assert_eq!(calls[0].1.result, Err(UartError::LineError));
    }
}
