//! # Mock DMA
//!
//! 只模拟通道状态，不会自己搬运数据。测试通过 [`MockDma::deliver`]
//! 和 [`MockDma::copy_source`] 扮演外设一端，再调用
//! [`UartDriver::dma_transfer_complete`](crate::uart::UartDriver::dma_transfer_complete)
//! 模拟完成中断。

use spin::Mutex;

use crate::config::NUM_DMA_CHANNELS;
use crate::error::{Result, UartError};
use crate::hal::{
    DmaChannelConfig, DmaChannelId, DmaCompletion, DmaController, DmaControllerId, DmaTransfer,
};

#[derive(Clone, Copy)]
struct Channel {
    config: Option<DmaChannelConfig>,
    armed: Option<DmaTransfer>,
    /// 已搬运的字节数
    progress: usize,
}

impl Channel {
    const IDLE: Self = Self { config: None, armed: None, progress: 0 };
}

struct State {
    initialized: bool,
    fail_next_start: bool,
    channels: [Channel; NUM_DMA_CHANNELS],
}

/// Mock DMA 控制器
pub struct MockDma {
    state: Mutex<State>,
}

impl MockDma {
    /// 创建未初始化的控制器
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(State {
                initialized: false,
                fail_next_start: false,
                channels: [Channel::IDLE; NUM_DMA_CHANNELS],
            }),
        }
    }

    pub fn init(&self) {
        self.state.lock().initialized = true;
    }

    /// 让下一次 `start_transfer` 返回 `InvalidState`
    pub fn fail_next_start(&self) {
        self.state.lock().fail_next_start = true;
    }

    pub fn configured(&self, channel: DmaChannelId) -> Option<DmaChannelConfig> {
        self.channel(channel, |ch| ch.config)
    }

    /// 通道上正在进行的传输
    pub fn armed(&self, channel: DmaChannelId) -> Option<DmaTransfer> {
        self.channel(channel, |ch| ch.armed)
    }

    pub fn progress(&self, channel: DmaChannelId) -> usize {
        self.channel(channel, |ch| Some(ch.progress)).unwrap_or(0)
    }

    pub fn set_progress(&self, channel: DmaChannelId, progress: usize) {
        let mut state = self.state.lock();
        if let Some(ch) = state.channels.get_mut(channel.index()) {
            ch.progress = progress;
        }
    }

    /// 扮演 UART RX：把数据写到接收传输的目的缓冲区，返回写入的字节数
    pub fn deliver(&self, channel: DmaChannelId, data: &[u8]) -> usize {
        let mut state = self.state.lock();
        let Some(ch) = state.channels.get_mut(channel.index()) else {
            return 0;
        };
        let Some(armed) = ch.armed else {
            return 0;
        };
        let n = data.len().min(armed.len - ch.progress);
        // SAFETY: 目的地址是驱动在 dma_read 中交出的缓冲区，
        // 在传输结束前不会被其他代码访问，且长度不超过 `armed.len`
        unsafe {
            core::ptr::copy_nonoverlapping(
                data.as_ptr(),
                (armed.destination + ch.progress) as *mut u8,
                n,
            );
        }
        ch.progress += n;
        n
    }

    /// 扮演 UART TX：取出发送传输的源数据，返回复制的字节数
    pub fn copy_source(&self, channel: DmaChannelId, out: &mut [u8]) -> usize {
        let state = self.state.lock();
        let Some(armed) = state.channels.get(channel.index()).and_then(|ch| ch.armed) else {
            return 0;
        };
        let n = out.len().min(armed.len);
        // SAFETY: 源地址是驱动在 dma_write 中交出的缓冲区，长度至少为 `armed.len`
        unsafe {
            core::ptr::copy_nonoverlapping(armed.source as *const u8, out.as_mut_ptr(), n);
        }
        n
    }

    /// 以成功结束通道上的传输，返回应交给驱动的完成事件
    pub fn complete(&self, channel: DmaChannelId) -> DmaCompletion {
        let mut state = self.state.lock();
        let transferred = state
            .channels
            .get_mut(channel.index())
            .and_then(|ch| {
                ch.progress = 0;
                ch.armed.take()
            })
            .map_or(0, |armed| armed.len);
        DmaCompletion::done(transferred)
    }

    fn channel<T>(&self, channel: DmaChannelId, f: impl FnOnce(&Channel) -> Option<T>) -> Option<T> {
        self.state.lock().channels.get(channel.index()).and_then(f)
    }
}

impl Default for MockDma {
    fn default() -> Self {
        Self::new()
    }
}

impl DmaController for MockDma {
    fn is_initialized(&self, _controller: DmaControllerId) -> bool {
        self.state.lock().initialized
    }

    fn configure_channel(
        &self,
        _controller: DmaControllerId,
        channel: DmaChannelId,
        config: &DmaChannelConfig,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(UartError::InvalidState);
        }
        let ch = state
            .channels
            .get_mut(channel.index())
            .ok_or(UartError::InvalidArgument)?;
        ch.config = Some(*config);
        Ok(())
    }

    fn start_transfer(
        &self,
        _controller: DmaControllerId,
        channel: DmaChannelId,
        transfer: &DmaTransfer,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if core::mem::take(&mut state.fail_next_start) {
            return Err(UartError::InvalidState);
        }
        let ch = state
            .channels
            .get_mut(channel.index())
            .ok_or(UartError::InvalidArgument)?;
        if ch.config.is_none() {
            return Err(UartError::InvalidState);
        }
        if ch.armed.is_some() {
            return Err(UartError::Busy);
        }
        ch.armed = Some(*transfer);
        ch.progress = 0;
        Ok(())
    }

    fn stop_transfer(&self, _controller: DmaControllerId, channel: DmaChannelId) -> Result<usize> {
        let mut state = self.state.lock();
        let ch = state
            .channels
            .get_mut(channel.index())
            .ok_or(UartError::InvalidArgument)?;
        ch.armed = None;
        Ok(core::mem::take(&mut ch.progress))
    }
}
