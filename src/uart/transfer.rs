//! # 传输与完成回调
//!
//! 每个 (UART, 方向) 有一个 [`TransferSlot`]，同一时刻最多容纳一个
//! 进行中的传输。状态机：
//!
//! ```text
//! Idle ──begin──▶ Active ──claim (CAS)──▶ Finishing ──▶ Idle ──▶ 回调
//! ```
//!
//! 自然完成、线路错误和主动终止都通过 [`TransferSlot::claim`] 抢占
//! 终止态，只有第一个成功的一方拿到传输记录并调用回调；其余调用方
//! 拿到 `None`，直接返回成功。槽位在调用回调之前就已经回到 Idle，
//! 回调里可以立即发起同方向的下一次传输。

use core::cell::RefCell;
use core::sync::atomic::{AtomicU8, Ordering};

use critical_section::Mutex;

use crate::error::{Result, UartError};
use crate::uart::status::StatusFlags;

/// 传输方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Tx,
    Rx,
}

/// 执行传输的引擎
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Irq,
    Dma,
}

/// 一次传输的完成信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// `Ok` 表示全部完成
    pub result: Result<()>,
    /// 检测到的状态（线路错误时含错误位）
    pub status: StatusFlags,
    /// 实际完成的字节数；出错或取消时是部分长度
    pub len: usize,
}

impl Completion {
    /// 0 或负的 errno
    pub const fn error_code(&self) -> i32 {
        match self.result {
            Ok(()) => 0,
            Err(e) => e.errno(),
        }
    }

    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// 传输完成回调
///
/// 回调在检测到完成的上下文中执行（中断、DMA 完成中断或调用
/// terminate 的线程），不能阻塞。缓冲区在这里交还给调用方，
/// 驱动此后不再持有它。
pub trait TransferClient: Sync {
    fn transfer_done(&self, buffer: &'static mut [u8], completion: Completion);
}

/// 一次传输请求
///
/// 缓冲区由调用方提供，驱动借用到回调为止，不会复制到别处。
pub struct Transfer {
    pub buffer: &'static mut [u8],
    pub len: usize,
    pub client: &'static dyn TransferClient,
}

impl Transfer {
    /// 传输整个缓冲区
    pub fn new(buffer: &'static mut [u8], client: &'static dyn TransferClient) -> Self {
        let len = buffer.len();
        Self { buffer, len, client }
    }

    /// 只传输前 `len` 个字节
    pub fn with_len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    /// 检查长度，不合法时连同缓冲区一起退回
    pub(crate) fn check(self, max_len: usize) -> StartResult<Self> {
        if self.len == 0 || self.len > self.buffer.len() || self.len > max_len {
            return Err(self.reject(UartError::InvalidArgument));
        }
        Ok(self)
    }

    pub(crate) fn reject(self, error: UartError) -> Rejected {
        Rejected { error, buffer: self.buffer }
    }
}

/// 被拒绝的启动请求
///
/// 缓冲区原样交还，调用方可以用它重试。驱动没有接受这次传输，
/// 不会有回调。
#[derive(Debug)]
pub struct Rejected {
    pub error: UartError,
    pub buffer: &'static mut [u8],
}

impl From<Rejected> for UartError {
    fn from(rejected: Rejected) -> Self {
        rejected.error
    }
}

/// 异步启动操作的结果
pub type StartResult<T = ()> = core::result::Result<T, Rejected>;

/// 进行中的传输记录，由当前引擎独占
pub(crate) struct ActiveTransfer {
    pub buffer: &'static mut [u8],
    pub len: usize,
    /// 已完成的字节数
    pub done: usize,
    pub client: &'static dyn TransferClient,
    pub engine: Engine,
}

impl ActiveTransfer {
    pub fn new(xfer: Transfer, engine: Engine) -> Self {
        Self {
            buffer: xfer.buffer,
            len: xfer.len,
            done: 0,
            client: xfer.client,
            engine,
        }
    }

    pub fn remaining(&self) -> usize {
        self.len - self.done
    }

    pub fn is_complete(&self) -> bool {
        self.done >= self.len
    }

    pub fn reject(self, error: UartError) -> Rejected {
        Rejected { error, buffer: self.buffer }
    }

    /// 调用回调并交还缓冲区
    pub fn dispatch(self, result: Result<()>, status: StatusFlags) {
        let completion = Completion { result, status, len: self.done };
        self.client.transfer_done(self.buffer, completion);
    }
}

const IDLE: u8 = 0;
const ACTIVE: u8 = 1;
const FINISHING: u8 = 2;

/// 槽位状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Active,
    Finishing,
}

/// 单方向的传输槽位
pub(crate) struct TransferSlot {
    state: AtomicU8,
    active: Mutex<RefCell<Option<ActiveTransfer>>>,
}

impl TransferSlot {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(IDLE),
            active: Mutex::new(RefCell::new(None)),
        }
    }

    pub fn state(&self) -> SlotState {
        match self.state.load(Ordering::Acquire) {
            IDLE => SlotState::Idle,
            ACTIVE => SlotState::Active,
            _ => SlotState::Finishing,
        }
    }

    /// Idle → Active，已有传输时以 `Busy` 退回
    pub fn begin(&self, xfer: ActiveTransfer) -> StartResult {
        critical_section::with(|cs| {
            if self
                .state
                .compare_exchange(IDLE, ACTIVE, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Err(xfer.reject(UartError::Busy));
            }
            self.active.borrow(cs).replace(Some(xfer));
            Ok(())
        })
    }

    /// 在临界区内访问进行中的传输；没有传输时返回 `None`
    pub fn with_active<T>(&self, f: impl FnOnce(&mut ActiveTransfer) -> T) -> Option<T> {
        critical_section::with(|cs| {
            if self.state.load(Ordering::Acquire) != ACTIVE {
                return None;
            }
            self.active.borrow_ref_mut(cs).as_mut().map(f)
        })
    }

    /// 当前传输使用的引擎
    pub fn engine(&self) -> Option<Engine> {
        self.with_active(|xfer| xfer.engine)
    }

    /// 抢占终止态：Active → Finishing → Idle
    ///
    /// 只有第一个调用方拿到传输记录。
    pub fn claim(&self) -> Option<ActiveTransfer> {
        self.claim_if(|_| true)
    }

    /// 只在 `engine` 匹配时抢占终止态
    pub fn claim_for(&self, engine: Engine) -> Option<ActiveTransfer> {
        self.claim_if(|xfer| xfer.engine == engine)
    }

    fn claim_if(&self, accept: impl FnOnce(&ActiveTransfer) -> bool) -> Option<ActiveTransfer> {
        critical_section::with(|cs| {
            let mut active = self.active.borrow_ref_mut(cs);
            if !active.as_ref().is_some_and(accept) {
                return None;
            }
            self.state
                .compare_exchange(ACTIVE, FINISHING, Ordering::AcqRel, Ordering::Acquire)
                .ok()?;
            let xfer = active.take();
            self.state.store(IDLE, Ordering::Release);
            xfer
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::boxed::Box;
    use std::sync::Mutex as StdMutex;
    use std::vec;
    use std::vec::Vec;

    struct Recorder {
        calls: StdMutex<Vec<Completion>>,
    }

    impl TransferClient for Recorder {
        fn transfer_done(&self, _buffer: &'static mut [u8], completion: Completion) {
            self.calls.lock().unwrap().push(completion);
        }
    }

    fn recorder() -> &'static Recorder {
        Box::leak(Box::new(Recorder { calls: StdMutex::new(Vec::new()) }))
    }

    fn buffer(len: usize) -> &'static mut [u8] {
        Box::leak(vec![0u8; len].into_boxed_slice())
    }

    #[test]
    fn test_begin_rejects_second_transfer() {
        let slot = TransferSlot::new();
        let client = recorder();

        slot.begin(ActiveTransfer::new(Transfer::new(buffer(4), client), Engine::Irq)).unwrap();
        assert_eq!(slot.state(), SlotState::Active);

        let second = buffer(6);
        second.copy_from_slice(b"second");
        let rejected = slot
            .begin(ActiveTransfer::new(Transfer::new(second, client), Engine::Irq))
            .unwrap_err();
        assert_eq!(rejected.error, UartError::Busy);
        assert_eq!(&rejected.buffer[..], b"second");
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_claim_only_once() {
        let slot = TransferSlot::new();
        let client = recorder();
        slot.begin(ActiveTransfer::new(Transfer::new(buffer(8), client), Engine::Irq)).unwrap();

        slot.with_active(|xfer| xfer.done = 3);
        let xfer = slot.claim().expect("first claim wins");
        assert!(slot.claim().is_none());
        assert_eq!(slot.state(), SlotState::Idle);

        xfer.dispatch(Err(UartError::Cancelled), StatusFlags::empty());
        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len, 3);
        assert_eq!(calls[0].error_code(), -125);
    }

    #[test]
    fn test_claim_for_other_engine_is_noop() {
        let slot = TransferSlot::new();
        slot.begin(ActiveTransfer::new(Transfer::new(buffer(2), recorder()), Engine::Dma)).unwrap();

        assert!(slot.claim_for(Engine::Irq).is_none());
        assert_eq!(slot.state(), SlotState::Active);
        assert!(slot.claim_for(Engine::Dma).is_some());
    }

    fn check_error(xfer: Transfer, max_len: usize) -> Option<UartError> {
        xfer.check(max_len).err().map(UartError::from)
    }

    #[test]
    fn test_transfer_validation() {
        let client = recorder();
        assert!(Transfer::new(buffer(16), client).check(4096).is_ok());
        assert_eq!(check_error(Transfer::new(buffer(0), client), 4096), Some(UartError::InvalidArgument));
        assert_eq!(
            check_error(Transfer::new(buffer(4), client).with_len(5), 4096),
            Some(UartError::InvalidArgument)
        );
        assert_eq!(check_error(Transfer::new(buffer(32), client), 16), Some(UartError::InvalidArgument));
    }

    #[test]
    fn test_rejected_check_returns_buffer() {
        let rejected = Transfer::new(buffer(32), recorder()).check(16).err().unwrap();
        assert_eq!(rejected.buffer.len(), 32);
    }
}
