//! # 异步完成信号
//!
//! [`CompletionSignal`] 既是 [`TransferClient`]，也能产生一个 `Future`，
//! 让中断或 DMA 传输可以被 `await`：
//!
//! ```rust,ignore
//! static DONE: CompletionSignal = CompletionSignal::new();
//!
//! async fn send(buf: &'static mut [u8]) -> &'static mut [u8] {
//!     UART.irq_write(UartId::Uart0, Transfer::new(buf, &DONE)).unwrap();
//!     let (buf, completion) = DONE.wait().await;
//!     buf
//! }
//! ```

use core::cell::RefCell;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};

use critical_section::Mutex;

use crate::uart::transfer::{Completion, TransferClient};

struct Inner {
    result: Option<(&'static mut [u8], Completion)>,
    waker: Option<Waker>,
}

/// 单次传输的完成信号
pub struct CompletionSignal {
    inner: Mutex<RefCell<Inner>>,
}

impl CompletionSignal {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner { result: None, waker: None })),
        }
    }

    /// 异步等待传输完成
    pub fn wait(&self) -> CompletionFuture<'_> {
        CompletionFuture { signal: self }
    }

    /// 取出结果（非阻塞）
    pub fn try_take(&self) -> Option<(&'static mut [u8], Completion)> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).result.take())
    }

    /// 是否已有未取走的结果
    pub fn is_done(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).result.is_some())
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferClient for CompletionSignal {
    fn transfer_done(&self, buffer: &'static mut [u8], completion: Completion) {
        let waker = critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            inner.result = Some((buffer, completion));
            inner.waker.take()
        });
        // 在临界区外唤醒
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// [`CompletionSignal::wait`] 返回的 Future
pub struct CompletionFuture<'a> {
    signal: &'a CompletionSignal,
}

impl Future for CompletionFuture<'_> {
    type Output = (&'static mut [u8], Completion);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        critical_section::with(|cs| {
            let mut inner = self.signal.inner.borrow_ref_mut(cs);
            match inner.result.take() {
                Some(result) => Poll::Ready(result),
                None => {
                    inner.waker = Some(cx.waker().clone());
                    Poll::Pending
                }
            }
        })
    }
}
