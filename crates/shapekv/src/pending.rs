//! Completion handles for non-blocking operations.

use std::fmt;
use std::future::Future;
use std::panic;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use shapekv_store::StoreError;
use tokio::runtime::Handle;
use tracing::warn;

use crate::error::{Error, Result};

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// The eventual result of a non-blocking store operation.
///
/// The work starts when the handle is created and runs on Tokio's blocking
/// pool. Dropping the handle abandons the result but does not cancel the
/// work. Awaiting resolves to [`StoreError::Timeout`] once the configured
/// sync timeout elapses.
pub struct Pending<T> {
    operation: &'static str,
    future: BoxFuture<T>,
}

impl<T: Send + 'static> Pending<T> {
    /// Start `work` on the current runtime's blocking pool.
    ///
    /// Outside a runtime, or on one built without the time driver, the handle
    /// resolves to [`Error::NoRuntime`] and `work` never runs.
    pub(crate) fn spawn<F>(operation: &'static str, timeout: Duration, work: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => return Self::ready(operation, Err(Error::NoRuntime(e.to_string()))),
        };
        // Creating a timer panics when the runtime has timers disabled.
        let deadline = match panic::catch_unwind(|| tokio::time::sleep(timeout)) {
            Ok(deadline) => deadline,
            Err(_) => {
                let reason = "runtime has no time driver; enable it with `enable_time`";
                return Self::ready(operation, Err(Error::NoRuntime(reason.to_string())));
            }
        };
        let task = handle.spawn_blocking(work);
        let future = async move {
            tokio::select! {
                joined = task => match joined {
                    Ok(result) => result,
                    Err(join) => Err(Error::Task(join.to_string())),
                },
                () = deadline => {
                    warn!(operation, ?timeout, "operation timed out");
                    Err(StoreError::Timeout {
                        operation: operation.to_string(),
                        after: timeout,
                    }
                    .into())
                }
            }
        };
        Self {
            operation,
            future: Box::pin(future),
        }
    }

    /// An already completed operation.
    pub fn ready(operation: &'static str, result: Result<T>) -> Self {
        Self {
            operation,
            future: Box::pin(async move { result }),
        }
    }
}

impl<T> Pending<T> {
    /// Name of the operation, for diagnostics.
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn resolves_with_the_work_result() {
        let pending = Pending::spawn("add", Duration::from_secs(5), || Ok(2 + 2));
        assert_eq!(pending.operation(), "add");
        assert_eq!(pending.await.unwrap(), 4);
    }

    #[tokio::test]
    async fn slow_work_times_out_as_retryable() {
        let pending = Pending::spawn("slow", Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        });
        let err = pending.await.unwrap_err();
        assert!(matches!(
            err,
            Error::Store(StoreError::Timeout { ref operation, .. }) if operation == "slow"
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn dropping_does_not_cancel() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        let pending = Pending::spawn("mark", Duration::from_secs(5), move || {
            std::thread::sleep(Duration::from_millis(20));
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        drop(pending);
        for _ in 0..100 {
            if done.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("abandoned work never ran");
    }

    #[test]
    fn outside_a_runtime_is_an_error() {
        let pending = Pending::spawn("orphan", Duration::from_secs(1), || Ok(1));
        let runtime = tokio::runtime::Runtime::new().unwrap();
        assert!(matches!(
            runtime.block_on(pending),
            Err(Error::NoRuntime(_))
        ));
    }

    #[test]
    fn runtime_without_timers_is_an_error() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let pending = runtime.block_on(async move {
            Pending::spawn("untimed", Duration::from_secs(1), move || {
                flag.store(true, Ordering::SeqCst);
                Ok(1)
            })
        });
        assert!(matches!(
            runtime.block_on(pending),
            Err(Error::NoRuntime(_))
        ));
        drop(runtime);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn errors_pass_through() {
        let pending: Pending<()> = Pending::spawn("fail", Duration::from_secs(1), || {
            Err(Error::InvalidArgument("nope".into()))
        });
        assert!(matches!(pending.await, Err(Error::InvalidArgument(_))));
    }
}
