//! Per-store loading flag and last-error slot.
//!
//! Every store operation clears the last error when it starts and overwrites
//! it when it fails; errors are never accumulated. The loading flag counts
//! in-flight operations, so overlapping calls keep it set until the last one
//! finishes (or its future is dropped).

use std::future::Future;
use std::sync::Mutex;

use crate::error::Result;
use crate::lock;

#[derive(Debug, Default)]
struct StatusInner {
    in_flight: usize,
    last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct OperationStatus {
    inner: Mutex<StatusInner>,
}

impl OperationStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.inner).in_flight > 0
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.inner).last_error.clone()
    }

    pub fn set_error(&self, message: impl Into<String>) {
        lock(&self.inner).last_error = Some(message.into());
    }

    pub fn clear_error(&self) {
        lock(&self.inner).last_error = None;
    }

    fn begin(&self) -> InFlight<'_> {
        let mut inner = lock(&self.inner);
        inner.in_flight += 1;
        inner.last_error = None;
        InFlight { status: self }
    }

    /// Runs one store operation: marks it in flight, and on failure records
    /// the message and logs it before handing the error back to the caller.
    pub async fn track<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _in_flight = self.begin();
        let result = fut.await;
        if let Err(err) = &result {
            tracing::error!(error = %err, operation, "Operation failed");
            self.set_error(err.to_string());
        }
        result
    }
}

struct InFlight<'a> {
    status: &'a OperationStatus,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut inner = lock(&self.status.inner);
        inner.in_flight = inner.in_flight.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlannerError;

    #[tokio::test]
    async fn failure_records_message_and_propagates() {
        let status = OperationStatus::new();
        let result: Result<()> = status
            .track("probe", async { Err(PlannerError::Application("nope".into())) })
            .await;

        assert!(result.is_err());
        assert_eq!(status.last_error().as_deref(), Some("nope"));
        assert!(!status.is_loading());
    }

    #[tokio::test]
    async fn next_operation_overwrites_error() {
        let status = OperationStatus::new();
        status.set_error("stale");

        status.track("ok", async { Ok(()) }).await.unwrap();
        assert_eq!(status.last_error(), None);

        let _ = status
            .track("first", async { Err::<(), _>(PlannerError::Application("a".into())) })
            .await;
        let _ = status
            .track("second", async { Err::<(), _>(PlannerError::Application("b".into())) })
            .await;
        assert_eq!(status.last_error().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn loading_while_in_flight() {
        let status = OperationStatus::new();
        let observed = status
            .track("observe", async { Ok(status.is_loading()) })
            .await
            .unwrap();
        assert!(observed);
        assert!(!status.is_loading());
    }

    #[tokio::test]
    async fn dropped_operation_releases_loading() {
        let status = OperationStatus::new();
        {
            let fut = status.track("abandoned", std::future::pending::<Result<()>>());
            let mut fut = Box::pin(fut);
            // Poll once so the operation registers, then discard it.
            let waker = futures::task::noop_waker();
            let mut cx = std::task::Context::from_waker(&waker);
            assert!(fut.as_mut().poll(&mut cx).is_pending());
            assert!(status.is_loading());
        }
        assert!(!status.is_loading());
    }
}
