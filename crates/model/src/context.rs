use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::Error;

const DEFAULT_CAUSE: &str = "context canceled";

/// The caller-owned context of a provider call.
///
/// Cloning the context is cheap, and all clones observe the same
/// cancellation. Adapters check it cooperatively once per received frame.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    token: CancellationToken,
    cause: Arc<OnceLock<String>>,
}

impl CallContext {
    /// Creates a context that is not cancelled.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the context with the default cause.
    #[inline]
    pub fn cancel(&self) {
        self.cancel_with(DEFAULT_CAUSE);
    }

    /// Cancels the context with a custom cause. Only the first cause is
    /// kept.
    pub fn cancel_with<S: Into<String>>(&self, cause: S) {
        self.cause.set(cause.into()).ok();
        self.token.cancel();
    }

    /// Returns `true` if the context has been cancelled.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits until the context is cancelled.
    #[inline]
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Returns the cancellation cause, if cancelled.
    pub fn cause(&self) -> Option<&str> {
        if !self.is_cancelled() {
            return None;
        }
        Some(self.cause.get().map(String::as_str).unwrap_or(DEFAULT_CAUSE))
    }

    /// Makes the `Cancelled` error carrying the cancellation cause.
    #[inline]
    pub fn to_error(&self) -> Error {
        Error::cancelled(self.cause().unwrap_or(DEFAULT_CAUSE))
    }

    /// Drives `fut` to completion unless the context is cancelled first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Error> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(self.to_error()),
            output = fut => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::pending;

    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_cause() {
        let ctx = CallContext::new();
        assert_eq!(ctx.cause(), None);

        let clone = ctx.clone();
        ctx.cancel_with("user pressed ctrl-c");
        ctx.cancel_with("ignored");
        assert!(clone.is_cancelled());
        assert_eq!(clone.cause(), Some("user pressed ctrl-c"));

        let err = clone.to_error();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(err.message(), "user pressed ctrl-c");
    }

    #[tokio::test]
    async fn test_run() {
        let ctx = CallContext::new();
        assert_eq!(ctx.run(async { 42 }).await.unwrap(), 42);

        ctx.cancel();
        let err = ctx.run(pending::<()>()).await.unwrap_err();
        assert_eq!(err.message(), "context canceled");
    }
}
