//! Cooperative cancellation for forecast and backtest requests.

use tokio::sync::watch;

use crate::ForecastError;

/// Owner side: calling [`CancelHandle::cancel`] signals every token derived from it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observer side, cheap to clone and share across tasks.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Create a linked handle/token pair.
pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        // send_replace never fails even when every token is gone
        self.tx.send_replace(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_, token) = cancellation();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> Result<(), ForecastError> {
        if self.is_cancelled() {
            Err(ForecastError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when cancellation is requested; pends forever if it never can be.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // handle dropped without cancelling
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_flags_all_tokens() {
        let (handle, token) = cancellation();
        let other = handle.token();
        assert!(token.check().is_ok());

        handle.cancel();
        assert!(token.is_cancelled());
        assert_eq!(other.check(), Err(ForecastError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let (handle, token) = cancellation();
        let waiter = tokio::spawn(async move { token.cancelled().await });
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_never_token_pends() {
        let token = CancelToken::never();
        let result = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(result.is_err());
    }
}
