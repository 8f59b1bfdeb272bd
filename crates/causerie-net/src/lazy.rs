//! Lazily-initialized transport handle.
//!
//! The transport is an explicitly owned resource with a visible
//! ready/not-ready state instead of a module-wide singleton promise.
//! Initialization is idempotent and safe to await from several call
//! sites at once; a failed attempt leaves the cell empty so the next
//! caller retries from scratch.

use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::handle::{TransportError, TransportHandle};

type InitFn = Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<TransportHandle>> + Send + Sync>;

pub struct LazyTransport {
    cell: OnceCell<TransportHandle>,
    init: InitFn,
}

impl LazyTransport {
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<TransportHandle>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            init: Box::new(move || Box::pin(factory())),
        }
    }

    /// The transport handle, initializing on first use. Concurrent
    /// callers share one initialization attempt.
    pub async fn get(&self) -> Result<&TransportHandle, TransportError> {
        self.cell
            .get_or_try_init(|| async {
                (self.init)().await.map_err(|e| {
                    warn!(error = %e, "Transport initialization failed");
                    TransportError::NotReady(e.to_string())
                })
            })
            .await
    }

    /// Whether the transport has successfully initialized.
    pub fn ready(&self) -> bool {
        self.cell.initialized()
    }

    /// The handle if already initialized, without triggering init.
    pub fn try_get(&self) -> Option<&TransportHandle> {
        self.cell.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn dummy_handle() -> TransportHandle {
        let (tx, _rx) = mpsc::channel(1);
        TransportHandle::new(tx)
    }

    #[tokio::test]
    async fn initializes_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let lazy = LazyTransport::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(dummy_handle())
            }
        });

        assert!(!lazy.ready());
        lazy.get().await.unwrap();
        lazy.get().await.unwrap();

        assert!(lazy.ready());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_init_is_retried_on_the_next_attempt() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let lazy = LazyTransport::new(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("no network");
                }
                Ok(dummy_handle())
            }
        });

        let first = lazy.get().await;
        assert!(matches!(first, Err(TransportError::NotReady(_))));
        assert!(!lazy.ready());
        assert!(lazy.try_get().is_none());

        lazy.get().await.unwrap();
        assert!(lazy.ready());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
