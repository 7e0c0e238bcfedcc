//! Dispatch with connection accounting.
//!
//! Wraps backend selection so every chosen backend has its in-flight counter
//! incremented for exactly the duration of the caller's work.

use std::future::Future;
use std::sync::Arc;

use url::Url;

use crate::error::LbError;
use crate::load_balancer::backend::BackendConnectionGuard;
use crate::load_balancer::pool::BackendPool;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    pool: Arc<BackendPool>,
}

impl Dispatcher {
    pub fn new(pool: Arc<BackendPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    /// Select a backend and take a connection slot on it.
    /// The slot is released when the returned guard drops.
    pub fn next_backend(&self) -> Result<BackendConnectionGuard, LbError> {
        let backend = self.pool.next_backend()?;
        Ok(backend.acquire())
    }

    /// Run `work` against the next backend.
    ///
    /// On success `work` receives the backend URL while the backend's counter
    /// is held; it is released once `work` finishes, panics or is dropped.
    /// On selection failure `work` receives the error and no counter is touched.
    pub async fn with_next_backend<F, Fut, T>(&self, work: F) -> T
    where
        F: FnOnce(Result<Url, LbError>) -> Fut,
        Fut: Future<Output = T>,
    {
        match self.next_backend() {
            Ok(guard) => {
                let url = guard.url().clone();
                let output = work(Ok(url)).await;
                drop(guard);
                output
            }
            Err(e) => work(Err(e)).await,
        }
    }
}
