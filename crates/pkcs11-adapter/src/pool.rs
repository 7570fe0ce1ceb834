//! Bounded concurrency around a blocking [`HsmBackend`] (spec §9: HSM
//! sessions are a scarce resource; SPM bounds how many run concurrently).
//!
//! All backend calls are blocking (PKCS#11 itself is synchronous), so the
//! pool runs every command on a `spawn_blocking` thread and limits how many
//! run at once with a semaphore, rather than trying to make the HSM client
//! async.

use crate::backend::HsmBackend;
use crate::types::{HsmError, HsmResult, SessionHandle};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs [`HsmBackend`] operations off the async executor, bounding how many
/// execute concurrently against one physical HSM.
pub struct SessionPool<B: HsmBackend + 'static> {
    backend: Arc<B>,
    permits: Arc<Semaphore>,
}

impl<B: HsmBackend + 'static> SessionPool<B> {
    /// `max_concurrent` should match the HSM vendor's documented session
    /// ceiling for the target SKU (spec §4.2 SKU config `hsm_max_sessions`).
    pub fn new(backend: Arc<B>, max_concurrent: usize) -> Self {
        Self { backend, permits: Arc::new(Semaphore::new(max_concurrent.max(1))) }
    }

    /// Open a session, bounded by the pool's concurrency limit.
    pub async fn open_session(&self, token_label: String, pin: String) -> HsmResult<SessionHandle> {
        self.execute(move |backend| backend.open_session(&token_label, &pin)).await
    }

    /// Run an arbitrary closure against the backend on a blocking thread,
    /// holding one concurrency permit for its duration.
    pub async fn execute<T, F>(&self, f: F) -> HsmResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&B) -> HsmResult<T> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| HsmError::HsmInternal("session pool closed".into()))?;
        let backend = self.backend.clone();
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f(&backend)
        })
        .await
        .map_err(|e| HsmError::HsmInternal(format!("HSM worker task panicked: {e}")))?;
        result
    }

    /// Number of commands that may run against the HSM at once right now.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftHsm;
    use crate::types::KeyOpts;

    #[tokio::test]
    async fn execute_runs_closure_against_backend() {
        let pool = SessionPool::new(Arc::new(SoftHsm::new()), 2);
        let session = pool.open_session("test-token".into(), "1234".into()).await.unwrap();
        let key = pool
            .execute(move |backend| backend.generate_aes(session, "pool-test-key", 128, KeyOpts::default()))
            .await
            .unwrap();
        assert_eq!(key.policy.encrypt, true);
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_semaphore() {
        let pool = Arc::new(SessionPool::new(Arc::new(SoftHsm::new()), 1));
        assert_eq!(pool.available_permits(), 1);
        let p2 = pool.clone();
        let handle = tokio::spawn(async move {
            p2.execute(|_backend| {
                std::thread::sleep(std::time::Duration::from_millis(50));
                Ok::<(), HsmError>(())
            })
            .await
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(pool.available_permits(), 0);
        handle.await.unwrap().unwrap();
        assert_eq!(pool.available_permits(), 1);
    }
}
