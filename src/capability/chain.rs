use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use sha2::{Digest, Sha256};

use super::router::BuiltTx;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("{0}")]
    SubmissionFailed(String),
    #[error("Transaction confirmation timeout")]
    ConfirmationTimeout,
    #[error("Transaction failed: {0}")]
    ConfirmationFailed(String),
}

/// Blockchain submission/confirmation capability. Mirrors a JSON-RPC client
/// shape (request-id counter, single `submit`/`await_confirmation` surface)
/// without committing the core to a particular chain.
#[async_trait]
pub trait Chain: Send + Sync {
    async fn submit(&self, tx: &BuiltTx) -> Result<String, ChainError>;
    async fn await_confirmation(&self, tx_hash: &str, timeout: Duration) -> Result<(), ChainError>;
}

/// A runnable stand-in for a real chain client. Generates a signature-shaped
/// hash on submit and resolves confirmation after a short simulated delay,
/// the way a real RPC client would poll `getTransaction` until it lands.
pub struct SimulatedChain {
    req_id: AtomicU64,
    /// Simulated settle time before a submitted tx is considered confirmed.
    pub confirm_after: Duration,
    /// When true, `await_confirmation` never resolves inside its timeout.
    /// Used by tests exercising the confirmation-timeout scenario.
    pub never_confirm: bool,
}

impl SimulatedChain {
    pub fn new() -> Self {
        Self {
            req_id: AtomicU64::new(1),
            confirm_after: Duration::from_millis(2000 + rand::thread_rng().gen_range(0..1000)),
            never_confirm: false,
        }
    }

    pub fn never_confirming() -> Self {
        Self {
            never_confirm: true,
            ..Self::new()
        }
    }

    fn next_req_id(&self) -> u64 {
        self.req_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Chain for SimulatedChain {
    async fn submit(&self, tx: &BuiltTx) -> Result<String, ChainError> {
        let id = self.next_req_id();
        let mut hasher = Sha256::new();
        hasher.update(&tx.blob);
        hasher.update(id.to_le_bytes());
        let digest = hasher.finalize();
        Ok(hex::encode(digest))
    }

    async fn await_confirmation(&self, tx_hash: &str, timeout: Duration) -> Result<(), ChainError> {
        if self.never_confirm {
            tokio::time::sleep(timeout).await;
            return Err(ChainError::ConfirmationTimeout);
        }

        tracing::debug!(tx_hash, "awaiting confirmation");

        match tokio::time::timeout(timeout, tokio::time::sleep(self.confirm_after)).await {
            Ok(()) => Ok(()),
            Err(_) => Err(ChainError::ConfirmationTimeout),
        }
    }
}
