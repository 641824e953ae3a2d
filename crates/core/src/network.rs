//! Boundary to the ledger network.

use async_trait::async_trait;

use crate::request::{SignedTransaction, TxId};
use crate::ClientResult;

/// Finality status the network reports for a broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finality {
    /// Accepted but not yet final.
    Pending,
    /// Irreversible. Terminal.
    Confirmed,
    /// Rejected by the contract or the chain, with the network's reason.
    /// Terminal.
    Rejected(String),
}

/// Seam to a ledger node: broadcast signed bytes, then observe finality.
/// Concrete transports (node RPC client, test double) live outside this
/// crate.
#[async_trait]
pub trait LedgerNetwork: Send + Sync {
    /// Submits a signed transaction, returning the network's transaction id.
    ///
    /// # Errors
    ///
    /// `ClientError::NetworkFailure` for transient connectivity problems
    /// (the dispatcher retries these with backoff),
    /// `ClientError::ContractRejected` if the node refuses the transaction
    /// outright.
    async fn broadcast(&self, tx: &SignedTransaction) -> ClientResult<TxId>;

    /// Reports the last known finality status for a transaction.
    ///
    /// # Errors
    ///
    /// `ClientError::NetworkFailure` for transient connectivity problems.
    async fn transaction_status(&self, txid: &TxId) -> ClientResult<Finality>;
}
