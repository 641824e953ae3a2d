//! Boundary to the external wallet capability.

use async_trait::async_trait;

use crate::request::{SignedTransaction, TransactionRequest};
use crate::session::Identity;
use crate::ClientResult;

/// The only seam through which the core talks to a wallet and the signer it
/// exposes. Concrete transports (browser extension bridge, hardware wallet,
/// test double) live outside this crate.
///
/// Implementations must not retry on their own: rejection by a human is not
/// a transient failure.
#[async_trait]
pub trait WalletGateway: Send + Sync {
    /// Asks the wallet for a connection and the account identity.
    ///
    /// Suspends until the person responds; there is no upper bound, so
    /// callers needing one must apply their own timeout.
    ///
    /// # Errors
    ///
    /// `ClientError::UserRejected` if the person declines,
    /// `ClientError::WalletUnavailable` if no compatible wallet capability
    /// is present.
    async fn request_connection(&self) -> ClientResult<Identity>;

    /// Asks the wallet to authorize a built request.
    ///
    /// # Errors
    ///
    /// `ClientError::UserRejected` or `ClientError::SigningFailed`.
    async fn sign(&self, request: &TransactionRequest) -> ClientResult<SignedTransaction>;
}
