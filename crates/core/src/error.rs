//! Error taxonomy for the client core.
//!
//! Callers are expected to branch on the variant, not parse message strings,
//! so behaviour stays stable across releases.

/// Errors surfaced by the session store, builders and dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// No compatible wallet capability is present.
    #[error("no compatible wallet capability is available")]
    WalletUnavailable,

    /// The person declined the wallet prompt. Never auto-retried.
    #[error("the wallet user rejected the request")]
    UserRejected,

    /// The wallet accepted the prompt but could not produce a signature.
    #[error("the wallet failed to sign the transaction")]
    SigningFailed,

    /// A write-path call was made without an authenticated session.
    #[error("not authenticated: connect a wallet first")]
    NotAuthenticated,

    /// Input failed validation before any wallet or network contact.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Transient connectivity failure; safe to retry with backoff.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The contract rejected the transaction (e.g. duplicate registration).
    /// Terminal.
    #[error("contract rejected the transaction: {0}")]
    ContractRejected(String),
}

impl ClientError {
    /// Only transient connectivity failures may be retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::NetworkFailure(_))
    }
}

impl From<clarity_codec::CodecError> for ClientError {
    fn from(err: clarity_codec::CodecError) -> Self {
        ClientError::InvalidArgument(err.to_string())
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_failures_are_retryable() {
        assert!(ClientError::NetworkFailure("timeout".into()).is_retryable());
        for err in [
            ClientError::WalletUnavailable,
            ClientError::UserRejected,
            ClientError::SigningFailed,
            ClientError::NotAuthenticated,
            ClientError::InvalidArgument("x".into()),
            ClientError::ContractRejected("dup".into()),
        ] {
            assert!(!err.is_retryable(), "{err} must not be retryable");
        }
    }
}
