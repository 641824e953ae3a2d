//! Transaction requests, identifiers and outcomes.
//!
//! A [`TransactionRequest`] is built once by the [`crate::builder`] module
//! and never mutated afterwards; the dispatcher owns the corresponding
//! [`TransactionOutcome`] for the rest of its lifecycle.

use std::fmt;

use clarity_codec::{ClarityValue, StacksAddress};
use uuid::Uuid;

use crate::config::Network;

/// Unique identity of one submission. Outcomes are keyed by this; no two
/// submissions ever share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Address/name pair naming the deployed contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractId {
    pub address: StacksAddress,
    pub name: String,
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.address, self.name)
    }
}

/// A fully specified, network-targeted contract call.
///
/// Construct-once, submit-once: fields are only readable, and the encoded
/// argument bytes are deterministic for identical inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    contract: ContractId,
    function_name: String,
    args: Vec<ClarityValue>,
    network: Network,
}

impl TransactionRequest {
    pub(crate) fn new(
        contract: ContractId,
        function_name: &str,
        args: Vec<ClarityValue>,
        network: Network,
    ) -> Self {
        Self {
            contract,
            function_name: function_name.to_string(),
            args,
            network,
        }
    }

    pub fn contract(&self) -> &ContractId {
        &self.contract
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Arguments in contract position order. The order is part of the wire
    /// contract and never changes without a contract version bump.
    pub fn args(&self) -> &[ClarityValue] {
        &self.args
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Each argument's wire encoding, in position order.
    pub fn encoded_args(&self) -> Vec<Vec<u8>> {
        self.args.iter().map(ClarityValue::serialize).collect()
    }

    /// The full unsigned call payload handed to the wallet signer:
    /// chain id, contract principal, length-prefixed contract and function
    /// names, argument count, then each argument's wire encoding.
    pub fn wire_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.network.chain_id().to_be_bytes());
        out.push(self.contract.address.version());
        out.extend_from_slice(self.contract.address.hash160());
        out.push(self.contract.name.len() as u8);
        out.extend_from_slice(self.contract.name.as_bytes());
        out.push(self.function_name.len() as u8);
        out.extend_from_slice(self.function_name.as_bytes());
        out.extend_from_slice(&(self.args.len() as u32).to_be_bytes());
        for arg in &self.args {
            arg.serialize_into(&mut out);
        }
        out
    }
}

/// Wallet-signed transaction bytes, opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub bytes: Vec<u8>,
}

/// Network-issued transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxId(pub String);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of one submitted transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TxState {
    /// Signed and/or broadcast; finality not yet reported.
    Pending,
    /// The network reported the transaction final. Terminal.
    Confirmed,
    /// Submission failed; carries the error that caused it. Terminal.
    Failed(crate::ClientError),
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxState::Pending)
    }
}

/// Snapshot of one submission's progress, owned by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    pub request_id: RequestId,
    pub txid: Option<TxId>,
    pub state: TxState,
}

impl TransactionOutcome {
    pub(crate) fn pending(request_id: RequestId) -> Self {
        Self {
            request_id,
            txid: None,
            state: TxState::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn tx_state_terminality() {
        assert!(!TxState::Pending.is_terminal());
        assert!(TxState::Confirmed.is_terminal());
        assert!(TxState::Failed(crate::ClientError::UserRejected).is_terminal());
    }
}
