//! # SHC Core
//!
//! Core client logic for the `PatientRecord` ledger contract:
//! - Wallet session lifecycle (signed-out / connecting / authenticated)
//! - Pure record-transaction builders with Clarity argument encoding
//! - Transaction dispatch, retry and finality tracking
//!
//! **No presentation concerns**: rendering, navigation and widgets belong to
//! the calling application. Callers interact with this crate through plain
//! data snapshots ([`session::Session`], [`request::TransactionOutcome`]) and
//! never receive references into internal state.
//!
//! The wallet capability and the ledger node are external collaborators
//! reached only through the [`wallet::WalletGateway`] and
//! [`network::LedgerNetwork`] traits.

pub mod builder;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod network;
pub mod record;
pub mod request;
pub mod session;
pub mod wallet;

pub use builder::RequestBuilder;
pub use config::{ContractConfig, DispatchConfig, Network};
pub use dispatcher::Dispatcher;
pub use error::{ClientError, ClientResult};
pub use network::{Finality, LedgerNetwork};
pub use record::{BloodType, ContentHash, PatientRecord, RecordUpdate};
pub use request::{
    ContractId, RequestId, SignedTransaction, TransactionOutcome, TransactionRequest, TxId,
    TxState,
};
pub use session::{Identity, Session, SessionStatus, SessionStore};
pub use wallet::WalletGateway;
