//! Startup-resolved configuration.
//!
//! Contract coordinates and dispatch tuning are resolved once at process
//! startup and passed into services. Nothing here reads environment
//! variables during request handling, which keeps behaviour consistent in
//! multi-threaded runtimes and test harnesses.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use clarity_codec::StacksAddress;

use crate::constants::{DEFAULT_CONTRACT_ADDRESS, DEFAULT_CONTRACT_NAME, MAX_CONTRACT_NAME_LEN};
use crate::{ClientError, ClientResult};

/// The Stacks network a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn chain_id(&self) -> u32 {
        match self {
            Network::Mainnet => 0x0000_0001,
            Network::Testnet => 0x8000_0000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ClientError;

    fn from_str(s: &str) -> ClientResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(ClientError::InvalidArgument(format!(
                "unrecognised network: {other}"
            ))),
        }
    }
}

/// Coordinates of the deployed `PatientRecord` contract.
#[derive(Debug, Clone)]
pub struct ContractConfig {
    address: StacksAddress,
    name: String,
    network: Network,
}

impl ContractConfig {
    /// Creates a validated contract configuration.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidArgument` if the contract name is empty,
    /// too long or not a valid Clarity contract name, or if the address
    /// belongs to a different network than `network`.
    pub fn new(address: StacksAddress, name: &str, network: Network) -> ClientResult<Self> {
        validate_contract_name(name)?;

        if address.is_mainnet() != (network == Network::Mainnet) {
            return Err(ClientError::InvalidArgument(format!(
                "contract address {address} does not belong to {network}"
            )));
        }

        Ok(Self {
            address,
            name: name.to_string(),
            network,
        })
    }

    /// The testnet deployment the original frontend targeted.
    pub fn testnet_default() -> ClientResult<Self> {
        let address = DEFAULT_CONTRACT_ADDRESS
            .parse::<StacksAddress>()
            .map_err(ClientError::from)?;
        Self::new(address, DEFAULT_CONTRACT_NAME, Network::Testnet)
    }

    pub fn address(&self) -> &StacksAddress {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

/// Clarity contract names: start with a letter, then letters, digits,
/// `-` or `_`.
fn validate_contract_name(name: &str) -> ClientResult<()> {
    if name.is_empty() {
        return Err(ClientError::InvalidArgument(
            "contract name cannot be empty".into(),
        ));
    }
    if name.len() > MAX_CONTRACT_NAME_LEN {
        return Err(ClientError::InvalidArgument(format!(
            "contract name exceeds maximum length of {MAX_CONTRACT_NAME_LEN} characters"
        )));
    }
    let mut bytes = name.bytes();
    let leading_ok = bytes.next().is_some_and(|b| b.is_ascii_alphabetic());
    let rest_ok = bytes.all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !leading_ok || !rest_ok {
        return Err(ClientError::InvalidArgument(format!(
            "invalid contract name: {name}"
        )));
    }
    Ok(())
}

/// Tuning for the transaction dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Total broadcast attempts before a transient failure becomes terminal.
    pub max_broadcast_attempts: u32,
    /// Base delay for exponential broadcast backoff.
    pub backoff_base: Duration,
    /// Delay between finality polls.
    pub poll_interval: Duration,
    /// Consecutive transient poll failures tolerated before giving up.
    pub max_poll_failures: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_broadcast_attempts: 3,
            backoff_base: Duration::from_millis(500),
            poll_interval: Duration::from_secs(2),
            max_poll_failures: 5,
        }
    }
}
