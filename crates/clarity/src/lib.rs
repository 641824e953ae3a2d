//! # Clarity Codec
//!
//! Wire-format codec for the subset of Clarity values used by the
//! `PatientRecord` contract surface, plus c32check Stacks addresses.
//!
//! This crate is pure: no I/O, no async, no global state. Encoding is
//! deterministic - identical values always produce byte-identical output -
//! which is what makes golden-vector testing and idempotent retries of
//! contract calls possible further up the stack.
//!
//! - [`ClarityValue`] covers `uint`, `string-utf8` and standard principals,
//!   serialized per the Clarity value wire format (SIP-005).
//! - [`StacksAddress`] handles c32check encoding and decoding with checksum
//!   verification.

mod address;
mod value;

pub use address::{
    StacksAddress, ADDRESS_VERSION_MAINNET_MULTISIG, ADDRESS_VERSION_MAINNET_SINGLESIG,
    ADDRESS_VERSION_TESTNET_MULTISIG, ADDRESS_VERSION_TESTNET_SINGLESIG,
};
pub use value::{ClarityValue, Utf8String};

/// Errors that can occur while encoding or decoding Clarity data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A character outside the c32 alphabet (after homoglyph normalization).
    #[error("invalid c32 character: {0:?}")]
    InvalidCharacter(char),

    /// The address checksum did not match its payload.
    #[error("c32check checksum mismatch")]
    ChecksumMismatch,

    /// The decoded address payload was not hash160 + checksum sized.
    #[error("invalid address payload length: {0} bytes")]
    InvalidAddressLength(usize),

    /// The address version byte is not one of the recognised Stacks versions.
    #[error("unsupported address version: {0}")]
    UnsupportedVersion(u8),

    /// The input ended before a complete value could be read.
    #[error("truncated value payload")]
    Truncated,

    /// The leading type tag does not name a supported Clarity type.
    #[error("unknown clarity type tag: 0x{0:02x}")]
    UnknownTypeTag(u8),

    /// A `string-utf8` payload did not contain valid UTF-8.
    #[error("invalid UTF-8 in string-utf8 payload")]
    InvalidUtf8,

    /// A string exceeds the u32 length prefix range.
    #[error("string payload too long for wire format")]
    StringTooLong,

    /// Bytes remained after a complete value was decoded.
    #[error("trailing bytes after value")]
    TrailingBytes,

    /// The input was not valid hexadecimal.
    #[error("invalid hex input")]
    InvalidHex,
}

impl From<hex::FromHexError> for CodecError {
    fn from(_: hex::FromHexError) -> Self {
        CodecError::InvalidHex
    }
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;
