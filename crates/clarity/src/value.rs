//! Clarity value wire serialization.
//!
//! Only the value kinds the `PatientRecord` contract surface needs are
//! modelled: `uint`, `string-utf8` and standard principals. The byte layout
//! follows the Clarity value serialization spec (SIP-005): a one-byte type
//! tag followed by the payload.

use std::fmt;

use crate::{CodecError, CodecResult, StacksAddress};

const TYPE_UINT: u8 = 0x01;
const TYPE_PRINCIPAL_STANDARD: u8 = 0x05;
const TYPE_STRING_UTF8: u8 = 0x0e;

/// A string whose UTF-8 byte length fits the u32 wire prefix. Construction
/// is the only place the bound is checked, so serialization can never emit
/// a corrupt length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utf8String(String);

impl Utf8String {
    pub fn new(s: impl Into<String>) -> CodecResult<Self> {
        let s = s.into();
        if u32::try_from(s.len()).is_err() {
            return Err(CodecError::StringTooLong);
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Utf8String {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Clarity value in its typed, decoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    /// `uint`: 128-bit unsigned integer, 16 bytes big-endian on the wire.
    UInt(u128),
    /// `string-utf8`: 4-byte big-endian length prefix plus UTF-8 bytes.
    StringUtf8(Utf8String),
    /// Standard principal: version byte plus 20-byte hash160.
    Principal(StacksAddress),
}

impl ClarityValue {
    /// Builds a `string-utf8` value, rejecting strings the u32 length prefix
    /// cannot represent.
    pub fn string_utf8(s: impl Into<String>) -> CodecResult<Self> {
        Ok(ClarityValue::StringUtf8(Utf8String::new(s)?))
    }

    /// Serializes the value to its wire bytes. Deterministic: identical
    /// values always produce byte-identical output.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.serialize_into(&mut out);
        out
    }

    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        match self {
            ClarityValue::UInt(n) => {
                out.push(TYPE_UINT);
                out.extend_from_slice(&n.to_be_bytes());
            }
            ClarityValue::StringUtf8(s) => {
                let bytes = s.as_str().as_bytes();
                out.push(TYPE_STRING_UTF8);
                // The bound is a construction invariant of `Utf8String`.
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            ClarityValue::Principal(address) => {
                out.push(TYPE_PRINCIPAL_STANDARD);
                out.push(address.version());
                out.extend_from_slice(address.hash160());
            }
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Decodes a single value, rejecting truncated input and trailing bytes.
    pub fn deserialize(bytes: &[u8]) -> CodecResult<Self> {
        let mut reader = Reader::new(bytes);
        let value = reader.read_value()?;
        if !reader.is_empty() {
            return Err(CodecError::TrailingBytes);
        }
        Ok(value)
    }

    pub fn from_hex(s: &str) -> CodecResult<Self> {
        Self::deserialize(&hex::decode(s.trim())?)
    }
}

/// Renders values as Clarity literals: `u123`, `u"text"`, `'SP…`.
impl fmt::Display for ClarityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClarityValue::UInt(n) => write!(f, "u{n}"),
            ClarityValue::StringUtf8(s) => write!(f, "u\"{s}\""),
            ClarityValue::Principal(address) => write!(f, "'{address}"),
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(CodecError::Truncated)?;
        if end > self.bytes.len() {
            return Err(CodecError::Truncated);
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_value(&mut self) -> CodecResult<ClarityValue> {
        match self.byte()? {
            TYPE_UINT => {
                let mut buf = [0u8; 16];
                buf.copy_from_slice(self.take(16)?);
                Ok(ClarityValue::UInt(u128::from_be_bytes(buf)))
            }
            TYPE_STRING_UTF8 => {
                let mut len_buf = [0u8; 4];
                len_buf.copy_from_slice(self.take(4)?);
                let len = u32::from_be_bytes(len_buf) as usize;
                let payload = self.take(len)?;
                let s = std::str::from_utf8(payload).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(ClarityValue::StringUtf8(Utf8String::new(s)?))
            }
            TYPE_PRINCIPAL_STANDARD => {
                let version = self.byte()?;
                let mut hash160 = [0u8; 20];
                hash160.copy_from_slice(self.take(20)?);
                Ok(ClarityValue::Principal(StacksAddress::new(version, hash160)?))
            }
            tag => Err(CodecError::UnknownTypeTag(tag)),
        }
    }
}
