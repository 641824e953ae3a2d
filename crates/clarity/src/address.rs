//! c32check Stacks addresses.
//!
//! A Stacks address is a version byte plus a 20-byte hash160, rendered as
//! `S` + version character + c32(payload ++ checksum), where the checksum is
//! the first four bytes of a double SHA-256 over version ++ payload. Decoding
//! normalizes the common homoglyphs (`O` -> `0`, `L`/`I` -> `1`) and lowercase
//! input before validating.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::{CodecError, CodecResult};

/// Mainnet single-sig address version (`SP…`).
pub const ADDRESS_VERSION_MAINNET_SINGLESIG: u8 = 22;

/// Mainnet multi-sig address version (`SM…`).
pub const ADDRESS_VERSION_MAINNET_MULTISIG: u8 = 20;

/// Testnet single-sig address version (`ST…`).
pub const ADDRESS_VERSION_TESTNET_SINGLESIG: u8 = 26;

/// Testnet multi-sig address version (`SN…`).
pub const ADDRESS_VERSION_TESTNET_MULTISIG: u8 = 21;

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

const HASH160_LEN: usize = 20;
const CHECKSUM_LEN: usize = 4;

/// A decoded standard Stacks principal: version byte plus hash160.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StacksAddress {
    version: u8,
    hash160: [u8; HASH160_LEN],
}

impl StacksAddress {
    /// Creates an address from raw parts.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::UnsupportedVersion` if `version` is not one of
    /// the four recognised Stacks address versions.
    pub fn new(version: u8, hash160: [u8; HASH160_LEN]) -> CodecResult<Self> {
        if !is_known_version(version) {
            return Err(CodecError::UnsupportedVersion(version));
        }
        Ok(Self { version, hash160 })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn hash160(&self) -> &[u8; HASH160_LEN] {
        &self.hash160
    }

    /// True for mainnet address versions (`SP…`/`SM…`).
    pub fn is_mainnet(&self) -> bool {
        matches!(
            self.version,
            ADDRESS_VERSION_MAINNET_SINGLESIG | ADDRESS_VERSION_MAINNET_MULTISIG
        )
    }
}

impl fmt::Display for StacksAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut body = Vec::with_capacity(HASH160_LEN + CHECKSUM_LEN);
        body.extend_from_slice(&self.hash160);
        body.extend_from_slice(&checksum(self.version, &self.hash160));
        write!(
            f,
            "S{}{}",
            C32_ALPHABET[self.version as usize] as char,
            c32_encode(&body)
        )
    }
}

impl FromStr for StacksAddress {
    type Err = CodecError;

    fn from_str(s: &str) -> CodecResult<Self> {
        let normalized = normalize(s)?;
        let mut chars = normalized.chars();
        match chars.next() {
            Some('S') => {}
            Some(other) => return Err(CodecError::InvalidCharacter(other)),
            None => return Err(CodecError::InvalidAddressLength(0)),
        }
        let version = match chars.next() {
            Some(c) => c32_value(c)?,
            None => return Err(CodecError::InvalidAddressLength(0)),
        };
        if !is_known_version(version) {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let payload = c32_decode(chars.as_str())?;
        if payload.len() != HASH160_LEN + CHECKSUM_LEN {
            return Err(CodecError::InvalidAddressLength(payload.len()));
        }

        let mut hash160 = [0u8; HASH160_LEN];
        hash160.copy_from_slice(&payload[..HASH160_LEN]);
        if payload[HASH160_LEN..] != checksum(version, &hash160) {
            return Err(CodecError::ChecksumMismatch);
        }

        Ok(Self { version, hash160 })
    }
}

/// Addresses serialize as their c32check string form.
impl serde::Serialize for StacksAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for StacksAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn is_known_version(version: u8) -> bool {
    matches!(
        version,
        ADDRESS_VERSION_MAINNET_SINGLESIG
            | ADDRESS_VERSION_MAINNET_MULTISIG
            | ADDRESS_VERSION_TESTNET_SINGLESIG
            | ADDRESS_VERSION_TESTNET_MULTISIG
    )
}

/// First four bytes of sha256(sha256(version ++ hash160)).
fn checksum(version: u8, hash160: &[u8; HASH160_LEN]) -> [u8; CHECKSUM_LEN] {
    let mut data = Vec::with_capacity(1 + HASH160_LEN);
    data.push(version);
    data.extend_from_slice(hash160);
    let digest = Sha256::digest(Sha256::digest(&data));
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// Uppercases and maps the c32 homoglyphs (`O` -> `0`, `L`/`I` -> `1`).
fn normalize(input: &str) -> CodecResult<String> {
    input
        .chars()
        .map(|c| {
            let c = c.to_ascii_uppercase();
            match c {
                'O' => Ok('0'),
                'L' | 'I' => Ok('1'),
                c if c.is_ascii_alphanumeric() => Ok(c),
                other => Err(CodecError::InvalidCharacter(other)),
            }
        })
        .collect()
}

fn c32_value(c: char) -> CodecResult<u8> {
    C32_ALPHABET
        .iter()
        .position(|&a| a as char == c)
        .map(|p| p as u8)
        .ok_or(CodecError::InvalidCharacter(c))
}

/// Encodes bytes as c32: base-32 digits of the value, with one leading `0`
/// digit per leading zero byte.
fn c32_encode(bytes: &[u8]) -> String {
    // Collect 5-bit digits from the least-significant end.
    let mut digits: Vec<u8> = Vec::with_capacity(bytes.len() * 8 / 5 + 1);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for &b in bytes.iter().rev() {
        acc |= (b as u32) << bits;
        bits += 8;
        while bits >= 5 {
            digits.push((acc & 0x1f) as u8);
            acc >>= 5;
            bits -= 5;
        }
    }
    if bits > 0 {
        digits.push((acc & 0x1f) as u8);
    }
    // Drop spurious most-significant zero digits; the leading-zero-byte rule
    // below is the only source of leading zeros in the output.
    while digits.last() == Some(&0) {
        digits.pop();
    }

    let leading_zero_bytes = bytes.iter().take_while(|&&b| b == 0).count();
    let mut out = String::with_capacity(leading_zero_bytes + digits.len());
    for _ in 0..leading_zero_bytes {
        out.push('0');
    }
    for &d in digits.iter().rev() {
        out.push(C32_ALPHABET[d as usize] as char);
    }
    out
}

/// Decodes a c32 digit string (already normalized) back into bytes.
fn c32_decode(input: &str) -> CodecResult<Vec<u8>> {
    let leading_zero_digits = input.chars().take_while(|&c| c == '0').count();

    // Accumulate bytes from the least-significant end.
    let mut out: Vec<u8> = Vec::with_capacity(input.len() * 5 / 8 + 1);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for c in input.chars().rev() {
        acc |= (c32_value(c)? as u32) << bits;
        bits += 5;
        while bits >= 8 {
            out.push((acc & 0xff) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 && acc != 0 {
        out.push(acc as u8);
    }
    while out.last() == Some(&0) {
        out.pop();
    }

    let mut bytes = vec![0u8; leading_zero_digits];
    bytes.extend(out.iter().rev());
    Ok(bytes)
}
