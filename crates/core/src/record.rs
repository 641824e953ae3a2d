//! Patient record domain types and input validation.
//!
//! These are the values the builders validate and encode. The record content
//! itself lives off-chain; this crate only ever carries its content address.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONTENT_HASH_LEN, MAX_DOB_AGE_DAYS, MAX_PATIENT_ID_LEN, MAX_PATIENT_NAME_LEN,
};
use crate::{ClientError, ClientResult};

/// Recognised blood type set, including `Unknown` for unrecorded values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl BloodType {
    pub const ALL: [BloodType; 9] = [
        BloodType::APositive,
        BloodType::ANegative,
        BloodType::BPositive,
        BloodType::BNegative,
        BloodType::AbPositive,
        BloodType::AbNegative,
        BloodType::OPositive,
        BloodType::ONegative,
        BloodType::Unknown,
    ];

    /// The canonical on-chain string for this blood type.
    pub fn as_str(&self) -> &'static str {
        match self {
            BloodType::APositive => "A+",
            BloodType::ANegative => "A-",
            BloodType::BPositive => "B+",
            BloodType::BNegative => "B-",
            BloodType::AbPositive => "AB+",
            BloodType::AbNegative => "AB-",
            BloodType::OPositive => "O+",
            BloodType::ONegative => "O-",
            BloodType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodType {
    type Err = ClientError;

    fn from_str(s: &str) -> ClientResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A+" => Ok(BloodType::APositive),
            "A-" => Ok(BloodType::ANegative),
            "B+" => Ok(BloodType::BPositive),
            "B-" => Ok(BloodType::BNegative),
            "AB+" => Ok(BloodType::AbPositive),
            "AB-" => Ok(BloodType::AbNegative),
            "O+" => Ok(BloodType::OPositive),
            "O-" => Ok(BloodType::ONegative),
            "UNKNOWN" => Ok(BloodType::Unknown),
            other => Err(ClientError::InvalidArgument(format!(
                "unrecognised blood type: {other}"
            ))),
        }
    }
}

/// A content address for off-chain encrypted record content: exactly 64
/// lowercase hex characters (a SHA-256 digest).
///
/// The hash is opaque to this crate. It is carried byte-identically into the
/// contract call; uppercase input is rejected rather than normalized so
/// what goes on chain is exactly what the caller computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// # Errors
    ///
    /// Returns `ClientError::InvalidArgument` unless `s` is exactly
    /// `CONTENT_HASH_LEN` lowercase hex characters.
    pub fn new(s: &str) -> ClientResult<Self> {
        if s.len() != CONTENT_HASH_LEN {
            return Err(ClientError::InvalidArgument(format!(
                "content hash must be exactly {CONTENT_HASH_LEN} hex characters, got {}",
                s.len()
            )));
        }
        let ok = s
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !ok {
            return Err(ClientError::InvalidArgument(
                "content hash must be lowercase hexadecimal".into(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = ClientError;

    fn from_str(s: &str) -> ClientResult<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ClientError;

    fn try_from(s: String) -> ClientResult<Self> {
        Self::new(&s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

/// The on-chain registration payload. Immutable once submitted; later
/// changes go through [`RecordUpdate`], never in-place mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: String,
    pub name: String,
    /// Days since the Unix epoch.
    pub date_of_birth: u64,
    pub blood_type: BloodType,
}

/// A pointer from a registered patient to new off-chain record content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub patient_id: String,
    pub content_hash: ContentHash,
}

/// Validates a patient identifier: non-empty, length-bounded, restricted to
/// a conservative ASCII set safe for keys and URIs.
pub fn validate_patient_id(patient_id: &str) -> ClientResult<()> {
    if patient_id.trim().is_empty() {
        return Err(ClientError::InvalidArgument(
            "patient id cannot be empty".into(),
        ));
    }
    if patient_id.len() > MAX_PATIENT_ID_LEN {
        return Err(ClientError::InvalidArgument(format!(
            "patient id exceeds maximum length of {MAX_PATIENT_ID_LEN} characters"
        )));
    }
    let ok = patient_id
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));
    if !ok {
        return Err(ClientError::InvalidArgument(
            "patient id contains invalid characters (only alphanumeric, '.', '-', '_' allowed)"
                .into(),
        ));
    }
    Ok(())
}

/// Validates a patient name: non-empty, length-bounded, no control
/// characters.
pub fn validate_patient_name(name: &str) -> ClientResult<()> {
    if name.trim().is_empty() {
        return Err(ClientError::InvalidArgument(
            "patient name cannot be empty".into(),
        ));
    }
    if name.len() > MAX_PATIENT_NAME_LEN {
        return Err(ClientError::InvalidArgument(format!(
            "patient name exceeds maximum length of {MAX_PATIENT_NAME_LEN} bytes"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(ClientError::InvalidArgument(
            "patient name contains control characters".into(),
        ));
    }
    Ok(())
}

/// Validates a date of birth expressed as days since the Unix epoch: it
/// must be a real calendar date, not in the future, and within a plausible
/// human lifespan of today.
pub fn validate_date_of_birth(epoch_days: u64) -> ClientResult<()> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).ok_or_else(|| {
        ClientError::InvalidArgument("calendar epoch out of range".into())
    })?;
    let date = epoch
        .checked_add_days(Days::new(epoch_days))
        .ok_or_else(|| {
            ClientError::InvalidArgument(format!("date of birth out of range: {epoch_days}"))
        })?;

    let today = Utc::now().date_naive();
    if date > today {
        return Err(ClientError::InvalidArgument(format!(
            "date of birth {date} is in the future"
        )));
    }
    if (today - date).num_days() > MAX_DOB_AGE_DAYS {
        return Err(ClientError::InvalidArgument(format!(
            "date of birth {date} is implausibly far in the past"
        )));
    }
    Ok(())
}
