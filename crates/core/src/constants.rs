//! Constants for the `PatientRecord` contract surface.
//!
//! Entry-point names and argument caps are part of the wire contract; they
//! must track the deployed contract version.

/// Default contract deployer address (testnet deployment).
pub const DEFAULT_CONTRACT_ADDRESS: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

/// Default contract name.
pub const DEFAULT_CONTRACT_NAME: &str = "PatientRecord";

/// Read-only lookup entry point: `patientId -> PatientRecord`.
pub const FN_GET_PATIENT_RECORD: &str = "get-patient-record";

/// Registration entry point: `patientId, name, dateOfBirth, bloodType -> ack`.
pub const FN_REGISTER_PATIENT: &str = "register-patient";

/// Update entry point: `patientId, contentHash -> ack`.
pub const FN_UPDATE_PATIENT_RECORD: &str = "update-patient-record";

/// Maximum byte length of a patient identifier.
pub const MAX_PATIENT_ID_LEN: usize = 64;

/// Maximum byte length of a patient name.
pub const MAX_PATIENT_NAME_LEN: usize = 128;

/// Exact length of a hex content address (SHA-256 digest).
pub const CONTENT_HASH_LEN: usize = 64;

/// Maximum length of a Clarity contract name.
pub const MAX_CONTRACT_NAME_LEN: usize = 40;

/// Oldest plausible date of birth, as days before today.
pub const MAX_DOB_AGE_DAYS: i64 = 150 * 366;
