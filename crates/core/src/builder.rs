//! Pure builders turning record intents into contract-call requests.
//!
//! No I/O, no async, no clocks beyond date plausibility: given identical
//! inputs the builders produce byte-identical encoded requests, which is
//! what makes idempotent retries and golden-encoding tests possible.
//! Validation failures reject synchronously and never reach the wallet or
//! the network.

use std::sync::Arc;

use clarity_codec::ClarityValue;

use crate::config::ContractConfig;
use crate::constants::{FN_GET_PATIENT_RECORD, FN_REGISTER_PATIENT, FN_UPDATE_PATIENT_RECORD};
use crate::record::{
    validate_date_of_birth, validate_patient_id, validate_patient_name, PatientRecord,
    RecordUpdate,
};
use crate::request::{ContractId, TransactionRequest};
use crate::ClientResult;

/// Builds fully specified `PatientRecord` contract calls.
#[derive(Clone)]
pub struct RequestBuilder {
    config: Arc<ContractConfig>,
}

impl RequestBuilder {
    pub fn new(config: Arc<ContractConfig>) -> Self {
        Self { config }
    }

    /// Read-only lookup of a patient record.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidArgument` if the patient id fails
    /// validation.
    pub fn read_record(&self, patient_id: &str) -> ClientResult<TransactionRequest> {
        validate_patient_id(patient_id)?;
        Ok(self.request(
            FN_GET_PATIENT_RECORD,
            vec![ClarityValue::string_utf8(patient_id)?],
        ))
    }

    /// Registration call for a new patient.
    ///
    /// Argument order is fixed at patient-id, name, date-of-birth,
    /// blood-type. The order is part of the wire contract and must not be
    /// changed without a contract version bump.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidArgument` if any field fails validation.
    pub fn register_patient(&self, record: &PatientRecord) -> ClientResult<TransactionRequest> {
        validate_patient_id(&record.patient_id)?;
        validate_patient_name(&record.name)?;
        validate_date_of_birth(record.date_of_birth)?;
        Ok(self.request(
            FN_REGISTER_PATIENT,
            vec![
                ClarityValue::string_utf8(record.patient_id.as_str())?,
                ClarityValue::string_utf8(record.name.as_str())?,
                ClarityValue::UInt(record.date_of_birth.into()),
                ClarityValue::string_utf8(record.blood_type.as_str())?,
            ],
        ))
    }

    /// Update call pointing a registered patient at new off-chain content.
    ///
    /// This is the integrity checkpoint: the hash is encoded byte-identical
    /// to the caller's input, with no transformation or truncation.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidArgument` if the patient id fails
    /// validation. The content hash was validated when constructed.
    pub fn update_record(&self, update: &RecordUpdate) -> ClientResult<TransactionRequest> {
        validate_patient_id(&update.patient_id)?;
        Ok(self.request(
            FN_UPDATE_PATIENT_RECORD,
            vec![
                ClarityValue::string_utf8(update.patient_id.as_str())?,
                ClarityValue::string_utf8(update.content_hash.as_str())?,
            ],
        ))
    }

    fn request(&self, function_name: &str, args: Vec<ClarityValue>) -> TransactionRequest {
        TransactionRequest::new(
            ContractId {
                address: *self.config.address(),
                name: self.config.name().to_string(),
            },
            function_name,
            args,
            self.config.network(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BloodType, ContentHash};
    use crate::ClientError;

    fn builder() -> RequestBuilder {
        let config = ContractConfig::testnet_default().expect("default config");
        RequestBuilder::new(Arc::new(config))
    }

    fn sample_record() -> PatientRecord {
        PatientRecord {
            patient_id: "p1".into(),
            name: "Jane Doe".into(),
            date_of_birth: 9000,
            blood_type: BloodType::APositive,
        }
    }

    #[test]
    fn read_record_targets_the_lookup_entry_point() {
        let request = builder().read_record("p1").expect("build read");
        assert_eq!(request.function_name(), "get-patient-record");
        assert_eq!(request.contract().name, "PatientRecord");
        assert_eq!(request.args().len(), 1);
        assert_eq!(
            request.args()[0],
            ClarityValue::string_utf8("p1").expect("arg")
        );
    }

    #[test]
    fn register_encodes_arguments_in_contract_order() {
        let request = builder()
            .register_patient(&sample_record())
            .expect("build register");
        assert_eq!(request.function_name(), "register-patient");

        let encoded = request.encoded_args();
        assert_eq!(hex::encode(&encoded[0]), "0e000000027031");
        assert_eq!(hex::encode(&encoded[1]), "0e000000084a616e6520446f65");
        assert_eq!(
            hex::encode(&encoded[2]),
            "0100000000000000000000000000002328"
        );
        assert_eq!(hex::encode(&encoded[3]), "0e00000002412b");
    }

    #[test]
    fn register_is_deterministic() {
        let builder = builder();
        let record = sample_record();
        let a = builder.register_patient(&record).expect("first build");
        let b = builder.register_patient(&record).expect("second build");
        assert_eq!(a, b);
        assert_eq!(a.encoded_args(), b.encoded_args());
        assert_eq!(a.wire_payload(), b.wire_payload());
    }

    #[test]
    fn empty_patient_id_rejects_every_operation() {
        let builder = builder();

        let err = builder.read_record("").expect_err("read should reject");
        assert!(matches!(err, ClientError::InvalidArgument(_)));

        let mut record = sample_record();
        record.patient_id.clear();
        let err = builder
            .register_patient(&record)
            .expect_err("register should reject");
        assert!(matches!(err, ClientError::InvalidArgument(_)));

        let update = RecordUpdate {
            patient_id: String::new(),
            content_hash: ContentHash::new(&"ab".repeat(32)).expect("hash"),
        };
        let err = builder
            .update_record(&update)
            .expect_err("update should reject");
        assert!(matches!(err, ClientError::InvalidArgument(_)));
    }

    #[test]
    fn register_rejects_future_birth_date() {
        let mut record = sample_record();
        record.date_of_birth = u64::MAX;
        let err = builder()
            .register_patient(&record)
            .expect_err("future date should reject");
        assert!(matches!(err, ClientError::InvalidArgument(_)));
    }

    #[test]
    fn update_round_trips_patient_id_and_hash() {
        let hash = "deadbeef".repeat(8);
        let update = RecordUpdate {
            patient_id: "p1".into(),
            content_hash: ContentHash::new(&hash).expect("hash"),
        };
        let request = builder().update_record(&update).expect("build update");
        assert_eq!(request.function_name(), "update-patient-record");

        let decoded: Vec<ClarityValue> = request
            .encoded_args()
            .iter()
            .map(|bytes| ClarityValue::deserialize(bytes).expect("decode arg"))
            .collect();
        assert_eq!(
            decoded,
            vec![
                ClarityValue::string_utf8("p1").expect("arg"),
                ClarityValue::string_utf8(hash).expect("arg"),
            ]
        );
    }
}
