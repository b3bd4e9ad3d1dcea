//! Stage message contracts.
//!
//! Messages are plain serializable records: no behavior, no I/O. A message
//! is never mutated after enqueue; each stage reads one and produces zero or
//! more new ones. Every message carries the root ingestion report id so any
//! point of the fan-out can be traced back without a lineage query.

use labrelay_core::bundle::Bundle;
use labrelay_core::id::ReportId;
use labrelay_core::topic::Topic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::PipelineError;

/// Serialized form of a bundle payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Fhir,
}

impl PayloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::Fhir => "fhir",
        }
    }
}

/// Hex SHA-256 of an uploaded payload, carried on messages so a consumer can
/// verify the blob it downloads is the one the producer wrote.
pub fn payload_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Serializes a bundle into its blob form plus the digest to carry on the
/// next message.
pub fn encode_bundle(bundle: &Bundle) -> Result<(Vec<u8>, String), PipelineError> {
    let bytes = serde_json::to_vec(bundle)?;
    let digest = payload_digest(&bytes);
    Ok((bytes, digest))
}

/// Parses downloaded blob bytes back into a bundle, after checking them
/// against the digest the producing stage recorded. A mismatch means the
/// blob was tampered with or the store returned the wrong object.
pub fn decode_bundle(bytes: &[u8], expected_digest: &str) -> Result<Bundle, PipelineError> {
    let actual = payload_digest(bytes);
    if actual != expected_digest {
        return Err(PipelineError::malformed_bundle(format!(
            "payload digest mismatch: expected {expected_digest}, got {actual}"
        )));
    }
    let bundle: Bundle = serde_json::from_slice(bytes)?;
    bundle.validate()?;
    Ok(bundle)
}

/// Input to the destination-filter stage: one bundle ready for routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationFilterMessage {
    pub report_id: ReportId,
    pub blob_url: String,
    pub digest: String,
    pub topic: Topic,
    #[serde(default)]
    pub format: PayloadFormat,
    pub original_ingest_report_id: ReportId,
}

/// Input to the receiver-filter stage: one (bundle, receiver) pair the
/// fan-out committed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverFilterMessage {
    pub report_id: ReportId,
    pub blob_url: String,
    pub digest: String,
    pub topic: Topic,
    #[serde(default)]
    pub format: PayloadFormat,
    pub original_ingest_report_id: ReportId,
    pub receiver_full_name: String,
}

/// Output of the receiver-filter stage, consumed by the downstream
/// translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateMessage {
    pub report_id: ReportId,
    pub blob_url: String,
    pub digest: String,
    pub topic: Topic,
    #[serde(default)]
    pub format: PayloadFormat,
    pub original_ingest_report_id: ReportId,
    pub receiver_full_name: String,
}
