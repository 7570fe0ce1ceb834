//! Wire shapes for the external registry's JSON contract (spec §6
//! "Registry HTTP").

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// A record as handed to the registry client by the sync worker.
#[derive(Debug, Clone)]
pub struct RegistryRecord {
    pub device_id: String,
    pub sku: String,
    pub version: u64,
    pub data: Vec<u8>,
    pub auth_pubkey: Vec<u8>,
    pub auth_signature: Vec<u8>,
}

/// The registry's `record` JSON shape: `{deviceId, sku, version, data,
/// authPubkey, authSignature}`, with binary fields base64-encoded.
#[derive(Debug, Serialize)]
pub(crate) struct WireRecord {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub sku: String,
    pub version: u64,
    pub data: String,
    #[serde(rename = "authPubkey")]
    pub auth_pubkey: String,
    #[serde(rename = "authSignature")]
    pub auth_signature: String,
}

impl From<&RegistryRecord> for WireRecord {
    fn from(record: &RegistryRecord) -> Self {
        Self {
            device_id: record.device_id.clone(),
            sku: record.sku.clone(),
            version: record.version,
            data: STANDARD.encode(&record.data),
            auth_pubkey: STANDARD.encode(&record.auth_pubkey),
            auth_signature: STANDARD.encode(&record.auth_signature),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterDeviceBody {
    pub record: WireRecord,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchRegisterDeviceBody {
    pub requests: Vec<WireRecord>,
}

/// `{error: {code, status, message}}`, present only on rejection.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub code: String,
    #[allow(dead_code)]
    pub status: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterDeviceReply {
    #[serde(rename = "deviceId")]
    #[allow(dead_code)]
    pub device_id: Option<String>,
    pub error: Option<ErrorEnvelope>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchRegisterDeviceReply {
    pub responses: Vec<BatchEntryReply>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchEntryReply {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub error: Option<ErrorEnvelope>,
}
