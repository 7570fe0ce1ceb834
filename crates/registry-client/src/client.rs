//! HTTP client for the external device registry (spec §4.6 / §6).
//!
//! A transport-level failure (network error, or a non-2xx with no
//! parseable error envelope) never becomes a `Result::Err` from the
//! per-record methods here: it surfaces as [`RegistryOutcome::Transport`]
//! so the sync worker can retry it on its next tick exactly like any other
//! pending record. Only client construction (a bad headers file, a client
//! that cannot be built) returns an `Err`.

use std::fs;
use std::path::Path;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;

use tracing::warn;

use crate::error::RegistryClientError;
use crate::outcome::{status_for_code, RegistryOutcome};
use crate::types::{
    BatchRegisterDeviceBody, BatchRegisterDeviceReply, RegisterDeviceBody, RegisterDeviceReply, RegistryRecord, WireRecord,
};

/// The surface the sync worker drives: pushing one or many records and
/// getting back per-record outcomes. Exists so the worker can be tested
/// against a fake without a real HTTP endpoint.
#[async_trait::async_trait]
pub trait RegistryPush: Send + Sync {
    /// Submit one record.
    async fn register_device(&self, record: &RegistryRecord) -> RegistryOutcome;

    /// Submit many records in one request.
    async fn batch_register_device(&self, records: &[RegistryRecord]) -> Vec<RegistryOutcome>;
}

/// A registry client bound to one pair of endpoints and one fixed set of
/// custom headers, loaded once at construction (spec §4.6: "custom headers
/// (loaded from a file once) are attached to every request").
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    register_url: String,
    batch_register_url: String,
}

impl RegistryClient {
    /// Build a client against the given endpoints, optionally loading
    /// extra headers from a `name: value`-per-line file.
    pub fn new(register_url: impl Into<String>, batch_register_url: impl Into<String>, headers_file: Option<&Path>) -> Result<Self, RegistryClientError> {
        let headers = match headers_file {
            Some(path) => load_headers(path)?,
            None => HeaderMap::new(),
        };
        let http = reqwest::Client::builder().default_headers(headers).build().map_err(RegistryClientError::ClientBuild)?;
        Ok(Self { http, register_url: register_url.into(), batch_register_url: batch_register_url.into() })
    }

    /// Submit one record. Never fails: every outcome, including transport
    /// failure, is reported through [`RegistryOutcome`].
    pub async fn register_device(&self, record: &RegistryRecord) -> RegistryOutcome {
        let body = RegisterDeviceBody { record: WireRecord::from(record) };
        let response = match self.http.post(&self.register_url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(device_id = %record.device_id, error = %err, "registry register_device transport failure");
                return RegistryOutcome::Transport { device_id: record.device_id.clone(), message: err.to_string() };
            }
        };
        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return RegistryOutcome::Transport { device_id: record.device_id.clone(), message: err.to_string() },
        };
        classify_register_reply(&record.device_id, status, &bytes)
    }

    /// Submit a batch in one request. On transport failure every record in
    /// the batch is reported as [`RegistryOutcome::Transport`]; otherwise
    /// each entry in the reply is matched back to its input record by
    /// `device_id`, and any input record the reply is silent about is
    /// itself treated as a transport failure (the registry owes one
    /// response per request).
    pub async fn batch_register_device(&self, records: &[RegistryRecord]) -> Vec<RegistryOutcome> {
        let body = BatchRegisterDeviceBody { requests: records.iter().map(WireRecord::from).collect() };
        let response = match self.http.post(&self.batch_register_url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                let message = err.to_string();
                return records.iter().map(|r| RegistryOutcome::Transport { device_id: r.device_id.clone(), message: message.clone() }).collect();
            }
        };
        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                let message = err.to_string();
                return records.iter().map(|r| RegistryOutcome::Transport { device_id: r.device_id.clone(), message: message.clone() }).collect();
            }
        };

        let parsed: Option<BatchRegisterDeviceReply> = serde_json::from_slice(&bytes).ok();
        let Some(parsed) = parsed else {
            let message = format!("unexpected status {status} with unparseable batch body");
            return records.iter().map(|r| RegistryOutcome::Transport { device_id: r.device_id.clone(), message: message.clone() }).collect();
        };

        records
            .iter()
            .map(|record| {
                match parsed.responses.iter().find(|entry| entry.device_id == record.device_id) {
                    Some(entry) => match &entry.error {
                        Some(err) => RegistryOutcome::Rejected { device_id: record.device_id.clone(), status: status_for_code(&err.code), message: err.message.clone() },
                        None => RegistryOutcome::Accepted { device_id: record.device_id.clone() },
                    },
                    None => RegistryOutcome::Transport { device_id: record.device_id.clone(), message: "registry reply omitted this device_id".to_string() },
                }
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl RegistryPush for RegistryClient {
    async fn register_device(&self, record: &RegistryRecord) -> RegistryOutcome {
        RegistryClient::register_device(self, record).await
    }

    async fn batch_register_device(&self, records: &[RegistryRecord]) -> Vec<RegistryOutcome> {
        RegistryClient::batch_register_device(self, records).await
    }
}

fn classify_register_reply(device_id: &str, http_status: StatusCode, body: &[u8]) -> RegistryOutcome {
    let parsed: Option<RegisterDeviceReply> = serde_json::from_slice(body).ok();
    match parsed.and_then(|reply| reply.error) {
        Some(err) => RegistryOutcome::Rejected { device_id: device_id.to_string(), status: status_for_code(&err.code), message: err.message },
        None if http_status.is_success() => RegistryOutcome::Accepted { device_id: device_id.to_string() },
        None => RegistryOutcome::Transport { device_id: device_id.to_string(), message: format!("unexpected status {http_status} with unparseable body") },
    }
}

fn load_headers(path: &Path) -> Result<HeaderMap, RegistryClientError> {
    let contents = fs::read_to_string(path).map_err(|source| RegistryClientError::HeadersFile { path: path.display().to_string(), source })?;
    let mut headers = HeaderMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| RegistryClientError::MalformedHeaderLine(line.to_string()))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| RegistryClientError::MalformedHeaderLine(line.to_string()))?;
        let value = HeaderValue::from_str(value.trim()).map_err(|_| RegistryClientError::MalformedHeaderLine(line.to_string()))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(device_id: &str) -> RegistryRecord {
        RegistryRecord {
            device_id: device_id.to_string(),
            sku: "sival".to_string(),
            version: 1,
            data: vec![1, 2, 3],
            auth_pubkey: vec![4, 5, 6],
            auth_signature: vec![7, 8, 9],
        }
    }

    #[test]
    fn load_headers_parses_name_value_lines_and_skips_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headers.txt");
        fs::write(&path, "X-Api-Key: secret123\n\nX-Tenant: sival\n").unwrap();
        let headers = load_headers(&path).unwrap();
        assert_eq!(headers.get("x-api-key").unwrap(), "secret123");
        assert_eq!(headers.get("x-tenant").unwrap(), "sival");
    }

    #[test]
    fn load_headers_rejects_line_without_colon() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headers.txt");
        fs::write(&path, "not-a-header-line\n").unwrap();
        assert!(matches!(load_headers(&path), Err(RegistryClientError::MalformedHeaderLine(_))));
    }

    #[test]
    fn classify_register_reply_treats_2xx_with_no_body_as_accepted() {
        let outcome = classify_register_reply("dev-1", StatusCode::OK, b"");
        assert!(outcome.is_accepted());
    }

    #[test]
    fn classify_register_reply_maps_error_envelope_to_rejected() {
        let body = br#"{"error":{"code":"INVALID_ARGUMENT","message":"bad sku"}}"#;
        let outcome = classify_register_reply("dev-1", StatusCode::BAD_REQUEST, body);
        match outcome {
            RegistryOutcome::Rejected { status, .. } => assert_eq!(status, crate::outcome::RejectedStatus::InvalidArgument),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn classify_register_reply_treats_unparseable_non_2xx_as_transport() {
        let outcome = classify_register_reply("dev-1", StatusCode::BAD_GATEWAY, b"<html>502</html>");
        assert!(matches!(outcome, RegistryOutcome::Transport { .. }));
    }

    #[test]
    fn record_helper_round_trips_device_id() {
        let r = record("0x0001000200000000000000030000000400000000");
        assert_eq!(r.device_id, "0x0001000200000000000000030000000400000000");
    }
}
