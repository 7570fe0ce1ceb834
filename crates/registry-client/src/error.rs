//! Failure modes that prevent a registry call from producing any
//! [`crate::RegistryOutcome`] at all (as opposed to a per-record rejection,
//! which is itself an outcome).

use thiserror::Error;

/// Errors that abort a whole request before any per-record outcome can be
/// read back.
#[derive(Debug, Error)]
pub enum RegistryClientError {
    /// The headers file configured for this client could not be read or
    /// parsed.
    #[error("failed to load registry headers from {path}: {source}")]
    HeadersFile {
        /// Path that was configured.
        path: String,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },

    /// A header line in the headers file was not `name: value`.
    #[error("malformed header line: {0:?}")]
    MalformedHeaderLine(String),

    /// The registry's response body did not parse as the expected JSON
    /// shape.
    #[error("failed to decode registry response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Building the `reqwest::Client` itself failed (e.g. a bad header
    /// value, native TLS init failure).
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
}
