//! Shared error taxonomy for the provisioning backend.
//!
//! Every service-level error in this workspace converges on [`ErrorKind`]
//! at the RPC boundary (spec §7). Library crates define their own
//! `thiserror` enums and convert into [`ProvisioningError`]; the server
//! binaries convert `ProvisioningError` into `tonic::Status` in one place.

use thiserror::Error;

/// Status-code analog carried by every provisioning error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Structural validation failure: unknown enum, over-size payload,
    /// malformed device id, missing SKU field.
    InvalidArgument,
    /// Missing/invalid session token, SKU auth mismatch, TLS peer mismatch.
    Unauthenticated,
    /// Authenticated caller invoking an RPC outside its allowed methods, or
    /// a WAS signature mismatch on `EndorseCerts`.
    PermissionDenied,
    /// Unknown SKU, missing key label, missing session, missing record.
    NotFound,
    /// Duplicate session add (resolved by implicit close, so this is only
    /// surfaced if a caller explicitly insists on strict semantics).
    AlreadyExists,
    /// HSM driver error, database failure, unexpected marshal error.
    Internal,
    /// Downstream service (SPM/PB) not reachable.
    Unavailable,
}

impl ErrorKind {
    /// The `tonic::Code` this kind maps to at the RPC boundary.
    pub fn code(self) -> tonic::Code {
        match self {
            ErrorKind::InvalidArgument => tonic::Code::InvalidArgument,
            ErrorKind::Unauthenticated => tonic::Code::Unauthenticated,
            ErrorKind::PermissionDenied => tonic::Code::PermissionDenied,
            ErrorKind::NotFound => tonic::Code::NotFound,
            ErrorKind::AlreadyExists => tonic::Code::AlreadyExists,
            ErrorKind::Internal => tonic::Code::Internal,
            ErrorKind::Unavailable => tonic::Code::Unavailable,
        }
    }
}

/// The error type every service-facing RPC handler returns internally,
/// before being converted to a [`tonic::Status`] at the transport edge.
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct ProvisioningError {
    /// Status-code analog.
    pub kind: ErrorKind,
    message: String,
}

impl ProvisioningError {
    /// Construct a new error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// `invalid_argument` shorthand.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// `unauthenticated` shorthand.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    /// `permission_denied` shorthand.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    /// `not_found` shorthand.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// `already_exists` shorthand.
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    /// `internal` shorthand.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// `unavailable` shorthand.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }
}

impl From<ProvisioningError> for tonic::Status {
    fn from(err: ProvisioningError) -> Self {
        tonic::Status::new(err.kind.code(), err.message.clone())
    }
}
