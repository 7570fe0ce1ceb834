//! Caller identification and the authorization interceptor (spec §4.4).
//!
//! Every unary RPC other than `InitSession`/`CloseSession` runs
//! [`authorize`] before doing any work. It is invoked explicitly at the top
//! of each handler (passing that handler's own RPC name) rather than
//! wired up as a `tonic::service::Interceptor`, since an interceptor only
//! sees a type-erased `Request<()>` and would have no reliable way back to
//! the RPC name without re-deriving it from the HTTP path.

use otprov_session_store::{AuthzFailure, Session, SessionStore};
use sha2::{Digest, Sha256};
use tonic::{Request, Status};

/// Header ATE clients present their session token under (spec §6: "Each
/// RPC carries `authorization` metadata equal to the session token").
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Header a non-TLS caller presents its claimed identity under, when
/// transport authentication isn't available to derive one (spec §3:
/// "`user_id` is derived from the transport (TLS peer subject) when TLS is
/// on, from a caller-supplied header otherwise").
pub const USER_ID_HEADER: &str = "x-otprov-user-id";

/// Derive the caller's `user_id`: the hex-encoded SHA-256 fingerprint of
/// the client's leaf TLS certificate when mTLS is in effect, or the
/// `x-otprov-user-id` metadata value otherwise.
pub fn derive_user_id<T>(request: &Request<T>, tls_enabled: bool) -> Result<String, Status> {
    if tls_enabled {
        let peer_certs = request
            .extensions()
            .get::<tonic::transport::server::TlsConnectInfo<tonic::transport::server::TcpConnectInfo>>()
            .and_then(|info| info.peer_certs())
            .ok_or_else(|| Status::unauthenticated("mutually-authenticated TLS is required"))?;
        let leaf = peer_certs.first().ok_or_else(|| Status::unauthenticated("no peer certificate presented"))?;
        let mut hasher = Sha256::new();
        hasher.update(leaf.as_ref());
        return Ok(hex::encode(hasher.finalize()));
    }

    request
        .metadata()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| Status::unauthenticated(format!("missing {USER_ID_HEADER} metadata")))
}

/// Run the spec §4.4 authorization check for one RPC call and return the
/// authorized [`Session`].
///
/// Steps (spec §4.4):
/// 1. Transport authentication, handled by [`derive_user_id`] when
///    `tls_enabled`.
/// 2. `authorization` metadata must be present.
/// 3-4. A session must exist for the derived `user_id` and its token must
///    exactly match.
/// 5. `rpc_method` must be allowed for that session.
pub fn authorize<T>(sessions: &SessionStore, request: &Request<T>, rpc_method: &str, tls_enabled: bool) -> Result<Session, Status> {
    let user_id = derive_user_id(request, tls_enabled)?;
    let token = request
        .metadata()
        .get(AUTHORIZATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Status::unauthenticated(format!("missing {AUTHORIZATION_HEADER} metadata")))?;

    sessions.authorize(&user_id, token, rpc_method).map_err(|failure| match failure {
        AuthzFailure::SessionNotFound | AuthzFailure::TokenMismatch => Status::not_found("no matching session"),
        AuthzFailure::MethodNotAllowed => Status::permission_denied("method not permitted for this session"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_headers(headers: &[(&str, &str)]) -> Request<()> {
        let mut request = Request::new(());
        for (name, value) in headers {
            request.metadata_mut().insert(*name, value.parse().unwrap());
        }
        request
    }

    #[test]
    fn derive_user_id_without_tls_reads_custom_header() {
        let request = request_with_headers(&[(USER_ID_HEADER, "ate-1")]);
        assert_eq!(derive_user_id(&request, false).unwrap(), "ate-1");
    }

    #[test]
    fn derive_user_id_without_tls_and_no_header_is_unauthenticated() {
        let request = request_with_headers(&[]);
        let err = derive_user_id(&request, false).unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn authorize_missing_authorization_header_is_unauthenticated() {
        let sessions = SessionStore::new();
        sessions.init_session("ate-1".into(), "sival".into(), vec!["DeriveTokens".into()]);
        let request = request_with_headers(&[(USER_ID_HEADER, "ate-1")]);
        let err = authorize(&sessions, &request, "/otprov.pa.Pa/DeriveTokens", false).unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn authorize_wrong_token_is_not_found() {
        let sessions = SessionStore::new();
        sessions.init_session("ate-1".into(), "sival".into(), vec!["DeriveTokens".into()]);
        let request = request_with_headers(&[(USER_ID_HEADER, "ate-1"), (AUTHORIZATION_HEADER, "wrong")]);
        let err = authorize(&sessions, &request, "/otprov.pa.Pa/DeriveTokens", false).unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);
    }

    #[test]
    fn authorize_disallowed_method_is_permission_denied() {
        let sessions = SessionStore::new();
        let session = sessions.init_session("ate-1".into(), "sival".into(), vec!["DeriveTokens".into()]);
        let request = request_with_headers(&[(USER_ID_HEADER, "ate-1"), (AUTHORIZATION_HEADER, &session.session_token)]);
        let err = authorize(&sessions, &request, "/otprov.pa.Pa/EndorseCerts", false).unwrap_err();
        assert_eq!(err.code(), tonic::Code::PermissionDenied);
    }

    #[test]
    fn authorize_succeeds_for_matching_token_and_allowed_method() {
        let sessions = SessionStore::new();
        let session = sessions.init_session("ate-1".into(), "sival".into(), vec!["DeriveTokens".into()]);
        let request = request_with_headers(&[(USER_ID_HEADER, "ate-1"), (AUTHORIZATION_HEADER, &session.session_token)]);
        let authorized = authorize(&sessions, &request, "/otprov.pa.Pa/DeriveTokens", false).unwrap();
        assert_eq!(authorized.user_id, "ate-1");
    }
}
