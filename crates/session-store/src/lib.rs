//! The process-wide `user_id -> Session` store (spec §3 "Session", §9
//! "Global session store").
//!
//! Constructed once at PA startup as a `Mutex`-protected map; spec §9
//! forbids runtime reinitialization, so this type is built once and shared
//! behind an `Arc` rather than exposing any "reset" operation.
#![warn(missing_docs)]

use otprov_core::token;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

/// One authenticated ATE session (spec §3 "Session").
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub session_token: String,
    pub sku: String,
    /// Method names this session may invoke; order is preserved from
    /// `SPM.InitSession`'s response but lookups are order-independent.
    pub allowed_methods: Vec<String>,
    pub created_at: SystemTime,
}

impl Session {
    /// Whether `rpc_method` is permitted for this session (spec §4.4 step
    /// 5: "method name must end with one of the allowed method strings").
    pub fn authorizes(&self, rpc_method: &str) -> bool {
        self.allowed_methods.iter().any(|allowed| rpc_method.ends_with(allowed.as_str()))
    }
}

/// Outcome of authorizing one PA RPC against the session store (spec §4.4
/// steps 3-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzFailure {
    /// No session registered for the derived `user_id`.
    SessionNotFound,
    /// A session exists but the supplied token doesn't match it.
    TokenMismatch,
    /// The session exists and the token matches, but the method isn't in
    /// `allowed_methods`.
    MethodNotAllowed,
}

/// The process-wide session store.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    /// Construct an empty store. Call once at PA startup.
    pub fn new() -> Self {
        Self { sessions: Mutex::new(HashMap::new()) }
    }

    /// Register a new session for `user_id`, generating a fresh token.
    /// Any session already registered for `user_id` is replaced (spec §4.4:
    /// "If `user_id` is already present it is removed first").
    pub fn init_session(&self, user_id: String, sku: String, allowed_methods: Vec<String>) -> Session {
        let session = Session {
            user_id: user_id.clone(),
            session_token: token::random_token(token::SESSION_TOKEN_LEN),
            sku,
            allowed_methods,
            created_at: SystemTime::now(),
        };
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.remove(&user_id).is_some() {
            tracing::debug!(%user_id, "implicit close of prior session on re-init");
        }
        sessions.insert(user_id, session.clone());
        session
    }

    /// Remove the session for `user_id`. Idempotent: removing an
    /// unknown/already-closed session is not an error (spec SPEC_FULL.md
    /// §2 "CloseSession").
    pub fn close_session(&self, user_id: &str) {
        self.sessions.lock().unwrap().remove(user_id);
    }

    /// Authorize an RPC call: look up `user_id`, compare `token`, then
    /// check `rpc_method` against `allowed_methods` (spec §4.4 steps 3-5).
    pub fn authorize(&self, user_id: &str, token: &str, rpc_method: &str) -> Result<Session, AuthzFailure> {
        let sessions = self.sessions.lock().unwrap();
        let session = sessions.get(user_id).ok_or(AuthzFailure::SessionNotFound)?;
        if session.session_token != token {
            return Err(AuthzFailure::TokenMismatch);
        }
        if !session.authorizes(rpc_method) {
            return Err(AuthzFailure::MethodNotAllowed);
        }
        Ok(session.clone())
    }

    /// Number of currently active sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Whether there are no active sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
