//! Random token generation shared by session tokens and test fixtures
//! (spec §3 `Session.session_token`).

use rand::Rng;

/// The 62-character alphabet session tokens are drawn from: `[A-Za-z0-9]`.
pub const TOKEN_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of a session token, in characters (spec §3, §4.3).
pub const SESSION_TOKEN_LEN: usize = 32;

/// Draw a uniformly random token of `len` characters from [`TOKEN_ALPHABET`].
pub fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// Whether `token` satisfies the session-token shape invariant: exactly
/// [`SESSION_TOKEN_LEN`] characters, each drawn from [`TOKEN_ALPHABET`].
pub fn is_well_formed_session_token(token: &str) -> bool {
    token.len() == SESSION_TOKEN_LEN
        && token.bytes().all(|b| TOKEN_ALPHABET.contains(&b))
}
