use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;

/// Random bytes behind a token; 24 bytes encode to exactly 32 characters.
const TOKEN_BYTES: usize = 24;
pub const TOKEN_LEN: usize = 32;

const MAX_TOKEN_LEN: usize = 128;
const MAX_SESSION_LEN: usize = 64;

/// Mint a new document token from the OS random source.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Check the token shape before it is turned into a file name.
///
/// Accepts URL-safe base64 with optional trailing padding, which rules out
/// path separators and dots.
pub fn is_well_formed(token: &str) -> bool {
    if token.len() > MAX_TOKEN_LEN {
        return false;
    }
    let body = token.trim_end_matches('=');
    !body.is_empty() && body.chars().all(is_url_safe)
}

pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Client supplied session ids are only used as map keys, but keep them short
/// and printable since they end up in logs.
pub fn is_valid_session_id(session: &str) -> bool {
    !session.is_empty() && session.len() <= MAX_SESSION_LEN && session.chars().all(is_url_safe)
}

fn is_url_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}
