use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::constants::TOKEN_BYTES;
use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Passwords
// =============================================================================

/// Hash a password with Argon2id and a fresh random salt
///
/// The returned PHC string embeds the algorithm parameters and salt, so it is
/// all that needs to be stored.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

/// Check a password against a stored PHC string
///
/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Stored password hash is malformed: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// =============================================================================
// Bearer Tokens
// =============================================================================

/// Generate an opaque bearer token (hex encoded random bytes)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Keyed digest of a bearer token, as stored in `access_tokens`
///
/// A leaked token table cannot be replayed without the server secret.
pub fn digest_token(token: &str, secret: &str) -> String {
    // HMAC accepts keys of any length, so construction cannot fail
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts any key length"));
    mac.update(token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
