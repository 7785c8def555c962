//! Password hashing, credential checks and session token helpers.

use crate::{models::User, storage::UserStore};
use anyhow::{Context, Result, anyhow};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

/// Hash a password into an Argon2id PHC string.
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_password(password: &SecretString) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

/// Check a password against a stored PHC string. Malformed hashes never match.
#[must_use]
pub fn verify_password(password: &SecretString, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.expose_secret().as_bytes(), &parsed)
        .is_ok()
}

/// Resolve a username/password pair into the matching user.
///
/// Returns `Ok(None)` when the user is unknown or the password is wrong.
///
/// # Errors
/// Returns an error if the user store fails.
#[instrument(skip(users, password))]
pub async fn authenticate(
    users: &dyn UserStore,
    username: &str,
    password: &SecretString,
) -> Result<Option<User>> {
    let Some(record) = users
        .find_user_by_username(username)
        .await
        .context("failed to look up user")?
    else {
        // Hash anyway so unknown usernames take about as long as wrong passwords.
        let _ = hash_password(password);
        debug!("unknown username");
        return Ok(None);
    };

    if verify_password(password, &record.password_hash) {
        Ok(Some(record.user))
    } else {
        debug!("password mismatch");
        Ok(None)
    }
}

/// Create a new session token for the session cookie.
/// The raw value is only returned to set the cookie; stores keep a hash.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values never touch the store.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
