//! encryption module
//!
//! Provides AES-256-GCM encryption/decryption for API tokens at rest, plus
//! PBKDF2 password hashing/verification for the admin credential.
//!
//! The token cipher takes the 256-bit key directly (configured as 64 hex
//! characters); no key derivation step is involved. The password hash path
//! uses the PHC string format so stored hashes are self-describing.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use pbkdf2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Pbkdf2,
};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};
use crate::types::EncryptedToken;

const NONCE_LENGTH: usize = 12;
const KEY_LENGTH: usize = 32; // AES-256

/// PHC prefix produced by `hash_password`
const PHC_PREFIX: &str = "$pbkdf2";

/// Parse a 64-hex-character string into a 256-bit key.
///
/// Returns `None` if the string has the wrong length or is not valid hex;
/// callers treat that as "encryption disabled".
#[must_use]
pub fn parse_key(hex_key: &str) -> Option<[u8; KEY_LENGTH]> {
    if hex_key.len() != KEY_LENGTH * 2 {
        return None;
    }
    let bytes = hex::decode(hex_key).ok()?;
    let mut key = [0u8; KEY_LENGTH];
    key.copy_from_slice(&bytes);
    Some(key)
}

/// Encrypt a token for storage.
///
/// # Arguments
/// * `plaintext` - clear token value
/// * `key` - 256-bit encryption key
///
/// # Returns
/// Returns an `EncryptedToken` holding base64 ciphertext and nonce.
pub fn encrypt_token(plaintext: &str, key: &[u8; KEY_LENGTH]) -> CoreResult<EncryptedToken> {
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    rand::rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CoreError::CredentialError(format!("Failed to create cipher: {e}")))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| CoreError::CredentialError(format!("Encryption failed: {e}")))?;

    Ok(EncryptedToken {
        ciphertext: BASE64.encode(ciphertext),
        nonce: BASE64.encode(nonce_bytes),
    })
}

/// Decrypt a stored token.
///
/// # Arguments
/// * `encrypted` - base64 ciphertext + nonce as persisted
/// * `key` - 256-bit encryption key
///
/// # Returns
/// Returns the clear token value.
pub fn decrypt_token(encrypted: &EncryptedToken, key: &[u8; KEY_LENGTH]) -> CoreResult<String> {
    let nonce_bytes = BASE64
        .decode(&encrypted.nonce)
        .map_err(|e| CoreError::CredentialError(format!("Invalid nonce: {e}")))?;
    let ciphertext = BASE64
        .decode(&encrypted.ciphertext)
        .map_err(|e| CoreError::CredentialError(format!("Invalid ciphertext: {e}")))?;

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CoreError::CredentialError(format!("Failed to create cipher: {e}")))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext = cipher.decrypt(nonce, ciphertext.as_ref()).map_err(|_| {
        CoreError::CredentialError("Decryption failed: invalid key or corrupted data".to_string())
    })?;

    String::from_utf8(plaintext)
        .map_err(|e| CoreError::CredentialError(format!("Invalid UTF-8: {e}")))
}

/// Hash a password with PBKDF2-SHA256 and a random salt.
///
/// Output is a PHC string (`$pbkdf2-sha256$...`) recognized by `is_hashed`.
pub fn hash_password(password: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Pbkdf2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CoreError::CredentialError(format!("Hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Whether a stored credential value is a PHC hash (as opposed to legacy plaintext).
#[must_use]
pub fn is_hashed(value: &str) -> bool {
    value.starts_with(PHC_PREFIX)
}

/// Verify a password against a stored credential value.
///
/// Hashed values go through PBKDF2 verification. Legacy plaintext values are
/// compared in constant time; callers are responsible for re-saving such
/// values as a hash after a successful verification.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    if is_hashed(stored) {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        constant_time_eq(password, stored)
    }
}

/// Compare two strings without leaking length-position timing information.
///
/// Both inputs are digested first so the comparison always runs over
/// fixed-length values.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let da = Sha256::digest(a.as_bytes());
    let db = Sha256::digest(b.as_bytes());
    da.iter().zip(db.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
