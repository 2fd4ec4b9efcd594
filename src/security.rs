use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

/// Static keys are 32 random bytes rendered as lowercase hex.
pub const API_KEY_BYTES: usize = 32;

/// Hash a password into an Argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

/// False for a wrong password and for an unparsable hash.
pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

pub fn generate_api_key() -> Result<String> {
    let mut bytes = [0u8; API_KEY_BYTES];
    getrandom::getrandom(&mut bytes).map_err(|e| anyhow!(e.to_string()))?;
    let mut key = String::with_capacity(API_KEY_BYTES * 2);
    use std::fmt::Write as _;
    for b in &bytes { let _ = write!(&mut key, "{:02x}", b); }
    Ok(key)
}
