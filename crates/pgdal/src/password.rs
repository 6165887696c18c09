//! Salted password hashing.
//!
//! Stored credentials use PBKDF2-HMAC-SHA256 in the self-describing form
//! `pbkdf2-sha256$<iterations>$<salt-hex>$<hash-hex>`, so the iteration count
//! can be raised later without invalidating existing rows.

use crate::error::{OrmError, OrmResult};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "pbkdf2-sha256";
const KEY_LEN: usize = 32;
const SALT_LEN: usize = 16;

/// Hashing cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordConfig {
    pub iterations: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            iterations: 100_000,
        }
    }
}

impl PasswordConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }
}

/// Hash `plain` with a fresh salt and the default cost.
pub fn hash_password(plain: &str) -> OrmResult<String> {
    hash_password_with(plain, &PasswordConfig::default())
}

/// Hash `plain` with a fresh salt.
pub fn hash_password_with(plain: &str, config: &PasswordConfig) -> OrmResult<String> {
    if config.iterations == 0 {
        return Err(OrmError::Credential(
            "iteration count must be at least 1".to_string(),
        ));
    }
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let key = pbkdf2(plain.as_bytes(), &salt, config.iterations)?;
    Ok(format!(
        "{SCHEME}${}${}${}",
        config.iterations,
        hex::encode(salt),
        hex::encode(key)
    ))
}

/// Check `plain` against a stored credential.
///
/// A stored value that is not in the expected form is an
/// [`OrmError::Credential`] error, not a mismatch.
pub fn verify_password(plain: &str, stored: &str) -> OrmResult<bool> {
    let parsed = Stored::parse(stored)?;
    let key = pbkdf2(plain.as_bytes(), &parsed.salt, parsed.iterations)?;
    Ok(constant_time_eq(&key, &parsed.hash))
}

struct Stored {
    iterations: u32,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

impl Stored {
    fn parse(stored: &str) -> OrmResult<Self> {
        let malformed = |what: &str| OrmError::Credential(format!("stored credential: {what}"));

        let mut parts = stored.split('$');
        match parts.next() {
            Some(SCHEME) => {}
            _ => return Err(malformed("unknown scheme")),
        }
        let iterations = parts
            .next()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| malformed("bad iteration count"))?;
        let salt = parts
            .next()
            .and_then(|s| hex::decode(s).ok())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| malformed("bad salt"))?;
        let hash = parts
            .next()
            .and_then(|s| hex::decode(s).ok())
            .filter(|h| h.len() == KEY_LEN)
            .ok_or_else(|| malformed("bad hash"))?;
        if parts.next().is_some() {
            return Err(malformed("trailing fields"));
        }

        Ok(Self {
            iterations,
            salt,
            hash,
        })
    }
}

// PBKDF2 with a single output block (dkLen == hLen).
fn pbkdf2(password: &[u8], salt: &[u8], iterations: u32) -> OrmResult<[u8; KEY_LEN]> {
    let prf = HmacSha256::new_from_slice(password)
        .map_err(|e| OrmError::Credential(e.to_string()))?;

    let mut mac = prf.clone();
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut u = [0u8; KEY_LEN];
    u.copy_from_slice(&mac.finalize().into_bytes());
    let mut out = u;

    for _ in 1..iterations {
        let mut mac = prf.clone();
        mac.update(&u);
        u.copy_from_slice(&mac.finalize().into_bytes());
        for (o, x) in out.iter_mut().zip(u.iter()) {
            *o ^= x;
        }
    }
    Ok(out)
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> PasswordConfig {
        PasswordConfig::new().iterations(10)
    }

    #[test]
    fn pbkdf2_matches_rfc7914_vector() {
        // RFC 7914 section 11: P="passwd", S="salt", c=1, first 32 bytes.
        let key = pbkdf2(b"passwd", b"salt", 1).unwrap();
        assert_eq!(
            hex::encode(key),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn hash_then_verify() {
        let stored = hash_password_with("hunter2", &cheap()).unwrap();
        assert!(stored.starts_with("pbkdf2-sha256$10$"));
        assert!(verify_password("hunter2", &stored).unwrap());
        assert!(!verify_password("hunter3", &stored).unwrap());
    }

    #[test]
    fn salts_differ() {
        let a = hash_password_with("same", &cheap()).unwrap();
        let b = hash_password_with("same", &cheap()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn salt_is_full_width() {
        let stored = hash_password_with("x", &cheap()).unwrap();
        let salt = stored.split('$').nth(2).unwrap();
        assert_eq!(hex::decode(salt).unwrap().len(), SALT_LEN);
    }

    #[test]
    fn plain_text_stored_value_is_rejected() {
        let err = verify_password("secret", "secret").unwrap_err();
        assert!(matches!(err, OrmError::Credential(_)));
    }

    #[test]
    fn malformed_stored_values() {
        for bad in [
            "pbkdf2-sha256$0$00$00",
            "pbkdf2-sha256$10$zz$00",
            "pbkdf2-sha256$10$00$00",
            "bcrypt$10$00$00",
            "pbkdf2-sha256$10",
        ] {
            assert!(verify_password("x", bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn zero_iterations_refused() {
        assert!(hash_password_with("x", &PasswordConfig::new().iterations(0)).is_err());
    }
}
