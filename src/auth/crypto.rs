//! Password hashing and secret comparison.

use argon2::{
    password_hash::{PasswordHashString, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Hashes a secret using Argon2 with a random salt.
pub fn hash_secret(secret: &SecretString) -> eyre::Result<PasswordHashString> {
    let salt = SaltString::generate(&mut rand::thread_rng());

    Ok(Argon2::default()
        .hash_password(secret.expose_secret().as_bytes(), salt.as_salt())?
        .serialize())
}

/// Verifies a secret against its Argon2 hash.
pub fn verify_secret(secret: &SecretString, hash: &str) -> eyre::Result<()> {
    let hash = PasswordHashString::new(hash).map_err(|e| eyre::eyre!(e))?;

    Ok(Argon2::default().verify_password(secret.expose_secret().as_bytes(), &hash.password_hash())?)
}

/// Constant-time equality for shared secrets of any length.
///
/// Both sides are hashed first so the comparison does not leak the length
/// of the expected secret.
pub fn secrets_match(presented: &str, expected: &SecretString) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.expose_secret().as_bytes());

    presented.ct_eq(&expected).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_roundtrip() {
        let secret = SecretString::from("correct horse battery staple");
        let hash = hash_secret(&secret).unwrap();

        assert!(verify_secret(&secret, hash.as_str()).is_ok());
        assert!(verify_secret(&SecretString::from("wrong"), hash.as_str()).is_err());
    }

    #[test]
    fn test_secrets_match() {
        let expected = SecretString::from("cron-secret");

        assert!(secrets_match("cron-secret", &expected));
        assert!(!secrets_match("cron-secre", &expected));
        assert!(!secrets_match("", &expected));
    }
}
