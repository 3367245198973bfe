use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

use crate::error::Error;

pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| Error::unexpected_error())?;

    Ok(hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, Error> {
    let parsed = PasswordHash::new(password_hash).map_err(|_| Error::unexpected_error())?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[test]
fn hashes_verify_only_the_original_password() {
    let hash = hash_password("correct horse").unwrap();

    assert!(verify_password("correct horse", &hash).unwrap());
    assert!(!verify_password("battery staple", &hash).unwrap());
    assert_ne!(hash, hash_password("correct horse").unwrap());
}
