//! Password hashing and verification.
//!
//! Plaintext passwords only ever pass through [`CredentialService::hash`] and
//! [`CredentialService::verify`]; they are never stored or logged.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use thiserror::Error;

// Upper bound on accepted plaintext length in characters. Input schemas reject
// longer passwords before they get here.
pub const MAX_PASSWORD_LENGTH: usize = 512;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("the password provided was too long")]
    TooLong,
    #[error("failed to hash password")]
    Hash(#[source] password_hash::Error),
    #[error("stored password hash is malformed")]
    MalformedHash(#[source] password_hash::Error),
}

/// CredentialService
///
/// The credential-verification collaborator: `hash(plaintext) -> digest` and
/// `verify(plaintext, digest) -> bool`. Both are CPU-bound and synchronous;
/// callers run them on the blocking pool.
pub trait CredentialService: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, CredentialError>;
    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, CredentialError>;
}

/// Argon2Credentials
///
/// Argon2id with the crate's default parameters, PHC-formatted digests and a
/// random salt per hash.
#[derive(Clone, Default)]
pub struct Argon2Credentials {
    argon2: Argon2<'static>,
}

impl Argon2Credentials {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialService for Argon2Credentials {
    fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        if plaintext.chars().count() > MAX_PASSWORD_LENGTH {
            return Err(CredentialError::TooLong);
        }
        let salt = SaltString::generate(&mut rand::thread_rng());
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(CredentialError::Hash)
    }

    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, CredentialError> {
        if plaintext.chars().count() > MAX_PASSWORD_LENGTH {
            return Ok(false);
        }
        let parsed = PasswordHash::new(digest).map_err(CredentialError::MalformedHash)?;
        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::MalformedHash(e)),
        }
    }
}

/// CredentialState
///
/// Shared handle to the credential collaborator held in `AppState`.
pub type CredentialState = Arc<dyn CredentialService>;
