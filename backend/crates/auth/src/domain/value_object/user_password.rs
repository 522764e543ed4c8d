//! User Password Value Object
//!
//! Stored password hash, delegating policy and Argon2id work to the
//! platform crate.

use platform::password::{ClearTextPassword, HashedPassword};

use crate::error::{AuthError, AuthResult};

/// Hashed user password
#[derive(Debug, Clone)]
pub struct UserPassword {
    hashed: HashedPassword,
}

impl UserPassword {
    /// Hash a raw password, enforcing the password policy.
    pub fn from_raw(raw: String, pepper: Option<&[u8]>) -> AuthResult<Self> {
        let clear = ClearTextPassword::new(raw)?;
        Ok(Self {
            hashed: clear.hash(pepper)?,
        })
    }

    /// Hash a trusted raw password without policy checks (bootstrap
    /// credentials from configuration).
    pub fn from_raw_unchecked(raw: String, pepper: Option<&[u8]>) -> AuthResult<Self> {
        let clear = ClearTextPassword::new_unchecked(raw);
        Ok(Self {
            hashed: clear.hash(pepper)?,
        })
    }

    /// Wrap a PHC hash string loaded from the database.
    pub fn from_db(phc: impl Into<String>) -> AuthResult<Self> {
        HashedPassword::from_phc_string(phc)
            .map(|hashed| Self { hashed })
            .map_err(|_| AuthError::Internal("Invalid stored password hash".to_string()))
    }

    /// PHC string for storage
    pub fn as_str(&self) -> &str {
        self.hashed.as_phc_string()
    }

    /// Verify a candidate password.
    ///
    /// The candidate goes through the same NFKC normalization as hashing
    /// did, but deliberately not through the policy: stored hashes may
    /// predate the policy (bootstrap credentials).
    pub fn verify(&self, candidate: &str, pepper: Option<&[u8]>) -> bool {
        let clear = ClearTextPassword::new_unchecked(candidate.to_string());
        self.hashed.verify(&clear, pepper)
    }
}
