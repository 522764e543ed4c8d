//! Password Hashing and Verification
//!
//! NIST SP 800-63B compliant password handling with:
//! - Argon2id hashing (memory-hard, recommended by OWASP)
//! - Zeroization of sensitive data
//! - Constant-time comparison
//!
//! ## Security Features
//! - Memory-hard hashing prevents GPU/ASIC attacks
//! - Zeroization prevents memory inspection attacks
//! - Pepper support for additional security layer

use std::fmt;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Constants (NIST SP 800-63B compliant)
// ============================================================================

/// Minimum password length (NIST: SHALL be at least 8)
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (NIST: SHOULD permit at least 64)
pub const MAX_PASSWORD_LENGTH: usize = 128;

// ============================================================================
// Error Types
// ============================================================================

/// Password policy violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    /// Password is too short
    #[error("Password must be at least {min} characters (got {actual})")]
    TooShort { min: usize, actual: usize },

    /// Password is too long
    #[error("Password must be at most {max} characters (got {actual})")]
    TooLong { max: usize, actual: usize },

    /// Password contains only whitespace
    #[error("Password cannot be empty or contain only whitespace")]
    EmptyOrWhitespace,

    /// Password contains invalid characters (control characters)
    #[error("Password contains invalid control characters")]
    InvalidCharacter,
}

/// Password hashing/verification errors
#[derive(Debug, Error)]
pub enum PasswordHashError {
    /// Hashing operation failed
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    /// Invalid hash format
    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password with automatic memory zeroization
///
/// This type ensures that password data is securely erased from memory
/// when the value is dropped, preventing memory inspection attacks.
///
/// ## Security
/// - Implements `Zeroize` and `ZeroizeOnDrop`
/// - Does not implement `Clone` to prevent accidental copies
/// - Debug output is redacted
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Create a new clear text password with validation
    ///
    /// Validates against NIST SP 800-63B requirements:
    /// - Minimum 8 characters
    /// - Maximum 128 characters
    /// - No control characters
    /// - Not empty/whitespace only
    ///
    /// Unicode is normalized using NFKC before validation.
    pub fn new(raw: String) -> Result<Self, PasswordPolicyError> {
        // NIST: Unicode NFKC normalization before processing
        let normalized: String = raw.nfkc().collect();

        let trimmed = normalized.trim();
        if trimmed.is_empty() {
            return Err(PasswordPolicyError::EmptyOrWhitespace);
        }

        // NIST: count Unicode code points, not bytes
        let char_count = normalized.chars().count();

        if char_count < MIN_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: MIN_PASSWORD_LENGTH,
                actual: char_count,
            });
        }

        if char_count > MAX_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooLong {
                max: MAX_PASSWORD_LENGTH,
                actual: char_count,
            });
        }

        // Control characters are rejected (except space, tab, newline)
        for ch in normalized.chars() {
            if ch.is_control() && ch != ' ' && ch != '\t' && ch != '\n' {
                return Err(PasswordPolicyError::InvalidCharacter);
            }
        }

        Ok(Self(normalized))
    }

    /// Create without validation (for trusted input such as bootstrap
    /// credentials from configuration). Still NFKC-normalized so hashes
    /// and verification candidates agree on the byte representation.
    pub fn new_unchecked(raw: String) -> Self {
        Self(raw.nfkc().collect())
    }

    /// Get the password as bytes for hashing
    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Hash the password using Argon2id
    ///
    /// ## Arguments
    /// * `pepper` - Optional application-wide secret for additional security
    ///
    /// ## Returns
    /// PHC-formatted hash string wrapped in `HashedPassword`
    pub fn hash(&self, pepper: Option<&[u8]>) -> Result<HashedPassword, PasswordHashError> {
        let password_bytes = match pepper {
            Some(p) => {
                let mut combined = self.as_bytes().to_vec();
                combined.extend_from_slice(p);
                combined
            }
            None => self.as_bytes().to_vec(),
        };

        // Random 128-bit salt
        let salt = SaltString::generate(OsRng);

        // OWASP recommended Argon2id parameters:
        // m=19456 (19 MiB), t=2, p=1
        let argon2 = Argon2::default();

        let hash = argon2
            .hash_password(&password_bytes, &salt)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

        Ok(HashedPassword {
            hash: hash.to_string(),
        })
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Hashed Password (Safe to store)
// ============================================================================

/// Hashed password in PHC string format
///
/// This type stores the Argon2id hash in PHC format, which includes:
/// - Algorithm identifier
/// - Version
/// - Parameters (memory, iterations, parallelism)
/// - Salt
/// - Hash
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    /// Create from PHC string (e.g., from database)
    pub fn from_phc_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let hash = s.into();

        // Validate it's a valid PHC string
        PasswordHash::new(&hash).map_err(|_| PasswordHashError::InvalidHashFormat)?;

        Ok(Self { hash })
    }

    /// Get the PHC string for storage
    pub fn as_phc_string(&self) -> &str {
        &self.hash
    }

    /// Verify a password against this hash
    ///
    /// Uses constant-time comparison to prevent timing attacks.
    ///
    /// ## Arguments
    /// * `password` - The clear text password to verify
    /// * `pepper` - Optional pepper (must match the one used during hashing)
    pub fn verify(&self, password: &ClearTextPassword, pepper: Option<&[u8]>) -> bool {
        let password_bytes = match pepper {
            Some(p) => {
                let mut combined = password.as_bytes().to_vec();
                combined.extend_from_slice(p);
                combined
            }
            None => password.as_bytes().to_vec(),
        };

        let parsed_hash = match PasswordHash::new(&self.hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        let argon2 = Argon2::default();

        // Argon2 uses constant-time comparison internally
        argon2
            .verify_password(&password_bytes, &parsed_hash)
            .is_ok()
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_too_short() {
        let result = ClearTextPassword::new("short".to_string());
        assert!(matches!(result, Err(PasswordPolicyError::TooShort { .. })));
    }

    #[test]
    fn test_password_too_long() {
        let long_password = "a".repeat(MAX_PASSWORD_LENGTH + 1);
        let result = ClearTextPassword::new(long_password);
        assert!(matches!(result, Err(PasswordPolicyError::TooLong { .. })));
    }

    #[test]
    fn test_password_empty() {
        let result = ClearTextPassword::new("".to_string());
        assert!(matches!(
            result,
            Err(PasswordPolicyError::EmptyOrWhitespace)
        ));
    }

    #[test]
    fn test_password_whitespace_only() {
        let result = ClearTextPassword::new("        ".to_string());
        assert!(matches!(
            result,
            Err(PasswordPolicyError::EmptyOrWhitespace)
        ));
    }

    #[test]
    fn test_valid_password() {
        let result = ClearTextPassword::new("MySecure#Pass2024!".to_string());
        assert!(result.is_ok());
    }

    #[test]
    fn test_unicode_password() {
        let result = ClearTextPassword::new("パスワード安全です!".to_string());
        assert!(result.is_ok());
    }

    #[test]
    fn test_hash_and_verify() {
        let password = ClearTextPassword::new_unchecked("TestPassword123!".to_string());
        let hashed = password.hash(None).unwrap();

        // Correct password should verify
        assert!(hashed.verify(&password, None));

        // Wrong password should not verify
        let wrong_password = ClearTextPassword::new_unchecked("WrongPassword123!".to_string());
        assert!(!hashed.verify(&wrong_password, None));
    }

    #[test]
    fn test_hash_with_pepper() {
        let password = ClearTextPassword::new_unchecked("TestPassword123!".to_string());
        let pepper = b"my_secret_pepper";
        let hashed = password.hash(Some(pepper)).unwrap();

        assert!(hashed.verify(&password, Some(pepper)));
        assert!(!hashed.verify(&password, None));
        assert!(!hashed.verify(&password, Some(b"wrong_pepper")));
    }

    #[test]
    fn test_phc_string_roundtrip() {
        let password = ClearTextPassword::new_unchecked("TestPassword123!".to_string());
        let hashed = password.hash(None).unwrap();

        let phc_string = hashed.as_phc_string().to_string();
        let restored = HashedPassword::from_phc_string(phc_string).unwrap();

        assert!(restored.verify(&password, None));
    }

    #[test]
    fn test_invalid_phc_string() {
        let result = HashedPassword::from_phc_string("not_a_valid_hash");
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redaction() {
        let password = ClearTextPassword::new_unchecked("secret".to_string());
        let debug_output = format!("{:?}", password);
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains("secret"));
    }
}
