//! Argon2id credential hashing.
//!
//! Default cost follows the OWASP password storage sheet: m=19456 KiB, t=2, p=1.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use castellan_application::PasswordHasher as PasswordHasherPort;
use castellan_core::{AppError, AppResult};

const DEFAULT_MEMORY_KIB: u32 = 19_456;
const DEFAULT_ITERATIONS: u32 = 2;

/// Argon2id implementation of the credential hashing port.
#[derive(Clone)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    /// Creates a hasher with the default cost.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cost(DEFAULT_MEMORY_KIB, DEFAULT_ITERATIONS)
            .unwrap_or_else(|_| Self::from_params(Params::default()))
    }

    /// Creates a hasher with an explicit memory (KiB) and iteration cost.
    pub fn with_cost(memory_kib: u32, iterations: u32) -> AppResult<Self> {
        let params = Params::new(memory_kib, iterations, 1, None).map_err(|error| {
            AppError::Validation(format!("invalid argon2 parameters: {error}"))
        })?;

        Ok(Self::from_params(params))
    }

    fn from_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasherPort for Argon2PasswordHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|error| AppError::Internal(format!("failed to hash password: {error}")))?;

        Ok(hash.to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(hash).map_err(|error| {
            AppError::Internal(format!("failed to parse password hash: {error}"))
        })?;

        match self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
        {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(error) => Err(AppError::Internal(format!(
                "password verification failed: {error}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use castellan_application::PasswordHasher;
    use castellan_core::{AppError, AppResult};

    use super::Argon2PasswordHasher;

    #[test]
    fn hash_and_verify_correct_password() -> AppResult<()> {
        let hasher = Argon2PasswordHasher::with_cost(1024, 1)?;
        let hash = hasher.hash_password("my-secret-password")?;
        assert!(hasher.verify_password("my-secret-password", &hash)?);
        Ok(())
    }

    #[test]
    fn every_hash_gets_its_own_salt() -> AppResult<()> {
        let hasher = Argon2PasswordHasher::new();
        let first = hasher.hash_password("same-password")?;
        let second = hasher.hash_password("same-password")?;
        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        Ok(())
    }

    #[test]
    fn zero_iterations_are_rejected() {
        assert!(matches!(
            Argon2PasswordHasher::with_cost(1024, 0),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn malformed_hash_is_an_internal_error() {
        let hasher = Argon2PasswordHasher::new();
        assert!(matches!(
            hasher.verify_password("anything", "not-a-phc-string"),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn verify_wrong_password_returns_false() -> AppResult<()> {
        let hasher = Argon2PasswordHasher::with_cost(1024, 1)?;
        let hash = hasher.hash_password("correct-password")?;
        assert!(!hasher.verify_password("wrong-password", &hash)?);
        Ok(())
    }
}
