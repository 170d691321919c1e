use crate::application_port::*;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use tracing::warn;

/// Argon2id work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HasherParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HasherParams {
    fn default() -> Self {
        HasherParams {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

pub struct Argon2CredentialHasher {
    params: Params,
}

impl Argon2CredentialHasher {
    pub fn new(params: HasherParams) -> Result<Self, AuthError> {
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            None,
        )
        .map_err(|e| AuthError::Configuration(format!("argon2 params: {}", e)))?;
        Ok(Argon2CredentialHasher { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

#[async_trait::async_trait]
impl CredentialHasher for Argon2CredentialHasher {
    async fn hash(&self, secret: &str) -> Result<String, AuthError> {
        let salt = argon2::password_hash::SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| AuthError::DependencyUnavailable(format!("hash error: {}", e)))?
            .to_string();
        Ok(hash)
    }

    /// Params are read from the digest itself, so digests written under an
    /// older work factor keep verifying.
    async fn verify(&self, digest: &str, secret: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(digest).map_err(|e| {
            warn!(error = %e, "stored digest is not a PHC string");
            AuthError::InvalidToken
        })?;

        match self.argon2().verify_password(secret.as_bytes(), &parsed) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::DependencyUnavailable(format!(
                "verify error: {}",
                e
            ))),
        }
    }
}
