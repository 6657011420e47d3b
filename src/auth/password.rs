use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// One-way password hashing scheme used by the auth flow.
pub trait PasswordScheme: Send + Sync {
    fn hash(&self, plain: &str) -> anyhow::Result<String>;
    /// `Ok(false)` on mismatch, `Err` only when the stored hash is unusable.
    fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool>;
}

#[derive(Default, Clone)]
pub struct Argon2Scheme {
    argon2: Argon2<'static>,
}

impl PasswordScheme for Argon2Scheme {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self
            .argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }
}
