//! Single-use tokens for the email verification and password reset links.

use anyhow::Context;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What a single-use token may be redeemed for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    VerifyEmail,
    ResetPassword,
}

impl TokenPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenPurpose::VerifyEmail => "verify_email",
            TokenPurpose::ResetPassword => "reset_password",
        }
    }
}

/// Source of raw token values.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> anyhow::Result<String>;
}

/// 32 bytes from the OS CSPRNG, base64url without padding.
#[derive(Default, Clone, Copy)]
pub struct OsRngTokens;

impl TokenGenerator for OsRngTokens {
    fn generate(&self) -> anyhow::Result<String> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate token")?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }
}

/// Only the hash is persisted; the raw value lives in the emailed link.
pub fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
