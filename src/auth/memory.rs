//! In-memory `CredentialStore` for exercising the auth flow without Postgres.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{CredentialStore, StoreError};
use super::repo_types::{NewToken, NewUser, Profile, User, UserPatch};
use super::tokens::TokenPurpose;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    tokens: HashMap<Vec<u8>, NewToken>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn token_count(&self) -> usize {
        self.inner.lock().unwrap().tokens.len()
    }

    pub fn set_superuser(&self, id: Uuid) {
        if let Some(u) = self.inner.lock().unwrap().users.get_mut(&id) {
            u.is_superuser = true;
        }
    }
}

impl Inner {
    fn put_token(&mut self, token: NewToken, now: OffsetDateTime) {
        self.tokens.retain(|_, t| {
            !(t.user_id == token.user_id && t.purpose == token.purpose) && t.expires_at > now
        });
        self.tokens.insert(token.token_hash.clone(), token);
    }

    fn take_token(&mut self, hash: &[u8], purpose: TokenPurpose, now: OffsetDateTime) -> Option<Uuid> {
        match self.tokens.get(hash) {
            Some(t) if t.purpose == purpose && t.expires_at > now => {
                self.tokens.remove(hash).map(|t| t.user_id)
            }
            _ => None,
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_user_with_token(&self, user: NewUser, token: NewToken) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: user.id,
            email: user.email,
            password_hash: user.password_hash,
            username: user.profile.username,
            phone: user.profile.phone,
            address: user.profile.address,
            city: user.profile.city,
            state: user.profile.state,
            postal_code: user.profile.postal_code,
            is_active: false,
            is_verified: false,
            is_superuser: user.is_superuser,
            is_oauth: false,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(created.id, created.clone());
        inner.put_token(token, now);
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().unwrap().users.get(&id).cloned())
    }

    async fn insert_token(&self, token: NewToken) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .put_token(token, OffsetDateTime::now_utc());
        Ok(())
    }

    async fn redeem_verification(&self, token_hash: &[u8], now: OffsetDateTime) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(user_id) = inner.take_token(token_hash, TokenPurpose::VerifyEmail, now) else {
            return Ok(None);
        };
        Ok(inner.users.get_mut(&user_id).map(|u| {
            u.is_verified = true;
            u.is_active = true;
            u.updated_at = now;
            u.clone()
        }))
    }

    async fn redeem_reset(
        &self,
        token_hash: &[u8],
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(user_id) = inner.take_token(token_hash, TokenPurpose::ResetPassword, now) else {
            return Ok(None);
        };
        Ok(inner.users.get_mut(&user_id).map(|u| {
            u.password_hash = password_hash.to_string();
            u.updated_at = now;
            u.clone()
        }))
    }

    async fn update_profile(&self, id: Uuid, profile: Profile) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.users.get_mut(&id).map(|u| {
            apply_profile(u, profile);
            u.updated_at = OffsetDateTime::now_utc();
            u.clone()
        }))
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.users.get_mut(&id).map(|u| {
            apply_profile(u, patch.profile);
            if let Some(hash) = patch.password_hash {
                u.password_hash = hash;
            }
            u.is_active = patch.flags.is_active.unwrap_or(u.is_active);
            u.is_verified = patch.flags.is_verified.unwrap_or(u.is_verified);
            u.is_superuser = patch.flags.is_superuser.unwrap_or(u.is_superuser);
            u.updated_at = OffsetDateTime::now_utc();
            u.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.tokens.retain(|_, t| t.user_id != id);
        Ok(inner.users.remove(&id).is_some())
    }
}

fn apply_profile(u: &mut User, profile: Profile) {
    if profile.username.is_some() {
        u.username = profile.username;
    }
    if profile.phone.is_some() {
        u.phone = profile.phone;
    }
    if profile.address.is_some() {
        u.address = profile.address;
    }
    if profile.city.is_some() {
        u.city = profile.city;
    }
    if profile.state.is_some() {
        u.state = profile.state;
    }
    if profile.postal_code.is_some() {
        u.postal_code = profile.postal_code;
    }
}
