use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NewToken, NewUser, Profile, User, UserPatch};
use super::tokens::TokenPurpose;
use crate::db::is_unique_violation;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence for users and their single-use tokens.
///
/// Every method that writes runs as one unit of work: either all of its
/// statements are committed or none are.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a user together with its first token (usually the email verification one).
    async fn insert_user_with_token(&self, user: NewUser, token: NewToken) -> Result<User, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Store a token, superseding the user's outstanding token of the same purpose.
    async fn insert_token(&self, token: NewToken) -> Result<(), StoreError>;

    /// Consume a verification token and mark its user verified and active.
    /// `None` when the token is unknown, expired or already used.
    async fn redeem_verification(&self, token_hash: &[u8], now: OffsetDateTime) -> Result<Option<User>, StoreError>;

    /// Consume a reset token and replace its user's password hash.
    async fn redeem_reset(
        &self,
        token_hash: &[u8],
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Overwrite the profile fields that are `Some`.
    async fn update_profile(&self, id: Uuid, profile: Profile) -> Result<Option<User>, StoreError>;

    /// Apply a superuser edit: profile, password hash and account flags.
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError>;

    /// Remove a user and, by cascade, its tokens. `false` when no such user.
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;
}

macro_rules! user_columns {
    () => {
        "id, email, password_hash, username, phone, address, city, state, postal_code, \
         is_active, is_verified, is_superuser, is_oauth, created_at, updated_at"
    };
}

#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

async fn insert_token_tx(tx: &mut Transaction<'_, Postgres>, token: &NewToken) -> Result<(), StoreError> {
    // Expired rows of any user are swept here; there is no background job.
    sqlx::query(
        r#"
        DELETE FROM auth_tokens
        WHERE (user_id = $1 AND purpose = $2) OR expires_at <= now()
        "#,
    )
    .bind(token.user_id)
    .bind(token.purpose.as_str())
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO auth_tokens (token_hash, user_id, purpose, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(&token.token_hash)
    .bind(token.user_id)
    .bind(token.purpose.as_str())
    .bind(token.expires_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn take_token_tx(
    tx: &mut Transaction<'_, Postgres>,
    token_hash: &[u8],
    purpose: TokenPurpose,
    now: OffsetDateTime,
) -> Result<Option<Uuid>, StoreError> {
    // DELETE ... RETURNING makes the redemption single-use even under concurrent requests.
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        DELETE FROM auth_tokens
        WHERE token_hash = $1 AND purpose = $2 AND expires_at > $3
        RETURNING user_id
        "#,
    )
    .bind(token_hash)
    .bind(purpose.as_str())
    .bind(now)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(|(id,)| id))
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert_user_with_token(&self, user: NewUser, token: NewToken) -> Result<User, StoreError> {
        let mut tx = self.db.begin().await?;
        let created = sqlx::query_as::<_, User>(concat!(
            r#"
            INSERT INTO users (id, email, password_hash, username, phone, address, city, state,
                               postal_code, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING "#,
            user_columns!()
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.profile.username)
        .bind(&user.profile.phone)
        .bind(&user.profile.address)
        .bind(&user.profile.city)
        .bind(&user.profile.state)
        .bind(&user.profile.postal_code)
        .bind(user.is_superuser)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateEmail
            } else {
                StoreError::Database(e)
            }
        })?;

        insert_token_tx(&mut tx, &token).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert_token(&self, token: NewToken) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;
        insert_token_tx(&mut tx, &token).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn redeem_verification(&self, token_hash: &[u8], now: OffsetDateTime) -> Result<Option<User>, StoreError> {
        let mut tx = self.db.begin().await?;
        let Some(user_id) = take_token_tx(&mut tx, token_hash, TokenPurpose::VerifyEmail, now).await? else {
            return Ok(None);
        };
        let user = sqlx::query_as::<_, User>(concat!(
            r#"
            UPDATE users
            SET is_verified = TRUE, is_active = TRUE, updated_at = now()
            WHERE id = $1
            RETURNING "#,
            user_columns!()
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn redeem_reset(
        &self,
        token_hash: &[u8],
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut tx = self.db.begin().await?;
        let Some(user_id) = take_token_tx(&mut tx, token_hash, TokenPurpose::ResetPassword, now).await? else {
            return Ok(None);
        };
        let user = sqlx::query_as::<_, User>(concat!(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = now()
            WHERE id = $1
            RETURNING "#,
            user_columns!()
        ))
        .bind(user_id)
        .bind(password_hash)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, profile: Profile) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(concat!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                phone = COALESCE($3, phone),
                address = COALESCE($4, address),
                city = COALESCE($5, city),
                state = COALESCE($6, state),
                postal_code = COALESCE($7, postal_code),
                updated_at = now()
            WHERE id = $1
            RETURNING "#,
            user_columns!()
        ))
        .bind(id)
        .bind(profile.username)
        .bind(profile.phone)
        .bind(profile.address)
        .bind(profile.city)
        .bind(profile.state)
        .bind(profile.postal_code)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        let UserPatch {
            profile,
            password_hash,
            flags,
        } = patch;
        let user = sqlx::query_as::<_, User>(concat!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                phone = COALESCE($3, phone),
                address = COALESCE($4, address),
                city = COALESCE($5, city),
                state = COALESCE($6, state),
                postal_code = COALESCE($7, postal_code),
                password_hash = COALESCE($8, password_hash),
                is_active = COALESCE($9, is_active),
                is_verified = COALESCE($10, is_verified),
                is_superuser = COALESCE($11, is_superuser),
                updated_at = now()
            WHERE id = $1
            RETURNING "#,
            user_columns!()
        ))
        .bind(id)
        .bind(profile.username)
        .bind(profile.phone)
        .bind(profile.address)
        .bind(profile.city)
        .bind(profile.state)
        .bind(profile.postal_code)
        .bind(password_hash)
        .bind(flags.is_active)
        .bind(flags.is_verified)
        .bind(flags.is_superuser)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
