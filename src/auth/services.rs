use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::claims::Role;
use super::jwt::JwtKeys;
use super::password::PasswordScheme;
use super::repo::{CredentialStore, StoreError};
use super::repo_types::{NewToken, NewUser, Profile, User, UserFlags, UserPatch};
use super::tokens::{hash_token, TokenGenerator, TokenPurpose};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::mail::{reset_link, verification_link, Mailer};

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub verify_ttl: Duration,
    pub reset_ttl: Duration,
    pub frontend_url: String,
    /// Lowercased emails that are created with the superuser flag.
    pub superuser_emails: Vec<String>,
}

impl From<&AppConfig> for AuthSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            verify_ttl: Duration::hours(cfg.tokens.verify_ttl_hours),
            reset_ttl: Duration::minutes(cfg.tokens.reset_ttl_minutes),
            frontend_url: cfg.frontend_url.clone(),
            superuser_emails: cfg.superuser_emails.clone(),
        }
    }
}

enum Notification {
    Verification { to: String, link: String },
    Reset { to: String, link: String },
}

/// Registration, login, email verification and password reset.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    passwords: Arc<dyn PasswordScheme>,
    tokens: Arc<dyn TokenGenerator>,
    mailer: Arc<dyn Mailer>,
    keys: JwtKeys,
    settings: AuthSettings,
    // Verified against when the email is unknown, so both login failures cost the same.
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        passwords: Arc<dyn PasswordScheme>,
        tokens: Arc<dyn TokenGenerator>,
        mailer: Arc<dyn Mailer>,
        keys: JwtKeys,
        settings: AuthSettings,
    ) -> anyhow::Result<Self> {
        let dummy_hash = passwords.hash("dummy-password-for-timing")?;
        Ok(Self {
            store,
            passwords,
            tokens,
            mailer,
            keys,
            settings,
            dummy_hash,
        })
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.keys.access_ttl.as_secs()
    }

    pub async fn register(&self, email: &str, password: &str, profile: Profile) -> Result<User, AppError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::Validation("Invalid email".into()));
        }
        if password.is_empty() {
            return Err(AppError::Validation("Password must not be empty".into()));
        }

        let password_hash = self.passwords.hash(password)?;
        let raw_token = self.tokens.generate()?;
        let user_id = Uuid::new_v4();
        let token = NewToken {
            user_id,
            token_hash: hash_token(&raw_token),
            purpose: TokenPurpose::VerifyEmail,
            expires_at: OffsetDateTime::now_utc() + self.settings.verify_ttl,
        };
        let new_user = NewUser {
            id: user_id,
            is_superuser: self.settings.superuser_emails.contains(&email),
            email,
            password_hash,
            profile,
        };

        let user = match self.store.insert_user_with_token(new_user, token).await {
            Ok(u) => u,
            Err(StoreError::DuplicateEmail) => {
                warn!("email already registered");
                return Err(AppError::DuplicateEmail);
            }
            Err(e) => return Err(e.into()),
        };

        self.dispatch(Notification::Verification {
            to: user.email.clone(),
            link: verification_link(&self.settings.frontend_url, &raw_token),
        });
        info!(user_id = %user.id, superuser = user.is_superuser, "user registered");
        Ok(user)
    }

    /// Returns a signed access token and the user it was issued for.
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, User), AppError> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            let _ = self.passwords.verify(password, &self.dummy_hash);
            warn!("login unknown email");
            return Err(AppError::AuthenticationError);
        };

        let password_ok = match self.passwords.verify(password, &user.password_hash) {
            Ok(ok) => ok,
            Err(e) => {
                error!(error = %e, user_id = %user.id, "stored password hash unusable");
                false
            }
        };
        if !password_ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::AuthenticationError);
        }
        if !user.is_active || user.is_oauth {
            warn!(user_id = %user.id, active = user.is_active, oauth = user.is_oauth, "login refused");
            return Err(AppError::AuthenticationError);
        }

        let token = self
            .keys
            .sign_access(user.id, Role::for_superuser(user.is_superuser))?;
        info!(user_id = %user.id, "user logged in");
        Ok((token, user))
    }

    pub async fn verify_email(&self, token: &str) -> Result<User, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::InvalidOrExpiredToken);
        }
        let user = self
            .store
            .redeem_verification(&hash_token(token), OffsetDateTime::now_utc())
            .await?
            .ok_or_else(|| {
                warn!("verification token rejected");
                AppError::InvalidOrExpiredToken
            })?;
        info!(user_id = %user.id, "email verified");
        Ok(user)
    }

    /// Never fails: the caller answers the same way whether or not the email exists.
    pub async fn forgot_password(&self, email: &str) {
        let Some(user) = self.lookup_quietly(email).await else {
            return;
        };
        match self.mint(&user, TokenPurpose::ResetPassword, self.settings.reset_ttl).await {
            Ok(raw) => {
                self.dispatch(Notification::Reset {
                    to: user.email.clone(),
                    link: reset_link(&self.settings.frontend_url, &raw),
                });
                info!(user_id = %user.id, "password reset requested");
            }
            Err(e) => error!(error = %e, user_id = %user.id, "could not issue reset token"),
        }
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<User, AppError> {
        if new_password.is_empty() {
            return Err(AppError::Validation("Password must not be empty".into()));
        }
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::InvalidOrExpiredToken);
        }
        let password_hash = self.passwords.hash(new_password)?;
        let user = self
            .store
            .redeem_reset(&hash_token(token), OffsetDateTime::now_utc(), &password_hash)
            .await?
            .ok_or_else(|| {
                warn!("reset token rejected");
                AppError::InvalidOrExpiredToken
            })?;
        info!(user_id = %user.id, "password reset");
        Ok(user)
    }

    /// Re-sends the verification link to an unverified account. Never fails.
    pub async fn request_verification(&self, email: &str) {
        let Some(user) = self.lookup_quietly(email).await else {
            return;
        };
        if user.is_verified {
            return;
        }
        match self.mint(&user, TokenPurpose::VerifyEmail, self.settings.verify_ttl).await {
            Ok(raw) => self.dispatch(Notification::Verification {
                to: user.email.clone(),
                link: verification_link(&self.settings.frontend_url, &raw),
            }),
            Err(e) => error!(error = %e, user_id = %user.id, "could not issue verification token"),
        }
    }

    /// The caller's own record; a token for a vanished or disabled account is unauthorized.
    pub async fn me(&self, user_id: Uuid) -> Result<User, AppError> {
        match self.store.find_user_by_id(user_id).await? {
            Some(u) if u.is_active => Ok(u),
            _ => Err(AppError::Unauthorized("User not found".into())),
        }
    }

    pub async fn update_profile(&self, user_id: Uuid, profile: Profile) -> Result<User, AppError> {
        self.me(user_id).await?;
        self.store
            .update_profile(user_id, profile)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".into()))
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, AppError> {
        self.store
            .find_user_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    /// Superuser edit of any account. A given password is re-hashed; email stays immutable.
    pub async fn update_user(
        &self,
        id: Uuid,
        profile: Profile,
        password: Option<&str>,
        flags: UserFlags,
    ) -> Result<User, AppError> {
        let password_hash = match password {
            Some("") => return Err(AppError::Validation("Password must not be empty".into())),
            Some(plain) => Some(self.passwords.hash(plain)?),
            None => None,
        };
        let user = self
            .store
            .update_user(
                id,
                UserPatch {
                    profile,
                    password_hash,
                    flags,
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        info!(user_id = %user.id, active = user.is_active, superuser = user.is_superuser, "user updated");
        Ok(user)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_user(id).await? {
            return Err(AppError::NotFound("User not found".into()));
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    async fn lookup_quietly(&self, email: &str) -> Option<User> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return None;
        }
        match self.store.find_user_by_email(&email).await {
            Ok(user) => user,
            Err(e) => {
                error!(error = %e, "user lookup failed");
                None
            }
        }
    }

    async fn mint(&self, user: &User, purpose: TokenPurpose, ttl: Duration) -> Result<String, AppError> {
        let raw = self.tokens.generate()?;
        self.store
            .insert_token(NewToken {
                user_id: user.id,
                token_hash: hash_token(&raw),
                purpose,
                expires_at: OffsetDateTime::now_utc() + ttl,
            })
            .await?;
        Ok(raw)
    }

    fn dispatch(&self, notification: Notification) {
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            let (kind, to, result) = match &notification {
                Notification::Verification { to, link } => {
                    ("verification", to, mailer.send_verification(to, link).await)
                }
                Notification::Reset { to, link } => ("reset", to, mailer.send_reset(to, link).await),
            };
            if let Err(e) = result {
                warn!(error = ?e, kind, to = %to, "email dispatch failed");
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::jwt::tests::make_keys;
    use crate::auth::memory::MemoryStore;
    use crate::auth::password::Argon2Scheme;
    use crate::auth::tokens::OsRngTokens;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    #[derive(Debug)]
    pub(crate) struct Sent {
        pub kind: &'static str,
        pub to: String,
        pub link: String,
    }

    impl Sent {
        pub fn token(&self) -> String {
            self.link
                .split("token=")
                .nth(1)
                .expect("link carries a token")
                .to_string()
        }
    }

    pub(crate) struct RecordingMailer(mpsc::UnboundedSender<Sent>);

    impl RecordingMailer {
        pub fn channel() -> (Self, mpsc::UnboundedReceiver<Sent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Self(tx), rx)
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_verification(&self, to: &str, link: &str) -> anyhow::Result<()> {
            let _ = self.0.send(Sent { kind: "verification", to: to.into(), link: link.into() });
            Ok(())
        }
        async fn send_reset(&self, to: &str, link: &str) -> anyhow::Result<()> {
            let _ = self.0.send(Sent { kind: "reset", to: to.into(), link: link.into() });
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send_verification(&self, _: &str, _: &str) -> anyhow::Result<()> {
            anyhow::bail!("smtp down")
        }
        async fn send_reset(&self, _: &str, _: &str) -> anyhow::Result<()> {
            anyhow::bail!("smtp down")
        }
    }

    fn settings() -> AuthSettings {
        AuthSettings {
            verify_ttl: Duration::hours(24),
            reset_ttl: Duration::hours(1),
            frontend_url: "http://shop.test".into(),
            superuser_emails: vec!["boss@x.com".into()],
        }
    }

    fn build(mailer: Arc<dyn Mailer>, settings: AuthSettings) -> (AuthService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let service = AuthService::new(
            store.clone(),
            Arc::new(Argon2Scheme::default()),
            Arc::new(OsRngTokens),
            mailer,
            make_keys("test-secret", "test-iss", "test-aud"),
            settings,
        )
        .expect("service");
        (service, store)
    }

    fn recording() -> (AuthService, Arc<MemoryStore>, mpsc::UnboundedReceiver<Sent>) {
        let (mailer, rx) = RecordingMailer::channel();
        let (service, store) = build(Arc::new(mailer), settings());
        (service, store, rx)
    }

    async fn register_and_verify(service: &AuthService, rx: &mut mpsc::UnboundedReceiver<Sent>, email: &str, pw: &str) -> User {
        service.register(email, pw, Profile::default()).await.unwrap();
        let sent = rx.recv().await.unwrap();
        service.verify_email(&sent.token()).await.unwrap()
    }

    #[tokio::test]
    async fn register_twice_yields_duplicate_email() {
        let (service, _, _rx) = recording();
        service.register("a@x.com", "pw1", Profile::default()).await.unwrap();
        let err = service
            .register("  A@X.com ", "pw2", Profile::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn register_creates_inactive_unverified_user_and_sends_link() {
        let (service, store, mut rx) = recording();
        let user = service
            .register("New@X.com", "pw1", Profile { username: Some("new".into()), ..Profile::default() })
            .await
            .unwrap();
        assert_eq!(user.email, "new@x.com");
        assert!(!user.is_active);
        assert!(!user.is_verified);
        assert!(!user.is_superuser);
        assert_ne!(user.password_hash, "pw1");
        assert_eq!(user.username.as_deref(), Some("new"));

        let sent = rx.recv().await.unwrap();
        assert_eq!(sent.kind, "verification");
        assert_eq!(sent.to, "new@x.com");
        assert!(sent.link.starts_with("http://shop.test/auth/verify?token="));
        assert_eq!(store.token_count(), 1);
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let (service, _, _rx) = recording();
        let err = service.register("not-an-email", "pw1", Profile::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = service.register("a@x.com", "", Profile::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_indistinguishable() {
        let (service, _, mut rx) = recording();
        register_and_verify(&service, &mut rx, "a@x.com", "pw1").await;

        let wrong_pw = service.login("a@x.com", "wrong").await.unwrap_err();
        let no_user = service.login("ghost@x.com", "pw1").await.unwrap_err();
        assert!(matches!(wrong_pw, AppError::AuthenticationError));
        assert!(matches!(no_user, AppError::AuthenticationError));
        assert_eq!(wrong_pw.status_code(), no_user.status_code());
        assert_eq!(
            serde_json::to_value(wrong_pw.body()).unwrap(),
            serde_json::to_value(no_user.body()).unwrap()
        );
    }

    #[tokio::test]
    async fn unverified_user_cannot_log_in() {
        let (service, _, _rx) = recording();
        service.register("a@x.com", "pw1", Profile::default()).await.unwrap();
        let err = service.login("a@x.com", "pw1").await.unwrap_err();
        assert!(matches!(err, AppError::AuthenticationError));
    }

    #[tokio::test]
    async fn registration_scenario() {
        let (service, _, mut rx) = recording();

        let created = service.register("a@x.com", "pw1", Profile::default()).await.unwrap();
        assert_eq!(created.email, "a@x.com");

        let err = service.login("a@x.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::AuthenticationError));

        let err = service.verify_email("fabricated-token").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));

        let token = rx.recv().await.unwrap().token();
        let verified = service.verify_email(&token).await.unwrap();
        assert_eq!(verified.id, created.id);
        assert!(verified.is_verified);
        assert!(verified.is_active);

        let err = service.verify_email(&token).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn login_issues_token_with_role() {
        let (service, store, mut rx) = recording();
        let user = register_and_verify(&service, &mut rx, "a@x.com", "pw1").await;

        let (token, logged_in) = service.login(" A@x.com", "pw1").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        let claims = make_keys("test-secret", "test-iss", "test-aud").verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::User);

        store.set_superuser(user.id);
        let (token, _) = service.login("a@x.com", "pw1").await.unwrap();
        let claims = make_keys("test-secret", "test-iss", "test-aud").verify(&token).unwrap();
        assert!(claims.is_superuser());
    }

    #[tokio::test]
    async fn configured_superuser_email_is_promoted_at_registration() {
        let (service, _, mut rx) = recording();
        let user = register_and_verify(&service, &mut rx, "Boss@x.com", "pw1").await;
        assert!(user.is_superuser);
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_email_sends_nothing() {
        let (service, store, mut rx) = recording();
        service.forgot_password("ghost@x.com").await;
        service.forgot_password("garbage").await;
        assert_eq!(store.token_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reset_password_replaces_hash_once() {
        let (service, _, mut rx) = recording();
        let user = register_and_verify(&service, &mut rx, "a@x.com", "old-pw").await;

        service.forgot_password("a@x.com").await;
        let sent = rx.recv().await.unwrap();
        assert_eq!(sent.kind, "reset");
        assert!(sent.link.starts_with("http://shop.test/auth/reset-password?token="));

        let reset = service.reset_password(&sent.token(), "new-pw").await.unwrap();
        assert_eq!(reset.id, user.id);

        assert!(matches!(
            service.login("a@x.com", "old-pw").await.unwrap_err(),
            AppError::AuthenticationError
        ));
        service.login("a@x.com", "new-pw").await.unwrap();

        let err = service.reset_password(&sent.token(), "third-pw").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn token_purposes_do_not_cross() {
        let (service, _, mut rx) = recording();
        service.register("a@x.com", "pw1", Profile::default()).await.unwrap();
        let verify_token = rx.recv().await.unwrap().token();

        let err = service.reset_password(&verify_token, "hijack").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
        // The failed cross-use must not consume it.
        service.verify_email(&verify_token).await.unwrap();
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (service, _) = build(
            Arc::new(RecordingMailer(tx)),
            AuthSettings { verify_ttl: Duration::ZERO, ..settings() },
        );
        service.register("a@x.com", "pw1", Profile::default()).await.unwrap();
        let token = rx.recv().await.unwrap().token();
        let err = service.verify_email(&token).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn resent_verification_supersedes_the_old_token() {
        let (service, _, mut rx) = recording();
        service.register("a@x.com", "pw1", Profile::default()).await.unwrap();
        let first = rx.recv().await.unwrap().token();

        service.request_verification("a@x.com").await;
        let second = rx.recv().await.unwrap().token();
        assert_ne!(first, second);

        assert!(matches!(
            service.verify_email(&first).await.unwrap_err(),
            AppError::InvalidOrExpiredToken
        ));
        service.verify_email(&second).await.unwrap();

        // Already verified: nothing more is sent.
        service.request_verification("a@x.com").await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn mail_failures_do_not_fail_the_request() {
        let (service, _) = build(Arc::new(FailingMailer), settings());
        let user = service.register("a@x.com", "pw1", Profile::default()).await.unwrap();
        assert_eq!(user.email, "a@x.com");
        service.forgot_password("a@x.com").await;
    }

    #[tokio::test]
    async fn profile_updates_only_touch_given_fields() {
        let (service, _, mut rx) = recording();
        let user = register_and_verify(&service, &mut rx, "a@x.com", "pw1").await;
        service
            .update_profile(user.id, Profile { city: Some("Porto".into()), ..Profile::default() })
            .await
            .unwrap();
        let updated = service
            .update_profile(user.id, Profile { phone: Some("123".into()), ..Profile::default() })
            .await
            .unwrap();
        assert_eq!(updated.city.as_deref(), Some("Porto"));
        assert_eq!(updated.phone.as_deref(), Some("123"));
        assert_eq!(updated.email, "a@x.com");
    }

    #[tokio::test]
    async fn me_rejects_unknown_and_inactive_users() {
        let (service, _, _rx) = recording();
        assert!(matches!(
            service.me(Uuid::new_v4()).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
        let inactive = service.register("a@x.com", "pw1", Profile::default()).await.unwrap();
        assert!(matches!(service.me(inactive.id).await.unwrap_err(), AppError::Unauthorized(_)));
        assert!(matches!(
            service.get_user(Uuid::new_v4()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert_eq!(service.get_user(inactive.id).await.unwrap().id, inactive.id);
    }

    #[tokio::test]
    async fn superuser_edit_sets_flags_and_password() {
        let (service, _, _rx) = recording();
        let user = service.register("a@x.com", "pw1", Profile::default()).await.unwrap();

        let flags = UserFlags {
            is_active: Some(true),
            is_verified: Some(true),
            is_superuser: Some(true),
        };
        let updated = service
            .update_user(user.id, Profile { city: Some("Braga".into()), ..Profile::default() }, Some("pw2"), flags)
            .await
            .unwrap();
        assert!(updated.is_active && updated.is_verified && updated.is_superuser);
        assert_eq!(updated.city.as_deref(), Some("Braga"));

        let (_, logged_in) = service.login("a@x.com", "pw2").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(matches!(
            service.login("a@x.com", "pw1").await.unwrap_err(),
            AppError::AuthenticationError
        ));

        // Deactivation locks the account out again.
        let flags = UserFlags { is_active: Some(false), ..UserFlags::default() };
        service.update_user(user.id, Profile::default(), None, flags).await.unwrap();
        assert!(matches!(
            service.login("a@x.com", "pw2").await.unwrap_err(),
            AppError::AuthenticationError
        ));
    }

    #[tokio::test]
    async fn superuser_edit_rejects_empty_password_and_unknown_user() {
        let (service, _, _rx) = recording();
        let user = service.register("a@x.com", "pw1", Profile::default()).await.unwrap();
        assert!(matches!(
            service
                .update_user(user.id, Profile::default(), Some(""), UserFlags::default())
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            service
                .update_user(Uuid::new_v4(), Profile::default(), None, UserFlags::default())
                .await
                .unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn deleted_user_and_its_tokens_are_gone() {
        let (service, store, mut rx) = recording();
        let user = service.register("a@x.com", "pw1", Profile::default()).await.unwrap();
        let token = rx.recv().await.unwrap().token();
        assert_eq!(store.token_count(), 1);

        service.delete_user(user.id).await.unwrap();
        assert_eq!(store.token_count(), 0);
        assert!(matches!(service.get_user(user.id).await.unwrap_err(), AppError::NotFound(_)));
        assert!(matches!(
            service.verify_email(&token).await.unwrap_err(),
            AppError::InvalidOrExpiredToken
        ));
        assert!(matches!(service.delete_user(user.id).await.unwrap_err(), AppError::NotFound(_)));

        // The email is free again.
        service.register("a@x.com", "pw1", Profile::default()).await.unwrap();
    }

    #[test]
    fn email_helpers() {
        assert_eq!(normalize_email("  Foo@Bar.COM "), "foo@bar.com");
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@y.com"));
    }
}
