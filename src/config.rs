use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Lifetimes of the single-use tokens sent by email.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub verify_ttl_hours: i64,
    pub reset_ttl_minutes: i64,
}

/// SMTP relay settings. `password` and `from` are optional so local runs
/// can fall back to the log mailer.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub from: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub tokens: TokenConfig,
    pub mail: MailConfig,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub superuser_emails: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "storefront".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "storefront-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
        };
        let tokens = TokenConfig {
            verify_ttl_hours: env_parse("VERIFY_TOKEN_TTL_HOURS", 24),
            reset_ttl_minutes: env_parse("RESET_TOKEN_TTL_MINUTES", 60),
        };
        let mail = MailConfig {
            server: std::env::var("MAIL_SERVER").unwrap_or_else(|_| "smtp.resend.com".into()),
            port: env_parse("MAIL_PORT", 587),
            username: std::env::var("MAIL_USERNAME").unwrap_or_else(|_| "resend".into()),
            password: std::env::var("MAIL_PASSWORD").ok().filter(|v| !v.is_empty()),
            from: std::env::var("MAIL_FROM").ok().filter(|v| !v.is_empty()),
        };
        Ok(Self {
            database_url,
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            tokens,
            mail,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8000".into()),
            cors_origins: split_list(
                &std::env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:8000,http://localhost:5173".into()),
            ),
            superuser_emails: split_list(&std::env::var("SUPERUSER_EMAILS").unwrap_or_default())
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
