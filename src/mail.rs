use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox}, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::config::MailConfig;

/// Outbound notifications of the auth flow. Callers treat both as fire-and-forget.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &str, link: &str) -> anyhow::Result<()>;
    async fn send_reset(&self, to: &str, link: &str) -> anyhow::Result<()>;
}

pub fn verification_link(frontend_url: &str, token: &str) -> String {
    let base = frontend_url.trim_end_matches('/');
    format!("{base}/auth/verify?token={token}")
}

pub fn reset_link(frontend_url: &str, token: &str) -> String {
    let base = frontend_url.trim_end_matches('/');
    format!("{base}/auth/reset-password?token={token}")
}

/// SMTP relay over STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig, password: &str, from: &str) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.server)
            .with_context(|| format!("smtp relay {}", cfg.server))?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), password.to_string()))
            .build();
        Ok(Self {
            transport,
            from: from.to_string(),
        })
    }

    async fn send_html(&self, to: &str, subject: &str, html: String) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.parse::<Mailbox>().context("parse MAIL_FROM")?)
            .to(to.parse::<Mailbox>().context("parse recipient")?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .context("build message")?;
        self.transport.send(message).await.context("smtp send")?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification(&self, to: &str, link: &str) -> anyhow::Result<()> {
        let html = format!(
            "<h3>Welcome!</h3>\
             <p>Please verify your email by clicking the link below:</p>\
             <p><a href=\"{link}\">Verify Email</a></p>\
             <p>If you didn't request this verification, please ignore this email.</p>"
        );
        self.send_html(to, "Verify your email", html).await
    }

    async fn send_reset(&self, to: &str, link: &str) -> anyhow::Result<()> {
        let html = format!(
            "<h3>Password Reset Request</h3>\
             <p>Click the link below to reset your password:</p>\
             <p><a href=\"{link}\">Reset Password</a></p>\
             <p>If you didn't request this reset, please ignore this email.</p>"
        );
        self.send_html(to, "Reset your password", html).await
    }
}

/// Development mailer: logs the recipient instead of sending.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to: &str, _link: &str) -> anyhow::Result<()> {
        info!(to = %to, "verification email (log mailer, not sent)");
        Ok(())
    }

    async fn send_reset(&self, to: &str, _link: &str) -> anyhow::Result<()> {
        info!(to = %to, "password reset email (log mailer, not sent)");
        Ok(())
    }
}

/// Picks SMTP when credentials are configured, otherwise the log mailer.
pub fn from_config(cfg: &MailConfig) -> anyhow::Result<Box<dyn Mailer>> {
    match (&cfg.password, &cfg.from) {
        (Some(password), Some(from)) => Ok(Box::new(SmtpMailer::new(cfg, password, from)?)),
        _ => {
            warn!("MAIL_PASSWORD or MAIL_FROM not set; emails will only be logged");
            Ok(Box::new(LogMailer))
        }
    }
}
