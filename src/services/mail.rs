// src/services/mail.rs
//! SMTP mail delivery
//!
//! Wraps the `lettre` async transport. The queue worker is the only caller;
//! handlers never talk to this service directly, so a slow or down SMTP
//! server cannot stall a request.

use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::info;

use crate::common::config::MailConfig;
use crate::common::safe_email_log;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),
}

/// Sends account emails over SMTP
pub struct Mailer {
    config: MailConfig,
}

impl Mailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    /// Send the email-verification message with its action url
    pub async fn send_verification_email(
        &self,
        to: &str,
        name: &str,
        url: &str,
    ) -> Result<(), MailError> {
        let html = verification_email_html(first_name(name), url);
        self.send(to, "Your account verification code", html).await
    }

    /// Send the password-reset message with its action url
    pub async fn send_reset_email(&self, to: &str, name: &str, url: &str) -> Result<(), MailError> {
        let html = reset_email_html(first_name(name), url);
        self.send(
            to,
            "Your password reset token (valid for only 10 minutes)",
            html,
        )
        .await
    }

    async fn send(&self, to: &str, subject: &str, html: String) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.config.from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|e| MailError::Build(e.to_string()))?;

        // Credentialed transports negotiate STARTTLS; without credentials we
        // assume a local development relay (mailcatcher) speaking plain SMTP.
        let mailer = if let (Some(user), Some(pass)) = (&self.config.user, &self.config.pass) {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?
                .port(self.config.port)
                .credentials(Credentials::new(user.clone(), pass.clone()))
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
                .port(self.config.port)
                .build()
        };

        mailer.send(email).await?;

        info!(to = %safe_email_log(to), subject = %subject, "Email sent");
        Ok(())
    }
}

/// First whitespace-separated word of a display name, for the greeting
fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or("User")
}

fn verification_email_html(first_name: &str, url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .button {{ display: inline-block; padding: 12px 24px; background-color: #4F46E5; color: white; text-decoration: none; border-radius: 5px; margin: 10px 0; }}
    </style>
</head>
<body>
    <div class="container">
        <p>Hi {},</p>
        <p>Just one more step: confirm your email address to activate your account.</p>
        <p><a class="button" href="{}">Verify your email</a></p>
        <p>If the button does not work, copy this link into your browser:<br>{}</p>
        <p>If you did not create an account, you can safely ignore this email.</p>
    </div>
</body>
</html>"#,
        first_name, url, url
    )
}

fn reset_email_html(first_name: &str, url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .button {{ display: inline-block; padding: 12px 24px; background-color: #4F46E5; color: white; text-decoration: none; border-radius: 5px; margin: 10px 0; }}
    </style>
</head>
<body>
    <div class="container">
        <p>Hi {},</p>
        <p>We received a request to reset your password. This link is valid for 10 minutes.</p>
        <p><a class="button" href="{}">Reset your password</a></p>
        <p>If the button does not work, copy this link into your browser:<br>{}</p>
        <p>If you did not request a password reset, you can safely ignore this email.</p>
    </div>
</body>
</html>"#,
        first_name, url, url
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_name_takes_first_word() {
        assert_eq!(first_name("Ada Lovelace"), "Ada");
        assert_eq!(first_name("Cher"), "Cher");
        assert_eq!(first_name("  spaced  out  "), "spaced");
    }

    #[test]
    fn test_first_name_defaults_for_empty() {
        assert_eq!(first_name(""), "User");
        assert_eq!(first_name("   "), "User");
    }

    #[test]
    fn test_templates_embed_the_url() {
        let url = "http://localhost:8000/api/auth/verifyemail/abc123";
        let html = verification_email_html("Ada", url);
        assert!(html.contains(url));
        assert!(html.contains("Hi Ada,"));

        let reset = reset_email_html("Ada", "http://localhost:8000/api/auth/resetpassword/def");
        assert!(reset.contains("resetpassword/def"));
        assert!(reset.contains("10 minutes"));
    }

    #[test]
    fn test_mail_error_display() {
        let err = MailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }
}
