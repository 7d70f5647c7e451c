use anyhow::Result;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::Config;

/// Plain-text SMTP sender for incident notifications.
pub struct EmailService {
    mailer: SmtpTransport,
    from_address: String,
    skip_send: bool,
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self> {
        let mailer = match (&config.smtp_username, &config.smtp_password) {
            (Some(username), password) => {
                let creds =
                    Credentials::new(username.clone(), password.clone().unwrap_or_default());
                SmtpTransport::relay(&config.smtp_host)?
                    .port(config.smtp_port)
                    .credentials(creds)
                    .build()
            }
            (None, _) => SmtpTransport::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .build(),
        };

        Ok(Self {
            mailer,
            from_address: config.smtp_from.clone(),
            skip_send: config.smtp_skip_send,
        })
    }

    pub fn skips_delivery(&self) -> bool {
        self.skip_send
    }

    /// Builds the message even when delivery is skipped so bad addresses still surface.
    pub fn send(&self, to_email: &str, subject: &str, body: String) -> Result<()> {
        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        if self.skip_send {
            tracing::debug!(to = %to_email, subject, "SMTP_SKIP_SEND set, email not sent");
            return Ok(());
        }

        self.mailer.send(&email)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn skip_send_still_validates_addresses() {
        let service = EmailService::new(&test_config()).expect("email service");
        assert!(service.skips_delivery());
        assert!(service
            .send("ops@example.com", "subject", "body".into())
            .is_ok());
        assert!(service.send("not-an-address", "subject", "body".into()).is_err());
    }
}
