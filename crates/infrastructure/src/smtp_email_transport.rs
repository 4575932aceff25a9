//! SMTP email transport using the `lettre` crate.

use std::sync::Arc;

use async_trait::async_trait;
use coursewright_application::{EmailConnection, EmailTransport, OutgoingEmail};
use coursewright_core::{AppError, AppResult};
use coursewright_domain::{SendFailure, SmtpReplyCode};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::response::Code;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

/// SMTP transport configuration.
#[derive(Clone)]
pub struct SmtpEmailConfig {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// SMTP username.
    pub username: String,
    /// SMTP password.
    pub password: String,
}

/// Production email transport using SMTP.
#[derive(Clone)]
pub struct SmtpEmailTransport {
    mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpEmailTransport {
    /// Creates a new SMTP transport.
    pub fn new(config: SmtpEmailConfig) -> AppResult<Self> {
        let credentials = Credentials::new(config.username, config.password);

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|error| {
                AppError::Internal(format!("failed to create SMTP transport: {error}"))
            })?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer: Arc::new(mailer),
        })
    }
}

#[async_trait]
impl EmailTransport for SmtpEmailTransport {
    async fn connect(&self) -> Result<Box<dyn EmailConnection>, SendFailure> {
        match self.mailer.test_connection().await {
            Ok(true) => Ok(Box::new(SmtpConnection {
                mailer: self.mailer.clone(),
            })),
            Ok(false) => Err(SendFailure::Connect {
                reason: "mail server did not accept the connection".to_owned(),
            }),
            Err(error) => Err(SendFailure::Connect {
                reason: error.to_string(),
            }),
        }
    }
}

struct SmtpConnection {
    mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
}

#[async_trait]
impl EmailConnection for SmtpConnection {
    async fn send(&mut self, email: OutgoingEmail<'_>) -> Result<(), SendFailure> {
        let message = build_message(&email)?;

        self.mailer
            .send(message)
            .await
            .map_err(|error| reply_failure(error.status(), error.to_string()))?;

        debug!(to = %email.to, "course email accepted by mail server");
        Ok(())
    }
}

fn build_message(email: &OutgoingEmail<'_>) -> Result<Message, SendFailure> {
    let from = parse_mailbox(email.from.as_str())?;
    let to = parse_mailbox(email.to.as_str())?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject)
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.to_owned())
        .map_err(|error| SendFailure::Rejected {
            code: SmtpReplyCode::MAILBOX_NAME_NOT_ALLOWED,
            message: format!("failed to build email: {error}"),
        })
}

// Addresses the server would refuse anyway are reported as a 553 rejection.
fn parse_mailbox(address: &str) -> Result<Mailbox, SendFailure> {
    address
        .parse::<Mailbox>()
        .map_err(|error| SendFailure::Rejected {
            code: SmtpReplyCode::MAILBOX_NAME_NOT_ALLOWED,
            message: format!("invalid address '{address}': {error}"),
        })
}

// Errors without a server reply mean the session broke off mid-send.
fn reply_failure(status: Option<Code>, message: String) -> SendFailure {
    let code = status.and_then(|code| code.to_string().parse::<SmtpReplyCode>().ok());

    match code {
        Some(code) => SendFailure::Rejected { code, message },
        None => SendFailure::Disconnected { reason: message },
    }
}

#[cfg(test)]
mod tests {
    use coursewright_application::OutgoingEmail;
    use coursewright_domain::{EmailAddress, FailureClass, SendFailure, SmtpReplyCode, classify};
    use lettre::transport::smtp::response::{Category, Code, Detail, Severity};

    use super::{build_message, reply_failure};

    fn address(value: &str) -> EmailAddress {
        match EmailAddress::new(value) {
            Ok(address) => address,
            Err(error) => panic!("invalid test email: {error}"),
        }
    }

    fn rejected_code(failure: &SendFailure) -> Option<u16> {
        match failure {
            SendFailure::Rejected { code, .. } => Some(code.value()),
            _ => None,
        }
    }

    #[test]
    fn builds_plain_text_message() {
        let from = address("instructor@example.org");
        let to = address("learner@example.org");
        let built = build_message(&OutgoingEmail {
            from: &from,
            to: &to,
            subject: "Welcome",
            body: "Hello learners",
        });

        let Ok(message) = built else {
            panic!("message should build");
        };
        let formatted = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(formatted.contains("Subject: Welcome"));
        assert!(formatted.contains("To: learner@example.org"));
    }

    #[test]
    fn unparseable_mailbox_is_rejected_with_553() {
        let from = address("instructor@example.org");
        let to = address("first last@example.org");
        let built = build_message(&OutgoingEmail {
            from: &from,
            to: &to,
            subject: "Welcome",
            body: "Hello learners",
        });

        let Err(failure) = built else {
            panic!("mailbox with a space should not parse");
        };
        assert_eq!(
            rejected_code(&failure),
            Some(SmtpReplyCode::MAILBOX_NAME_NOT_ALLOWED.value())
        );
        assert_eq!(classify(&failure), FailureClass::Permanent);
    }

    #[test]
    fn transient_reply_is_retried() {
        let status = Code::new(
            Severity::TransientNegativeCompletion,
            Category::Unspecified4,
            Detail::Four,
        );
        let failure = reply_failure(Some(status), "454 try again later".to_owned());

        assert_eq!(rejected_code(&failure), Some(454));
        assert_eq!(classify(&failure), FailureClass::Transient);
    }

    #[test]
    fn permanent_reply_skips_the_recipient() {
        let status = Code::new(
            Severity::PermanentNegativeCompletion,
            Category::MailSystem,
            Detail::Four,
        );
        let failure = reply_failure(Some(status), "554 transaction failed".to_owned());

        assert_eq!(rejected_code(&failure), Some(554));
        assert_eq!(classify(&failure), FailureClass::Permanent);
    }

    #[test]
    fn missing_reply_is_a_disconnect() {
        let failure = reply_failure(None, "connection reset".to_owned());

        assert!(matches!(
            failure,
            SendFailure::Disconnected { ref reason } if reason == "connection reset"
        ));
        assert_eq!(classify(&failure), FailureClass::Transient);
    }
}
