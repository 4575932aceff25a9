//! Console email transport for development. Logs emails to tracing output.

use async_trait::async_trait;
use coursewright_application::{EmailConnection, EmailTransport, OutgoingEmail};
use coursewright_domain::SendFailure;
use tracing::info;

/// Development transport that logs every message instead of delivering it.
#[derive(Clone, Default)]
pub struct ConsoleEmailTransport;

impl ConsoleEmailTransport {
    /// Creates a new console transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailTransport for ConsoleEmailTransport {
    async fn connect(&self) -> Result<Box<dyn EmailConnection>, SendFailure> {
        Ok(Box::new(ConsoleConnection))
    }
}

struct ConsoleConnection;

#[async_trait]
impl EmailConnection for ConsoleConnection {
    async fn send(&mut self, email: OutgoingEmail<'_>) -> Result<(), SendFailure> {
        info!(
            from = %email.from,
            to = %email.to,
            subject = email.subject,
            "--- EMAIL (console) ---\nTo: {}\nSubject: {}\n\n{}\n--- END EMAIL ---",
            email.to,
            email.subject,
            email.body
        );

        Ok(())
    }
}
