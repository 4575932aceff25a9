use std::sync::Arc;

use coursewright_application::EmailTransport;
use coursewright_core::AppError;
use coursewright_infrastructure::{ConsoleEmailTransport, SmtpEmailConfig, SmtpEmailTransport};

use crate::api_config::{ApiConfig, EmailProviderConfig};

pub(super) fn build_email_transport(
    config: &ApiConfig,
) -> Result<Arc<dyn EmailTransport>, AppError> {
    let transport: Arc<dyn EmailTransport> = match &config.email_provider {
        EmailProviderConfig::Console => Arc::new(ConsoleEmailTransport::new()),
        EmailProviderConfig::Smtp(smtp) => {
            let smtp_config = SmtpEmailConfig {
                host: smtp.host.clone(),
                port: smtp.port,
                username: smtp.username.clone(),
                password: smtp.password.clone(),
            };
            Arc::new(SmtpEmailTransport::new(smtp_config)?)
        }
    };

    Ok(transport)
}
