use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use coursewright_application::RetryPolicy;
use coursewright_core::AppError;
use coursewright_domain::CourseKey;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct SmtpRuntimeConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub enum EmailProviderConfig {
    Console,
    Smtp(SmtpRuntimeConfig),
}

#[derive(Debug, Clone, Copy)]
pub struct BulkEmailRuntimeConfig {
    pub retry_policy: RetryPolicy,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: Option<String>,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub email_provider: EmailProviderConfig,
    pub bulk_email: BulkEmailRuntimeConfig,
    pub disable_course_creation: bool,
    pub dev_seed_course: Option<CourseKey>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        let mut config = Self::from_lookup(|name| env::var(name).ok())?;
        config.migrate_only = migrate_only;
        Ok(config)
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let env = EnvSource { lookup: &lookup };

        let database_url = env.optional_non_empty("DATABASE_URL");
        let frontend_url = env
            .optional_non_empty("FRONTEND_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_owned());
        let api_host = env
            .optional_non_empty("API_HOST")
            .unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = env.parse_or("API_PORT", 3001_u16)?;

        let email_provider = match env
            .optional_non_empty("EMAIL_PROVIDER")
            .unwrap_or_else(|| "console".to_owned())
            .as_str()
        {
            "console" => EmailProviderConfig::Console,
            "smtp" => EmailProviderConfig::Smtp(SmtpRuntimeConfig {
                host: env.required_non_empty("SMTP_HOST")?,
                port: env
                    .required_non_empty("SMTP_PORT")?
                    .parse::<u16>()
                    .map_err(|error| AppError::Validation(format!("invalid SMTP_PORT: {error}")))?,
                username: env.required_non_empty("SMTP_USERNAME")?,
                password: env.required_non_empty("SMTP_PASSWORD")?,
            }),
            other => {
                return Err(AppError::Validation(format!(
                    "EMAIL_PROVIDER must be either 'console' or 'smtp', got '{other}'"
                )));
            }
        };

        let defaults = RetryPolicy::default();
        let retry_base_seconds = env.parse_or(
            "BULK_EMAIL_RETRY_BASE_SECONDS",
            defaults.base_countdown.as_secs(),
        )?;
        let retry_max_seconds = env.parse_or(
            "BULK_EMAIL_RETRY_MAX_SECONDS",
            defaults.max_countdown.as_secs(),
        )?;
        if retry_base_seconds == 0 {
            return Err(AppError::Validation(
                "BULK_EMAIL_RETRY_BASE_SECONDS must be greater than zero".to_owned(),
            ));
        }
        if retry_max_seconds < retry_base_seconds {
            return Err(AppError::Validation(
                "BULK_EMAIL_RETRY_MAX_SECONDS must not be lower than BULK_EMAIL_RETRY_BASE_SECONDS"
                    .to_owned(),
            ));
        }
        let max_retries = env.parse_or("BULK_EMAIL_MAX_RETRIES", 5_u32)?;
        let disable_course_creation = env.parse_or("DISABLE_COURSE_CREATION", false)?;

        let dev_seed_course = env
            .optional_non_empty("DEV_SEED_COURSE")
            .map(|value| {
                CourseKey::from_str(value.as_str()).map_err(|error| {
                    AppError::Validation(format!("invalid DEV_SEED_COURSE: {}", error.message()))
                })
            })
            .transpose()?;

        Ok(Self {
            migrate_only: false,
            database_url,
            frontend_url,
            api_host,
            api_port,
            email_provider,
            bulk_email: BulkEmailRuntimeConfig {
                retry_policy: RetryPolicy {
                    base_countdown: Duration::from_secs(retry_base_seconds),
                    max_countdown: Duration::from_secs(retry_max_seconds),
                },
                max_retries,
            },
            disable_course_creation,
            dev_seed_course,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

struct EnvSource<'a, F> {
    lookup: &'a F,
}

impl<F> EnvSource<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional_non_empty(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn required_non_empty(&self, name: &str) -> Result<String, AppError> {
        let value = (self.lookup)(name)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))?;
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{name} must not be empty")));
        }

        Ok(value)
    }

    fn parse_or<T>(&self, name: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional_non_empty(name) {
            Some(value) => value
                .trim()
                .parse::<T>()
                .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use coursewright_core::AppError;

    use super::{ApiConfig, EmailProviderConfig};

    fn load(pairs: &[(&str, &str)]) -> Result<ApiConfig, AppError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        ApiConfig::from_lookup(|name| values.get(name).cloned())
    }

    #[test]
    fn defaults_run_in_memory_with_console_email() {
        let Ok(config) = load(&[]) else {
            panic!("empty environment should load");
        };

        assert!(config.database_url.is_none());
        assert!(matches!(config.email_provider, EmailProviderConfig::Console));
        assert_eq!(config.api_port, 3001);
        assert_eq!(
            config.bulk_email.retry_policy.base_countdown,
            Duration::from_secs(60)
        );
        assert_eq!(config.bulk_email.max_retries, 5);
        assert!(!config.disable_course_creation);
        assert!(config.dev_seed_course.is_none());
    }

    #[test]
    fn smtp_provider_requires_connection_settings() {
        let result = load(&[("EMAIL_PROVIDER", "smtp"), ("SMTP_HOST", "mail.example.org")]);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn retry_window_must_be_ordered() {
        let result = load(&[
            ("BULK_EMAIL_RETRY_BASE_SECONDS", "120"),
            ("BULK_EMAIL_RETRY_MAX_SECONDS", "60"),
        ]);
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = load(&[("BULK_EMAIL_MAX_RETRIES", "many")]);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn dev_seed_course_is_parsed() {
        let Ok(config) = load(&[("DEV_SEED_COURSE", "MITx/999/Robot_Super_Course")]) else {
            panic!("seed course should parse");
        };
        assert_eq!(
            config.dev_seed_course.map(|course| course.to_string()),
            Some("MITx/999/Robot_Super_Course".to_owned())
        );

        assert!(load(&[("DEV_SEED_COURSE", "MITx/999")]).is_err());
    }

    #[test]
    fn course_creation_flag_is_boolean() {
        let Ok(config) = load(&[("DISABLE_COURSE_CREATION", "true")]) else {
            panic!("flag should parse");
        };
        assert!(config.disable_course_creation);

        assert!(load(&[("DISABLE_COURSE_CREATION", "sometimes")]).is_err());
    }
}
