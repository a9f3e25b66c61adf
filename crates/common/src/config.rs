use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Which retry decision the dispatcher applies to a failed unit of work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPolicy {
    /// Every error is retried until attempts run out.
    #[default]
    Always,
    /// Only errors reported as transient are retried.
    Transient,
}

impl FromStr for RetryPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(RetryPolicy::Always),
            "transient" => Ok(RetryPolicy::Transient),
            other => Err(anyhow::anyhow!(
                "WORKER_RETRY_POLICY must be 'always' or 'transient', got '{other}'"
            )),
        }
    }
}

/// Outbound mail channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransportKind {
    #[default]
    Smtp,
    Resend,
}

impl FromStr for MailTransportKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smtp" => Ok(MailTransportKind::Smtp),
            "resend" => Ok(MailTransportKind::Resend),
            other => Err(anyhow::anyhow!(
                "MAIL_TRANSPORT must be 'smtp' or 'resend', got '{other}'"
            )),
        }
    }
}

/// Scheduler pacing and retry settings. Read once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Wait between two scans (default: 60 minutes)
    pub scan_interval: Duration,

    /// Upper bound on recipients processed per scan (default: 50)
    pub batch_size: u32,

    /// Pause between two recipients of the same batch (default: 1000 ms)
    pub item_delay: Duration,

    /// Retries after the first attempt; a recipient gets `max_retry_attempts + 1` tries (default: 3)
    pub max_retry_attempts: u32,

    pub retry_policy: RetryPolicy,

    /// How long `stop` waits for the loop before aborting it (default: 30 s)
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(60 * 60),
            batch_size: 50,
            item_delay: Duration::from_millis(1000),
            max_retry_attempts: 3,
            retry_policy: RetryPolicy::Always,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("WORKER_BATCH_SIZE must be a positive integer");
        }
        Ok(())
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let config = Self {
            scan_interval: Duration::from_secs(
                parse_or(lookup, "WORKER_INTERVAL_MINUTES", 60u64)? * 60,
            ),
            batch_size: parse_or(lookup, "WORKER_BATCH_SIZE", 50u32)?,
            item_delay: Duration::from_millis(parse_or(
                lookup,
                "WORKER_DELAY_BETWEEN_EMAILS_MS",
                1000u64,
            )?),
            max_retry_attempts: parse_or(lookup, "WORKER_MAX_RETRY_ATTEMPTS", 3u32)?,
            retry_policy: match lookup("WORKER_RETRY_POLICY") {
                Some(raw) => raw.parse()?,
                None => RetryPolicy::default(),
            },
            shutdown_grace: Duration::from_secs(parse_or(
                lookup,
                "WORKER_SHUTDOWN_GRACE_SECS",
                30u64,
            )?),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Mail sender settings shared by every transport.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub transport: MailTransportKind,

    /// Sender address
    pub from_email: String,

    /// Optional display name shown next to the sender address
    pub from_name: Option<String>,

    pub smtp_host: String,
    pub smtp_port: u16,

    /// SMTP authentication is only attempted when a username is set
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_starttls: bool,

    /// Resend API key, required when `transport` is `resend`
    pub resend_api_key: Option<String>,

    /// Directory holding `<name>.html` templates
    pub template_dir: String,
    pub welcome_template: String,
    pub welcome_subject: String,
}

impl MailConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let transport = match lookup("MAIL_TRANSPORT") {
            Some(raw) => raw.parse()?,
            None => MailTransportKind::default(),
        };
        let resend_api_key = lookup("RESEND_API_KEY");
        if transport == MailTransportKind::Resend && resend_api_key.is_none() {
            anyhow::bail!("RESEND_API_KEY is required when MAIL_TRANSPORT=resend");
        }

        Ok(Self {
            transport,
            from_email: lookup("EMAIL_FROM")
                .ok_or_else(|| anyhow::anyhow!("EMAIL_FROM environment variable is required"))?,
            from_name: lookup("EMAIL_FROM_NAME"),
            smtp_host: lookup("SMTP_HOST").unwrap_or_else(|| "localhost".to_string()),
            smtp_port: parse_or(lookup, "SMTP_PORT", 587u16)?,
            smtp_username: lookup("SMTP_USERNAME").filter(|u| !u.is_empty()),
            smtp_password: lookup("SMTP_PASSWORD"),
            smtp_starttls: parse_or(lookup, "SMTP_STARTTLS", true)?,
            resend_api_key,
            template_dir: lookup("TEMPLATE_DIR").unwrap_or_else(|| "templates".to_string()),
            welcome_template: lookup("WELCOME_TEMPLATE")
                .unwrap_or_else(|| "welcome_email".to_string()),
            welcome_subject: lookup("WELCOME_SUBJECT")
                .unwrap_or_else(|| "Welcome to Our Service".to_string()),
        })
    }
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 5)
    pub db_max_connections: u32,

    pub worker: WorkerConfig,

    pub mail: MailConfig,

    /// Optional JSON file of recipients inserted when the store is empty
    pub seed_file: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5u32)?,
            worker: WorkerConfig::from_lookup(&lookup)?,
            mail: MailConfig::from_lookup(&lookup)?,
            seed_file: lookup("SEED_FILE"),
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            anyhow::anyhow!(
                "{key} must be a valid {}",
                std::any::type_name::<T>()
            )
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/courier"),
            ("EMAIL_FROM", "noreply@example.com"),
        ]))
        .unwrap();

        assert_eq!(config.worker, WorkerConfig::default());
        assert_eq!(config.worker.scan_interval, Duration::from_secs(3600));
        assert_eq!(config.worker.batch_size, 50);
        assert_eq!(config.worker.item_delay, Duration::from_millis(1000));
        assert_eq!(config.worker.max_retry_attempts, 3);
        assert_eq!(config.mail.transport, MailTransportKind::Smtp);
        assert_eq!(config.mail.smtp_port, 587);
        assert_eq!(config.mail.welcome_subject, "Welcome to Our Service");
        assert_eq!(config.db_max_connections, 5);
    }

    #[test]
    fn test_worker_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/courier"),
            ("EMAIL_FROM", "noreply@example.com"),
            ("WORKER_INTERVAL_MINUTES", "5"),
            ("WORKER_BATCH_SIZE", "10"),
            ("WORKER_DELAY_BETWEEN_EMAILS_MS", "250"),
            ("WORKER_MAX_RETRY_ATTEMPTS", "0"),
            ("WORKER_RETRY_POLICY", "transient"),
        ]))
        .unwrap();

        assert_eq!(config.worker.scan_interval, Duration::from_secs(300));
        assert_eq!(config.worker.batch_size, 10);
        assert_eq!(config.worker.item_delay, Duration::from_millis(250));
        assert_eq!(config.worker.max_retry_attempts, 0);
        assert_eq!(config.worker.retry_policy, RetryPolicy::Transient);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/courier"),
            ("EMAIL_FROM", "noreply@example.com"),
            ("WORKER_BATCH_SIZE", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("WORKER_BATCH_SIZE"));
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/courier"),
            ("EMAIL_FROM", "noreply@example.com"),
            ("WORKER_INTERVAL_MINUTES", "hourly"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("WORKER_INTERVAL_MINUTES"));
    }

    #[test]
    fn test_missing_database_url() {
        let err = AppConfig::from_lookup(lookup_from(&[("EMAIL_FROM", "noreply@example.com")]))
            .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_resend_requires_api_key() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/courier"),
            ("EMAIL_FROM", "noreply@example.com"),
            ("MAIL_TRANSPORT", "resend"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("RESEND_API_KEY"));
    }
}
