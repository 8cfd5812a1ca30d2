//! Server configuration
//!
//! Everything comes from the environment (after `.env` is loaded). Missing
//! integrations are `None` and degrade to mock or in-memory mode; startup
//! never fails on absent configuration.

use std::time::Duration;

use store_supabase::SupabaseConfig;

/// Deployment environment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Transactional email provider credentials
#[derive(Clone, Debug)]
pub enum EmailProvider {
    SendGrid(String),
    Resend(String),
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    /// `RUST_LOG` directive for the tracing subscriber
    pub log_filter: String,
    pub bind_addr: String,
    pub site_url: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub supabase: Option<SupabaseConfig>,
    pub email: Option<EmailProvider>,
    pub email_from: String,
    pub admin_email: Option<String>,
    pub download_secret: Option<String>,
    pub provider_timeout: Duration,
    pub database_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            log_filter: "info,tower_http=debug".into(),
            bind_addr: "0.0.0.0:3000".into(),
            site_url: "http://localhost:3000".into(),
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            supabase: None,
            email: None,
            email_from: "orders@ventaro.ai".into(),
            admin_email: None,
            download_secret: None,
            provider_timeout: Duration::from_secs(10),
            database_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Build from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let secs = |key: &str, default: Duration| {
            var(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(default, Duration::from_secs)
        };
        let database_timeout = secs("DATABASE_TIMEOUT_SECS", defaults.database_timeout);

        let supabase = match (var("SUPABASE_URL"), var("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(key)) => Some(SupabaseConfig::new(url, key).with_timeout(database_timeout)),
            _ => None,
        };

        let email = var("SENDGRID_API_KEY")
            .map(EmailProvider::SendGrid)
            .or_else(|| var("RESEND_API_KEY").map(EmailProvider::Resend));

        Self {
            environment: var("APP_ENV").map_or(Environment::Development, |v| Environment::parse(&v)),
            log_filter: var("RUST_LOG").unwrap_or(defaults.log_filter),
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            site_url: var("SITE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.site_url),
            stripe_secret_key: var("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
            supabase,
            email,
            email_from: var("EMAIL_FROM").unwrap_or(defaults.email_from),
            admin_email: var("ADMIN_EMAIL"),
            download_secret: var("DOWNLOAD_SIGNING_SECRET"),
            provider_timeout: secs("PROVIDER_TIMEOUT_SECS", defaults.provider_timeout),
            database_timeout,
        }
    }
}
