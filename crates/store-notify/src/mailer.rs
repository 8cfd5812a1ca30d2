//! Mailers
//!
//! Transport strategy for rendered emails. SendGrid and Resend talk to the
//! providers' HTTP APIs; [`LogMailer`] is the no-op used when no key is
//! configured; [`MemoryMailer`] records messages for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::error::{NotifyError, Result};
use crate::template::Email;

/// Email transport trait (Strategy pattern)
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message
    async fn send(&self, from: &str, email: &Email) -> Result<()>;

    /// Transport name
    fn name(&self) -> &str;
}

async fn check_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(NotifyError::from_status(status.as_u16(), body))
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// SendGrid v3 mail API
pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SendGridMailer {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key: api_key.into(),
            endpoint: "https://api.sendgrid.com/v3/mail/send".into(),
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, from: &str, email: &Email) -> Result<()> {
        let body = json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": from },
            "subject": email.subject,
            "content": [
                { "type": "text/plain", "value": email.text },
                { "type": "text/html", "value": email.html },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        check_response(response).await
    }

    fn name(&self) -> &str {
        "sendgrid"
    }
}

/// Resend email API
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key: api_key.into(),
            endpoint: "https://api.resend.com/emails".into(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, from: &str, email: &Email) -> Result<()> {
        let body = json!({
            "from": from,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html,
            "text": email.text,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        check_response(response).await
    }

    fn name(&self) -> &str {
        "resend"
    }
}

/// Logs instead of sending (no provider configured)
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, from: &str, email: &Email) -> Result<()> {
        info!(
            from = %from,
            to = %email.to,
            subject = %email.subject,
            template = email.template.as_str(),
            "Email not sent (no provider configured)"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Records sent messages; can be told to fail the first N sends
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Email>>,
    failures_left: AtomicU32,
    attempts: AtomicU32,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` sends with a retryable error
    pub fn failing(n: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(n),
            ..Self::default()
        }
    }

    /// Messages delivered so far
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Send attempts, including failed ones
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, _from: &str, email: &Email) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(NotifyError::Simulated(format!("send to {} failed", email.to)));
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
