//! Notification Dispatcher
//!
//! Renders templates and hands them to the configured [`Mailer`]. Delivery is
//! retried with exponential backoff; messages that still fail land in a
//! bounded dead-letter log. Nothing here ever fails the caller's transaction.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use store_core::{Booking, Catalog, Fulfillment, Order, ProductId};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::mailer::Mailer;
use crate::template::{self, DownloadLink, Email, Inquiry};

/// Dead letters kept in memory
pub const DEAD_LETTER_CAPACITY: usize = 100;

/// Sender identity and links
#[derive(Clone, Debug)]
pub struct NotifyConfig {
    /// `From:` address
    pub from_address: String,

    /// Receives booking alerts and inquiry copies
    pub admin_email: Option<String>,

    /// Public base URL used in links
    pub site_url: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            from_address: "orders@ventaro.ai".into(),
            admin_email: None,
            site_url: "http://localhost:3000".into(),
        }
    }
}

/// Retry behaviour for email delivery
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// No waiting between attempts (tests)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// `base_delay * 2^retry`, capped at `max_delay`
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// A message that exhausted its retries
#[derive(Clone, Debug, Serialize)]
pub struct DeadLetter {
    pub email: Email,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// Email dispatcher
pub struct Dispatcher {
    mailer: Arc<dyn Mailer>,
    catalog: Arc<Catalog>,
    config: NotifyConfig,
    retry: RetryConfig,
    dead_letters: Mutex<VecDeque<DeadLetter>>,
}

impl Dispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, catalog: Arc<Catalog>, config: NotifyConfig) -> Self {
        Self {
            mailer,
            catalog,
            config,
            retry: RetryConfig::default(),
            dead_letters: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn mailer_name(&self) -> &str {
        self.mailer.name()
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// Send with retry; on final failure record a dead letter and return the error
    pub async fn deliver(&self, email: &Email) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.mailer.send(&self.config.from_address, email).await {
                Ok(()) => {
                    info!(
                        to = %email.to,
                        template = email.template.as_str(),
                        attempt,
                        "Email sent"
                    );
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for_retry(attempt - 1);
                    warn!(
                        to = %email.to,
                        template = email.template.as_str(),
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Email send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        to = %email.to,
                        template = email.template.as_str(),
                        attempt,
                        error = %e,
                        "Email send failed, moving to dead-letter log"
                    );
                    self.record_dead_letter(email, &e.to_string(), attempt);
                    return Err(e);
                }
            }
        }
    }

    /// Deliver and swallow the error
    pub async fn dispatch(&self, email: Email) {
        let _ = self.deliver(&email).await;
    }

    /// Fire-and-forget delivery on the runtime
    pub fn spawn(self: &Arc<Self>, email: Email) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.dispatch(email).await })
    }

    fn record_dead_letter(&self, email: &Email, error: &str, attempts: u32) {
        if let Ok(mut letters) = self.dead_letters.lock() {
            if letters.len() == DEAD_LETTER_CAPACITY {
                letters.pop_front();
            }
            letters.push_back(DeadLetter {
                email: email.clone(),
                error: error.to_string(),
                attempts,
                failed_at: Utc::now(),
            });
        }
    }

    /// Snapshot of the dead-letter log, oldest first
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters
            .lock()
            .map(|letters| letters.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Public URL for a download token
    pub fn download_url(&self, token: &str) -> String {
        format!("{}/downloads/{}", self.config.site_url.trim_end_matches('/'), token)
    }

    /// Links for each line of a completed order
    pub fn download_links(&self, order: &Order, downloads: &BTreeMap<ProductId, String>) -> Vec<DownloadLink> {
        order
            .items
            .iter()
            .filter_map(|item| {
                let product = self.catalog.get(&item.product_id)?;
                let url = match &product.fulfillment {
                    Fulfillment::Download { .. } => self.download_url(downloads.get(&product.id)?),
                    Fulfillment::Booking { flow } => {
                        format!("{}/{}", self.config.site_url.trim_end_matches('/'), flow)
                    }
                };
                Some(DownloadLink {
                    product_name: product.name.clone(),
                    url,
                })
            })
            .collect()
    }

    /// Render the order confirmation for a completed order
    pub fn order_confirmation(&self, order: &Order, downloads: &BTreeMap<ProductId, String>) -> Email {
        let links = self.download_links(order, downloads);
        template::order_confirmation(order, &self.catalog, &links)
    }

    /// Booking received: acknowledgement to requester, alert to admin
    pub async fn booking_requested(&self, booking: &Booking) {
        self.dispatch(template::booking_requested(booking)).await;
        match &self.config.admin_email {
            Some(admin) => self.dispatch(template::booking_admin_alert(booking, admin)).await,
            None => debug!(booking_id = %booking.id, "No admin email configured, skipping alert"),
        }
    }

    /// Booking status changed by an admin
    pub async fn booking_updated(&self, booking: &Booking) {
        self.dispatch(template::booking_status_changed(booking)).await;
    }

    /// Contact-form inquiry: acknowledgement and admin copy
    pub async fn inquiry_received(&self, inquiry: &Inquiry) {
        self.dispatch(template::inquiry_acknowledgement(inquiry)).await;
        if let Some(admin) = &self.config.admin_email {
            self.dispatch(template::inquiry_admin_copy(inquiry, admin)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::MemoryMailer;
    use crate::template::TemplateKey;
    use store_core::order::{CartLine, price_cart};
    use store_core::{Identity, OrderId};

    fn dispatcher(mailer: Arc<MemoryMailer>, attempts: u32) -> Dispatcher {
        Dispatcher::new(
            mailer,
            Arc::new(Catalog::standard()),
            NotifyConfig {
                site_url: "https://store.example/".into(),
                admin_email: Some("admin@x.io".into()),
                ..Default::default()
            },
        )
        .with_retry(RetryConfig::immediate(attempts))
    }

    fn inquiry() -> Inquiry {
        Inquiry {
            name: "Sam".into(),
            email: "sam@x.io".into(),
            message: "hello".into(),
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for_retry(0), Duration::from_millis(200));
        assert_eq!(retry.delay_for_retry(1), Duration::from_millis(400));
        assert_eq!(retry.delay_for_retry(10), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let mailer = Arc::new(MemoryMailer::failing(2));
        let dispatcher = dispatcher(mailer.clone(), 3);
        assert!(dispatcher.deliver(&template::inquiry_acknowledgement(&inquiry())).await.is_ok());
        assert_eq!(mailer.attempts(), 3);
        assert!(dispatcher.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_goes_to_dead_letters() {
        let mailer = Arc::new(MemoryMailer::failing(10));
        let dispatcher = dispatcher(mailer.clone(), 3);
        dispatcher.dispatch(template::inquiry_acknowledgement(&inquiry())).await;

        let letters = dispatcher.dead_letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].attempts, 3);
        assert_eq!(letters[0].email.template, TemplateKey::InquiryAcknowledgement);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_backoff_waits() {
        let mailer = Arc::new(MemoryMailer::failing(1));
        let dispatcher = Dispatcher::new(mailer.clone(), Arc::new(Catalog::standard()), NotifyConfig::default());
        let started = tokio::time::Instant::now();
        dispatcher.dispatch(template::inquiry_acknowledgement(&inquiry())).await;
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_inquiry_sends_admin_copy() {
        let mailer = Arc::new(MemoryMailer::new());
        dispatcher(mailer.clone(), 1).inquiry_received(&inquiry()).await;
        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, "admin@x.io");
    }

    #[test]
    fn test_download_links() {
        let catalog = Catalog::standard();
        let items = price_cart(
            &catalog,
            &[
                CartLine {
                    product: "ebook".into(),
                    quantity: 1,
                },
                CartLine {
                    product: "coaching".into(),
                    quantity: 1,
                },
            ],
        )
        .unwrap();
        let order = Order::pending(OrderId::new(), Identity::guest("g@x.io"), items);
        let mut downloads = BTreeMap::new();
        downloads.insert(ProductId::from_canonical("ebook"), "tok123".to_string());

        let links = dispatcher(Arc::new(MemoryMailer::new()), 1).download_links(&order, &downloads);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://store.example/downloads/tok123");
        assert_eq!(links[1].url, "https://store.example/coaching-booking");
    }
}
