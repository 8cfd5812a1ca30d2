//! Application State

use std::sync::Arc;
use std::time::Duration;

use store_core::{AccessGuard, AccessPolicy, Catalog, EntitlementStore, MemoryGateway, PersistenceGateway};
use store_notify::{Dispatcher, LogMailer, Mailer, NotifyConfig, ResendMailer, SendGridMailer};
use store_payments::{
    CheckoutInitiator, DownloadSigner, MockPaymentProvider, PaymentProvider, StripeProvider, WebhookHandler,
    WebhookVerifier,
};
use store_supabase::{SupabaseAuth, SupabaseGateway};

use crate::config::{Config, EmailProvider};
use crate::identity::{AnonymousOnly, HeaderIdentity, IdentityResolver, SupabaseIdentity};

/// Swappable integrations
pub struct Components {
    pub gateway: Arc<dyn PersistenceGateway>,
    pub payments: Arc<dyn PaymentProvider>,
    pub mailer: Arc<dyn Mailer>,
    pub identity: Arc<dyn IdentityResolver>,
}

impl Components {
    /// Pick live integrations where configured, stand-ins otherwise
    pub fn from_config(config: &Config) -> Self {
        let gateway: Arc<dyn PersistenceGateway> = match &config.supabase {
            Some(supabase) => {
                tracing::info!(url = %supabase.url, "✓ Supabase configured");
                Arc::new(SupabaseGateway::new(supabase.clone()))
            }
            None => {
                tracing::warn!("⚠ Supabase not configured - orders and bookings kept in memory");
                tracing::warn!("  Set SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY in .env");
                Arc::new(MemoryGateway::new())
            }
        };

        let payments: Arc<dyn PaymentProvider> = match &config.stripe_secret_key {
            Some(key) => {
                tracing::info!("✓ Stripe configured");
                Arc::new(StripeProvider::new(key))
            }
            None => {
                tracing::warn!("⚠ Stripe not configured - using mock checkout sessions");
                tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
                Arc::new(MockPaymentProvider::new())
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.email {
            Some(EmailProvider::SendGrid(key)) => {
                tracing::info!("✓ SendGrid configured");
                Arc::new(SendGridMailer::new(key.clone(), config.provider_timeout))
            }
            Some(EmailProvider::Resend(key)) => {
                tracing::info!("✓ Resend configured");
                Arc::new(ResendMailer::new(key.clone(), config.provider_timeout))
            }
            None => {
                tracing::warn!("⚠ No email provider configured - emails are logged only");
                Arc::new(LogMailer)
            }
        };

        let identity: Arc<dyn IdentityResolver> = match (&config.supabase, config.environment.is_production()) {
            (Some(supabase), _) => Arc::new(SupabaseIdentity::new(SupabaseAuth::new(supabase.clone()))),
            (None, false) => {
                tracing::warn!("⚠ Trusting x-user-id / x-user-email headers (development mode)");
                Arc::new(HeaderIdentity)
            }
            (None, true) => {
                tracing::warn!("⚠ No identity provider in production - all requests are anonymous");
                Arc::new(AnonymousOnly)
            }
        };

        Self {
            gateway,
            payments,
            mailer,
            identity,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Product catalog
    pub catalog: Arc<Catalog>,

    /// Persistence backend (Supabase or in-memory)
    pub gateway: Arc<dyn PersistenceGateway>,

    /// Admin and capability checks
    pub policy: AccessPolicy,

    /// Content access guard
    pub guard: Arc<AccessGuard>,

    /// Checkout session creation
    pub checkout: Arc<CheckoutInitiator>,

    /// Payment webhook processing
    pub webhooks: Arc<WebhookHandler>,

    /// Email delivery
    pub dispatcher: Arc<Dispatcher>,

    /// Download token verification
    pub downloads: DownloadSigner,

    /// Request identity resolution
    pub identity: Arc<dyn IdentityResolver>,

    /// Bound on gateway calls made directly by handlers
    pub db_timeout: Duration,

    /// Payment provider name, for health output
    pub payments_mode: String,
}

impl AppState {
    /// Wire components into handler state
    pub fn assemble(config: &Config, components: Components) -> Self {
        let catalog = Arc::new(Catalog::standard());
        let policy = AccessPolicy::new(config.admin_email.as_deref());

        let dispatcher = Arc::new(Dispatcher::new(
            components.mailer,
            catalog.clone(),
            NotifyConfig {
                from_address: config.email_from.clone(),
                admin_email: policy.admin_email().map(str::to_string),
                site_url: config.site_url.clone(),
            },
        ));

        let downloads = match &config.download_secret {
            Some(secret) => DownloadSigner::new(secret),
            None => {
                tracing::warn!("⚠ DOWNLOAD_SIGNING_SECRET not set - download links expire on restart");
                DownloadSigner::ephemeral()
            }
        };

        let verifier = WebhookVerifier::new(
            config.stripe_webhook_secret.clone(),
            config.environment.is_production(),
        );
        if !verifier.is_enforcing() {
            tracing::warn!("⚠ Webhook signatures not verified (no STRIPE_WEBHOOK_SECRET)");
        }

        let payments_mode = components.payments.name().to_string();
        let checkout = CheckoutInitiator::new(
            catalog.clone(),
            components.gateway.clone(),
            components.payments,
            config.site_url.clone(),
        )
        .with_timeout(config.provider_timeout);

        let webhooks = WebhookHandler::new(
            components.gateway.clone(),
            catalog.clone(),
            dispatcher.clone(),
            downloads.clone(),
            verifier,
        )
        .with_db_timeout(config.database_timeout);

        let guard = AccessGuard::new(EntitlementStore::new(
            components.gateway.clone(),
            catalog.clone(),
            policy.clone(),
        ));

        Self {
            catalog,
            gateway: components.gateway,
            policy,
            guard: Arc::new(guard),
            checkout: Arc::new(checkout),
            webhooks: Arc::new(webhooks),
            dispatcher,
            downloads,
            identity: components.identity,
            db_timeout: config.database_timeout,
            payments_mode,
        }
    }

    /// Run a gateway call under the database timeout
    pub async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = store_core::Result<T>>,
    ) -> store_core::Result<T> {
        tokio::time::timeout(self.db_timeout, call)
            .await
            .map_err(|_| store_core::StoreError::PersistenceUnavailable("database call timed out".into()))?
    }
}
