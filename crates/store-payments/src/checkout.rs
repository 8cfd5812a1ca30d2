//! Stripe Checkout Integration
//!
//! Implements the "Stripe Checkout (Hosted)" approach: the server prices the
//! cart, records a pending order, and redirects the buyer to Stripe's page.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store_core::order::price_cart;
use store_core::{CartLine, Catalog, Identity, Order, OrderId, PersistenceGateway, StoreError};
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency,
};

use crate::error::{PaymentError, Result};
use crate::metadata;

/// One priced line sent to the provider
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionLine {
    pub name: String,
    pub description: String,
    pub unit_amount_cents: i64,
    pub quantity: u32,
}

/// Provider-agnostic hosted-checkout request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRequest {
    pub order_id: OrderId,
    pub customer_email: String,
    pub lines: Vec<SessionLine>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

/// A hosted checkout page
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HostedSession {
    /// Provider session id
    pub id: String,
    /// URL to redirect the buyer to
    pub url: String,
}

/// Payment provider trait (Strategy pattern)
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session
    async fn create_session(&self, request: &SessionRequest) -> Result<HostedSession>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Stripe client wrapper
pub struct StripeProvider {
    client: Client,
}

impl StripeProvider {
    /// Create a new Stripe provider
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_session(&self, request: &SessionRequest) -> Result<HostedSession> {
        let mut params = CreateCheckoutSession::new();
        params.customer_email = Some(&request.customer_email);
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.client_reference_id = Some(request.order_id.as_str());
        params.mode = Some(CheckoutSessionMode::Payment);
        params.metadata = Some(request.metadata.clone());

        params.line_items = Some(
            request
                .lines
                .iter()
                .map(|line| CreateCheckoutSessionLineItems {
                    quantity: Some(u64::from(line.quantity)),
                    price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                        currency: Currency::USD,
                        unit_amount: Some(line.unit_amount_cents),
                        product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                            name: line.name.clone(),
                            description: Some(line.description.clone()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
                .collect(),
        );

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| match e {
                stripe::StripeError::Stripe(err) => PaymentError::Stripe(err.to_string()),
                other => PaymentError::ProviderUnavailable(other.to_string()),
            })?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        Ok(HostedSession {
            id: session.id.to_string(),
            url,
        })
    }

    fn name(&self) -> &str {
        "stripe"
    }
}

/// Stand-in provider used when Stripe is not configured, and in tests
#[derive(Default)]
pub struct MockPaymentProvider {
    unavailable: AtomicBool,
    requests: Mutex<Vec<SessionRequest>>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the provider were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_session(&self, request: &SessionRequest) -> Result<HostedSession> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PaymentError::ProviderUnavailable("mock provider offline".into()));
        }
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let id = format!("cs_mock_{}", request.order_id.as_str().replace('-', ""));
        Ok(HostedSession {
            url: format!("{}&mock_session={}", request.success_url, id),
            id,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Pending order id
    pub order_id: OrderId,

    /// Provider session ID
    pub session_id: String,

    /// URL to redirect user to
    pub checkout_url: String,

    /// Server-side total
    pub total: Decimal,
}

/// Creates pending orders and hosted checkout sessions
pub struct CheckoutInitiator {
    catalog: Arc<Catalog>,
    gateway: Arc<dyn PersistenceGateway>,
    provider: Arc<dyn PaymentProvider>,
    site_url: String,
    provider_timeout: Duration,
}

impl CheckoutInitiator {
    pub fn new(
        catalog: Arc<Catalog>,
        gateway: Arc<dyn PersistenceGateway>,
        provider: Arc<dyn PaymentProvider>,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            gateway,
            provider,
            site_url: site_url.into().trim_end_matches('/').to_string(),
            provider_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Validate and price the cart, record a pending order and open a hosted
    /// checkout session for it.
    pub async fn initiate(&self, identity: Option<&Identity>, cart: &[CartLine]) -> Result<CheckoutSession> {
        let identity = identity
            .filter(|i| i.is_authenticated())
            .ok_or(PaymentError::Unauthenticated)?;

        let items = price_cart(&self.catalog, cart)?;
        let order = Order::pending(OrderId::new(), identity.clone(), items);

        match self.gateway.insert_order(&order).await {
            Ok(()) => {}
            Err(StoreError::PersistenceUnavailable(reason)) => {
                tracing::warn!(
                    order_id = %order.id,
                    reason = %reason,
                    "Could not store pending order; continuing, webhook will rebuild it"
                );
            }
            Err(e) => return Err(e.into()),
        }

        let request = SessionRequest {
            order_id: order.id.clone(),
            customer_email: identity.email().to_string(),
            lines: order
                .items
                .iter()
                .filter_map(|item| {
                    let product = self.catalog.get(&item.product_id)?;
                    Some(SessionLine {
                        name: product.name.clone(),
                        description: product.description.clone(),
                        unit_amount_cents: product.price_cents(),
                        quantity: item.quantity,
                    })
                })
                .collect(),
            success_url: format!(
                "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}&order_id={}",
                self.site_url, order.id
            ),
            cancel_url: format!("{}/cart", self.site_url),
            metadata: metadata::encode(&order.id, identity, &order.items),
        };

        let session = tokio::time::timeout(self.provider_timeout, self.provider.create_session(&request))
            .await
            .map_err(|_| PaymentError::ProviderUnavailable("timed out creating checkout session".into()))??;

        tracing::info!(
            order_id = %order.id,
            session_id = %session.id,
            total = %order.total,
            provider = self.provider.name(),
            "Created checkout session"
        );

        Ok(CheckoutSession {
            order_id: order.id,
            session_id: session.id,
            checkout_url: session.url,
            total: order.total,
        })
    }
}
