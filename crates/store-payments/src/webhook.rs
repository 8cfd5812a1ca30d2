//! Stripe Webhook Handling
//!
//! Processes Stripe checkout events: completion grants the purchased products,
//! expiry or async failure marks the order failed, everything else is
//! acknowledged and ignored.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use store_core::{
    Catalog, CompletionOutcome, Order, OrderCompletion, OrderId, PersistenceGateway, ProductId, StoreError,
};
use store_notify::Dispatcher;
use stripe::{CheckoutSession, CheckoutSessionPaymentStatus, Event, EventObject, EventType};
use tokio::task::JoinHandle;

use crate::downloads::DownloadSigner;
use crate::error::{PaymentError, Result};
use crate::metadata;
use crate::signature::WebhookVerifier;

/// Event id and type, readable for any event shape
#[derive(Debug, Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
}

/// Checkout session details carried by an event
#[derive(Clone, Debug)]
pub struct SessionDetails {
    pub session_id: String,
    pub order_id: OrderId,
    pub customer_email: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Parsed webhook event
#[derive(Clone, Debug)]
pub enum WebhookEvent {
    /// Payment captured - complete the order
    PaymentSucceeded(SessionDetails),

    /// Session completed but funds not yet captured (delayed methods)
    AwaitingPayment(SessionDetails),

    /// Session expired or async payment failed - fail the order
    PaymentFailed(SessionDetails),

    /// Unhandled event type
    Other { event_type: String },
}

impl WebhookEvent {
    /// Parse a verified payload into the event id and what it means for an order.
    ///
    /// Checkout session events must deserialize as a full Stripe event; any
    /// other type is acknowledged by name without looking at its object.
    pub fn parse(payload: &[u8]) -> Result<(String, Self)> {
        let envelope: Envelope =
            serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

        let event: Event = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(_) if !envelope.event_type.starts_with(CHECKOUT_SESSION_PREFIX) => {
                return Ok((envelope.id, WebhookEvent::Other { event_type: envelope.event_type }));
            }
            Err(e) => return Err(PaymentError::WebhookParse(e.to_string())),
        };

        let parsed = match event.type_ {
            EventType::CheckoutSessionCompleted => {
                let session = checkout_session(&event)?;
                let paid = session.payment_status != CheckoutSessionPaymentStatus::Unpaid;
                let details = SessionDetails::from_session(session)?;
                if paid {
                    WebhookEvent::PaymentSucceeded(details)
                } else {
                    WebhookEvent::AwaitingPayment(details)
                }
            }
            EventType::CheckoutSessionAsyncPaymentSucceeded => {
                WebhookEvent::PaymentSucceeded(SessionDetails::from_session(checkout_session(&event)?)?)
            }
            EventType::CheckoutSessionExpired | EventType::CheckoutSessionAsyncPaymentFailed => {
                WebhookEvent::PaymentFailed(SessionDetails::from_session(checkout_session(&event)?)?)
            }
            _ => WebhookEvent::Other {
                event_type: envelope.event_type,
            },
        };
        Ok((envelope.id, parsed))
    }
}

const CHECKOUT_SESSION_PREFIX: &str = "checkout.session.";

fn checkout_session(event: &Event) -> Result<&CheckoutSession> {
    match &event.data.object {
        EventObject::CheckoutSession(session) => Ok(session),
        _ => Err(PaymentError::WebhookParse("Invalid checkout session data".into())),
    }
}

impl SessionDetails {
    fn from_session(session: &CheckoutSession) -> Result<Self> {
        let metadata = session.metadata.clone().unwrap_or_default();
        let order_id = metadata
            .get(metadata::ORDER_ID)
            .cloned()
            .or_else(|| session.client_reference_id.clone())
            .filter(|id| !id.is_empty())
            .map(OrderId::from_string)
            .ok_or_else(|| PaymentError::WebhookParse("session carries no order id".into()))?;

        let customer_email = session.customer_email.clone().or_else(|| {
            session
                .customer_details
                .as_ref()
                .and_then(|details| details.email.clone())
        });

        Ok(Self {
            session_id: session.id.to_string(),
            order_id,
            customer_email,
            metadata,
        })
    }
}

/// What a delivery did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Order moved to completed by this delivery
    Completed(OrderId),
    /// Redelivery of an already-completed order
    Duplicate(OrderId),
    /// Storage unreachable; order rebuilt from the event so the buyer still hears back
    CompletedInMemory(OrderId),
    /// Order moved to failed
    Failed(OrderId),
    /// Acknowledged without action
    Ignored(String),
}

/// Outcome plus the spawned notification, if any
#[derive(Debug)]
pub struct HandledEvent {
    pub outcome: WebhookOutcome,
    pub notification: Option<JoinHandle<()>>,
}

impl HandledEvent {
    fn quiet(outcome: WebhookOutcome) -> Self {
        Self {
            outcome,
            notification: None,
        }
    }
}

/// Webhook handler
pub struct WebhookHandler {
    gateway: Arc<dyn PersistenceGateway>,
    catalog: Arc<Catalog>,
    dispatcher: Arc<Dispatcher>,
    signer: DownloadSigner,
    verifier: WebhookVerifier,
    db_timeout: Duration,
    /// Orders confirmed by email from this process while storage could not record
    /// the completion. Entries leave once a later delivery reaches storage.
    notified_fallback: Mutex<HashSet<OrderId>>,
}

impl WebhookHandler {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        catalog: Arc<Catalog>,
        dispatcher: Arc<Dispatcher>,
        signer: DownloadSigner,
        verifier: WebhookVerifier,
    ) -> Self {
        Self {
            gateway,
            catalog,
            dispatcher,
            signer,
            verifier,
            db_timeout: Duration::from_secs(5),
            notified_fallback: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_db_timeout(mut self, timeout: Duration) -> Self {
        self.db_timeout = timeout;
        self
    }

    pub fn verifier(&self) -> &WebhookVerifier {
        &self.verifier
    }

    /// Verify the signature, then process the event
    pub async fn handle(&self, payload: &[u8], signature: Option<&str>) -> Result<HandledEvent> {
        self.verifier.verify(payload, signature)?;
        self.process(payload).await
    }

    /// Process an already-verified payload
    pub async fn process(&self, payload: &[u8]) -> Result<HandledEvent> {
        let (event_id, event) = WebhookEvent::parse(payload)?;

        match event {
            WebhookEvent::PaymentSucceeded(session) => {
                tracing::info!(event_id = %event_id, order_id = %session.order_id, "Processing payment success");
                self.complete(session).await
            }
            WebhookEvent::AwaitingPayment(session) => {
                tracing::info!(
                    event_id = %event_id,
                    order_id = %session.order_id,
                    "Checkout completed but payment still pending"
                );
                Ok(HandledEvent::quiet(WebhookOutcome::Ignored("payment pending".into())))
            }
            WebhookEvent::PaymentFailed(session) => self.fail(session).await,
            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_id = %event_id, event_type = %event_type, "Unhandled webhook event");
                Ok(HandledEvent::quiet(WebhookOutcome::Ignored(event_type)))
            }
        }
    }

    async fn complete(&self, session: SessionDetails) -> Result<HandledEvent> {
        let owner = metadata::decode_owner(&session.metadata, session.customer_email.as_deref())?;
        let items = metadata::decode_items(&session.metadata, &self.catalog)?;
        let order = Order::pending(session.order_id.clone(), owner, items);
        let downloads = self.sign_downloads(&order);

        let completion = OrderCompletion {
            payment_session_id: session.session_id.clone(),
            order,
            downloads,
        };

        match self.bounded(self.gateway.complete_order(&completion)).await {
            Ok(CompletionOutcome::Completed(order)) => {
                tracing::info!(
                    order_id = %order.id,
                    owner = %order.owner,
                    total = %order.total,
                    "Order completed"
                );
                // emailed already if an earlier delivery hit an outage
                let notification = (!self.release_fallback(&order.id))
                    .then(|| self.notify(&order, &completion.downloads));
                Ok(HandledEvent {
                    outcome: WebhookOutcome::Completed(order.id),
                    notification,
                })
            }
            Ok(CompletionOutcome::AlreadyCompleted(order)) => {
                self.release_fallback(&order.id);
                tracing::info!(order_id = %order.id, "Order already completed, skipping");
                Ok(HandledEvent::quiet(WebhookOutcome::Duplicate(order.id)))
            }
            Err(StoreError::InvalidTransition { from, to }) => {
                tracing::warn!(
                    order_id = %session.order_id,
                    from = %from,
                    to = %to,
                    "Payment succeeded for an order that cannot complete"
                );
                Ok(HandledEvent::quiet(WebhookOutcome::Ignored(format!("order is {}", from))))
            }
            Err(e) => {
                tracing::error!(
                    order_id = %session.order_id,
                    error = %e,
                    "Could not record completion, confirming from event payload"
                );
                let mut order = completion.order;
                order.complete(&completion.payment_session_id)?;
                let notification = self
                    .claim_notification(&order.id)
                    .then(|| self.notify(&order, &completion.downloads));
                Ok(HandledEvent {
                    outcome: WebhookOutcome::CompletedInMemory(order.id),
                    notification,
                })
            }
        }
    }

    async fn fail(&self, session: SessionDetails) -> Result<HandledEvent> {
        match self.bounded(self.gateway.fail_order(&session.order_id)).await {
            Ok(changed) => {
                if changed {
                    tracing::info!(order_id = %session.order_id, "Order failed");
                }
                Ok(HandledEvent::quiet(WebhookOutcome::Failed(session.order_id)))
            }
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(order_id = %session.order_id, "Failure event for unknown order");
                Ok(HandledEvent::quiet(WebhookOutcome::Ignored("unknown order".into())))
            }
            Err(StoreError::InvalidTransition { from, .. }) => {
                tracing::warn!(order_id = %session.order_id, from = %from, "Failure event for settled order");
                Ok(HandledEvent::quiet(WebhookOutcome::Ignored(format!("order is {}", from))))
            }
            Err(e) => {
                tracing::error!(order_id = %session.order_id, error = %e, "Could not record order failure");
                Ok(HandledEvent::quiet(WebhookOutcome::Ignored("storage unavailable".into())))
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = store_core::Result<T>>,
    ) -> store_core::Result<T> {
        tokio::time::timeout(self.db_timeout, call)
            .await
            .map_err(|_| StoreError::PersistenceUnavailable("database call timed out".into()))?
    }

    fn sign_downloads(&self, order: &Order) -> BTreeMap<ProductId, String> {
        order
            .items
            .iter()
            .map(|item| (item.product_id.clone(), self.signer.sign(&order.id, &item.product_id)))
            .collect()
    }

    /// First fallback confirmation for an order wins; later ones must not email again
    fn claim_notification(&self, order_id: &OrderId) -> bool {
        match self.notified_fallback.lock() {
            Ok(mut seen) => seen.insert(order_id.clone()),
            Err(_) => false,
        }
    }

    /// Drop an order from the fallback ledger; true if it had been emailed from there
    fn release_fallback(&self, order_id: &OrderId) -> bool {
        self.notified_fallback
            .lock()
            .map(|mut seen| seen.remove(order_id))
            .unwrap_or(false)
    }

    fn notify(&self, order: &Order, downloads: &BTreeMap<ProductId, String>) -> JoinHandle<()> {
        let email = self.dispatcher.order_confirmation(order, downloads);
        self.dispatcher.spawn(email)
    }
}
