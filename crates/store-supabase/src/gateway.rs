//! Supabase-backed [`PersistenceGateway`]
//!
//! Plain reads and inserts go through PostgREST table endpoints. Order
//! completion runs in the `complete_checkout` SQL function so the status flip,
//! the purchase rows and the `notified` marker land in one transaction.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::json;
use store_core::{
    Booking, BookingId, BookingUpdate, CompletionOutcome, Identity, Order, OrderCompletion, OrderId,
    PersistenceGateway, PurchasedItem, Result, StoreError,
};

use crate::client::{PostgrestClient, SupabaseConfig};
use crate::rows::{BookingRow, CompleteCheckoutArgs, CompleteCheckoutResult, OrderRow, PurchasesForArgs};

const ORDERS: &str = "orders";
const BOOKINGS: &str = "coaching_bookings";

/// Hosted Postgres persistence
#[derive(Clone)]
pub struct SupabaseGateway {
    client: PostgrestClient,
}

impl SupabaseGateway {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            client: PostgrestClient::new(config),
        }
    }

    pub fn url(&self) -> &str {
        &self.client.config().url
    }
}

#[async_trait]
impl PersistenceGateway for SupabaseGateway {
    fn backend(&self) -> &'static str {
        "supabase"
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let request = self
            .client
            .table(Method::POST, ORDERS)
            .header("Prefer", "return=minimal")
            .json(&OrderRow::from(order));
        self.client.send(request).await?;
        tracing::debug!(order_id = %order.id, "Inserted pending order");
        Ok(())
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>> {
        let request = self
            .client
            .table(Method::GET, ORDERS)
            .query(&[("id", format!("eq.{}", id)), ("select", "*".to_string())]);
        let rows: Vec<OrderRow> = self.client.fetch(request).await?;
        rows.into_iter().next().map(Order::try_from).transpose()
    }

    async fn complete_order(&self, completion: &OrderCompletion) -> Result<CompletionOutcome> {
        let args = CompleteCheckoutArgs {
            p_order: OrderRow::from(&completion.order),
            p_session_id: completion.payment_session_id.clone(),
            p_downloads: completion.downloads.clone(),
        };
        let request = self.client.rpc("complete_checkout").json(&args);
        let result: CompleteCheckoutResult = self.client.fetch(request).await?;
        let order = Order::try_from(result.order)?;

        match result.outcome.as_str() {
            "completed" => Ok(CompletionOutcome::Completed(order)),
            "already_completed" => Ok(CompletionOutcome::AlreadyCompleted(order)),
            other => Err(StoreError::Persistence(format!("unexpected completion outcome '{}'", other))),
        }
    }

    async fn fail_order(&self, id: &OrderId) -> Result<bool> {
        let request = self
            .client
            .rpc("fail_checkout")
            .json(&json!({ "p_order_id": id.as_str() }));
        self.client.fetch(request).await
    }

    async fn purchases(&self, identity: &Identity) -> Result<Vec<PurchasedItem>> {
        let args = PurchasesForArgs {
            p_user_id: identity.user_id(),
            p_email: identity.email(),
        };
        let request = self.client.rpc("purchases_for").json(&args);
        self.client.fetch(request).await
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        let request = self
            .client
            .table(Method::POST, BOOKINGS)
            .header("Prefer", "return=minimal")
            .json(&BookingRow::from(booking));
        self.client.send(request).await?;
        Ok(())
    }

    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>> {
        let request = self
            .client
            .table(Method::GET, BOOKINGS)
            .query(&[("id", format!("eq.{}", id)), ("select", "*".to_string())]);
        let rows: Vec<BookingRow> = self.client.fetch(request).await?;
        rows.into_iter().next().map(Booking::try_from).transpose()
    }

    async fn bookings_on(&self, date: NaiveDate) -> Result<Vec<Booking>> {
        let request = self.client.table(Method::GET, BOOKINGS).query(&[
            ("booking_date", format!("eq.{}", date)),
            ("select", "*".to_string()),
            ("order", "booking_time.asc,created_at.asc".to_string()),
        ]);
        let rows: Vec<BookingRow> = self.client.fetch(request).await?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn update_booking(&self, update: &BookingUpdate) -> Result<Booking> {
        let mut booking = self
            .get_booking(&update.booking_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Booking {}", update.booking_id)))?;
        let previous = booking.status;
        booking.apply(update)?;

        // Conditional on the status we read; the partial unique index on
        // confirmed slots rejects a second confirmation with 23505.
        let request = self
            .client
            .table(Method::PATCH, BOOKINGS)
            .query(&[
                ("id", format!("eq.{}", booking.id)),
                ("status", format!("eq.{}", previous.as_str())),
            ])
            .header("Prefer", "return=representation")
            .json(&json!({
                "status": booking.status.as_str(),
                "admin_notes": booking.admin_notes,
                "meeting_link": booking.meeting_link,
                "updated_at": booking.updated_at,
            }));

        let rows: Vec<BookingRow> = match self.client.fetch(request).await {
            Err(StoreError::SlotTaken(_)) => return Err(StoreError::SlotTaken(booking.slot_label())),
            other => other?,
        };

        match rows.into_iter().next() {
            Some(row) => Booking::try_from(row),
            None => Err(StoreError::InvalidTransition {
                from: previous.as_str().into(),
                to: update.status.as_str().into(),
            }),
        }
    }
}

impl std::fmt::Debug for SupabaseGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseGateway").field("url", &self.url()).finish_non_exhaustive()
    }
}
