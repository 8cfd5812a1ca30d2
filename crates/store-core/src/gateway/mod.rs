//! Persistence Gateway
//!
//! Every read and write of orders, purchases and bookings goes through
//! [`PersistenceGateway`]. There are exactly two implementations: the hosted
//! database (in `store-supabase`) and [`MemoryGateway`] for development and
//! tests. The server picks one at startup and injects it everywhere.

mod memory;

pub use memory::MemoryGateway;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::booking::{Booking, BookingId, BookingUpdate};
use crate::error::Result;
use crate::identity::Identity;
use crate::order::{CompletionOutcome, Order, OrderCompletion, OrderId, PurchasedItem};

/// Storage backend trait (Strategy pattern)
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Insert a new pending order
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Fetch an order by id
    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>>;

    /// Atomically complete an order and record its purchased items.
    ///
    /// Inserts `completion.order` when no row exists. An order that is already
    /// completed is left untouched and reported as
    /// [`CompletionOutcome::AlreadyCompleted`].
    async fn complete_order(&self, completion: &OrderCompletion) -> Result<CompletionOutcome>;

    /// Mark a pending order failed. Returns `true` if the status changed.
    async fn fail_order(&self, id: &OrderId) -> Result<bool>;

    /// Purchased items of completed orders claimed by `identity`
    async fn purchases(&self, identity: &Identity) -> Result<Vec<PurchasedItem>>;

    /// Insert a new booking request
    async fn insert_booking(&self, booking: &Booking) -> Result<()>;

    /// Fetch a booking by id
    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>>;

    /// All bookings on a date, any status
    async fn bookings_on(&self, date: NaiveDate) -> Result<Vec<Booking>>;

    /// Apply an admin transition, enforcing one confirmed booking per slot
    async fn update_booking(&self, update: &BookingUpdate) -> Result<Booking>;
}
