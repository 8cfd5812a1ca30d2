//! In-memory gateway
//!
//! Used when no database is configured, and as the test double. One lock
//! guards all tables so completion and purchase recording are atomic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::NaiveDate;

use super::PersistenceGateway;
use crate::booking::{Booking, BookingId, BookingStatus, BookingUpdate};
use crate::error::{Result, StoreError};
use crate::identity::Identity;
use crate::order::{CompletionOutcome, Order, OrderCompletion, OrderId, PurchasedItem};

#[derive(Default)]
struct Tables {
    orders: HashMap<OrderId, Order>,
    purchases: Vec<PurchasedItem>,
    bookings: HashMap<BookingId, Booking>,
}

/// In-memory persistence (for development and tests)
#[derive(Default)]
pub struct MemoryGateway {
    tables: RwLock<Tables>,
    offline: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with `PersistenceUnavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::PersistenceUnavailable(
                "in-memory store offline".into(),
            ));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.check_online()?;
        self.tables
            .read()
            .map_err(|_| StoreError::Persistence("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.check_online()?;
        self.tables
            .write()
            .map_err(|_| StoreError::Persistence("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut tables = self.write()?;
        tables.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>> {
        Ok(self.read()?.orders.get(id).cloned())
    }

    async fn complete_order(&self, completion: &OrderCompletion) -> Result<CompletionOutcome> {
        let mut tables = self.write()?;

        let order = tables
            .orders
            .entry(completion.order.id.clone())
            .or_insert_with(|| completion.order.clone());

        if !order.complete(&completion.payment_session_id)? {
            return Ok(CompletionOutcome::AlreadyCompleted(order.clone()));
        }

        let order = order.clone();
        let items = order.purchased_items(&completion.downloads);
        tables.purchases.extend(items);

        Ok(CompletionOutcome::Completed(order))
    }

    async fn fail_order(&self, id: &OrderId) -> Result<bool> {
        let mut tables = self.write()?;
        let order = tables
            .orders
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("Order {}", id)))?;
        order.fail()
    }

    async fn purchases(&self, identity: &Identity) -> Result<Vec<PurchasedItem>> {
        let tables = self.read()?;
        let mut items: Vec<_> = tables
            .purchases
            .iter()
            .filter(|item| {
                tables
                    .orders
                    .get(&item.order_id)
                    .is_some_and(|order| identity.claims(&order.owner))
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
        Ok(items)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        let mut tables = self.write()?;
        tables.bookings.insert(booking.id.clone(), booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>> {
        Ok(self.read()?.bookings.get(id).cloned())
    }

    async fn bookings_on(&self, date: NaiveDate) -> Result<Vec<Booking>> {
        let tables = self.read()?;
        let mut bookings: Vec<_> = tables
            .bookings
            .values()
            .filter(|b| b.date == date)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.time.cmp(&b.time).then(a.created_at.cmp(&b.created_at)));
        Ok(bookings)
    }

    async fn update_booking(&self, update: &BookingUpdate) -> Result<Booking> {
        let mut tables = self.write()?;

        let mut booking = tables
            .bookings
            .get(&update.booking_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Booking {}", update.booking_id)))?;

        booking.apply(update)?;

        if booking.status == BookingStatus::Confirmed
            && tables.bookings.values().any(|other| booking.clashes_with(other))
        {
            return Err(StoreError::SlotTaken(booking.slot_label()));
        }

        tables.bookings.insert(booking.id.clone(), booking.clone());
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveTime;

    use super::*;
    use crate::booking::BookingRequest;
    use crate::catalog::{Catalog, ProductId};
    use crate::order::{CartLine, price_cart};

    fn pending_order(owner: Identity) -> Order {
        let items = price_cart(
            &Catalog::standard(),
            &[CartLine {
                product: "ebook".into(),
                quantity: 1,
            }],
        )
        .unwrap();
        Order::pending(OrderId::new(), owner, items)
    }

    fn completion(order: &Order) -> OrderCompletion {
        let mut downloads = BTreeMap::new();
        downloads.insert(ProductId::from_canonical("ebook"), "tok".to_string());
        OrderCompletion {
            payment_session_id: "cs_test_1".into(),
            order: order.clone(),
            downloads,
        }
    }

    fn booking_on(time: &str, who: &str) -> Booking {
        Booking::request(
            Identity::user(who, format!("{who}@x.io")),
            BookingRequest {
                date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
                time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
                timezone: "UTC".into(),
                notes: None,
            },
        )
        .unwrap()
    }

    fn confirm(booking: &Booking) -> BookingUpdate {
        BookingUpdate {
            booking_id: booking.id.clone(),
            status: BookingStatus::Confirmed,
            admin_notes: None,
            meeting_link: None,
        }
    }

    #[tokio::test]
    async fn test_complete_is_idempotent() {
        let store = MemoryGateway::new();
        let owner = Identity::user("u1", "u1@x.io");
        let order = pending_order(owner.clone());
        store.insert_order(&order).await.unwrap();

        let first = store.complete_order(&completion(&order)).await.unwrap();
        let second = store.complete_order(&completion(&order)).await.unwrap();

        assert!(!first.is_duplicate());
        assert!(second.is_duplicate());
        let purchases = store.purchases(&owner).await.unwrap();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].download_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_complete_inserts_missing_order() {
        let store = MemoryGateway::new();
        let owner = Identity::guest("g@x.io");
        let order = pending_order(owner.clone());

        let outcome = store.complete_order(&completion(&order)).await.unwrap();
        assert!(!outcome.is_duplicate());
        assert_eq!(store.purchases(&owner).await.unwrap().len(), 1);
        assert!(store.get_order(&order.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pending_orders_grant_nothing() {
        let store = MemoryGateway::new();
        let owner = Identity::user("u1", "u1@x.io");
        store.insert_order(&pending_order(owner.clone())).await.unwrap();
        assert!(store.purchases(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_order() {
        let store = MemoryGateway::new();
        let order = pending_order(Identity::user("u1", "u1@x.io"));
        store.insert_order(&order).await.unwrap();
        assert!(store.fail_order(&order.id).await.unwrap());
        assert!(store.complete_order(&completion(&order)).await.is_err());
        assert!(matches!(
            store.fail_order(&OrderId::new()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_offline() {
        let store = MemoryGateway::new();
        store.set_offline(true);
        assert!(matches!(
            store.get_order(&OrderId::new()).await,
            Err(StoreError::PersistenceUnavailable(_))
        ));
        store.set_offline(false);
        assert!(store.get_order(&OrderId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_confirmed_slot_is_exclusive() {
        let store = MemoryGateway::new();
        let first = booking_on("10:00", "u1");
        let second = booking_on("10:00", "u2");
        store.insert_booking(&first).await.unwrap();
        store.insert_booking(&second).await.unwrap();

        store.update_booking(&confirm(&first)).await.unwrap();
        assert!(matches!(
            store.update_booking(&confirm(&second)).await,
            Err(StoreError::SlotTaken(_))
        ));

        let stored = store.get_booking(&second.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::PendingConfirmation);
    }

    #[tokio::test]
    async fn test_cancelled_slot_frees_up() {
        let store = MemoryGateway::new();
        let first = booking_on("11:00", "u1");
        let second = booking_on("11:00", "u2");
        store.insert_booking(&first).await.unwrap();
        store.insert_booking(&second).await.unwrap();

        store.update_booking(&confirm(&first)).await.unwrap();
        store
            .update_booking(&BookingUpdate {
                status: BookingStatus::Cancelled,
                ..confirm(&first)
            })
            .await
            .unwrap();
        store.update_booking(&confirm(&second)).await.unwrap();

        assert_eq!(store.bookings_on(first.date).await.unwrap().len(), 2);
    }
}
