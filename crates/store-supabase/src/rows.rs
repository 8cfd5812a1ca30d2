//! Table rows and their mapping to domain types

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store_core::{
    Booking, BookingId, BookingStatus, Identity, LineItem, Order, OrderId, OrderStatus, ProductId, StoreError,
};

/// `orders` row
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderRow {
    pub id: String,
    pub user_id: Option<String>,
    pub email: String,
    pub items: Vec<LineItem>,
    pub total: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub payment_session_id: Option<String>,
    pub notified: bool,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.owner.user_id().map(str::to_string),
            email: order.owner.email().to_string(),
            items: order.items.clone(),
            total: order.total,
            status: order.status.as_str().to_string(),
            created_at: order.created_at,
            completed_at: order.completed_at,
            payment_session_id: order.payment_session_id.clone(),
            notified: order.notified,
        }
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Persistence(format!("unknown order status '{}'", row.status)))?;
        Ok(Order {
            id: OrderId::from_string(row.id),
            owner: owner(row.user_id, &row.email),
            items: row.items,
            total: row.total,
            status,
            created_at: row.created_at,
            completed_at: row.completed_at,
            payment_session_id: row.payment_session_id,
            notified: row.notified,
        })
    }
}

/// Arguments of `complete_checkout`
#[derive(Debug, Serialize)]
pub struct CompleteCheckoutArgs {
    pub p_order: OrderRow,
    pub p_session_id: String,
    pub p_downloads: BTreeMap<ProductId, String>,
}

/// Result of `complete_checkout`
#[derive(Debug, Deserialize)]
pub struct CompleteCheckoutResult {
    /// `completed` or `already_completed`
    pub outcome: String,
    pub order: OrderRow,
}

/// Arguments of `purchases_for`
#[derive(Debug, Serialize)]
pub struct PurchasesForArgs<'a> {
    pub p_user_id: Option<&'a str>,
    pub p_email: &'a str,
}

/// `coaching_bookings` row
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingRow {
    pub id: String,
    pub user_id: Option<String>,
    pub email: String,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
    pub timezone: String,
    pub status: String,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub meeting_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Booking> for BookingRow {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id.to_string(),
            user_id: booking.requester.user_id().map(str::to_string),
            email: booking.requester.email().to_string(),
            booking_date: booking.date,
            booking_time: booking.time,
            timezone: booking.timezone.clone(),
            status: booking.status.as_str().to_string(),
            notes: booking.notes.clone(),
            admin_notes: booking.admin_notes.clone(),
            meeting_link: booking.meeting_link.clone(),
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = BookingStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Persistence(format!("unknown booking status '{}'", row.status)))?;
        Ok(Booking {
            id: BookingId::from_string(row.id),
            requester: owner(row.user_id, &row.email),
            date: row.booking_date,
            time: row.booking_time,
            timezone: row.timezone,
            status,
            notes: row.notes,
            admin_notes: row.admin_notes,
            meeting_link: row.meeting_link,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn owner(user_id: Option<String>, email: &str) -> Identity {
    match user_id.filter(|id| !id.is_empty()) {
        Some(user_id) => Identity::user(user_id, email),
        None => Identity::guest(email),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_order_row_from_postgrest_json() {
        let row: OrderRow = serde_json::from_value(json!({
            "id": "0b6c2a52-6d43-4f0e-9d4a-5c1d2b3a4f10",
            "user_id": null,
            "email": "Guest@X.io",
            "items": [{"product_id": "ebook", "quantity": 1, "unit_price": "15.00"}],
            "total": 15.00,
            "status": "completed",
            "created_at": "2026-01-05T10:00:00.123456+00:00",
            "completed_at": "2026-01-05T10:02:00+00:00",
            "payment_session_id": "cs_test_1",
            "notified": true
        }))
        .unwrap();

        let order = Order::try_from(row).unwrap();
        assert_eq!(order.owner, Identity::guest("guest@x.io"));
        assert_eq!(order.total, dec!(15));
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.items[0].product_id.as_str(), "ebook");
    }

    #[test]
    fn test_unknown_status_rejected() {
        let order = Order::pending(OrderId::new(), Identity::user("u1", "u1@x.io"), Vec::new());
        let mut row = OrderRow::from(&order);
        row.status = "refunded".into();
        assert!(matches!(Order::try_from(row), Err(StoreError::Persistence(_))));
    }

    #[test]
    fn test_booking_row_time_column() {
        let row: BookingRow = serde_json::from_value(json!({
            "id": "b1",
            "user_id": "u1",
            "email": "u1@x.io",
            "booking_date": "2030-01-07",
            "booking_time": "10:00:00",
            "timezone": "Europe/London",
            "status": "confirmed",
            "notes": null,
            "admin_notes": null,
            "meeting_link": "https://meet.example/abc",
            "created_at": "2029-12-01T09:00:00Z",
            "updated_at": "2029-12-02T09:00:00Z"
        }))
        .unwrap();

        let booking = Booking::try_from(row).unwrap();
        assert_eq!(booking.slot_label(), "2030-01-07 10:00");
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(booking.requester.is_authenticated());
    }
}
