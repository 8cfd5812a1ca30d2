//! Coaching Bookings
//!
//! ```text
//! pending_confirmation ──(admin confirms)──▶ confirmed ──(admin marks)──▶ completed
//!          │                                     │
//!          └───────────(admin cancels)───────────┴──────────────────────▶ cancelled
//! ```
//!
//! A slot is one hour on the daily grid. At most one `confirmed` booking may
//! hold a given date/time.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::identity::Identity;

/// First bookable hour of the day
pub const FIRST_SLOT_HOUR: u32 = 9;
/// Last bookable hour of the day (slot start)
pub const LAST_SLOT_HOUR: u32 = 16;

/// Unique booking identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(String);

impl BookingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Booking lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingConfirmation,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingConfirmation => "pending_confirmation",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_confirmation" | "pending" => Some(BookingStatus::PendingConfirmation),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" | "canceled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    fn can_move_to(self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, to),
            (PendingConfirmation, Confirmed)
                | (PendingConfirmation, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
        )
    }
}

/// The daily slot grid
pub fn slot_grid() -> Vec<NaiveTime> {
    (FIRST_SLOT_HOUR..=LAST_SLOT_HOUR)
        .filter_map(|h| NaiveTime::from_hms_opt(h, 0, 0))
        .collect()
}

/// Parse `HH:MM` into a grid slot
pub fn parse_slot(s: &str) -> Result<NaiveTime> {
    let time = NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| StoreError::InvalidRequest(format!("Invalid time '{}', expected HH:MM", s)))?;
    if time.minute() != 0 || !(FIRST_SLOT_HOUR..=LAST_SLOT_HOUR).contains(&time.hour()) {
        return Err(StoreError::InvalidRequest(format!(
            "{} is not a bookable slot",
            time.format("%H:%M")
        )));
    }
    Ok(time)
}

/// A request for a coaching session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingRequest {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub timezone: String,
    pub notes: Option<String>,
}

/// A coaching booking
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,

    /// Who asked for the session
    pub requester: Identity,

    /// Session date
    pub date: NaiveDate,

    /// Slot start
    pub time: NaiveTime,

    /// Requester's timezone label (display only)
    pub timezone: String,

    pub status: BookingStatus,

    /// Requester's message
    pub notes: Option<String>,

    pub admin_notes: Option<String>,

    pub meeting_link: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Create a pending booking, validating the slot
    pub fn request(requester: Identity, request: BookingRequest) -> Result<Self> {
        parse_slot(&request.time.format("%H:%M").to_string())?;

        let now = Utc::now();
        if request.date < now.date_naive() {
            return Err(StoreError::InvalidRequest(
                "Cannot book a date in the past".into(),
            ));
        }

        Ok(Self {
            id: BookingId::new(),
            requester,
            date: request.date,
            time: request.time,
            timezone: request.timezone,
            status: BookingStatus::PendingConfirmation,
            notes: request.notes,
            admin_notes: None,
            meeting_link: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// `YYYY-MM-DD HH:MM`
    pub fn slot_label(&self) -> String {
        format!("{} {}", self.date, self.time.format("%H:%M"))
    }

    /// Whether `other` is a different confirmed booking on the same slot
    pub fn clashes_with(&self, other: &Booking) -> bool {
        other.id != self.id
            && other.status == BookingStatus::Confirmed
            && other.date == self.date
            && other.time == self.time
    }

    /// Apply an admin update. Slot uniqueness is checked by the caller,
    /// which sees the other bookings.
    pub fn apply(&mut self, update: &BookingUpdate) -> Result<()> {
        if !self.status.can_move_to(update.status) {
            return Err(StoreError::InvalidTransition {
                from: self.status.as_str().into(),
                to: update.status.as_str().into(),
            });
        }

        self.status = update.status;
        if update.admin_notes.is_some() {
            self.admin_notes = update.admin_notes.clone();
        }
        if update.meeting_link.is_some() {
            self.meeting_link = update.meeting_link.clone();
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Admin status change
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingUpdate {
    pub booking_id: BookingId,
    pub status: BookingStatus,
    pub admin_notes: Option<String>,
    pub meeting_link: Option<String>,
}

/// Free and taken slots for one day
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub date: NaiveDate,
    pub available: Vec<String>,
    pub booked: Vec<String>,
}

/// Compute availability for `date` from that day's bookings
pub fn availability(date: NaiveDate, bookings: &[Booking]) -> SlotAvailability {
    let (booked, available): (Vec<_>, Vec<_>) = slot_grid().into_iter().partition(|slot| {
        bookings
            .iter()
            .any(|b| b.date == date && b.time == *slot && b.status == BookingStatus::Confirmed)
    });

    let label = |t: NaiveTime| t.format("%H:%M").to_string();
    SlotAvailability {
        date,
        available: available.into_iter().map(label).collect(),
        booked: booked.into_iter().map(label).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(time: &str) -> BookingRequest {
        BookingRequest {
            date: NaiveDate::from_ymd_opt(2030, 5, 14).unwrap(),
            time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            timezone: "Australia/Sydney".into(),
            notes: None,
        }
    }

    fn update(booking: &Booking, status: BookingStatus) -> BookingUpdate {
        BookingUpdate {
            booking_id: booking.id.clone(),
            status,
            admin_notes: None,
            meeting_link: Some("https://meet.example/abc".into()),
        }
    }

    #[test]
    fn test_slot_grid() {
        let grid = slot_grid();
        assert_eq!(grid.len(), 8);
        assert!(parse_slot("09:00").is_ok());
        assert!(parse_slot("16:00").is_ok());
        assert!(parse_slot("17:00").is_err());
        assert!(parse_slot("10:30").is_err());
        assert!(parse_slot("ten").is_err());
    }

    #[test]
    fn test_request_rejects_off_grid() {
        let requester = Identity::user("u1", "u1@x.io");
        assert!(Booking::request(requester.clone(), request("10:00")).is_ok());
        assert!(Booking::request(requester, request("08:00")).is_err());
    }

    #[test]
    fn test_lifecycle() {
        let mut booking = Booking::request(Identity::user("u1", "u1@x.io"), request("10:00")).unwrap();
        booking.apply(&update(&booking, BookingStatus::Confirmed)).unwrap();
        assert_eq!(booking.meeting_link.as_deref(), Some("https://meet.example/abc"));
        booking.apply(&update(&booking, BookingStatus::Completed)).unwrap();
        assert!(booking.status.is_terminal());
        assert!(matches!(
            booking.apply(&update(&booking, BookingStatus::Cancelled)),
            Err(StoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_pending_cannot_complete() {
        let mut booking = Booking::request(Identity::user("u1", "u1@x.io"), request("10:00")).unwrap();
        assert!(booking.apply(&update(&booking, BookingStatus::Completed)).is_err());
    }

    #[test]
    fn test_availability() {
        let mut a = Booking::request(Identity::user("u1", "u1@x.io"), request("10:00")).unwrap();
        let b = Booking::request(Identity::user("u2", "u2@x.io"), request("11:00")).unwrap();
        a.apply(&update(&a, BookingStatus::Confirmed)).unwrap();

        let slots = availability(a.date, &[a.clone(), b.clone()]);
        assert_eq!(slots.booked, vec!["10:00".to_string()]);
        assert_eq!(slots.available.len(), 7);
        assert!(slots.available.contains(&"11:00".to_string()));

        let c = Booking::request(Identity::user("u3", "u3@x.io"), request("10:00")).unwrap();
        assert!(c.clashes_with(&a));
        assert!(!c.clashes_with(&b));
        assert!(!a.clashes_with(&a));
    }
}
