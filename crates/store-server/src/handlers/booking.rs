//! Coaching bookings

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use store_core::booking::{availability, parse_slot};
use store_core::{Booking, BookingId, BookingRequest, BookingStatus, BookingUpdate, SlotAvailability, StoreError};

use crate::error::{ApiResult, bad_request, forbidden, store_error, unauthenticated};
use crate::identity::CurrentIdentity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub date: NaiveDate,
    /// `HH:MM`
    pub time: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingRequest {
    pub booking_id: String,
    pub status: String,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub meeting_link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingList {
    pub date: NaiveDate,
    pub bookings: Vec<Booking>,
}

/// Request a coaching slot
pub async fn create_booking(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Json(payload): Json<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<Booking>)> {
    let requester = identity.get().ok_or_else(unauthenticated)?.clone();

    let time = parse_slot(&payload.time).map_err(store_error)?;
    let booking = Booking::request(
        requester,
        BookingRequest {
            date: payload.date,
            time,
            timezone: payload.timezone.unwrap_or_else(|| "UTC".into()),
            notes: payload.notes.filter(|n| !n.trim().is_empty()),
        },
    )
    .map_err(store_error)?;

    let existing = state
        .bounded(state.gateway.bookings_on(booking.date))
        .await
        .map_err(store_error)?;
    if existing.iter().any(|other| booking.clashes_with(other)) {
        return Err(store_error(StoreError::SlotTaken(booking.slot_label())));
    }

    state
        .bounded(state.gateway.insert_booking(&booking))
        .await
        .map_err(store_error)?;

    tracing::info!(
        booking_id = %booking.id,
        requester = %booking.requester,
        slot = %booking.slot_label(),
        "Booking requested"
    );

    let dispatcher = state.dispatcher.clone();
    let notice = booking.clone();
    tokio::spawn(async move { dispatcher.booking_requested(&notice).await });

    Ok((StatusCode::CREATED, Json(booking)))
}

/// Free and confirmed slots for a date
pub async fn slot_availability(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<SlotAvailability>> {
    let bookings = state
        .bounded(state.gateway.bookings_on(query.date))
        .await
        .map_err(store_error)?;
    Ok(Json(availability(query.date, &bookings)))
}

fn require_admin(state: &AppState, identity: &CurrentIdentity) -> ApiResult<()> {
    let caller = identity.get().ok_or_else(unauthenticated)?;
    if state.policy.is_admin(caller) {
        Ok(())
    } else {
        tracing::warn!(identity = %caller, "Non-admin attempted admin booking access");
        Err(forbidden())
    }
}

/// Admin: move a booking through its lifecycle
pub async fn update_booking(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Json(payload): Json<UpdateBookingRequest>,
) -> ApiResult<Json<Booking>> {
    require_admin(&state, &identity)?;

    let status = BookingStatus::parse(&payload.status)
        .ok_or_else(|| bad_request(format!("Unknown booking status '{}'", payload.status)))?;
    let update = BookingUpdate {
        booking_id: BookingId::from_string(payload.booking_id),
        status,
        admin_notes: payload.admin_notes,
        meeting_link: payload.meeting_link,
    };

    let booking = state
        .bounded(state.gateway.update_booking(&update))
        .await
        .map_err(store_error)?;

    tracing::info!(booking_id = %booking.id, status = booking.status.as_str(), "Booking updated");

    let dispatcher = state.dispatcher.clone();
    let notice = booking.clone();
    tokio::spawn(async move { dispatcher.booking_updated(&notice).await });

    Ok(Json(booking))
}

/// Admin: every booking on a date
pub async fn list_bookings(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<BookingList>> {
    require_admin(&state, &identity)?;

    let bookings = state
        .bounded(state.gateway.bookings_on(query.date))
        .await
        .map_err(store_error)?;
    Ok(Json(BookingList {
        date: query.date,
        bookings,
    }))
}
