//! Ventaro store HTTP server
//!
//! Axum router over the store crates. The binary in `main.rs` wires live
//! integrations from the environment; tests build [`AppState`] from
//! in-memory stand-ins and drive [`app`] directly.

pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{booking, checkout, contact, content, downloads, health_check, purchases, webhook};
pub use crate::state::{AppState, Components};

/// Build the application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Checkout and payment
        .route("/checkout", post(checkout::create_checkout))
        .route("/webhook/payment", post(webhook::payment_webhook))
        .route("/purchases/confirm", get(purchases::confirm_purchases))
        // Coaching
        .route(
            "/coaching-booking",
            get(booking::slot_availability).post(booking::create_booking),
        )
        .route(
            "/admin/coaching-bookings",
            get(booking::list_bookings).patch(booking::update_booking),
        )
        // Contact
        .route("/contact", post(contact::submit_inquiry))
        // Protected content
        .route("/api/content/{product}", get(content::content_api))
        .route("/content/{product}", get(content::content_page))
        .route("/downloads/{token}", get(downloads::resolve_download))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
