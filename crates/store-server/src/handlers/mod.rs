//! HTTP Handlers

pub mod booking;
pub mod checkout;
pub mod contact;
pub mod content;
pub mod downloads;
pub mod purchases;
pub mod webhook;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// `stripe` or `mock`
    pub payments: String,
    /// `supabase` or `memory`
    pub persistence: &'static str,
    /// `sendgrid`, `resend` or `log`
    pub email: String,
    pub identity: String,
    pub webhook_signatures: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        payments: state.payments_mode.clone(),
        persistence: state.gateway.backend(),
        email: state.dispatcher.mailer_name().to_string(),
        identity: state.identity.name().to_string(),
        webhook_signatures: state.webhooks.verifier().is_enforcing(),
    })
}

#[derive(Debug, Serialize)]
pub struct Received {
    pub received: bool,
}

impl Received {
    pub fn ok() -> Json<Self> {
        Json(Self { received: true })
    }
}
