//! # store-supabase
//!
//! Hosted Postgres persistence for the store, spoken over Supabase's REST
//! surface rather than a direct database connection.
//!
//! ```text
//! ┌──────────────────────┐   PostgREST    ┌──────────────────────────────┐
//! │   SupabaseGateway    │───────────────▶│ orders / purchases /         │
//! │ (PersistenceGateway) │   /rest/v1/*   │ coaching_bookings            │
//! └──────────────────────┘                │ rpc: complete_checkout,      │
//! ┌──────────────────────┐    GoTrue      │      fail_checkout,          │
//! │     SupabaseAuth     │───────────────▶│      purchases_for           │
//! └──────────────────────┘  /auth/v1/user └──────────────────────────────┘
//! ```
//!
//! The schema lives in `migrations/0001_schema.sql`. A project without it
//! answers "relation does not exist", which surfaces as
//! `StoreError::PersistenceUnavailable` so callers fall back instead of failing.

mod auth;
mod client;
mod gateway;
mod rows;

pub use auth::SupabaseAuth;
pub use client::{PostgrestClient, SupabaseConfig};
pub use gateway::SupabaseGateway;
pub use rows::{BookingRow, OrderRow};
