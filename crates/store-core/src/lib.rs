//! # store-core
//!
//! Domain model of the Ventaro digital store: the static catalog, orders,
//! coaching bookings, and the rules that decide who may open what.
//!
//! ## Entitlement flow
//!
//! ```text
//! ┌─────────┐   ┌───────────┐   ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Catalog │──▶│ Checkout  │──▶│   Webhook    │──▶│ Entitlement  │──▶│ AccessGuard │
//! │         │   │ (pending) │   │ (completed)  │   │    Store     │   │   (read)    │
//! └─────────┘   └───────────┘   └──────────────┘   └──────────────┘   └─────────────┘
//!                     │                 │                  ▲
//!                     └──────── PersistenceGateway ────────┘
//! ```
//!
//! Checkout and webhook live in `store-payments`; this crate owns the data they
//! write and the read side that turns completed orders into access.

pub mod booking;
pub mod catalog;
pub mod entitlement;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod identity;
pub mod order;
pub mod policy;

pub use booking::{Booking, BookingId, BookingRequest, BookingStatus, BookingUpdate, SlotAvailability};
pub use catalog::{Catalog, Fulfillment, Product, ProductId, ProductKind};
pub use entitlement::EntitlementStore;
pub use error::{Result, StoreError};
pub use gateway::{MemoryGateway, PersistenceGateway};
pub use guard::{AccessDecision, AccessGuard, DenialReason};
pub use identity::Identity;
pub use order::{
    CartLine, CompletionOutcome, LineItem, Order, OrderCompletion, OrderId, OrderStatus,
    PurchasedItem,
};
pub use policy::AccessPolicy;
