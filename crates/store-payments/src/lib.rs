//! # store-payments
//!
//! Payment side of the Ventaro digital store: hosted checkout, the payment
//! webhook and signed download references.
//!
//! ## Stripe Checkout (Hosted)
//!
//! **Flow:** Cart → pending order → Stripe's hosted page → webhook → completed order
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │  Your Site  │────▶│  Stripe Hosted  │────▶│  Your Site  │
//! │   (cart)    │     │  Checkout Page  │     │  (success)  │
//! └─────────────┘     └─────────────────┘     └─────────────┘
//!                              │
//!                              ▼
//!                     ┌─────────────────┐     ┌─────────────┐
//!                     │ POST /webhook/  │────▶│ Entitlement │
//!                     │     payment     │     │   + email   │
//!                     └─────────────────┘     └─────────────┘
//! ```
//!
//! The webhook is the only writer of `completed`. It verifies the
//! `Stripe-Signature` header before reading the body, treats redelivery as a
//! no-op, and still confirms the purchase by email when storage is down.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use store_payments::{CheckoutInitiator, StripeProvider};
//!
//! let checkout = CheckoutInitiator::new(catalog, gateway, Arc::new(StripeProvider::new("sk_test_xxx")), site_url);
//! let session = checkout.initiate(Some(&identity), &cart).await?;
//!
//! // Redirect user to: session.checkout_url
//! ```

mod checkout;
mod downloads;
mod error;
pub mod metadata;
mod signature;
mod webhook;

pub use checkout::{
    CheckoutInitiator, CheckoutSession, HostedSession, MockPaymentProvider, PaymentProvider, SessionLine,
    SessionRequest, StripeProvider,
};
pub use downloads::DownloadSigner;
pub use error::{PaymentError, Result};
pub use signature::{DEFAULT_TOLERANCE_SECS, WebhookVerifier, signature_header};
pub use webhook::{HandledEvent, SessionDetails, WebhookEvent, WebhookHandler, WebhookOutcome};
