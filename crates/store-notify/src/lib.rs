//! # store-notify
//!
//! Transactional email for the store: order confirmations, booking notices and
//! inquiry acknowledgements.
//!
//! ```text
//! template::render ──▶ Dispatcher ──(retry w/ backoff)──▶ Mailer ──▶ SendGrid / Resend / log
//!                          │
//!                          └──(exhausted)──▶ dead-letter log
//! ```
//!
//! Delivery failures are logged and swallowed; callers never see them.

pub mod dispatcher;
pub mod error;
pub mod mailer;
pub mod template;

pub use dispatcher::{DeadLetter, Dispatcher, NotifyConfig, RetryConfig};
pub use error::{NotifyError, Result};
pub use mailer::{LogMailer, Mailer, MemoryMailer, ResendMailer, SendGridMailer};
pub use template::{DownloadLink, Email, Inquiry, TemplateKey};
