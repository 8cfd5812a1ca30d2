//! Request identity
//!
//! Resolves who is calling from request headers. With Supabase configured a
//! bearer token is checked against its auth endpoint; in development without
//! Supabase the `x-user-id` / `x-user-email` headers are trusted instead.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use store_core::{Identity, StoreError};
use store_supabase::SupabaseAuth;

use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Identity resolution strategy
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// The caller, or `None` if the request carries no valid identity
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Identity>, StoreError>;

    /// Mode name for logs and health output
    fn name(&self) -> &str;
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Bearer tokens checked against Supabase Auth
pub struct SupabaseIdentity {
    auth: SupabaseAuth,
}

impl SupabaseIdentity {
    pub fn new(auth: SupabaseAuth) -> Self {
        Self { auth }
    }
}

#[async_trait]
impl IdentityResolver for SupabaseIdentity {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Identity>, StoreError> {
        match bearer_token(headers) {
            Some(token) => self.auth.user(token).await,
            None => Ok(None),
        }
    }

    fn name(&self) -> &str {
        "supabase"
    }
}

/// Development only: trust identity headers as sent
#[derive(Default)]
pub struct HeaderIdentity;

#[async_trait]
impl IdentityResolver for HeaderIdentity {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Identity>, StoreError> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        Ok(match (header(USER_ID_HEADER), header(USER_EMAIL_HEADER)) {
            (Some(id), Some(email)) => Some(Identity::user(id, email)),
            _ => None,
        })
    }

    fn name(&self) -> &str {
        "dev-headers"
    }
}

/// No identity source available: every request is anonymous
#[derive(Default)]
pub struct AnonymousOnly;

#[async_trait]
impl IdentityResolver for AnonymousOnly {
    async fn resolve(&self, _headers: &HeaderMap) -> Result<Option<Identity>, StoreError> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Extractor for the calling identity, if any
#[derive(Clone, Debug)]
pub struct CurrentIdentity(pub Option<Identity>);

impl CurrentIdentity {
    pub fn get(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match state.identity.resolve(&parts.headers).await {
            Ok(identity) => Ok(CurrentIdentity(identity)),
            Err(e) => {
                // unverifiable callers are treated as signed out
                tracing::warn!(error = %e, resolver = state.identity.name(), "Identity lookup failed");
                Ok(CurrentIdentity(None))
            }
        }
    }
}
