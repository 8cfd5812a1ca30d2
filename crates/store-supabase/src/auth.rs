//! Supabase Auth (GoTrue) token lookup

use serde::Deserialize;
use store_core::{Identity, StoreError};

use crate::client::{SupabaseConfig, classify, transport};

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Resolves bearer tokens through `GET /auth/v1/user`
#[derive(Clone)]
pub struct SupabaseAuth {
    http: reqwest::Client,
    config: SupabaseConfig,
}

impl SupabaseAuth {
    pub fn new(config: SupabaseConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, config }
    }

    /// The user behind `access_token`, or `None` if the token is not valid
    pub async fn user(&self, access_token: &str) -> Result<Option<Identity>, StoreError> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.config.url))
            .header("apikey", &self.config.service_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport(&e))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status.as_u16(), &body));
        }

        let user: AuthUser = response.json().await.map_err(|e| transport(&e))?;
        Ok(user_identity(user))
    }
}

fn user_identity(user: AuthUser) -> Option<Identity> {
    let email = user.email.filter(|e| !e.trim().is_empty())?;
    Some(Identity::user(user.id, email))
}
