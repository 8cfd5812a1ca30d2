//! Protected content
//!
//! Both the JSON endpoint and the rendered page go through
//! [`AccessGuard::check`](store_core::AccessGuard::check); neither carries
//! its own entitlement logic.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Serialize;
use store_core::{AccessDecision, DenialReason, Fulfillment, Product, StoreError};
use store_notify::template::escape;

use crate::error::{ApiResult, api_error, store_error};
use crate::identity::CurrentIdentity;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ContentResponse {
    pub product: Product,
    pub granted: bool,
}

/// JSON access check for a product's content
pub async fn content_api(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Path(product): Path<String>,
) -> ApiResult<Json<ContentResponse>> {
    let decision = state
        .guard
        .check(identity.get(), &product)
        .await
        .map_err(store_error)?;

    match decision {
        AccessDecision::Granted(product) => Ok(Json(ContentResponse { product, granted: true })),
        AccessDecision::Denied {
            product,
            reason: DenialReason::NotPurchased,
        } => Err(api_error(
            StatusCode::FORBIDDEN,
            "PURCHASE_REQUIRED",
            format!("Purchase {} to unlock this content.", product.name),
        )),
        AccessDecision::Denied {
            reason: DenialReason::Unverifiable,
            ..
        } => Err(store_error(StoreError::PersistenceUnavailable(
            "entitlements could not be verified".into(),
        ))),
    }
}

/// Rendered content page
pub async fn content_page(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Path(product_ref): Path<String>,
) -> Response {
    let Ok(product) = state.catalog.resolve(&product_ref) else {
        return (
            StatusCode::NOT_FOUND,
            page("Not found", "<p>We couldn't find that product.</p>"),
        )
            .into_response();
    };

    if identity.get().is_none() {
        return Redirect::to(&format!("/signin?redirect=/content/{}", product.id)).into_response();
    }

    match state.guard.check(identity.get(), product.id.as_str()).await {
        Ok(AccessDecision::Granted(product)) => content_body(&product).into_response(),
        Ok(AccessDecision::Denied { product, reason }) => purchase_required(&product, reason).into_response(),
        Err(e) => {
            tracing::warn!(product = %product.id, error = %e, "Content page check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                page("Something went wrong", "<p>Please try again shortly.</p>"),
            )
                .into_response()
        }
    }
}

fn content_body(product: &Product) -> Html<String> {
    let access = match &product.fulfillment {
        Fulfillment::Download { .. } => {
            "<p>Your download links are in your order confirmation email and on your purchases page.</p>"
                .to_string()
        }
        Fulfillment::Booking { flow } => format!(
            r#"<p><a href="/{}">Choose a time for your session</a>.</p>"#,
            escape(flow)
        ),
    };
    page(
        &product.name,
        &format!("<p>{}</p>{}", escape(&product.description), access),
    )
}

fn purchase_required(product: &Product, reason: DenialReason) -> Html<String> {
    let body = match reason {
        DenialReason::NotPurchased => format!(
            r#"<p>This content is part of <strong>{}</strong>.</p><p><a href="/products/{}">Purchase it to unlock access</a>.</p>"#,
            escape(&product.name),
            product.id
        ),
        DenialReason::Unverifiable => {
            "<p>We couldn't confirm your purchase right now. Please refresh in a moment.</p>".to_string()
        }
    };
    page("Purchase required", &body)
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{} | Ventaro AI</title></head>\
         <body><main><h1>{}</h1>{}</main></body></html>",
        escape(title),
        escape(title),
        body
    ))
}
