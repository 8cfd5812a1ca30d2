//! Router-level tests over in-memory integrations

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use store_core::{MemoryGateway, PersistenceGateway};
use store_notify::{MemoryMailer, TemplateKey};
use store_payments::{MockPaymentProvider, signature_header};
use store_server::config::Config;
use store_server::identity::{HeaderIdentity, USER_EMAIL_HEADER, USER_ID_HEADER};
use store_server::{AppState, Components, app};
use tower::ServiceExt;

const WEBHOOK_SECRET: &str = "whsec_test";
const ADMIN: &str = "admin@ventaro.ai";

struct Harness {
    app: Router,
    gateway: Arc<MemoryGateway>,
    provider: Arc<MockPaymentProvider>,
    mailer: Arc<MemoryMailer>,
}

impl Harness {
    fn new() -> Self {
        let gateway = Arc::new(MemoryGateway::new());
        let provider = Arc::new(MockPaymentProvider::new());
        let mailer = Arc::new(MemoryMailer::new());

        let config = Config {
            stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
            admin_email: Some(ADMIN.into()),
            download_secret: Some("download-secret".into()),
            ..Config::default()
        };
        let components = Components {
            gateway: gateway.clone(),
            payments: provider.clone(),
            mailer: mailer.clone(),
            identity: Arc::new(HeaderIdentity),
        };

        Self {
            app: app(AppState::assemble(&config, components)),
            gateway,
            provider,
            mailer,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn checkout_as(&self, user: Option<(&str, &str)>, items: Value) -> (StatusCode, Value) {
        self.send(json_request("POST", "/checkout", user, &json!({ "items": items })))
            .await
    }

    async fn webhook(&self, payload: &Value) -> (StatusCode, Value) {
        let bytes = serde_json::to_vec(payload).unwrap();
        let signature = signature_header(&bytes, WEBHOOK_SECRET, chrono::Utc::now().timestamp());
        self.send(
            Request::builder()
                .method("POST")
                .uri("/webhook/payment")
                .header("stripe-signature", signature)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(bytes))
                .unwrap(),
        )
        .await
    }

    fn sent(&self, template: TemplateKey) -> usize {
        self.mailer.sent().iter().filter(|e| e.template == template).count()
    }

    async fn wait_for_email(&self, template: TemplateKey) {
        for _ in 0..100 {
            if self.sent(template) > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

fn json_request(method: &str, uri: &str, user: Option<(&str, &str)>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some((id, email)) = user {
        builder = builder.header(USER_ID_HEADER, id).header(USER_EMAIL_HEADER, email);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, user: Option<(&str, &str)>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some((id, email)) = user {
        builder = builder.header(USER_ID_HEADER, id).header(USER_EMAIL_HEADER, email);
    }
    builder.body(Body::empty()).unwrap()
}

const ALICE: (&str, &str) = ("user-alice", "alice@example.com");
const BOB: (&str, &str) = ("user-bob", "bob@example.com");
const ADMIN_USER: (&str, &str) = ("user-admin", ADMIN);

/// Event the provider would send for the most recent checkout session
fn completed_event(harness: &Harness, event_id: &str) -> Value {
    let request = harness.provider.requests().pop().unwrap();
    let session_id = format!("cs_mock_{}", request.order_id.as_str().replace('-', ""));
    json!({
        "id": event_id,
        "object": "event",
        "type": "checkout.session.completed",
        "created": 1_700_000_000,
        "livemode": false,
        "pending_webhooks": 1,
        "request": null,
        "data": { "object": {
            "object": "checkout.session",
            "id": session_id,
            "automatic_tax": { "enabled": false, "liability": null, "status": null },
            "client_reference_id": request.order_id.as_str(),
            "created": 1_700_000_000,
            "currency": "usd",
            "custom_fields": [],
            "custom_text": {
                "after_submit": null,
                "shipping_address": null,
                "submit": null,
                "terms_of_service_acceptance": null
            },
            "customer_email": request.customer_email,
            "expires_at": 1_700_086_400,
            "livemode": false,
            "metadata": request.metadata,
            "mode": "payment",
            "payment_method_types": ["card"],
            "payment_status": "paid",
            "shipping_options": [],
            "status": "complete"
        }}
    })
}

fn booking_date() -> String {
    (chrono::Utc::now().date_naive() + chrono::Days::new(7)).to_string()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_reports_modes() {
    let harness = Harness::new();
    let (status, body) = harness.send(get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["payments"], "mock");
    assert_eq!(body["persistence"], "memory");
    assert_eq!(body["webhook_signatures"], true);
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn test_checkout_requires_sign_in() {
    let harness = Harness::new();
    let (status, body) = harness.checkout_as(None, json!([{ "id": "ebook" }])).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");
    assert!(harness.provider.requests().is_empty());
}

#[tokio::test]
async fn test_checkout_rejects_unknown_product() {
    let harness = Harness::new();
    let (status, body) = harness.checkout_as(Some(ALICE), json!([{ "id": "nope" }])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PRODUCT");
}

#[tokio::test]
async fn test_checkout_prices_server_side() {
    let harness = Harness::new();
    let items = json!([
        { "id": "1", "name": "Tampered", "price": 0.01, "quantity": 2 },
        { "productId": "prompts" }
    ]);
    let (status, body) = harness.checkout_as(Some(ALICE), items).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], "40.00");
    assert!(body["url"].as_str().unwrap().contains("mock_session="));

    let order_id = body["orderId"].as_str().unwrap();
    let order = harness
        .gateway
        .get_order(&store_core::OrderId::from_string(order_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, store_core::OrderStatus::Pending);
}

#[tokio::test]
async fn test_checkout_provider_outage() {
    let harness = Harness::new();
    harness.provider.set_unavailable(true);
    let (status, body) = harness.checkout_as(Some(ALICE), json!([{ "id": "ebook" }])).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "PAYMENT_PROVIDER_UNAVAILABLE");
}

// ============================================================================
// Webhook and entitlements
// ============================================================================

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let harness = Harness::new();
    let response = harness
        .send(
            Request::builder()
                .method("POST")
                .uri("/webhook/payment")
                .header("stripe-signature", "t=1,v1=deadbeef")
                .body(Body::from(r#"{"id":"evt","type":"checkout.session.completed"}"#))
                .unwrap(),
        )
        .await;

    assert_eq!(response.0, StatusCode::BAD_REQUEST);
    assert_eq!(response.1["code"], "INVALID_SIGNATURE");
}

#[tokio::test]
async fn test_purchase_unlocks_content() {
    let harness = Harness::new();

    let (status, body) = harness.send(get("/api/content/ebook", Some(ALICE))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "PURCHASE_REQUIRED");

    harness.checkout_as(Some(ALICE), json!([{ "id": "ebook" }])).await;
    let (status, body) = harness.webhook(&completed_event(&harness, "evt_1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let (status, body) = harness.send(get("/api/content/ebook", Some(ALICE))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["granted"], true);

    // Legacy alias resolves to the same entitlement
    let (status, _) = harness.send(get("/api/content/ai-tools-mastery-guide-2025", Some(ALICE))).await;
    assert_eq!(status, StatusCode::OK);

    // Another user is still locked out
    let (status, _) = harness.send(get("/api/content/ebook", Some(BOB))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_redelivered_webhook_emails_once() {
    let harness = Harness::new();
    harness.checkout_as(Some(ALICE), json!([{ "id": "ebook" }])).await;
    let event = completed_event(&harness, "evt_1");

    let (first, _) = harness.webhook(&event).await;
    let (second, _) = harness.webhook(&event).await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);

    harness.wait_for_email(TemplateKey::OrderConfirmation).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.sent(TemplateKey::OrderConfirmation), 1);

    let (_, body) = harness.send(get("/purchases/confirm", Some(ALICE))).await;
    assert_eq!(body["purchases"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unhandled_event_acknowledged() {
    let harness = Harness::new();
    let (status, body) = harness
        .webhook(&json!({ "id": "evt_x", "type": "customer.created", "data": { "object": {} } }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn test_admin_sees_everything() {
    let harness = Harness::new();
    for product in ["ebook", "prompts", "video-course", "coaching"] {
        let (status, _) = harness
            .send(get(&format!("/api/content/{}", product), Some(ADMIN_USER)))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", product);
    }
}

#[tokio::test]
async fn test_content_api_unknown_and_anonymous() {
    let harness = Harness::new();

    let (status, body) = harness.send(get("/api/content/ebook", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, body) = harness.send(get("/api/content/mystery", Some(ALICE))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PRODUCT");
}

#[tokio::test]
async fn test_content_page_flow() {
    let harness = Harness::new();

    let response = harness.app.clone().oneshot(get("/content/1", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/signin?redirect=/content/ebook"
    );

    let response = harness
        .app
        .clone()
        .oneshot(get("/content/ebook", Some(ALICE)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&html).contains("Purchase required"));
}

#[tokio::test]
async fn test_entitlement_read_failure_denies() {
    let harness = Harness::new();
    harness.gateway.set_offline(true);

    let (status, body) = harness.send(get("/api/content/ebook", Some(ALICE))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "PERSISTENCE_UNAVAILABLE");
}

// ============================================================================
// Purchases and downloads
// ============================================================================

#[tokio::test]
async fn test_purchases_scoped_to_caller() {
    let harness = Harness::new();

    let (status, _) = harness.send(get("/purchases/confirm", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = harness
        .send(get("/purchases/confirm?userId=user-alice", Some(BOB)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    harness.checkout_as(Some(ALICE), json!([{ "id": "prompts" }])).await;
    harness.webhook(&completed_event(&harness, "evt_1")).await;

    let (status, body) = harness
        .send(get("/purchases/confirm?userId=user-alice", Some(ADMIN_USER)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["purchases"][0]["productId"], "prompts");
}

#[tokio::test]
async fn test_download_link_resolves() {
    let harness = Harness::new();
    harness.checkout_as(Some(ALICE), json!([{ "id": "ebook" }])).await;
    harness.webhook(&completed_event(&harness, "evt_1")).await;

    let (_, body) = harness.send(get("/purchases/confirm", Some(ALICE))).await;
    let url = body["purchases"][0]["accessUrl"].as_str().unwrap().to_string();
    let path = url.trim_start_matches("http://localhost:3000");

    let (status, body) = harness.send(get(path, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["productId"], "ebook");
    assert_eq!(body["fulfillment"]["type"], "download");

    let tampered = path.replace("ebook", "video-course");
    let (status, body) = harness.send(get(&tampered, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

// ============================================================================
// Bookings and contact
// ============================================================================

#[tokio::test]
async fn test_booking_lifecycle() {
    let harness = Harness::new();
    let date = booking_date();

    let (status, _) = harness
        .send(json_request(
            "POST",
            "/coaching-booking",
            None,
            &json!({ "date": date, "time": "10:00" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, booking) = harness
        .send(json_request(
            "POST",
            "/coaching-booking",
            Some(ALICE),
            &json!({ "date": date, "time": "10:00", "timezone": "Europe/London" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "pending_confirmation");
    let booking_id = booking["id"].as_str().unwrap().to_string();

    // Pending requests don't take the slot
    let (_, slots) = harness
        .send(get(&format!("/coaching-booking?date={}", date), None))
        .await;
    assert_eq!(slots["available"].as_array().unwrap().len(), 8);

    let update = json!({ "bookingId": booking_id, "status": "confirmed", "meetingLink": "https://meet.example/abc" });
    let (status, _) = harness
        .send(json_request("PATCH", "/admin/coaching-bookings", Some(BOB), &update))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = harness
        .send(json_request("PATCH", "/admin/coaching-bookings", Some(ADMIN_USER), &update))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["meeting_link"], "https://meet.example/abc");

    let (_, slots) = harness
        .send(get(&format!("/coaching-booking?date={}", date), None))
        .await;
    assert_eq!(slots["booked"], json!(["10:00"]));

    // Confirmed slot is taken
    let (status, body) = harness
        .send(json_request(
            "POST",
            "/coaching-booking",
            Some(BOB),
            &json!({ "date": date, "time": "10:00" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SLOT_TAKEN");

    let (status, body) = harness
        .send(get(&format!("/admin/coaching-bookings?date={}", date), Some(ADMIN_USER)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_booking_rejects_off_grid_slot() {
    let harness = Harness::new();
    let (status, body) = harness
        .send(json_request(
            "POST",
            "/coaching-booking",
            Some(ALICE),
            &json!({ "date": booking_date(), "time": "18:00" }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_admin_update_rejects_bad_status() {
    let harness = Harness::new();
    let (status, body) = harness
        .send(json_request(
            "PATCH",
            "/admin/coaching-bookings",
            Some(ADMIN_USER),
            &json!({ "bookingId": "b1", "status": "maybe" }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_contact_acknowledged() {
    let harness = Harness::new();

    let (status, _) = harness
        .send(json_request(
            "POST",
            "/contact",
            None,
            &json!({ "name": "Ann", "email": "not-an-email", "message": "hi" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = harness
        .send(json_request(
            "POST",
            "/contact",
            None,
            &json!({ "name": "Ann", "email": "ann@example.com", "message": "Do you offer team plans?" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    harness.wait_for_email(TemplateKey::InquiryAdminCopy).await;
    assert_eq!(harness.sent(TemplateKey::InquiryAcknowledgement), 1);
    assert_eq!(harness.sent(TemplateKey::InquiryAdminCopy), 1);
}
