//! Ventaro store server
//!
//! Reads configuration from the environment, reports which integrations are
//! live, and serves the store API.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use store_server::config::Config;
use store_server::{AppState, Components, app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment, .env included, before anything reads it
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        environment = ?config.environment,
        site_url = %config.site_url,
        "Configuration loaded"
    );

    // Integrations (live or stand-in) and handler state
    let components = Components::from_config(&config);
    let state = AppState::assemble(&config, components);

    if state.policy.admin_email().is_none() {
        tracing::warn!("⚠ ADMIN_EMAIL not set - admin endpoints are closed");
    }

    let router = app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 Ventaro store running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET   /health                   - Health check");
    tracing::info!("  POST  /checkout                 - Create checkout session");
    tracing::info!("  POST  /webhook/payment          - Payment provider webhook");
    tracing::info!("  GET   /purchases/confirm        - Completed purchases");
    tracing::info!("  GET   /coaching-booking         - Slot availability");
    tracing::info!("  POST  /coaching-booking         - Request a session");
    tracing::info!("  PATCH /admin/coaching-bookings  - Update a booking (admin)");
    tracing::info!("  POST  /contact                  - Contact form");
    tracing::info!("  GET   /api/content/{{product}}    - Content access check");
    tracing::info!("  GET   /downloads/{{token}}        - Resolve download link");
    tracing::info!("");

    axum::serve(listener, router).await?;

    Ok(())
}
