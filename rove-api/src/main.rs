use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rove_api::{app, state::{AppState, AuthConfig}};
use rove_booking::{
    BookingLedger, BookingRepository, MockPaymentGateway, PaymentOrchestrator,
    ReconciliationListener, WebhookVerifier,
};
use rove_rating::{RatingGate, RatingRepository};
use rove_store::{DbClient, EventBus, MemoryStore, PgBookingRepository, PgRatingRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rove_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = rove_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Rove API on port {}", config.server.port);

    // The in-memory store doubles as the catalog directory stand-in; the
    // booking and rating repositories move to Postgres when configured.
    let memory = MemoryStore::new();
    let (booking_repo, rating_repo): (Arc<dyn BookingRepository>, Arc<dyn RatingRepository>) =
        match &config.database.url {
            Some(url) => {
                let db = DbClient::new(url).await.expect("Failed to connect to Postgres");
                db.migrate().await.expect("Failed to run migrations");
                (
                    Arc::new(PgBookingRepository::new(db.pool.clone())),
                    Arc::new(PgRatingRepository::new(db.pool.clone())),
                )
            }
            None => {
                tracing::warn!("No database configured, running on the in-memory store");
                (memory.clone(), memory.clone())
            }
        };

    let ledger = Arc::new(BookingLedger::new(
        booking_repo,
        memory.clone(),
        config.business_rules.fee_schedule(),
    ));

    // Injected gateway client; swap the mock for a live adapter at deploy.
    let orchestrator = Arc::new(PaymentOrchestrator::new(Arc::new(MockPaymentGateway)));

    let (listener, webhook_tx, webhook_rx) = ReconciliationListener::channel(
        ledger.clone(),
        orchestrator.clone(),
        config.business_rules.webhook_retry_attempts,
        Duration::from_millis(config.business_rules.webhook_retry_backoff_ms),
    );
    tokio::spawn(listener.run(webhook_rx));

    let rating_gate = Arc::new(RatingGate::new(rating_repo, ledger.clone()));

    let events = EventBus::new(256);
    let _event_logger = events.spawn_logger();

    let app_state = AppState {
        ledger,
        orchestrator,
        rating_gate,
        verifier: Arc::new(WebhookVerifier::new(config.gateway.webhook_secret.clone())),
        webhook_tx,
        events,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        gateway_timeout: Duration::from_secs(config.gateway.request_timeout_seconds),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
