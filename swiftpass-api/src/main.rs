use std::net::SocketAddr;
use std::sync::Arc;

use swiftpass_api::{app, state::AppState};
use swiftpass_booking::{SettlementService, TicketService};
use swiftpass_core::payment::PaymentGateway;
use swiftpass_momo::{MomoClient, MomoConfig};
use swiftpass_store::{DbClient, PostgresSettlementStore, PostgresTicketStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "swiftpass_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = swiftpass_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting SwiftPass API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let gateway: Arc<dyn PaymentGateway> = Arc::new(MomoClient::new(MomoConfig {
        base_url: config.gateway.base_url.clone(),
        subscription_key: config.gateway.subscription_key.clone(),
        target_environment: config.gateway.target_environment.clone(),
        callback_host: config.gateway.callback_host.clone(),
        currency: config.gateway.currency.clone(),
    }));

    let state = AppState {
        settlements: Arc::new(SettlementService::new(Arc::new(
            PostgresSettlementStore::new(db.pool.clone()),
        ))),
        tickets: Arc::new(TicketService::new(Arc::new(PostgresTicketStore::new(
            db.pool.clone(),
        )))),
        gateway,
    };

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
