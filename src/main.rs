use std::sync::Arc;

use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use order_execution_engine::capability::chain::{Chain, SimulatedChain};
use order_execution_engine::capability::router::{Router as RouterCapability, SimulatedRouter};
use order_execution_engine::capability::store::{OrderStore, PgOrderStore};
use order_execution_engine::config::Config;
use order_execution_engine::services::event_publisher::EventPublisher;
use order_execution_engine::services::order_lifecycle::OrderLifecycle;
use order_execution_engine::services::push_registry::PushRegistry;
use order_execution_engine::services::resource_manager::PerOrderResourceManager;
use order_execution_engine::{db, middleware, redis, routes, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_execution_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!("Starting Order Execution Engine on {}", config.addr());

    let db_pool = db::connect(&config).await;
    tracing::info!("Connected to store");

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations complete");

    let redis_pool = redis::connect(&config).await;
    tracing::info!("Connected to queue substrate");

    let store: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(db_pool.clone()));
    let router_capability: Arc<dyn RouterCapability> = Arc::new(SimulatedRouter::new());
    let chain_capability: Arc<dyn Chain> = Arc::new(SimulatedChain::new());

    let resource_manager = PerOrderResourceManager::new(redis_pool.clone(), config.idle_timeout);
    let publisher = EventPublisher::new(redis_pool.clone(), resource_manager.clone());
    let lifecycle = OrderLifecycle::new(
        store.clone(),
        router_capability,
        chain_capability,
        publisher,
        redis_pool.clone(),
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        db: db_pool,
        redis: redis_pool,
        store,
        push_registry: PushRegistry::new(),
        resource_manager: resource_manager.clone(),
        lifecycle,
    };

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods(Any)
        .allow_headers(Any);

    let metrics_handle = setup_metrics();

    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::orders::router())
        .merge(routes::stream::router())
        .route(
            "/metrics",
            axum::routing::get(move || async move { metrics_handle.render() }),
        )
        .layer(middleware::security::SecurityHeadersLayer)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.addr())
        .await
        .expect("Failed to bind");

    tracing::info!("Listening on {}", config.addr());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(resource_manager))
        .await
        .expect("Server error");
}

fn setup_metrics() -> metrics_exporter_prometheus::PrometheusHandle {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    builder
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

async fn shutdown_signal(resource_manager: PerOrderResourceManager) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }

    tracing::info!("Closing per-order resources");
    resource_manager.teardown_all().await;
}
