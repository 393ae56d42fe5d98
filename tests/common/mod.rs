//! Shared scenario-test setup. Tests in this suite exercise the real
//! Postgres store and Redis queue substrate; they skip (not fail) when the
//! environment isn't wired up, the same way `mqk-db`'s scenario tests do.

use std::sync::Arc;
use std::time::Duration;

use order_execution_engine::capability::chain::{Chain, SimulatedChain};
use order_execution_engine::capability::router::{Router as RouterCapability, SimulatedRouter};
use order_execution_engine::capability::store::{OrderStore, PgOrderStore};
use order_execution_engine::config::Config;
use order_execution_engine::services::event_publisher::EventPublisher;
use order_execution_engine::services::order_lifecycle::OrderLifecycle;
use order_execution_engine::services::push_registry::PushRegistry;
use order_execution_engine::services::resource_manager::PerOrderResourceManager;
use order_execution_engine::{db, redis, AppState};

pub struct Infra {
    pub store: Arc<dyn OrderStore>,
    pub redis: redis::RedisPool,
    pub resource_manager: PerOrderResourceManager,
    pub publisher: EventPublisher,
}

/// Brings up a pool against `DATABASE_URL`, runs migrations, and connects to
/// `QUEUE_URL` (or the default local Redis). Returns `None` if `DATABASE_URL`
/// isn't set, so these tests are a no-op pass outside an environment with
/// both services available.
pub async fn try_setup() -> Option<Infra> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("SKIP: DATABASE_URL not set");
        return None;
    }

    let config = Config::from_env();
    let pool = db::connect(&config).await;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    let redis_pool = redis::connect(&config).await;

    let store: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(pool));
    let resource_manager =
        PerOrderResourceManager::new(redis_pool.clone(), Duration::from_millis(200));
    let publisher = EventPublisher::new(redis_pool.clone(), resource_manager.clone());

    Some(Infra {
        store,
        redis: redis_pool,
        resource_manager,
        publisher,
    })
}

/// Brings up a full `AppState` (simulated `Router`/`Chain`, real store and
/// queue substrate) suitable for driving the actual Axum routers with
/// `tower::util::ServiceExt::oneshot`. `None` under the same conditions as
/// [`try_setup`].
pub async fn try_app_state() -> Option<AppState> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("SKIP: DATABASE_URL not set");
        return None;
    }

    let config = Config::from_env();
    let pool = db::connect(&config).await;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    let redis_pool = redis::connect(&config).await;

    let store: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(pool.clone()));
    let router_capability: Arc<dyn RouterCapability> = Arc::new(SimulatedRouter::new());
    let chain_capability: Arc<dyn Chain> = Arc::new(SimulatedChain::new());

    let resource_manager =
        PerOrderResourceManager::new(redis_pool.clone(), Duration::from_millis(200));
    let publisher = EventPublisher::new(redis_pool.clone(), resource_manager.clone());
    let lifecycle = OrderLifecycle::new(
        store.clone(),
        router_capability,
        chain_capability,
        publisher,
        redis_pool.clone(),
    );

    Some(AppState {
        config: Arc::new(config),
        db: pool,
        redis: redis_pool,
        store,
        push_registry: PushRegistry::new(),
        resource_manager,
        lifecycle,
    })
}

/// Lighter setup for tests that only need the queue substrate. `Config`
/// still requires `DATABASE_URL` to be set even here, since it's a single
/// required field shared by the whole config surface.
pub async fn try_redis() -> Option<redis::RedisPool> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("SKIP: DATABASE_URL not set");
        return None;
    }

    let config = Config::from_env();
    Some(redis::connect(&config).await)
}
