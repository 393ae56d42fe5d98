pub mod audit;
pub mod capability;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod queue;
pub mod redis;
pub mod routes;
pub mod services;

use std::sync::Arc;

use crate::capability::store::OrderStore;
use crate::config::Config;
use crate::services::order_lifecycle::OrderLifecycle;
use crate::services::push_registry::PushRegistry;
use crate::services::resource_manager::PerOrderResourceManager;

/// Shared application state accessible in all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: db::Pool,
    pub redis: redis::RedisPool,
    pub store: Arc<dyn OrderStore>,
    pub push_registry: PushRegistry,
    pub resource_manager: PerOrderResourceManager,
    pub lifecycle: OrderLifecycle,
}
