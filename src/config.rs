use std::env;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,

    // Database
    pub database_url: String,
    pub db_max_connections: u32,

    // Queue substrate (Redis). `rediss://` selects the TLS variant.
    pub queue_url: String,

    // Execution domain (§4.6 / §5)
    pub queue_max_concurrency: u32,
    pub queue_rate_limit_per_minute: u32,

    // Delivery domain (§4.3 / §5)
    pub ws_worker_concurrency: u32,
    pub ws_worker_rate_limit_per_minute: u32,

    // Per-order resource lifecycle (§4.4). Not sourced from the environment
    // in the original implementation, but exposed here so operators can tune
    // it without a rebuild.
    pub idle_timeout: Duration,

    // CORS
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: env("HOST", "0.0.0.0"),
            port: env("PORT", "3000").parse().expect("PORT must be a number"),

            database_url: require_env("DATABASE_URL"),
            db_max_connections: env("DB_MAX_CONNECTIONS", "20").parse().unwrap_or(20),

            queue_url: env("QUEUE_URL", "redis://127.0.0.1:6379"),

            queue_max_concurrency: env("QUEUE_MAX_CONCURRENCY", "10").parse().unwrap_or(10),
            queue_rate_limit_per_minute: env("QUEUE_RATE_LIMIT_PER_MINUTE", "100")
                .parse()
                .unwrap_or(100),

            ws_worker_concurrency: env("WS_WORKER_CONCURRENCY", "50").parse().unwrap_or(50),
            ws_worker_rate_limit_per_minute: env("WS_WORKER_RATE_LIMIT", "1000")
                .parse()
                .unwrap_or(1000),

            idle_timeout: Duration::from_secs(
                env("IDLE_TIMEOUT_SECS", "900").parse().unwrap_or(900),
            ),

            cors_origins: env("CORS_ORIGINS", "http://localhost:3000,http://localhost:5173")
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid address")
    }
}

fn env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
