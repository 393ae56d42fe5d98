use redis::aio::ConnectionManager;
use redis::Client;
use crate::config::Config;

pub type RedisPool = ConnectionManager;

pub async fn connect(config: &Config) -> RedisPool {
    let client = Client::open(config.queue_url.as_str())
        .expect("Invalid queue substrate URL");
    ConnectionManager::new(client)
        .await
        .expect("Failed to connect to queue substrate")
}
