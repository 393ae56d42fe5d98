//! The Redis-backed realization of the "queue substrate" referenced
//! throughout the component design: per-order, per-status job lists with
//! job-key deduplication, retry, and retention.

use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::redis::RedisPool;

/// Envelope wrapping every job pushed onto a status or execution queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob<T> {
    pub job_key: String,
    pub payload: T,
    pub attempt: u32,
    pub max_attempts: u32,
    pub enqueued_at: chrono::DateTime<Utc>,
}

impl<T> QueueJob<T> {
    pub fn new(job_key: impl Into<String>, payload: T, max_attempts: u32) -> Self {
        Self {
            job_key: job_key.into(),
            payload,
            attempt: 0,
            max_attempts,
            enqueued_at: Utc::now(),
        }
    }
}

fn queue_key(order_id: Uuid, queue_name: &str) -> String {
    format!("mqe:{order_id}:{queue_name}")
}

fn job_key_guard(order_id: Uuid, job_key: &str) -> String {
    format!("mqe:{order_id}:jobkey:{job_key}")
}

/// A single named job queue, scoped to one order.
pub struct OrderQueue {
    redis: RedisPool,
    order_id: Uuid,
    name: String,
}

impl OrderQueue {
    pub fn new(redis: RedisPool, order_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            redis,
            order_id,
            name: name.into(),
        }
    }

    /// Push a job onto this queue unless a job with the same key was already
    /// enqueued and has not yet expired its dedupe window. Returns `true` if
    /// the job was actually enqueued.
    pub async fn enqueue<T: Serialize + Send + Sync>(
        &self,
        job: QueueJob<T>,
        dedupe_window: Duration,
    ) -> Result<bool, redis::RedisError> {
        let mut conn = self.redis.clone();
        let guard_key = job_key_guard(self.order_id, &job.job_key);

        let inserted: bool = redis::cmd("SET")
            .arg(&guard_key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(dedupe_window.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map(|v: Option<String>| v.is_some())?;

        if !inserted {
            tracing::debug!(order_id = %self.order_id, job_key = %job.job_key, queue = %self.name, "duplicate enqueue suppressed");
            return Ok(false);
        }

        let body = serde_json::to_string(&job).map_err(|e| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "serialize job", e.to_string()))
        })?;

        let key = queue_key(self.order_id, &self.name);
        let _: () = conn.rpush(&key, body).await?;
        Ok(true)
    }

    /// Pop the next job, if any, blocking up to `timeout`.
    pub async fn dequeue<T: DeserializeOwned>(
        &self,
        timeout: Duration,
    ) -> Result<Option<QueueJob<T>>, redis::RedisError> {
        let mut conn = self.redis.clone();
        let key = queue_key(self.order_id, &self.name);

        let result: Option<(String, String)> = conn
            .blpop(&key, timeout.as_secs_f64().max(0.01))
            .await?;

        match result {
            Some((_, body)) => {
                let job: QueueJob<T> = serde_json::from_str(&body).map_err(|e| {
                    redis::RedisError::from((
                        redis::ErrorKind::TypeError,
                        "deserialize job",
                        e.to_string(),
                    ))
                })?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Re-enqueue a job after a failed delivery attempt, applying exponential
    /// backoff and honoring `max_attempts`. Returns `false` once the job has
    /// exhausted its retry budget.
    pub async fn retry<T: Serialize + Send + Sync>(
        &self,
        mut job: QueueJob<T>,
        backoff_base: Duration,
    ) -> Result<bool, redis::RedisError> {
        job.attempt += 1;
        if job.attempt >= job.max_attempts {
            tracing::warn!(order_id = %self.order_id, job_key = %job.job_key, queue = %self.name, "job exhausted retries");
            return Ok(false);
        }

        let delay = backoff_base * 2u32.pow(job.attempt.saturating_sub(1));
        tokio::time::sleep(delay).await;

        let body = serde_json::to_string(&job).map_err(|e| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "serialize job", e.to_string()))
        })?;
        let mut conn = self.redis.clone();
        let key = queue_key(self.order_id, &self.name);
        let _: () = conn.rpush(&key, body).await?;
        Ok(true)
    }
}

/// Delete every Redis key belonging to this order: the seven queues, their
/// job-key dedupe guards, everything namespaced `mqe:{orderId}:*`.
pub async fn teardown(redis: &RedisPool, order_id: Uuid) -> Result<(), redis::RedisError> {
    let mut conn = redis.clone();
    let pattern = format!("mqe:{order_id}:*");

    let mut cursor: u64 = 0;
    loop {
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(&pattern)
            .arg("COUNT")
            .arg(200)
            .query_async(&mut conn)
            .await?;

        if !keys.is_empty() {
            let _: () = redis::cmd("UNLINK")
                .arg(&keys)
                .query_async(&mut conn)
                .await?;
        }

        cursor = next_cursor;
        if cursor == 0 {
            break;
        }
    }

    tracing::info!(%order_id, "queue substrate state torn down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_key_is_namespaced_per_order() {
        let id = Uuid::nil();
        assert_eq!(queue_key(id, "status/pending"), format!("mqe:{id}:status/pending"));
    }

    #[test]
    fn job_key_guard_is_namespaced_per_order() {
        let id = Uuid::nil();
        assert_eq!(job_key_guard(id, "abc"), format!("mqe:{id}:jobkey:abc"));
    }
}
