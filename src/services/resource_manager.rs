use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::redis::RedisPool;

/// The worker handles owned by one order's resource bundle: one execution
/// worker and six delivery workers (§4.4 step 3/4).
pub struct PerOrderResources {
    pub execution_worker: JoinHandle<()>,
    pub delivery_workers: Vec<JoinHandle<()>>,
    deadline_tx: watch::Sender<Instant>,
    reaper: JoinHandle<()>,
}

impl PerOrderResources {
    fn abort_all(&self) {
        self.execution_worker.abort();
        for handle in &self.delivery_workers {
            handle.abort();
        }
    }
}

impl Drop for PerOrderResources {
    fn drop(&mut self) {
        self.abort_all();
        self.reaper.abort();
    }
}

/// Allocates and reaps the per-order queue/worker/timer bundle described in
/// §4.4. At most one resource record exists per `orderId` at any moment.
#[derive(Clone)]
pub struct PerOrderResourceManager {
    resources: Arc<DashMap<Uuid, PerOrderResources>>,
    redis: RedisPool,
    idle_timeout: Duration,
}

impl PerOrderResourceManager {
    pub fn new(redis: RedisPool, idle_timeout: Duration) -> Self {
        Self {
            resources: Arc::new(DashMap::new()),
            redis,
            idle_timeout,
        }
    }

    /// Register a freshly-spawned worker set for `order_id` and arm its idle
    /// timer. Any previously-registered bundle for the same order is
    /// replaced (and torn down via `Drop`).
    pub fn allocate(
        &self,
        order_id: Uuid,
        execution_worker: JoinHandle<()>,
        delivery_workers: Vec<JoinHandle<()>>,
    ) {
        let (deadline_tx, mut deadline_rx) = watch::channel(Instant::now() + self.idle_timeout);

        let resources = self.resources.clone();
        let redis = self.redis.clone();
        let idle_timeout = self.idle_timeout;

        let reaper = tokio::spawn(async move {
            loop {
                let deadline = *deadline_rx.borrow();
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(deadline - now) => {
                        if *deadline_rx.borrow() <= Instant::now() {
                            break;
                        }
                    }
                    changed = deadline_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }

            if let Some((_, bundle)) = resources.remove(&order_id) {
                bundle.abort_all();
                if let Err(e) = crate::queue::teardown(&redis, order_id).await {
                    tracing::warn!(%order_id, error = %e, "queue substrate teardown failed");
                }
                tracing::info!(%order_id, timeout_secs = idle_timeout.as_secs(), "per-order resources reaped on idle timeout");
            }
        });

        self.resources.insert(
            order_id,
            PerOrderResources {
                execution_worker,
                delivery_workers,
                deadline_tx,
                reaper,
            },
        );
    }

    /// Reset the idle timer for `order_id`. A no-op (logged) if no resource
    /// record exists, per §4.4's invariant.
    pub fn touch(&self, order_id: Uuid) {
        match self.resources.get(&order_id) {
            Some(entry) => {
                let _ = entry.deadline_tx.send(Instant::now() + self.idle_timeout);
            }
            None => {
                tracing::debug!(%order_id, "touch on order with no resource record; no-op");
            }
        }
    }

    pub fn has_resources(&self, order_id: Uuid) -> bool {
        self.resources.contains_key(&order_id)
    }

    /// Force-teardown, used on an explicit terminal transition if the caller
    /// doesn't want to wait out the idle timer, and on process shutdown.
    pub async fn teardown_now(&self, order_id: Uuid) {
        if let Some((_, bundle)) = self.resources.remove(&order_id) {
            bundle.abort_all();
            if let Err(e) = crate::queue::teardown(&self.redis, order_id).await {
                tracing::warn!(%order_id, error = %e, "queue substrate teardown failed");
            }
        }
    }

    /// Close every resource record in parallel. Called on process shutdown.
    pub async fn teardown_all(&self) {
        let order_ids: Vec<Uuid> = self.resources.iter().map(|e| *e.key()).collect();
        let redis = self.redis.clone();
        let resources = self.resources.clone();

        let mut handles = Vec::new();
        for order_id in order_ids {
            let redis = redis.clone();
            let resources = resources.clone();
            handles.push(tokio::spawn(async move {
                if let Some((_, bundle)) = resources.remove(&order_id) {
                    bundle.abort_all();
                    let _ = crate::queue::teardown(&redis, order_id).await;
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }
}
