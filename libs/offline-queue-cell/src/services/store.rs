use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{QueueError, QueuedMutation};

/// Per-owner FIFO of pending mutations plus a dead-letter list.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn push(&self, mutation: &QueuedMutation) -> Result<(), QueueError>;
    /// Pending mutations in insertion order.
    async fn list(&self, owner: &str) -> Result<Vec<QueuedMutation>, QueueError>;
    async fn update(&self, mutation: &QueuedMutation) -> Result<(), QueueError>;
    async fn remove(&self, owner: &str, id: Uuid) -> Result<(), QueueError>;
    /// Take the mutation out of the pending queue and park it.
    async fn dead_letter(&self, mutation: &QueuedMutation) -> Result<(), QueueError>;
    async fn dead_letters(&self, owner: &str) -> Result<Vec<QueuedMutation>, QueueError>;
}

// ==============================================================================
// MEMORY
// ==============================================================================

#[derive(Default)]
struct MemoryQueues {
    pending: HashMap<String, VecDeque<QueuedMutation>>,
    dead: HashMap<String, Vec<QueuedMutation>>,
}

/// Process-local store used when no Redis is configured.
#[derive(Default)]
pub struct MemoryQueueStore {
    queues: RwLock<MemoryQueues>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn push(&self, mutation: &QueuedMutation) -> Result<(), QueueError> {
        let mut queues = self.queues.write().await;
        queues
            .pending
            .entry(mutation.owner.clone())
            .or_default()
            .push_back(mutation.clone());
        Ok(())
    }

    async fn list(&self, owner: &str) -> Result<Vec<QueuedMutation>, QueueError> {
        let queues = self.queues.read().await;
        Ok(queues
            .pending
            .get(owner)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn update(&self, mutation: &QueuedMutation) -> Result<(), QueueError> {
        let mut queues = self.queues.write().await;
        let slot = queues
            .pending
            .get_mut(&mutation.owner)
            .and_then(|q| q.iter_mut().find(|m| m.id == mutation.id))
            .ok_or_else(|| QueueError::Store(format!("Mutation {} is not queued", mutation.id)))?;
        *slot = mutation.clone();
        Ok(())
    }

    async fn remove(&self, owner: &str, id: Uuid) -> Result<(), QueueError> {
        let mut queues = self.queues.write().await;
        if let Some(queue) = queues.pending.get_mut(owner) {
            queue.retain(|m| m.id != id);
        }
        Ok(())
    }

    async fn dead_letter(&self, mutation: &QueuedMutation) -> Result<(), QueueError> {
        let mut queues = self.queues.write().await;
        if let Some(queue) = queues.pending.get_mut(&mutation.owner) {
            queue.retain(|m| m.id != mutation.id);
        }
        queues
            .dead
            .entry(mutation.owner.clone())
            .or_default()
            .push(mutation.clone());
        Ok(())
    }

    async fn dead_letters(&self, owner: &str) -> Result<Vec<QueuedMutation>, QueueError> {
        let queues = self.queues.read().await;
        Ok(queues.dead.get(owner).cloned().unwrap_or_default())
    }
}

// ==============================================================================
// REDIS
// ==============================================================================

/// Mutations expire after 30 days.
const MUTATION_TTL_SECONDS: i64 = 30 * 24 * 3600;

fn pending_key(owner: &str) -> String {
    format!("offline_queue:{}:pending", owner)
}

fn dead_key(owner: &str) -> String {
    format!("offline_queue:{}:dead", owner)
}

fn mutation_key(id: Uuid) -> String {
    format!("offline_mutation:{}", id)
}

/// Redis-backed store: a list of ids per owner plus one JSON hash per mutation.
pub struct RedisQueueStore {
    pool: Pool,
}

impl RedisQueueStore {
    pub async fn new(redis_url: &str) -> Result<Self, QueueError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| QueueError::Store(format!("Pool creation error: {}", e)))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| QueueError::Store(format!("Connection error: {}", e)))?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis offline queue store initialized");

        Ok(Self { pool })
    }

    async fn get_connection(&self) -> Result<Connection, QueueError> {
        self.pool
            .get()
            .await
            .map_err(|e| QueueError::Store(format!("Failed to get Redis connection: {}", e)))
    }

    async fn write_mutation(conn: &mut Connection, mutation: &QueuedMutation) -> Result<(), QueueError> {
        let key = mutation_key(mutation.id);
        let data = serde_json::to_string(mutation)?;
        let _: () = conn.hset(&key, "data", data).await?;
        let _: () = conn.expire(&key, MUTATION_TTL_SECONDS).await?;
        Ok(())
    }

    async fn load_list(&self, list_key: &str) -> Result<Vec<QueuedMutation>, QueueError> {
        let mut conn = self.get_connection().await?;
        let ids: Vec<String> = conn.lrange(list_key, 0, -1).await?;

        let mut mutations = Vec::with_capacity(ids.len());
        for id in ids {
            let data: Option<String> = conn.hget(format!("offline_mutation:{}", id), "data").await?;
            match data {
                Some(data) => mutations.push(serde_json::from_str(&data)?),
                None => {
                    warn!("Queued mutation {} expired; dropping from {}", id, list_key);
                    let _: () = conn.lrem(list_key, 1, &id).await?;
                }
            }
        }
        Ok(mutations)
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn push(&self, mutation: &QueuedMutation) -> Result<(), QueueError> {
        let mut conn = self.get_connection().await?;
        Self::write_mutation(&mut conn, mutation).await?;
        let _: () = conn
            .rpush(pending_key(&mutation.owner), mutation.id.to_string())
            .await?;
        debug!("Mutation {} queued for {}", mutation.id, mutation.owner);
        Ok(())
    }

    async fn list(&self, owner: &str) -> Result<Vec<QueuedMutation>, QueueError> {
        self.load_list(&pending_key(owner)).await
    }

    async fn update(&self, mutation: &QueuedMutation) -> Result<(), QueueError> {
        let mut conn = self.get_connection().await?;
        Self::write_mutation(&mut conn, mutation).await
    }

    async fn remove(&self, owner: &str, id: Uuid) -> Result<(), QueueError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.lrem(pending_key(owner), 1, id.to_string()).await?;
        let _: () = conn.del(mutation_key(id)).await?;
        Ok(())
    }

    async fn dead_letter(&self, mutation: &QueuedMutation) -> Result<(), QueueError> {
        let mut conn = self.get_connection().await?;
        Self::write_mutation(&mut conn, mutation).await?;
        let id = mutation.id.to_string();
        let _: () = conn.lrem(pending_key(&mutation.owner), 1, &id).await?;
        let _: () = conn.rpush(dead_key(&mutation.owner), &id).await?;
        Ok(())
    }

    async fn dead_letters(&self, owner: &str) -> Result<Vec<QueuedMutation>, QueueError> {
        self.load_list(&dead_key(owner)).await
    }
}

/// Redis when `REDIS_URL` is set and reachable, memory otherwise.
pub async fn store_from_config(config: &AppConfig) -> Arc<dyn QueueStore> {
    if let Some(url) = config.redis_url.as_deref().filter(|u| !u.is_empty()) {
        match RedisQueueStore::new(url).await {
            Ok(store) => return Arc::new(store),
            Err(e) => warn!("Redis unavailable for offline queue, using memory store: {}", e),
        }
    }
    info!("Offline queue using in-memory store");
    Arc::new(MemoryQueueStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;

    use crate::models::{EntityKind, Operation};

    fn mutation(owner: &str) -> QueuedMutation {
        QueuedMutation {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            entity: EntityKind::Patient,
            operation: Operation::Create,
            record_id: None,
            payload: Some(json!({ "full_name": "Mona" })),
            queued_at: Utc::now(),
            attempts: 0,
            last_error: None,
        }
    }

    #[tokio::test]
    async fn memory_store_keeps_insertion_order_per_owner() {
        let store = MemoryQueueStore::new();
        let first = mutation("u1");
        let second = mutation("u1");
        let other = mutation("u2");
        store.push(&first).await.unwrap();
        store.push(&other).await.unwrap();
        store.push(&second).await.unwrap();

        let ids: Vec<Uuid> = store.list("u1").await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(store.list("u2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn memory_store_updates_and_dead_letters() {
        let store = MemoryQueueStore::new();
        let mut queued = mutation("u1");
        store.push(&queued).await.unwrap();

        queued.attempts = 2;
        queued.last_error = Some("boom".to_string());
        store.update(&queued).await.unwrap();
        assert_eq!(store.list("u1").await.unwrap()[0].attempts, 2);

        store.dead_letter(&queued).await.unwrap();
        assert!(store.list("u1").await.unwrap().is_empty());
        assert_eq!(store.dead_letters("u1").await.unwrap(), vec![queued]);
    }

    #[tokio::test]
    async fn updating_unknown_mutation_fails() {
        let store = MemoryQueueStore::new();
        assert_matches!(store.update(&mutation("u1")).await, Err(QueueError::Store(_)));
    }

    #[tokio::test]
    async fn memory_store_is_the_fallback() {
        let store = store_from_config(&AppConfig::default()).await;
        assert!(store.list("anyone").await.unwrap().is_empty());
    }
}
