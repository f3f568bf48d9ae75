use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    EnqueueRequest, Operation, QueueError, QueuedMutation, ReplayReport, MAX_ATTEMPTS, MAX_BATCH,
};
use crate::services::store::QueueStore;

/// Mutations recorded while a client was offline, replayed in order once it
/// reconnects. Each owner (user id) has an independent queue.
pub struct OfflineQueue {
    store: Arc<dyn QueueStore>,
    supabase: SupabaseClient,
}

impl OfflineQueue {
    pub fn new(config: &AppConfig, store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            supabase: SupabaseClient::new(config),
        }
    }

    /// All-or-nothing: a single invalid entry rejects the batch.
    pub async fn enqueue(
        &self,
        owner: &str,
        requests: Vec<EnqueueRequest>,
    ) -> Result<Vec<QueuedMutation>, QueueError> {
        if requests.is_empty() {
            return Err(QueueError::Validation("No mutations supplied".to_string()));
        }
        if requests.len() > MAX_BATCH {
            return Err(QueueError::Validation(format!(
                "At most {} mutations per batch",
                MAX_BATCH
            )));
        }
        let problems: Vec<String> = requests
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.validate().err().map(|e| format!("mutation {}: {}", i, e)))
            .collect();
        if !problems.is_empty() {
            return Err(QueueError::Validation(problems.join("; ")));
        }

        let mut queued = Vec::with_capacity(requests.len());
        for request in requests {
            let mutation = QueuedMutation {
                id: Uuid::new_v4(),
                owner: owner.to_string(),
                entity: request.entity,
                operation: request.operation,
                record_id: request.record_id,
                payload: request.payload,
                queued_at: Utc::now(),
                attempts: 0,
                last_error: None,
            };
            self.store.push(&mutation).await?;
            queued.push(mutation);
        }

        info!("Queued {} offline mutations for {}", queued.len(), owner);
        Ok(queued)
    }

    pub async fn pending(&self, owner: &str) -> Result<Vec<QueuedMutation>, QueueError> {
        self.store.list(owner).await
    }

    pub async fn dead_letters(&self, owner: &str) -> Result<Vec<QueuedMutation>, QueueError> {
        self.store.dead_letters(owner).await
    }

    async fn apply(&self, mutation: &QueuedMutation, token: &str) -> Result<(), QueueError> {
        let table = mutation.entity.table();
        let payload = mutation.payload.clone().unwrap_or_default();
        let record_filter = || {
            mutation
                .record_id
                .map(|id| format!("id=eq.{}", id))
                .ok_or_else(|| QueueError::Validation("Missing record_id".to_string()))
        };

        match mutation.operation {
            Operation::Create => {
                self.supabase
                    .insert_returning(table, payload, Some(token))
                    .await?;
            }
            Operation::Update => {
                self.supabase
                    .patch_returning(table, &record_filter()?, payload, Some(token))
                    .await?;
            }
            Operation::Delete => {
                let path = format!("/rest/v1/{}?{}", table, record_filter()?);
                self.supabase.delete(&path, Some(token)).await?;
            }
        }
        Ok(())
    }

    /// Replay the owner's queue oldest first with the caller's token, so row
    /// level security applies as if the client were online. The pass stops at
    /// the first failure to keep later mutations from overtaking it, unless
    /// that failure exhausts the entry's attempts and it is dead-lettered.
    #[instrument(skip(self, token))]
    pub async fn replay(&self, owner: &str, token: &str) -> Result<ReplayReport, QueueError> {
        let mut report = ReplayReport::default();

        for mut mutation in self.store.list(owner).await? {
            match self.apply(&mutation, token).await {
                Ok(()) => {
                    self.store.remove(owner, mutation.id).await?;
                    report.replayed += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    mutation.attempts += 1;
                    mutation.last_error = Some(e.to_string());
                    warn!(
                        "Replay of {} ({:?} {}) failed, attempt {}: {}",
                        mutation.id,
                        mutation.operation,
                        mutation.entity.table(),
                        mutation.attempts,
                        e
                    );

                    if mutation.attempts >= MAX_ATTEMPTS {
                        self.store.dead_letter(&mutation).await?;
                        report.dead_lettered += 1;
                    } else {
                        self.store.update(&mutation).await?;
                        break;
                    }
                }
            }
        }

        report.remaining = self.store.list(owner).await?.len() as u32;
        info!(
            "Replay for {}: {} replayed, {} failed, {} remaining",
            owner, report.replayed, report.failed, report.remaining
        );
        Ok(report)
    }
}
