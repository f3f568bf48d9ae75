use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use shared_database::SupabaseError;
use shared_models::error::AppError;

/// Attempts after which a mutation is moved to the dead-letter list.
pub const MAX_ATTEMPTS: u32 = 5;
pub const MAX_BATCH: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Patient,
    Appointment,
    Visit,
}

impl EntityKind {
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Patient => "patients",
            EntityKind::Appointment => "appointments",
            EntityKind::Visit => "visits",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedMutation {
    pub id: Uuid,
    pub owner: String,
    pub entity: EntityKind,
    pub operation: Operation,
    pub record_id: Option<Uuid>,
    pub payload: Option<Value>,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueRequest {
    pub entity: EntityKind,
    pub operation: Operation,
    pub record_id: Option<Uuid>,
    pub payload: Option<Value>,
}

impl EnqueueRequest {
    /// update/delete need a record id; create/update need an object payload.
    pub fn validate(&self) -> Result<(), String> {
        let needs_record = matches!(self.operation, Operation::Update | Operation::Delete);
        if needs_record && self.record_id.is_none() {
            return Err(format!("{:?} on {} requires record_id", self.operation, self.entity.table()));
        }

        let needs_payload = matches!(self.operation, Operation::Create | Operation::Update);
        if needs_payload && !matches!(self.payload, Some(Value::Object(_))) {
            return Err(format!(
                "{:?} on {} requires an object payload",
                self.operation,
                self.entity.table()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueBatch {
    pub mutations: Vec<EnqueueRequest>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReplayReport {
    pub replayed: u32,
    pub failed: u32,
    pub remaining: u32,
    pub dead_lettered: u32,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Queue store error: {0}")]
    Store(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] SupabaseError),
}

impl From<QueueError> for AppError {
    fn from(error: QueueError) -> Self {
        match error {
            QueueError::Validation(msg) => AppError::ValidationError(msg),
            QueueError::Database(e) => AppError::Database(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(operation: Operation, record_id: Option<Uuid>, payload: Option<Value>) -> EnqueueRequest {
        EnqueueRequest {
            entity: EntityKind::Patient,
            operation,
            record_id,
            payload,
        }
    }

    #[test]
    fn create_needs_object_payload() {
        assert!(request(Operation::Create, None, Some(json!({ "full_name": "Mona" }))).validate().is_ok());
        assert!(request(Operation::Create, None, None).validate().is_err());
        assert!(request(Operation::Create, None, Some(json!([1, 2]))).validate().is_err());
    }

    #[test]
    fn update_needs_record_and_payload() {
        let id = Some(Uuid::new_v4());
        assert!(request(Operation::Update, id, Some(json!({ "phone": "010" }))).validate().is_ok());
        assert!(request(Operation::Update, None, Some(json!({}))).validate().is_err());
        assert!(request(Operation::Update, id, None).validate().is_err());
    }

    #[test]
    fn delete_needs_only_record() {
        assert!(request(Operation::Delete, Some(Uuid::new_v4()), None).validate().is_ok());
        let err = request(Operation::Delete, None, None).validate().unwrap_err();
        assert_eq!(err, "Delete on patients requires record_id");
    }

    #[test]
    fn entities_map_to_tables() {
        assert_eq!(EntityKind::Visit.table(), "visits");
        let kind: EntityKind = serde_json::from_str("\"appointment\"").unwrap();
        assert_eq!(kind.table(), "appointments");
    }
}
