use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use clinic_cell::ClinicError;
use shared_database::SupabaseError;
use shared_models::error::AppError;

// ==============================================================================
// PUSH
// ==============================================================================

/// Payload of a Supabase database webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseWebhook {
    #[serde(rename = "type")]
    pub event: String,
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub record: Option<Value>,
}

impl DatabaseWebhook {
    pub fn is_notification_insert(&self) -> bool {
        self.event.eq_ignore_ascii_case("INSERT") && self.table == "notifications"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PushOutcome {
    Sent {
        sent: bool,
        notification_id: Uuid,
        onesignal_id: Option<String>,
    },
    Skipped {
        skipped: bool,
        reason: String,
    },
}

impl PushOutcome {
    pub fn sent(notification_id: Uuid, onesignal_id: Option<String>) -> Self {
        PushOutcome::Sent {
            sent: true,
            notification_id,
            onesignal_id,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        PushOutcome::Skipped {
            skipped: true,
            reason: reason.into(),
        }
    }
}

// ==============================================================================
// WHATSAPP
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReminderQuery {
    /// Defaults to tomorrow.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReminderReport {
    pub date: Option<NaiveDate>,
    pub sent: u32,
    /// Delivered, but the appointment still reads `reminder_sent = false`
    /// and will be picked up again on the next run.
    pub unflagged: u32,
    pub failed: u32,
    pub skipped: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactRow {
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClinicNameRow {
    pub name: String,
}

/// Appointment joined with its patient and clinic for reminder dispatch.
#[derive(Debug, Clone, Deserialize)]
pub struct ReminderCandidate {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub patients: Option<ContactRow>,
    pub clinics: Option<ClinicNameRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppInstance {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub instance_name: String,
    pub status: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const STATUS_CONNECTED: &str = "connected";
pub const STATUS_DISCONNECTED: &str = "disconnected";
pub const STATUS_CREATED: &str = "created";

/// Upstream connection states are folded into the three values we store.
pub fn normalize_instance_state(raw: &str) -> &'static str {
    match raw.trim().to_ascii_lowercase().as_str() {
        "open" | "connected" | "authenticated" | "ready" => STATUS_CONNECTED,
        "connecting" | "qr" | "created" | "pending" => STATUS_CREATED,
        _ => STATUS_DISCONNECTED,
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("WhatsApp instance not found")]
    InstanceNotFound,

    #[error("Clinic already has a WhatsApp instance")]
    InstanceExists,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Invalid data: {0}")]
    Decode(String),

    #[error(transparent)]
    Access(#[from] ClinicError),

    #[error("Database error: {0}")]
    Database(#[from] SupabaseError),
}

impl From<NotificationError> for AppError {
    fn from(error: NotificationError) -> Self {
        match error {
            NotificationError::NotConfigured(_) | NotificationError::Decode(_) => {
                AppError::Internal(error.to_string())
            }
            NotificationError::Validation(msg) => AppError::ValidationError(msg),
            NotificationError::InstanceNotFound => AppError::NotFound(error.to_string()),
            NotificationError::InstanceExists => AppError::Conflict(error.to_string()),
            NotificationError::Upstream(_) => AppError::ExternalService(error.to_string()),
            NotificationError::Access(inner) => inner.into(),
            NotificationError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
