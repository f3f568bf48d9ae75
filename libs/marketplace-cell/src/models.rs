use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use clinic_cell::ClinicError;
use payment_cell::PaymentError;
use shared_database::SupabaseError;
use shared_models::error::AppError;

/// Key of the app that unlocks the chat assistant.
pub const AI_ASSISTANT_APP: &str = "ai_assistant";
pub const SUBSCRIPTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceApp {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub price_monthly: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSubscription {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub app_id: Uuid,
    pub app_key: String,
    pub status: SubscriptionStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl AppSubscription {
    /// Only an active, unexpired subscription grants access.
    pub fn grants_access(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.expires_at > now
    }
}

pub fn subscription_period(started_at: DateTime<Utc>) -> DateTime<Utc> {
    started_at + Duration::days(SUBSCRIPTION_DAYS)
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessResponse {
    pub app_key: String,
    pub has_access: bool,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum MarketplaceError {
    #[error("App not found")]
    AppNotFound,

    #[error("Subscription not found")]
    SubscriptionNotFound,

    #[error("Clinic already has an active subscription to this app")]
    AlreadySubscribed,

    #[error("Subscription is not active")]
    NotActive,

    #[error("Invalid data: {0}")]
    Decode(String),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Access(#[from] ClinicError),

    #[error("Database error: {0}")]
    Database(#[from] SupabaseError),
}

impl From<MarketplaceError> for AppError {
    fn from(error: MarketplaceError) -> Self {
        match error {
            MarketplaceError::AppNotFound | MarketplaceError::SubscriptionNotFound => {
                AppError::NotFound(error.to_string())
            }
            MarketplaceError::AlreadySubscribed | MarketplaceError::NotActive => {
                AppError::Conflict(error.to_string())
            }
            MarketplaceError::Decode(msg) => AppError::Internal(msg),
            MarketplaceError::Payment(inner) => inner.into(),
            MarketplaceError::Access(inner) => inner.into(),
            MarketplaceError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
