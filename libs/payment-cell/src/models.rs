use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use clinic_cell::ClinicError;
use shared_database::SupabaseError;
use shared_models::error::AppError;

pub const MIN_TOPUP_EGP: f64 = 10.0;
pub const MAX_TOPUP_EGP: f64 = 50_000.0;
/// Gateway amounts are compared to the stored amount within one piastre.
pub const AMOUNT_TOLERANCE: f64 = 0.01;
pub const DEFAULT_CURRENCY: &str = "EGP";

// ==============================================================================
// WALLET
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub clinic_id: Uuid,
    pub balance: f64,
    pub currency: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Wallet {
    /// Clinics without a wallet row have an implicit zero balance.
    pub fn empty(clinic_id: Uuid) -> Self {
        Self {
            clinic_id,
            balance: 0.0,
            currency: DEFAULT_CURRENCY.to_string(),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Topup,
    Debit,
    Refund,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub reference: String,
    pub easykash_ref: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopupRequest {
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopupResponse {
    pub transaction_id: Uuid,
    pub reference: String,
    pub payment_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// ==============================================================================
// EASYKASH CALLBACK
// ==============================================================================

/// Accepts `"500.00"` or `500.0` and keeps the text as received, since the
/// signature covers the amount exactly as the gateway rendered it.
fn amount_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid amount: {}", other))),
    }
}

/// Any scalar rendered as text; the gateway is inconsistent about quoting ids.
fn scalar_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("expected a scalar, got {}", other))),
    }
}

/// Server-to-server payment notification from EasyKash.
#[derive(Debug, Clone, Deserialize)]
pub struct EasyKashCallback {
    #[serde(rename = "productCode", alias = "ProductCode", deserialize_with = "scalar_text")]
    pub product_code: String,
    #[serde(rename = "amount", alias = "Amount", deserialize_with = "amount_text")]
    pub amount: String,
    #[serde(rename = "productType", alias = "ProductType", deserialize_with = "scalar_text")]
    pub product_type: String,
    #[serde(rename = "paymentMethod", alias = "PaymentMethod", deserialize_with = "scalar_text")]
    pub payment_method: String,
    #[serde(rename = "status", alias = "Status", deserialize_with = "scalar_text")]
    pub status: String,
    #[serde(rename = "easykashRef", alias = "EasykashRef", alias = "EasyKashRef", deserialize_with = "scalar_text")]
    pub easykash_ref: String,
    #[serde(rename = "customerReference", alias = "CustomerReference", deserialize_with = "scalar_text")]
    pub customer_reference: String,
    #[serde(rename = "signatureHash", alias = "SignatureHash")]
    pub signature_hash: String,
    #[serde(default, rename = "BuyerName", alias = "buyerName")]
    pub buyer_name: Option<String>,
    #[serde(default, rename = "BuyerEmail", alias = "buyerEmail")]
    pub buyer_email: Option<String>,
    #[serde(default, rename = "BuyerMobile", alias = "buyerMobile")]
    pub buyer_mobile: Option<String>,
}

impl EasyKashCallback {
    pub fn amount_value(&self) -> Option<f64> {
        self.amount.trim().parse().ok()
    }
}

/// What a gateway status means for a pending top-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOutcome {
    Paid,
    StillPending,
    Failed,
}

impl GatewayOutcome {
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "PAID" => GatewayOutcome::Paid,
            "NEW" | "PENDING" => GatewayOutcome::StillPending,
            _ => GatewayOutcome::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookResult {
    Completed { transaction_id: Uuid, amount: f64 },
    Failed { transaction_id: Uuid, reason: String },
    Pending { transaction_id: Uuid },
    AlreadyProcessed { transaction_id: Uuid },
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Top-up amount must be between 10 and 50000 EGP")]
    InvalidAmount,

    #[error("Amount must be positive")]
    NonPositiveAmount,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Transaction not found for reference {0}")]
    TransactionNotFound(String),

    #[error("Insufficient wallet balance: {balance:.2} available, {required:.2} required")]
    InsufficientFunds { balance: f64, required: f64 },

    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Invalid data: {0}")]
    Decode(String),

    #[error(transparent)]
    Access(#[from] ClinicError),

    #[error("Database error: {0}")]
    Database(#[from] SupabaseError),
}

impl From<PaymentError> for AppError {
    fn from(error: PaymentError) -> Self {
        match error {
            PaymentError::InvalidAmount | PaymentError::NonPositiveAmount => {
                AppError::ValidationError(error.to_string())
            }
            PaymentError::InvalidSignature => AppError::Auth(error.to_string()),
            PaymentError::TransactionNotFound(_) => AppError::NotFound(error.to_string()),
            PaymentError::InsufficientFunds { .. } => AppError::PaymentRequired(error.to_string()),
            PaymentError::NotConfigured | PaymentError::Decode(_) => AppError::Internal(error.to_string()),
            PaymentError::Gateway(_) => AppError::ExternalService(error.to_string()),
            PaymentError::Access(inner) => inner.into(),
            PaymentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
