use chrono::Utc;
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    PaymentError, TopupResponse, TransactionKind, TransactionStatus, WalletTransaction,
    MAX_TOPUP_EGP, MIN_TOPUP_EGP,
};
use crate::services::easykash::{Buyer, EasyKashClient};
use crate::services::wallet::decode;

pub fn validate_topup_amount(amount: f64) -> Result<(), PaymentError> {
    if !amount.is_finite() || !(MIN_TOPUP_EGP..=MAX_TOPUP_EGP).contains(&amount) {
        return Err(PaymentError::InvalidAmount);
    }
    Ok(())
}

/// Starts wallet top-ups. The wallet is only credited later, by the
/// gateway webhook.
pub struct TopupService {
    supabase: SupabaseClient,
    gateway: EasyKashClient,
}

impl TopupService {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        Ok(Self {
            supabase: SupabaseClient::new(config),
            gateway: EasyKashClient::new(config)?,
        })
    }

    #[instrument(skip(self, buyer, auth_token))]
    pub async fn start_topup(
        &self,
        clinic_id: Uuid,
        amount: f64,
        buyer: &Buyer,
        auth_token: &str,
    ) -> Result<TopupResponse, PaymentError> {
        validate_topup_amount(amount)?;

        let reference = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let row = self
            .supabase
            .insert_returning(
                "wallet_transactions",
                json!({
                    "clinic_id": clinic_id,
                    "amount": amount,
                    "type": TransactionKind::Topup,
                    "status": TransactionStatus::Pending,
                    "reference": reference,
                    "description": "Wallet top-up",
                    "created_at": now,
                    "updated_at": now
                }),
                Some(auth_token),
            )
            .await?;
        let transaction: WalletTransaction = decode(row)?;

        match self.gateway.create_payment(amount, &reference, buyer).await {
            Ok(payment_url) => {
                info!(
                    clinic_id = %clinic_id,
                    transaction_id = %transaction.id,
                    amount,
                    "Top-up started"
                );
                Ok(TopupResponse {
                    transaction_id: transaction.id,
                    reference,
                    payment_url,
                })
            }
            Err(gateway_error) => {
                error!(
                    transaction_id = %transaction.id,
                    "Top-up gateway call failed: {}", gateway_error
                );
                let filter = format!("id=eq.{}", transaction.id);
                if let Err(e) = self
                    .supabase
                    .patch_returning(
                        "wallet_transactions",
                        &filter,
                        json!({
                            "status": TransactionStatus::Failed,
                            "description": "Payment gateway error",
                            "updated_at": Utc::now().to_rfc3339()
                        }),
                        Some(auth_token),
                    )
                    .await
                {
                    error!(transaction_id = %transaction.id, "Could not mark top-up failed: {}", e);
                }
                Err(gateway_error)
            }
        }
    }
}
