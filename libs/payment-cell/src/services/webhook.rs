use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{
    EasyKashCallback, GatewayOutcome, PaymentError, TransactionStatus, WalletTransaction,
    WebhookResult, AMOUNT_TOLERANCE,
};
use crate::services::signature::verify_callback;
use crate::services::wallet::{decode, WalletService};

/// Reconciles EasyKash callbacks with pending top-ups. Runs with the
/// service-role key; the signature is the only authentication.
pub struct PaymentWebhookService {
    supabase: SupabaseClient,
    wallets: WalletService,
    hmac_secret: String,
}

impl PaymentWebhookService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            wallets: WalletService::new(config),
            hmac_secret: config.easykash_hmac_secret.clone(),
        }
    }

    #[instrument(skip(self, callback), fields(reference = %callback.customer_reference, status = %callback.status))]
    pub async fn handle(&self, callback: &EasyKashCallback) -> Result<WebhookResult, PaymentError> {
        verify_callback(&self.hmac_secret, callback)?;

        let transaction = self.find_topup(&callback.customer_reference).await?;
        if transaction.status != TransactionStatus::Pending {
            info!(transaction_id = %transaction.id, "Webhook redelivered for settled transaction");
            return Ok(WebhookResult::AlreadyProcessed {
                transaction_id: transaction.id,
            });
        }

        match GatewayOutcome::from_status(&callback.status) {
            GatewayOutcome::StillPending => Ok(WebhookResult::Pending {
                transaction_id: transaction.id,
            }),
            GatewayOutcome::Failed => {
                let reason = format!("Payment {}", callback.status.trim().to_ascii_lowercase());
                self.settle_failed(&transaction, callback, reason).await
            }
            GatewayOutcome::Paid => {
                let received = callback.amount_value();
                let matches = received
                    .map(|paid| (paid - transaction.amount).abs() <= AMOUNT_TOLERANCE)
                    .unwrap_or(false);
                if !matches {
                    warn!(
                        transaction_id = %transaction.id,
                        expected = transaction.amount,
                        received = %callback.amount,
                        "Paid amount does not match top-up"
                    );
                    let reason = format!(
                        "Amount mismatch: expected {:.2}, received {}",
                        transaction.amount, callback.amount
                    );
                    return self.settle_failed(&transaction, callback, reason).await;
                }
                self.settle_paid(&transaction, callback).await
            }
        }
    }

    async fn find_topup(&self, reference: &str) -> Result<WalletTransaction, PaymentError> {
        let not_found = || PaymentError::TransactionNotFound(reference.to_string());
        let reference_id = Uuid::parse_str(reference.trim()).map_err(|_| not_found())?;

        let path = format!(
            "/rest/v1/wallet_transactions?reference=eq.{}&type=eq.topup",
            reference_id
        );
        let row = self
            .supabase
            .select_one(&path, None)
            .await?
            .ok_or_else(not_found)?;
        decode(row)
    }

    /// Move a pending transaction to its final status. `None` means another
    /// delivery settled it first.
    async fn claim(
        &self,
        transaction: &WalletTransaction,
        status: TransactionStatus,
        callback: &EasyKashCallback,
        description: Option<&str>,
    ) -> Result<Option<WalletTransaction>, PaymentError> {
        let mut update = json!({
            "status": status,
            "easykash_ref": callback.easykash_ref,
            "updated_at": Utc::now().to_rfc3339()
        });
        if let (Some(text), Value::Object(map)) = (description, &mut update) {
            map.insert("description".to_string(), json!(text));
        }

        let filter = format!("id=eq.{}&status=eq.pending", transaction.id);
        match self
            .supabase
            .patch_returning("wallet_transactions", &filter, update, None)
            .await
        {
            Ok(row) => Ok(Some(decode(row)?)),
            Err(SupabaseError::Empty(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Undo a completed claim whose credit did not happen, so the gateway's
    /// next delivery can settle it again.
    async fn reopen(&self, transaction: &WalletTransaction) {
        let filter = format!("id=eq.{}&status=eq.completed", transaction.id);
        let update = json!({
            "status": TransactionStatus::Pending,
            "updated_at": Utc::now().to_rfc3339()
        });
        if let Err(e) = self
            .supabase
            .patch_returning("wallet_transactions", &filter, update, None)
            .await
        {
            error!(
                transaction_id = %transaction.id,
                clinic_id = %transaction.clinic_id,
                amount = transaction.amount,
                "Top-up left completed without a wallet credit: {}", e
            );
        }
    }

    async fn settle_failed(
        &self,
        transaction: &WalletTransaction,
        callback: &EasyKashCallback,
        reason: String,
    ) -> Result<WebhookResult, PaymentError> {
        match self
            .claim(transaction, TransactionStatus::Failed, callback, Some(&reason))
            .await?
        {
            Some(_) => {
                info!(transaction_id = %transaction.id, "Top-up failed: {}", reason);
                Ok(WebhookResult::Failed {
                    transaction_id: transaction.id,
                    reason,
                })
            }
            None => Ok(WebhookResult::AlreadyProcessed {
                transaction_id: transaction.id,
            }),
        }
    }

    async fn settle_paid(
        &self,
        transaction: &WalletTransaction,
        callback: &EasyKashCallback,
    ) -> Result<WebhookResult, PaymentError> {
        if self
            .claim(transaction, TransactionStatus::Completed, callback, None)
            .await?
            .is_none()
        {
            return Ok(WebhookResult::AlreadyProcessed {
                transaction_id: transaction.id,
            });
        }

        if let Err(e) = self.wallets.credit(transaction.clinic_id, transaction.amount).await {
            error!(
                transaction_id = %transaction.id,
                clinic_id = %transaction.clinic_id,
                amount = transaction.amount,
                "Wallet credit failed, reopening top-up: {}", e
            );
            self.reopen(transaction).await;
            return Err(e);
        }

        info!(
            transaction_id = %transaction.id,
            clinic_id = %transaction.clinic_id,
            easykash_ref = %callback.easykash_ref,
            "Top-up completed"
        );
        Ok(WebhookResult::Completed {
            transaction_id: transaction.id,
            amount: transaction.amount,
        })
    }
}
