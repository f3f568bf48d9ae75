use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    PaymentError, TransactionKind, TransactionQuery, TransactionStatus, Wallet, WalletTransaction,
};

const DEFAULT_TRANSACTION_PAGE: u32 = 50;
const MAX_TRANSACTION_PAGE: u32 = 200;

pub(crate) fn decode<T: serde::de::DeserializeOwned>(row: Value) -> Result<T, PaymentError> {
    serde_json::from_value(row).map_err(|e| PaymentError::Decode(e.to_string()))
}

pub struct WalletService {
    supabase: SupabaseClient,
}

impl WalletService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_wallet(
        &self,
        clinic_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Wallet, PaymentError> {
        let path = format!("/rest/v1/wallets?clinic_id=eq.{}", clinic_id);
        match self.supabase.select_one(&path, auth_token).await? {
            Some(row) => decode(row),
            None => Ok(Wallet::empty(clinic_id)),
        }
    }

    pub async fn list_transactions(
        &self,
        clinic_id: Uuid,
        query: &TransactionQuery,
        auth_token: &str,
    ) -> Result<Vec<WalletTransaction>, PaymentError> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_TRANSACTION_PAGE)
            .clamp(1, MAX_TRANSACTION_PAGE);
        let path = format!(
            "/rest/v1/wallet_transactions?clinic_id=eq.{}&order=created_at.desc&limit={}&offset={}",
            clinic_id,
            limit,
            query.offset.unwrap_or(0)
        );

        self.supabase
            .select(&path, Some(auth_token))
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Charge the wallet and record a completed `debit` transaction.
    #[instrument(skip(self, description, auth_token))]
    pub async fn debit(
        &self,
        clinic_id: Uuid,
        amount: f64,
        description: &str,
        auth_token: Option<&str>,
    ) -> Result<WalletTransaction, PaymentError> {
        if amount <= 0.0 {
            return Err(PaymentError::NonPositiveAmount);
        }

        let wallet = self.get_wallet(clinic_id, auth_token).await?;
        if wallet.balance < amount {
            return Err(PaymentError::InsufficientFunds {
                balance: wallet.balance,
                required: amount,
            });
        }

        let _: Value = self
            .supabase
            .rpc(
                "debit_wallet",
                json!({ "p_clinic_id": clinic_id, "p_amount": amount }),
                auth_token,
            )
            .await?;

        let now = Utc::now().to_rfc3339();
        let row = self
            .supabase
            .insert_returning(
                "wallet_transactions",
                json!({
                    "clinic_id": clinic_id,
                    "amount": amount,
                    "type": TransactionKind::Debit,
                    "status": TransactionStatus::Completed,
                    "reference": Uuid::new_v4().to_string(),
                    "description": description,
                    "created_at": now,
                    "updated_at": now
                }),
                auth_token,
            )
            .await?;

        info!(clinic_id = %clinic_id, amount, "Wallet debited");
        decode(row)
    }

    /// Add a completed top-up amount to the wallet balance.
    pub async fn credit(&self, clinic_id: Uuid, amount: f64) -> Result<(), PaymentError> {
        let _: Value = self
            .supabase
            .rpc(
                "credit_wallet",
                json!({ "p_clinic_id": clinic_id, "p_amount": amount }),
                None,
            )
            .await?;
        info!(clinic_id = %clinic_id, amount, "Wallet credited");
        Ok(())
    }
}
