use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use clinic_cell::ClinicAccess;
use payment_cell::WalletService;
use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{
    subscription_period, AppSubscription, MarketplaceApp, MarketplaceError, SubscriptionStatus,
};

fn decode<T: serde::de::DeserializeOwned>(row: Value) -> Result<T, MarketplaceError> {
    serde_json::from_value(row).map_err(|e| MarketplaceError::Decode(e.to_string()))
}

/// App keys are lowercase identifiers such as `ai_assistant`.
fn is_app_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 64
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

pub struct MarketplaceService {
    supabase: SupabaseClient,
    wallets: WalletService,
}

impl MarketplaceService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            wallets: WalletService::new(config),
        }
    }

    pub async fn list_apps(&self, auth_token: &str) -> Result<Vec<MarketplaceApp>, MarketplaceError> {
        self.supabase
            .select("/rest/v1/marketplace_apps?is_active=eq.true&order=name.asc", Some(auth_token))
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn get_app(&self, key: &str, auth_token: &str) -> Result<MarketplaceApp, MarketplaceError> {
        if !is_app_key(key) {
            return Err(MarketplaceError::AppNotFound);
        }
        let path = format!("/rest/v1/marketplace_apps?key=eq.{}&is_active=eq.true", key);
        let row = self
            .supabase
            .select_one(&path, Some(auth_token))
            .await?
            .ok_or(MarketplaceError::AppNotFound)?;
        decode(row)
    }

    pub async fn list_subscriptions(
        &self,
        clinic_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AppSubscription>, MarketplaceError> {
        let path = format!(
            "/rest/v1/app_subscriptions?clinic_id=eq.{}&order=started_at.desc",
            clinic_id
        );
        self.supabase
            .select(&path, Some(auth_token))
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// The subscription currently granting access to `app_key`, if any.
    pub async fn current_subscription(
        &self,
        clinic_id: Uuid,
        app_key: &str,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Option<AppSubscription>, MarketplaceError> {
        if !is_app_key(app_key) {
            return Ok(None);
        }
        let path = format!(
            "/rest/v1/app_subscriptions?clinic_id=eq.{}&app_key=eq.{}&status=eq.active&order=expires_at.desc",
            clinic_id, app_key
        );
        let rows = self.supabase.select(&path, Some(auth_token)).await?;

        for row in rows {
            let subscription: AppSubscription = decode(row)?;
            if subscription.grants_access(now) {
                return Ok(Some(subscription));
            }
        }
        Ok(None)
    }

    pub async fn has_access(
        &self,
        clinic_id: Uuid,
        app_key: &str,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<bool, MarketplaceError> {
        let granted = self
            .current_subscription(clinic_id, app_key, now, auth_token)
            .await?
            .is_some();
        debug!("Clinic {} access to {}: {}", clinic_id, app_key, granted);
        Ok(granted)
    }

    /// Pay one period from the wallet and activate the app. Owner only.
    #[instrument(skip(self, access, auth_token), fields(clinic_id = %access.clinic_id))]
    pub async fn subscribe(
        &self,
        access: &ClinicAccess,
        app_key: &str,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<AppSubscription, MarketplaceError> {
        access.require_owner()?;

        let app = self.get_app(app_key, auth_token).await?;
        if self
            .current_subscription(access.clinic_id, &app.key, now, auth_token)
            .await?
            .is_some()
        {
            return Err(MarketplaceError::AlreadySubscribed);
        }

        if app.price_monthly > 0.0 {
            self.wallets
                .debit(
                    access.clinic_id,
                    app.price_monthly,
                    &format!("Subscription: {}", app.name),
                    Some(auth_token),
                )
                .await?;
        }

        let row = self
            .supabase
            .insert_returning(
                "app_subscriptions",
                json!({
                    "clinic_id": access.clinic_id,
                    "app_id": app.id,
                    "app_key": app.key,
                    "status": SubscriptionStatus::Active,
                    "started_at": now.to_rfc3339(),
                    "expires_at": subscription_period(now).to_rfc3339(),
                    "cancelled_at": Value::Null
                }),
                Some(auth_token),
            )
            .await?;
        let subscription: AppSubscription = decode(row)?;

        info!(
            subscription_id = %subscription.id,
            app_key = %subscription.app_key,
            price = app.price_monthly,
            "App subscription activated"
        );
        Ok(subscription)
    }

    /// Stop the subscription immediately. No refund is issued.
    pub async fn cancel(
        &self,
        clinic_id: Uuid,
        subscription_id: Uuid,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<AppSubscription, MarketplaceError> {
        let path = format!(
            "/rest/v1/app_subscriptions?id=eq.{}&clinic_id=eq.{}",
            subscription_id, clinic_id
        );
        let current: AppSubscription = decode(
            self.supabase
                .select_one(&path, Some(auth_token))
                .await?
                .ok_or(MarketplaceError::SubscriptionNotFound)?,
        )?;
        if current.status != SubscriptionStatus::Active {
            return Err(MarketplaceError::NotActive);
        }

        let filter = format!(
            "id=eq.{}&clinic_id=eq.{}&status=eq.active",
            subscription_id, clinic_id
        );
        let row = self
            .supabase
            .patch_returning(
                "app_subscriptions",
                &filter,
                json!({
                    "status": SubscriptionStatus::Cancelled,
                    "cancelled_at": now.to_rfc3339()
                }),
                Some(auth_token),
            )
            .await
            .map_err(|e| match e {
                SupabaseError::Empty(_) => MarketplaceError::NotActive,
                other => other.into(),
            })?;

        info!(subscription_id = %subscription_id, "App subscription cancelled");
        decode(row)
    }
}
