use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    normalize_instance_state, NotificationError, WhatsAppInstance, STATUS_CREATED, STATUS_DISCONNECTED,
};
use crate::services::whatsapp::WhatsAppClient;

/// Gateway instance names are derived from the clinic id.
pub fn instance_name_for(clinic_id: Uuid) -> String {
    format!("tabibi_{}", clinic_id.simple())
}

fn decode(row: Value) -> Result<WhatsAppInstance, NotificationError> {
    serde_json::from_value(row).map_err(|e| NotificationError::Decode(e.to_string()))
}

/// One WhatsApp instance per clinic, mirrored in `whatsapp_instances`.
pub struct InstanceService {
    supabase: SupabaseClient,
    client: WhatsAppClient,
}

impl InstanceService {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        Ok(Self {
            supabase: SupabaseClient::new(config),
            client: WhatsAppClient::new(config)?,
        })
    }

    pub async fn find(&self, clinic_id: Uuid, auth_token: &str) -> Result<Option<WhatsAppInstance>, NotificationError> {
        let path = format!("/rest/v1/whatsapp_instances?clinic_id=eq.{}", clinic_id);
        self.supabase
            .select_one(&path, Some(auth_token))
            .await?
            .map(decode)
            .transpose()
    }

    async fn existing(&self, clinic_id: Uuid, auth_token: &str) -> Result<WhatsAppInstance, NotificationError> {
        self.find(clinic_id, auth_token)
            .await?
            .ok_or(NotificationError::InstanceNotFound)
    }

    async fn store_status(
        &self,
        instance: &WhatsAppInstance,
        status: &str,
        auth_token: &str,
    ) -> Result<WhatsAppInstance, NotificationError> {
        let filter = format!("id=eq.{}", instance.id);
        let row = self
            .supabase
            .patch_returning(
                "whatsapp_instances",
                &filter,
                json!({ "status": status, "updated_at": Utc::now().to_rfc3339() }),
                Some(auth_token),
            )
            .await?;
        decode(row)
    }

    pub async fn create(&self, clinic_id: Uuid, auth_token: &str) -> Result<WhatsAppInstance, NotificationError> {
        if self.find(clinic_id, auth_token).await?.is_some() {
            return Err(NotificationError::InstanceExists);
        }

        let instance_name = instance_name_for(clinic_id);
        self.client.create_instance(&instance_name).await?;

        let now = Utc::now().to_rfc3339();
        let row = self
            .supabase
            .insert_returning(
                "whatsapp_instances",
                json!({
                    "clinic_id": clinic_id,
                    "instance_name": instance_name,
                    "status": STATUS_CREATED,
                    "created_at": now,
                    "updated_at": now
                }),
                Some(auth_token),
            )
            .await?;

        info!(clinic_id = %clinic_id, "WhatsApp instance created");
        decode(row)
    }

    pub async fn qr_code(&self, clinic_id: Uuid, auth_token: &str) -> Result<Value, NotificationError> {
        let instance = self.existing(clinic_id, auth_token).await?;
        self.client.qr_code(&instance.instance_name).await
    }

    /// Ask the gateway for the live state and persist it.
    pub async fn refresh_status(&self, clinic_id: Uuid, auth_token: &str) -> Result<WhatsAppInstance, NotificationError> {
        let instance = self.existing(clinic_id, auth_token).await?;
        let state = self.client.connection_state(&instance.instance_name).await?;
        let status = normalize_instance_state(&state);
        if status == instance.status {
            return Ok(instance);
        }
        self.store_status(&instance, status, auth_token).await
    }

    pub async fn logout(&self, clinic_id: Uuid, auth_token: &str) -> Result<WhatsAppInstance, NotificationError> {
        let instance = self.existing(clinic_id, auth_token).await?;
        self.client.logout(&instance.instance_name).await?;
        info!(clinic_id = %clinic_id, "WhatsApp instance logged out");
        self.store_status(&instance, STATUS_DISCONNECTED, auth_token).await
    }

    pub async fn delete(&self, clinic_id: Uuid, auth_token: &str) -> Result<(), NotificationError> {
        let instance = self.existing(clinic_id, auth_token).await?;
        self.client.delete_instance(&instance.instance_name).await?;
        self.supabase
            .delete(&format!("/rest/v1/whatsapp_instances?id=eq.{}", instance.id), Some(auth_token))
            .await?;
        info!(clinic_id = %clinic_id, "WhatsApp instance deleted");
        Ok(())
    }
}
