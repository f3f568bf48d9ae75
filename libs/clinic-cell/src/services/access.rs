use serde::Deserialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;

use crate::models::{ClinicAccess, ClinicError, Permission};

#[derive(Debug, Deserialize)]
struct OwnedClinicRow {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct SecretaryMembershipRow {
    id: Uuid,
    clinic_id: Uuid,
    #[serde(default)]
    permissions: Vec<String>,
}

/// Resolves which clinic a caller acts for and with which permissions.
pub struct ClinicAccessService {
    supabase: SupabaseClient,
}

impl ClinicAccessService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Like [`resolve`](Self::resolve) but returns `None` for users without a clinic.
    pub async fn find(&self, user: &User, auth_token: &str) -> Result<Option<ClinicAccess>, ClinicError> {
        let owner_path = format!("/rest/v1/clinics?owner_id=eq.{}&select=id", user.id);
        if let Some(row) = self.supabase.select_one(&owner_path, Some(auth_token)).await? {
            let owned: OwnedClinicRow = serde_json::from_value(row)
                .map_err(|e| ClinicError::Validation(e.to_string()))?;
            debug!("User {} owns clinic {}", user.id, owned.id);
            return Ok(Some(ClinicAccess::owner(owned.id, &user.id)));
        }

        let secretary_path = format!(
            "/rest/v1/secretaries?user_id=eq.{}&is_active=eq.true&select=id,clinic_id,permissions",
            user.id
        );
        if let Some(row) = self.supabase.select_one(&secretary_path, Some(auth_token)).await? {
            let membership: SecretaryMembershipRow = serde_json::from_value(row)
                .map_err(|e| ClinicError::Validation(e.to_string()))?;
            let permissions = membership
                .permissions
                .iter()
                .filter_map(|p| Permission::parse(p))
                .collect();
            debug!("User {} is a secretary of clinic {}", user.id, membership.clinic_id);
            return Ok(Some(ClinicAccess::secretary(
                membership.clinic_id,
                &user.id,
                membership.id,
                permissions,
            )));
        }

        Ok(None)
    }

    #[instrument(skip(self, user, auth_token), fields(user_id = %user.id))]
    pub async fn resolve(&self, user: &User, auth_token: &str) -> Result<ClinicAccess, ClinicError> {
        self.find(user, auth_token)
            .await?
            .ok_or(ClinicError::NoClinicAccess)
    }

    /// Resolve and check a permission in one step.
    pub async fn require(
        &self,
        user: &User,
        auth_token: &str,
        permission: Permission,
    ) -> Result<ClinicAccess, ClinicError> {
        let access = self.resolve(user, auth_token).await?;
        access.require(permission)?;
        Ok(access)
    }
}
