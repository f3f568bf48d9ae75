use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{AddSecretaryRequest, ClinicError, Secretary, UpdateSecretaryRequest};

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
    })
}

pub fn validate_secretary(request: &AddSecretaryRequest) -> Result<(), ClinicError> {
    if request.name.trim().chars().count() < 2 {
        return Err(ClinicError::Validation("Secretary name is required".to_string()));
    }
    if !email_regex().is_match(request.email.trim()) {
        return Err(ClinicError::Validation("Invalid email address".to_string()));
    }
    if request.permissions.is_empty() {
        return Err(ClinicError::Validation(
            "A secretary needs at least one permission".to_string(),
        ));
    }
    Ok(())
}

pub struct StaffService {
    supabase: SupabaseClient,
}

impl StaffService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_secretaries(
        &self,
        clinic_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Secretary>, ClinicError> {
        let path = format!("/rest/v1/secretaries?clinic_id=eq.{}&order=created_at.asc", clinic_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| ClinicError::Validation(e.to_string())))
            .collect()
    }

    pub async fn add_secretary(
        &self,
        clinic_id: Uuid,
        request: AddSecretaryRequest,
        auth_token: &str,
    ) -> Result<Secretary, ClinicError> {
        validate_secretary(&request)?;
        let email = request.email.trim().to_lowercase();

        // Secretaries sign up on their own; the owner links the existing account.
        let user_id: Option<Uuid> = self
            .supabase
            .rpc("find_user_id_by_email", json!({ "p_email": email }), Some(auth_token))
            .await?;
        let user_id = user_id.ok_or_else(|| ClinicError::UnknownAccount(email.clone()))?;

        let secretary_data = json!({
            "clinic_id": clinic_id,
            "user_id": user_id,
            "name": request.name.trim(),
            "email": email,
            "phone": request.phone,
            "permissions": request.permissions,
            "is_active": true,
            "created_at": Utc::now().to_rfc3339()
        });

        let row = self
            .supabase
            .insert_returning("secretaries", secretary_data, Some(auth_token))
            .await?;
        let secretary: Secretary =
            serde_json::from_value(row).map_err(|e| ClinicError::Validation(e.to_string()))?;

        info!("Secretary {} added to clinic {}", secretary.id, clinic_id);
        Ok(secretary)
    }

    pub async fn update_secretary(
        &self,
        clinic_id: Uuid,
        secretary_id: Uuid,
        request: UpdateSecretaryRequest,
        auth_token: &str,
    ) -> Result<Secretary, ClinicError> {
        let mut update_data = Map::new();

        if let Some(name) = request.name {
            update_data.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(permissions) = request.permissions {
            if permissions.is_empty() {
                return Err(ClinicError::Validation(
                    "A secretary needs at least one permission".to_string(),
                ));
            }
            update_data.insert("permissions".to_string(), json!(permissions));
        }
        if let Some(active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(active));
        }

        if update_data.is_empty() {
            return Err(ClinicError::Validation("Nothing to update".to_string()));
        }

        debug!("Updating secretary {} in clinic {}", secretary_id, clinic_id);
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/secretaries?id=eq.{}&clinic_id=eq.{}", secretary_id, clinic_id),
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(return_representation()),
            )
            .await?;

        let row = rows.into_iter().next().ok_or(ClinicError::SecretaryNotFound)?;
        serde_json::from_value(row).map_err(|e| ClinicError::Validation(e.to_string()))
    }

    pub async fn remove_secretary(
        &self,
        clinic_id: Uuid,
        secretary_id: Uuid,
        auth_token: &str,
    ) -> Result<(), ClinicError> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &format!("/rest/v1/secretaries?id=eq.{}&clinic_id=eq.{}", secretary_id, clinic_id),
                Some(auth_token),
                None,
                Some(return_representation()),
            )
            .await?;

        if rows.is_empty() {
            return Err(ClinicError::SecretaryNotFound);
        }

        info!("Secretary {} removed from clinic {}", secretary_id, clinic_id);
        Ok(())
    }
}

fn return_representation() -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "Prefer",
        reqwest::header::HeaderValue::from_static("return=representation"),
    );
    headers
}
