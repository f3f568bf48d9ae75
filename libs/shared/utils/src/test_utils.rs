use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";
pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const TEST_EASYKASH_HMAC_SECRET: &str = "test-easykash-hmac-secret";

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Config whose every upstream (database, gateway, push, WhatsApp, AI)
    /// points at the same mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
            easykash_api_key: "test-easykash-key".to_string(),
            easykash_hmac_secret: TEST_EASYKASH_HMAC_SECRET.to_string(),
            easykash_base_url: self.supabase_url.clone(),
            payment_redirect_url: "https://tabibi.app/wallet".to_string(),
            onesignal_app_id: "test-onesignal-app".to_string(),
            onesignal_api_key: "test-onesignal-key".to_string(),
            onesignal_base_url: self.supabase_url.clone(),
            whatsapp_api_url: self.supabase_url.clone(),
            whatsapp_api_token: "test-whatsapp-token".to_string(),
            gemini_api_key: "test-gemini-key".to_string(),
            gemini_base_url: self.supabase_url.clone(),
            gemini_model: "gemini-test".to_string(),
            redis_url: None,
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "authenticated".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "authenticated")
    }

    pub fn secretary(email: &str) -> Self {
        Self::new(email, "authenticated")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    fn sign(payload: Value, secret: &str) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        Self::sign(
            json!({
                "sub": user.id,
                "email": user.email,
                "role": user.role,
                "aud": "authenticated",
                "iat": now.timestamp(),
                "exp": exp.timestamp()
            }),
            secret,
        )
    }

    pub fn create_token_with_audience(user: &TestUser, secret: &str, aud: &str) -> String {
        let now = Utc::now();
        Self::sign(
            json!({
                "sub": user.id,
                "aud": aud,
                "iat": now.timestamp(),
                "exp": (now + Duration::hours(1)).timestamp()
            }),
            secret,
        )
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row fixtures shaped like the PostgREST responses the cells consume.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn clinic_response(clinic_id: &str, owner_id: &str) -> Value {
        json!({
            "id": clinic_id,
            "owner_id": owner_id,
            "name": "Nile Family Clinic",
            "booking_slug": "nile-family-clinic",
            "phone": "01001234567",
            "address": "12 Tahrir St, Cairo",
            "specialty": "Family Medicine",
            "booking_enabled": true,
            "slot_duration_minutes": 30,
            "working_hours": {
                "sunday": { "enabled": true, "start": "09:00", "end": "17:00" },
                "monday": { "enabled": true, "start": "09:00", "end": "17:00" },
                "tuesday": { "enabled": true, "start": "09:00", "end": "17:00" },
                "wednesday": { "enabled": true, "start": "09:00", "end": "17:00" },
                "thursday": { "enabled": true, "start": "09:00", "end": "13:00" },
                "friday": { "enabled": false, "start": "09:00", "end": "17:00" },
                "saturday": { "enabled": true, "start": "10:00", "end": "14:00" }
            },
            "medical_fields_config": null,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn secretary_response(clinic_id: &str, user_id: &str, permissions: &[&str]) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "clinic_id": clinic_id,
            "user_id": user_id,
            "name": "Sara Hassan",
            "email": "sara@example.com",
            "phone": "01112223334",
            "permissions": permissions,
            "is_active": true,
            "created_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn patient_response(patient_id: &str, clinic_id: &str, full_name: &str) -> Value {
        json!({
            "id": patient_id,
            "clinic_id": clinic_id,
            "full_name": full_name,
            "phone": "01012345678",
            "gender": "female",
            "date_of_birth": "1990-05-14",
            "address": null,
            "notes": null,
            "medical_history": null,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        clinic_id: &str,
        patient_id: &str,
        date: &str,
        time: &str,
        status: &str,
    ) -> Value {
        json!({
            "id": appointment_id,
            "clinic_id": clinic_id,
            "patient_id": patient_id,
            "appointment_date": date,
            "appointment_time": time,
            "duration_minutes": 30,
            "status": status,
            "source": "clinic",
            "reason": "Checkup",
            "notes": null,
            "reminder_sent": false,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn wallet_response(clinic_id: &str, balance: f64) -> Value {
        json!({
            "clinic_id": clinic_id,
            "balance": balance,
            "currency": "EGP",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn wallet_transaction_response(
        transaction_id: &str,
        clinic_id: &str,
        reference: &str,
        amount: f64,
        status: &str,
    ) -> Value {
        json!({
            "id": transaction_id,
            "clinic_id": clinic_id,
            "amount": amount,
            "type": "topup",
            "status": status,
            "reference": reference,
            "easykash_ref": null,
            "description": "Wallet top-up",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn marketplace_app_response(app_id: &str, key: &str, price: f64) -> Value {
        json!({
            "id": app_id,
            "key": key,
            "name": "AI Assistant",
            "description": "Chat assistant for clinic staff",
            "price_monthly": price,
            "is_active": true
        })
    }

    pub fn subscription_response(
        subscription_id: &str,
        clinic_id: &str,
        app_id: &str,
        app_key: &str,
        status: &str,
        expires_at: &str,
    ) -> Value {
        json!({
            "id": subscription_id,
            "clinic_id": clinic_id,
            "app_id": app_id,
            "app_key": app_key,
            "status": status,
            "started_at": "2026-01-01T00:00:00Z",
            "expires_at": expires_at,
            "cancelled_at": null
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
