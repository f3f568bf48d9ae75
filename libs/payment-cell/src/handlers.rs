use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use clinic_cell::{ClinicAccessService, ClinicService, Permission};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{EasyKashCallback, TopupRequest, TransactionQuery};
use crate::services::{Buyer, PaymentWebhookService, TopupService, WalletService};

#[axum::debug_handler]
pub async fn get_wallet(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config)
        .require(&user, auth.token(), Permission::ViewFinance)
        .await?;
    let wallet = WalletService::new(&config)
        .get_wallet(access.clinic_id, Some(auth.token()))
        .await?;
    Ok(Json(json!(wallet)))
}

#[axum::debug_handler]
pub async fn list_transactions(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config)
        .require(&user, auth.token(), Permission::ViewFinance)
        .await?;
    let transactions = WalletService::new(&config)
        .list_transactions(access.clinic_id, &query, auth.token())
        .await?;
    Ok(Json(json!(transactions)))
}

#[axum::debug_handler]
pub async fn start_topup(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<TopupRequest>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config)
        .require(&user, auth.token(), Permission::ViewFinance)
        .await?;
    let clinic = ClinicService::new(&config)
        .get_clinic(access.clinic_id, auth.token())
        .await?;

    let buyer = Buyer {
        name: user.display_name().unwrap_or_else(|| clinic.name.clone()),
        email: user.email.clone().unwrap_or_default(),
        mobile: clinic.phone.clone().unwrap_or_default(),
    };

    let response = TopupService::new(&config)?
        .start_topup(access.clinic_id, request.amount, &buyer, auth.token())
        .await?;
    Ok(Json(json!(response)))
}

/// Public EasyKash callback. Authenticated by its HMAC signature only.
#[axum::debug_handler]
pub async fn payment_webhook(
    State(config): State<Arc<AppConfig>>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let callback: EasyKashCallback = serde_json::from_value(payload)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    let result = PaymentWebhookService::new(&config).handle(&callback).await?;
    Ok(Json(json!(result)))
}
