use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::EnqueueBatch;
use crate::router::QueueState;
use crate::services::OfflineQueue;

fn queue(state: &QueueState) -> OfflineQueue {
    OfflineQueue::new(&state.config, state.store.clone())
}

#[axum::debug_handler]
pub async fn enqueue(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Json(batch): Json<EnqueueBatch>,
) -> Result<Json<Value>, AppError> {
    let queued = queue(&state).enqueue(&user.id, batch.mutations).await?;
    Ok(Json(json!({
        "queued": queued.len(),
        "mutations": queued,
    })))
}

#[axum::debug_handler]
pub async fn list_pending(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let pending = queue(&state).pending(&user.id).await?;
    Ok(Json(json!(pending)))
}

#[axum::debug_handler]
pub async fn replay(
    State(state): State<QueueState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let report = queue(&state).replay(&user.id, auth.token()).await?;
    Ok(Json(json!(report)))
}

#[axum::debug_handler]
pub async fn list_dead_letters(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let dead = queue(&state).dead_letters(&user.id).await?;
    Ok(Json(json!(dead)))
}
