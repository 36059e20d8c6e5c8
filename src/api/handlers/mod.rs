use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};

use super::response::{ApiError, ApiResponse};
use super::AppState;
use crate::commands::{
    AddUserToProcedureHandler, RemoveAllUsersFromProcedureHandler, RemoveUserFromProcedureHandler,
};
use crate::models::*;

type CommandResponse = Result<Json<ApiResponse<()>>, ApiError>;

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Plan procedure membership
// ============================================================

pub async fn add_user_to_procedure(
    State(state): State<AppState>,
    body: Result<Json<AddUserToProcedureCommand>, JsonRejection>,
) -> CommandResponse {
    let Json(command) = body?;
    let cancel = state.shutdown.child_token();
    AddUserToProcedureHandler::new(state.db)
        .handle(command, &cancel)
        .await?;
    Ok(Json(ApiResponse::succeed(())))
}

pub async fn remove_user_from_procedure(
    State(state): State<AppState>,
    body: Result<Json<RemoveUserFromProcedureCommand>, JsonRejection>,
) -> CommandResponse {
    let Json(command) = body?;
    let cancel = state.shutdown.child_token();
    RemoveUserFromProcedureHandler::new(state.db)
        .handle(command, &cancel)
        .await?;
    Ok(Json(ApiResponse::succeed(())))
}

pub async fn remove_all_users_from_procedure(
    State(state): State<AppState>,
    body: Result<Json<RemoveAllUsersFromProcedureCommand>, JsonRejection>,
) -> CommandResponse {
    let Json(command) = body?;
    let cancel = state.shutdown.child_token();
    RemoveAllUsersFromProcedureHandler::new(state.db)
        .handle(command, &cancel)
        .await?;
    Ok(Json(ApiResponse::succeed(())))
}
