//! `/api/support/*` handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::ApiState;
use super::extract::{ApiJson, AuthUser};
use crate::auth::normalize_email;
use crate::error::ApiError;
use crate::store::tickets::{SupportTicket, TicketStatus};

#[derive(Debug, Deserialize)]
pub(super) struct CreateRequest {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    message: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RespondRequest {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusRequest {
    status: Option<String>,
}

/// Load a ticket the caller may see: their own, or any ticket for admins
/// when `admin_allowed`.
async fn load_ticket(
    state: &ApiState,
    caller: &AuthUser,
    id: String,
    admin_allowed: bool,
    denied: &str,
) -> Result<SupportTicket, ApiError> {
    let ticket = state
        .db(move |s| s.find_ticket(&id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Ticket not found".into()))?;
    let is_owner = ticket.user_id == caller.user.id;
    if !is_owner && !(admin_allowed && caller.user.is_admin) {
        return Err(ApiError::Forbidden(denied.into()));
    }
    Ok(ticket)
}

/// POST /api/support/ticket
pub(super) async fn create(
    State(state): State<ApiState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<CreateRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let subject = req.subject.trim().to_string();
    let message = req.message.trim().to_string();
    if subject.is_empty() || message.is_empty() {
        return Err(ApiError::BadRequest("Please provide subject and message".into()));
    }
    let email = req
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| caller.user.email.clone());

    let user_id = caller.user.id.clone();
    let ticket = state
        .db(move |s| s.create_ticket(&user_id, &subject, &message, &email))
        .await?;
    info!(ticket_id = %ticket.id, user = %caller.user.username, "support ticket created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Support ticket created successfully", "ticketId": ticket.id })),
    ))
}

/// GET /api/support/tickets
pub(super) async fn list(
    State(state): State<ApiState>,
    caller: AuthUser,
) -> Result<Json<Vec<SupportTicket>>, ApiError> {
    let user_id = caller.user.id.clone();
    Ok(Json(state.db(move |s| s.list_tickets(&user_id)).await?))
}

/// GET /api/support/ticket/{id}
pub(super) async fn detail(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SupportTicket>, ApiError> {
    let ticket = load_ticket(&state, &caller, id, false, "Not authorized to access this ticket").await?;
    Ok(Json(ticket))
}

/// POST /api/support/ticket/{id}/respond
pub(super) async fn respond(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<RespondRequest>,
) -> Result<Json<Value>, ApiError> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Please provide a message".into()));
    }
    let ticket = load_ticket(&state, &caller, id, true, "Not authorized to respond to this ticket").await?;

    let is_admin = caller.user.is_admin;
    let ticket_id = ticket.id.clone();
    let updated = state
        .db(move |s| s.append_response(&ticket_id, &message, is_admin))
        .await?
        .ok_or_else(|| ApiError::NotFound("Ticket not found".into()))?;
    info!(ticket_id = %updated.id, user_id = %caller.user.id, is_admin, status = updated.status.as_str(), "ticket response added");

    Ok(Json(json!({ "message": "Response added successfully", "ticket": updated })))
}

/// PUT /api/support/ticket/{id}/status (admins only)
pub(super) async fn set_status(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<Json<Value>, ApiError> {
    if !caller.user.is_admin {
        return Err(ApiError::Forbidden("Admin access required".into()));
    }
    let status: TicketStatus = req
        .status
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid ticket status".into()))?;

    let updated = state
        .db(move |s| s.set_ticket_status(&id, status))
        .await?
        .ok_or_else(|| ApiError::NotFound("Ticket not found".into()))?;
    info!(ticket_id = %updated.id, status = status.as_str(), "ticket status changed");

    Ok(Json(json!({ "message": "Ticket status updated", "ticket": updated })))
}
