use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swiftpass_core::ticket::{RedeemOutcome, TicketDetails, TicketState};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Scanner identity recorded when the checkpoint does not send its own.
const DEFAULT_SCANNER: &str = "SwiftPass Scanner API";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/tickets/scan", post(scan_ticket))
        .route("/v1/tickets/{ticket_id}", get(ticket_status))
        .route("/v1/tickets/{ticket_id}/verify", get(verify_ticket))
}

#[derive(Debug, Deserialize)]
pub struct ScanTicketRequest {
    pub ticket_id: Option<Uuid>,
    pub scanner_info: Option<String>,
}

#[derive(Debug, Serialize)]
struct ScanTicketResponse {
    success: bool,
    status: &'static str,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ticket: Option<TicketDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scan_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scanned_at: Option<DateTime<Utc>>,
}

async fn scan_ticket(
    State(state): State<AppState>,
    Json(req): Json<ScanTicketRequest>,
) -> Result<(StatusCode, Json<ScanTicketResponse>), AppError> {
    let ticket_id = req.ticket_id.ok_or(AppError::BadRequest {
        code: "MISSING_TICKET_ID",
        message: "Ticket ID is required".to_string(),
    })?;
    let scanner = req
        .scanner_info
        .unwrap_or_else(|| DEFAULT_SCANNER.to_string());

    match state.tickets.redeem(ticket_id, &scanner).await? {
        RedeemOutcome::Redeemed { ticket, scan_id } => {
            let scanned_at = ticket.checked_at;
            Ok((
                StatusCode::OK,
                Json(ScanTicketResponse {
                    success: true,
                    status: "scanned",
                    message: "Ticket scanned successfully",
                    ticket: Some(ticket),
                    scan_id: Some(scan_id),
                    scanned_at,
                }),
            ))
        }
        RedeemOutcome::AlreadyUsed { scanned_at } => Ok((
            StatusCode::CONFLICT,
            Json(ScanTicketResponse {
                success: false,
                status: "already_used",
                message: "Ticket already scanned",
                ticket: None,
                scan_id: None,
                scanned_at: Some(scanned_at),
            }),
        )),
        RedeemOutcome::NotFound => Err(AppError::NotFound {
            code: "TICKET_NOT_FOUND",
            message: format!("Ticket not found: {ticket_id}"),
        }),
    }
}

#[derive(Debug, Serialize)]
struct TicketStatusResponse {
    success: bool,
    ticket: TicketDetails,
}

async fn ticket_status(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<TicketStatusResponse>, AppError> {
    let ticket = state
        .tickets
        .status(ticket_id)
        .await?
        .ok_or(AppError::NotFound {
            code: "TICKET_NOT_FOUND",
            message: format!("Ticket not found: {ticket_id}"),
        })?;

    Ok(Json(TicketStatusResponse {
        success: true,
        ticket,
    }))
}

#[derive(Debug, Serialize)]
struct VerifyTicketResponse {
    success: bool,
    valid: bool,
    status: &'static str,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ticket: Option<TicketDetails>,
}

/// Read-only QR verification: reports validity without redeeming.
async fn verify_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> Result<(StatusCode, Json<VerifyTicketResponse>), AppError> {
    match state.tickets.verify(ticket_id).await? {
        Some((ticket, status)) => {
            let message = match ticket.state {
                TicketState::Scanned => "Ticket already used",
                TicketState::Unscanned => "Ticket is valid",
            };
            Ok((
                StatusCode::OK,
                Json(VerifyTicketResponse {
                    success: true,
                    valid: true,
                    status,
                    message,
                    ticket: Some(ticket),
                }),
            ))
        }
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(VerifyTicketResponse {
                success: false,
                valid: false,
                status: "unknown",
                message: "Ticket not found",
                ticket: None,
            }),
        )),
    }
}
