use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swiftpass_core::booking::SettlementRequest;
use swiftpass_core::payment::{PaymentRequest, PaymentStatus, PaymentStatusReport};
use swiftpass_core::trip::SeatReservation;
use swiftpass_core::CoreError;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/payments", post(submit_payment))
        .route("/v1/payments/{reference_id}/status", get(payment_status))
        .route("/v1/payments/callback", post(gateway_callback))
}

#[derive(Debug, Deserialize)]
pub struct SubmitPaymentRequest {
    pub phone_number: String,
    pub amount: i64,
    pub payment_method: Option<String>,
    pub trip_id: Uuid,
    pub number_of_seats: i32,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
struct SubmitPaymentResponse {
    success: bool,
    message: String,
    reference_id: Uuid,
    external_id: Uuid,
    amount: i64,
    currency: String,
    phone_number: String,
    trip_id: Uuid,
    number_of_seats: i32,
    firstname: String,
    lastname: String,
    email: String,
    contact: String,
    timestamp: DateTime<Utc>,
}

/// Accepted MSISDN prefixes for Rwandan mobile money numbers.
const MSISDN_PREFIXES: [&str; 4] = ["078", "079", "072", "073"];

fn validate_msisdn(raw: &str) -> Result<String, AppError> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let prefixed = MSISDN_PREFIXES.iter().any(|p| cleaned.starts_with(p));
    if cleaned.len() != 10 || !prefixed || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest {
            code: "INVALID_PHONE",
            message: "Please enter a valid Rwandan phone number (078, 079, 072 or 073)".to_string(),
        });
    }
    Ok(cleaned)
}

async fn submit_payment(
    State(state): State<AppState>,
    Json(req): Json<SubmitPaymentRequest>,
) -> Result<Json<SubmitPaymentResponse>, AppError> {
    let msisdn = validate_msisdn(&req.phone_number)?;
    if req.amount <= 0 {
        return Err(AppError::BadRequest {
            code: "INVALID_AMOUNT",
            message: "Please enter a valid amount".to_string(),
        });
    }
    if req.number_of_seats <= 0 {
        return Err(AppError::BadRequest {
            code: "INVALID_SEATS",
            message: "Please enter a valid number of seats".to_string(),
        });
    }

    let method = req
        .payment_method
        .clone()
        .unwrap_or_else(|| "momo".to_string());
    let handle = state
        .gateway
        .request_to_pay(&PaymentRequest {
            msisdn: msisdn.clone(),
            amount: req.amount,
            method,
        })
        .await?;

    info!(reference_id = %handle.reference_id, trip_id = %req.trip_id, "payment request submitted");

    // No booking records yet. Everything the client must carry through
    // status polling is echoed back.
    Ok(Json(SubmitPaymentResponse {
        success: true,
        message: "Payment request sent successfully! Please approve the payment on your phone."
            .to_string(),
        reference_id: handle.reference_id,
        external_id: handle.external_id,
        amount: req.amount,
        currency: handle.currency,
        phone_number: msisdn.clone(),
        trip_id: req.trip_id,
        number_of_seats: req.number_of_seats,
        firstname: req.firstname,
        lastname: req.lastname,
        email: req.email,
        contact: msisdn,
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub trip_id: Option<Uuid>,
    pub number_of_seats: Option<i32>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub contact: Option<String>,
    pub payment_method: Option<String>,
    pub amount: Option<i64>,
}

#[derive(Debug, Serialize)]
struct PaymentStatusResponse {
    status: PaymentStatus,
    status_message: String,
    financial_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    settlement: Option<SettlementSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    db_error: Option<DbError>,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct SettlementSummary {
    customer_id: Uuid,
    booking_id: Uuid,
    payment_id: Uuid,
    ticket_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    seat_update: Option<SeatReservation>,
    replayed: bool,
}

#[derive(Debug, Serialize)]
struct DbError {
    code: &'static str,
    message: String,
}

fn status_message(status: &PaymentStatus) -> String {
    match status {
        PaymentStatus::Pending => "Waiting for payment approval on your phone",
        PaymentStatus::Successful => "Payment completed successfully",
        PaymentStatus::Failed => "Payment was declined or failed",
        PaymentStatus::Unknown => "Payment status unknown",
    }
    .to_string()
}

fn settlement_request(
    reference_id: Uuid,
    report: &PaymentStatusReport,
    query: &StatusQuery,
) -> Option<SettlementRequest> {
    Some(SettlementRequest {
        trip_id: query.trip_id?,
        number_of_seats: query.number_of_seats?,
        firstname: query.firstname.clone()?,
        lastname: query.lastname.clone()?,
        contact: query.contact.clone()?,
        email: query.email.clone()?,
        amount: query.amount.unwrap_or(0),
        method: query
            .payment_method
            .clone()
            .unwrap_or_else(|| "momo".to_string()),
        // The gateway's transaction id is the idempotency key; the request
        // reference stands in when the gateway omits it.
        transaction_ref: report
            .financial_transaction_id
            .clone()
            .unwrap_or_else(|| reference_id.to_string()),
    })
}

/// The settlement trigger. Polled by the client; the first poll that
/// observes SUCCESSFUL with complete booking data settles the payment.
/// Later polls replay the settlement and get the same identifiers back.
async fn payment_status(
    State(state): State<AppState>,
    Path(reference_id): Path<Uuid>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    let report = state.gateway.payment_status(reference_id).await?;

    let mut response = PaymentStatusResponse {
        status: report.status.clone(),
        status_message: status_message(&report.status),
        financial_transaction_id: report.financial_transaction_id.clone(),
        settlement: None,
        db_error: None,
        timestamp: Utc::now(),
    };

    if report.status == PaymentStatus::Successful {
        if let Some(request) = settlement_request(reference_id, &report, &query) {
            match state.settlements.settle(request).await {
                Ok(result) => {
                    response.settlement = Some(SettlementSummary {
                        customer_id: result.ids.customer_id,
                        booking_id: result.ids.booking_id,
                        payment_id: result.ids.payment_id,
                        ticket_id: result.ids.ticket_id,
                        seat_update: result.reservation,
                        replayed: result.replayed,
                    });
                }
                // The gateway status still reaches the caller; the
                // settlement failure rides along with its own reason code.
                Err(err) => {
                    error!(%reference_id, "settlement failed: {err}");
                    let message = err.to_string();
                    let code = match err {
                        CoreError::InsufficientSeats { .. } => "NO_SEATS_LEFT",
                        _ => "SETTLEMENT_ERROR",
                    };
                    response.db_error = Some(DbError { code, message });
                }
            }
        }
    }

    Ok(Json(response))
}

/// Gateway notification receiver. Settlement is driven by status polling;
/// callbacks are logged and always acknowledged.
async fn gateway_callback(Json(payload): Json<serde_json::Value>) -> StatusCode {
    info!(payload = %payload, "gateway callback received");
    if payload["status"].as_str() == Some("SUCCESSFUL") {
        info!(
            transaction = payload["financialTransactionId"].as_str().unwrap_or("unknown"),
            "payment confirmed via callback"
        );
    }
    StatusCode::OK
}
