use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trip::SeatReservation;

/// One customer row per settlement. No dedup across settlements: a repeat
/// traveler gets a fresh row each time they book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub contact: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub trip_id: Uuid,
    pub number_of_seats: i32,
    pub booking_date: DateTime<Utc>,
}

/// Payment record written by settlement. The engine only ever records
/// confirmed payments, so `status` is always "completed".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: i64,
    pub method: String,
    pub transaction_ref: String,
    pub status: String,
    pub time_paid: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Everything settlement needs to materialize the record set for one
/// confirmed payment. `transaction_ref` is the gateway's transaction id
/// (falling back to the request reference) and acts as the idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub trip_id: Uuid,
    pub number_of_seats: i32,
    pub firstname: String,
    pub lastname: String,
    pub contact: String,
    pub email: String,
    pub amount: i64,
    pub method: String,
    pub transaction_ref: String,
}

/// Identifiers of the customer/booking/payment/ticket set created by one
/// settlement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SettlementIds {
    pub customer_id: Uuid,
    pub booking_id: Uuid,
    pub payment_id: Uuid,
    pub ticket_id: Uuid,
}

/// A freshly committed settlement, including the seat movement it caused.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub ids: SettlementIds,
    pub reservation: SeatReservation,
}

/// Outcome of a settlement call. `replayed` is true when the reference had
/// already been settled and the original identifiers were returned instead
/// of running the transaction again.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementResult {
    pub ids: SettlementIds,
    pub reservation: Option<SeatReservation>,
    pub replayed: bool,
}
