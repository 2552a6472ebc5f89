use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduled departure with a finite seat count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub departure_at: DateTime<Utc>,
    pub arrival_estimate: Option<DateTime<Utc>>,
    pub available_seats: i32,
}

/// Seat movement produced by a successful reservation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeatReservation {
    pub previous_available: i32,
    pub new_available: i32,
}
