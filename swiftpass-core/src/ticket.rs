use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ticket lifecycle. `Scanned` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TicketState {
    Unscanned,
    Scanned,
}

impl TicketState {
    /// Wire/storage representation of the checked flag.
    pub fn as_flag(&self) -> &'static str {
        match self {
            TicketState::Unscanned => "no",
            TicketState::Scanned => "yes",
        }
    }

    pub fn from_flag(flag: &str) -> Self {
        if flag == "yes" {
            TicketState::Scanned
        } else {
            TicketState::Unscanned
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub state: TicketState,
    pub checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn issue(booking_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            state: TicketState::Unscanned,
            checked_at: None,
            created_at: now,
        }
    }

    /// Fires the unscanned -> scanned transition. Returns false when the
    /// ticket was already scanned; the original timestamp is left untouched.
    pub fn redeem(&mut self, now: DateTime<Utc>) -> bool {
        if self.state == TicketState::Scanned {
            return false;
        }
        self.state = TicketState::Scanned;
        self.checked_at = Some(now);
        true
    }
}

/// Append-only record of a scan attempt that succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub scanned_at: DateTime<Utc>,
    pub scanner_info: String,
}

/// Ticket joined with its booking, customer and trip for receipt display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDetails {
    pub ticket_id: Uuid,
    pub booking_id: Uuid,
    pub state: TicketState,
    pub checked_at: Option<DateTime<Utc>>,
    pub issued_at: DateTime<Utc>,
    pub number_of_seats: i32,
    pub firstname: String,
    pub lastname: String,
    pub contact: String,
    pub email: String,
    pub trip_id: Uuid,
    pub departure_at: DateTime<Utc>,
    pub arrival_estimate: Option<DateTime<Utc>>,
    pub bus_model: Option<String>,
    pub plates_number: Option<String>,
    pub route_departure: Option<String>,
    pub route_destination: Option<String>,
}

/// Outcome of a redemption attempt. `AlreadyUsed` is a normal checkpoint
/// answer, not an error.
#[derive(Debug, Clone)]
pub enum RedeemOutcome {
    Redeemed {
        ticket: TicketDetails,
        scan_id: Uuid,
    },
    AlreadyUsed {
        scanned_at: DateTime<Utc>,
    },
    NotFound,
}
