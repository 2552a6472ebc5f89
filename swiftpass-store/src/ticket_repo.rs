use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use swiftpass_core::repository::TicketStore;
use swiftpass_core::ticket::{RedeemOutcome, TicketDetails, TicketState};
use swiftpass_core::{CoreError, CoreResult};
use uuid::Uuid;

use crate::store_err;

pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TicketDetailsRow {
    ticket_id: Uuid,
    booking_id: Uuid,
    checked: String,
    checked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    number_of_seats: i32,
    firstname: String,
    lastname: String,
    contact: String,
    email: String,
    trip_id: Uuid,
    departure_datetime: DateTime<Utc>,
    estimated_arrival: Option<DateTime<Utc>>,
    bus_model: Option<String>,
    plates_number: Option<String>,
    route_departure: Option<String>,
    route_destination: Option<String>,
}

impl From<TicketDetailsRow> for TicketDetails {
    fn from(row: TicketDetailsRow) -> Self {
        TicketDetails {
            ticket_id: row.ticket_id,
            booking_id: row.booking_id,
            state: TicketState::from_flag(&row.checked),
            checked_at: row.checked_at,
            issued_at: row.created_at,
            number_of_seats: row.number_of_seats,
            firstname: row.firstname,
            lastname: row.lastname,
            contact: row.contact,
            email: row.email,
            trip_id: row.trip_id,
            departure_at: row.departure_datetime,
            arrival_estimate: row.estimated_arrival,
            bus_model: row.bus_model,
            plates_number: row.plates_number,
            route_departure: row.route_departure,
            route_destination: row.route_destination,
        }
    }
}

const DETAILS_QUERY: &str = "SELECT t.ticket_id, t.booking_id, t.checked, t.checked_at, t.created_at,
        b.number_of_seats,
        c.firstname, c.lastname, c.contact, c.email,
        trip.trip_id, trip.departure_datetime, trip.estimated_arrival,
        bus.model AS bus_model, bus.plates_number,
        r.departure AS route_departure, r.destination AS route_destination
 FROM tickets t
 JOIN bookings b ON t.booking_id = b.booking_id
 JOIN customers c ON b.customer_id = c.customer_id
 JOIN trips trip ON b.trip_id = trip.trip_id
 LEFT JOIN buses bus ON trip.bus_id = bus.bus_id
 LEFT JOIN routes r ON trip.route_id = r.route_id
 WHERE t.ticket_id = $1";

#[async_trait]
impl TicketStore for PostgresTicketStore {
    async fn redeem(&self, ticket_id: Uuid, scanner_info: &str) -> CoreResult<RedeemOutcome> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // Check-and-set keyed on the unscanned state. Concurrent scans of
        // the same ticket serialize on the row; only one sees it unscanned.
        let updated: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "UPDATE tickets
             SET checked = 'yes', checked_at = NOW()
             WHERE ticket_id = $1 AND checked = 'no'
             RETURNING checked_at",
        )
        .bind(ticket_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err)?;

        let Some((checked_at,)) = updated else {
            // Nothing changed; distinguish unknown from already used.
            let existing: Option<(String, Option<DateTime<Utc>>)> =
                sqlx::query_as("SELECT checked, checked_at FROM tickets WHERE ticket_id = $1")
                    .bind(ticket_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(store_err)?;
            return match existing {
                None => Ok(RedeemOutcome::NotFound),
                Some((_, Some(scanned_at))) => Ok(RedeemOutcome::AlreadyUsed { scanned_at }),
                Some((flag, None)) => Err(CoreError::Store(format!(
                    "ticket {ticket_id} has checked flag '{flag}' but no scan timestamp"
                ))),
            };
        };

        let scan_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO ticket_scans (scan_id, ticket_id, scanned_at, scanner_info)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(scan_id)
        .bind(ticket_id)
        .bind(checked_at)
        .bind(scanner_info)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;

        let details = self
            .ticket_details(ticket_id)
            .await?
            .ok_or_else(|| CoreError::Store(format!("scanned ticket {ticket_id} disappeared")))?;

        Ok(RedeemOutcome::Redeemed {
            ticket: details,
            scan_id,
        })
    }

    async fn ticket_details(&self, ticket_id: Uuid) -> CoreResult<Option<TicketDetails>> {
        let row: Option<TicketDetailsRow> = sqlx::query_as(DETAILS_QUERY)
            .bind(ticket_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(row.map(TicketDetails::from))
    }
}
