use sqlx::Postgres;
use swiftpass_core::trip::SeatReservation;
use swiftpass_core::{CoreError, CoreResult};
use uuid::Uuid;

use crate::store_err;

/// Authoritative seat counter. Lives entirely inside the caller's
/// transaction so a later failure rolls the decrement back with everything
/// else.
pub struct InventoryLedger;

impl InventoryLedger {
    /// Atomically decrement a trip's available seats.
    ///
    /// The decrement and the availability check are one conditional UPDATE,
    /// so two concurrent reservations for the same trip serialize on the
    /// row and can never both consume the last seat. Zero affected rows is
    /// disambiguated with a follow-up read in the same transaction.
    pub async fn reserve(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        trip_id: Uuid,
        seats: i32,
    ) -> CoreResult<SeatReservation> {
        if seats <= 0 {
            return Err(CoreError::Store(format!(
                "reservation count must be positive, got {seats}"
            )));
        }

        let updated: Option<(i32,)> = sqlx::query_as(
            "UPDATE trips
             SET available_seats = available_seats - $2
             WHERE trip_id = $1 AND available_seats >= $2
             RETURNING available_seats",
        )
        .bind(trip_id)
        .bind(seats)
        .fetch_optional(&mut **tx)
        .await
        .map_err(store_err)?;

        if let Some((remaining,)) = updated {
            return Ok(SeatReservation {
                previous_available: remaining + seats,
                new_available: remaining,
            });
        }

        let current: Option<(i32,)> =
            sqlx::query_as("SELECT available_seats FROM trips WHERE trip_id = $1")
                .bind(trip_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(store_err)?;

        match current {
            Some((available,)) => Err(CoreError::InsufficientSeats {
                requested: seats,
                available,
            }),
            None => Err(CoreError::TripNotFound(trip_id)),
        }
    }
}
