use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use swiftpass_core::booking::{Settlement, SettlementIds, SettlementRequest};
use swiftpass_core::repository::SettlementStore;
use swiftpass_core::ticket::TicketState;
use swiftpass_core::{CoreError, CoreResult};
use uuid::Uuid;

use crate::inventory::InventoryLedger;
use crate::store_err;

pub struct PostgresSettlementStore {
    pool: PgPool,
}

impl PostgresSettlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Unique-violation on payments.transaction_ref means another trigger
/// settled this payment first.
fn map_payment_insert_err(err: sqlx::Error, reference: &str) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            return CoreError::DuplicateReference(reference.to_string());
        }
    }
    store_err(err)
}

#[async_trait]
impl SettlementStore for PostgresSettlementStore {
    async fn find_by_reference(&self, reference: &str) -> CoreResult<Option<SettlementIds>> {
        let row: Option<(Uuid, Uuid, Uuid, Uuid)> = sqlx::query_as(
            "SELECT b.customer_id, b.booking_id, p.payment_id, t.ticket_id
             FROM payments p
             JOIN bookings b ON p.booking_id = b.booking_id
             JOIN tickets t ON t.booking_id = b.booking_id
             WHERE p.transaction_ref = $1",
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(|(customer_id, booking_id, payment_id, ticket_id)| SettlementIds {
            customer_id,
            booking_id,
            payment_id,
            ticket_id,
        }))
    }

    async fn settle(&self, request: &SettlementRequest) -> CoreResult<Settlement> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // 1. Reserve seats. Exhausted inventory aborts before any insert;
        //    dropping the transaction rolls everything back.
        let reservation =
            InventoryLedger::reserve(&mut tx, request.trip_id, request.number_of_seats).await?;

        let now = Utc::now();
        let customer_id = Uuid::new_v4();
        let booking_id = Uuid::new_v4();
        let payment_id = Uuid::new_v4();
        let ticket_id = Uuid::new_v4();

        // 2. Customer from the booking request's contact fields.
        sqlx::query(
            "INSERT INTO customers (customer_id, firstname, lastname, contact, email, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(customer_id)
        .bind(&request.firstname)
        .bind(&request.lastname)
        .bind(&request.contact)
        .bind(&request.email)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        // 3. Booking referencing customer and trip.
        sqlx::query(
            "INSERT INTO bookings (booking_id, customer_id, trip_id, number_of_seats, booking_date)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(booking_id)
        .bind(customer_id)
        .bind(request.trip_id)
        .bind(request.number_of_seats)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        // 4. Payment, status fixed to completed. transaction_ref is UNIQUE.
        sqlx::query(
            "INSERT INTO payments (payment_id, booking_id, amount, payment_method,
                                   transaction_ref, payment_status, time_paid, created_at)
             VALUES ($1, $2, $3, $4, $5, 'completed', $6, $6)",
        )
        .bind(payment_id)
        .bind(booking_id)
        .bind(request.amount)
        .bind(&request.method)
        .bind(&request.transaction_ref)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_payment_insert_err(e, &request.transaction_ref))?;

        // 5. Ticket, unscanned.
        sqlx::query(
            "INSERT INTO tickets (ticket_id, booking_id, checked, checked_at, created_at)
             VALUES ($1, $2, $3, NULL, $4)",
        )
        .bind(ticket_id)
        .bind(booking_id)
        .bind(TicketState::Unscanned.as_flag())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;

        Ok(Settlement {
            ids: SettlementIds {
                customer_id,
                booking_id,
                payment_id,
                ticket_id,
            },
            reservation,
        })
    }
}
