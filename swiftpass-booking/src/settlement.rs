use std::sync::Arc;

use swiftpass_core::booking::{SettlementRequest, SettlementResult};
use swiftpass_core::repository::SettlementStore;
use swiftpass_core::{CoreError, CoreResult};
use tracing::{info, warn};

/// Runs settlements against a store, guaranteeing at most one record set
/// per gateway transaction reference.
///
/// The trigger for settlement is client-driven status polling, so the same
/// confirmed payment can arrive here any number of times. The guard is
/// fetch-existing-first; the store's uniqueness constraint on the reference
/// backs it up when two triggers race past the fetch.
pub struct SettlementService {
    store: Arc<dyn SettlementStore>,
}

impl SettlementService {
    pub fn new(store: Arc<dyn SettlementStore>) -> Self {
        Self { store }
    }

    pub async fn settle(&self, request: SettlementRequest) -> CoreResult<SettlementResult> {
        if let Some(ids) = self.store.find_by_reference(&request.transaction_ref).await? {
            info!(
                reference = %request.transaction_ref,
                booking_id = %ids.booking_id,
                "settlement replayed, returning existing records"
            );
            return Ok(SettlementResult {
                ids,
                reservation: None,
                replayed: true,
            });
        }

        match self.store.settle(&request).await {
            Ok(settlement) => {
                info!(
                    reference = %request.transaction_ref,
                    booking_id = %settlement.ids.booking_id,
                    ticket_id = %settlement.ids.ticket_id,
                    seats = request.number_of_seats,
                    remaining = settlement.reservation.new_available,
                    "settlement committed"
                );
                Ok(SettlementResult {
                    ids: settlement.ids,
                    reservation: Some(settlement.reservation),
                    replayed: false,
                })
            }
            Err(CoreError::DuplicateReference(reference)) => {
                // Lost the race to a concurrent trigger for the same payment.
                warn!(reference = %reference, "settlement raced, re-reading existing records");
                let ids = self
                    .store
                    .find_by_reference(&reference)
                    .await?
                    .ok_or_else(|| {
                        CoreError::Store(format!("settled reference {reference} disappeared"))
                    })?;
                Ok(SettlementResult {
                    ids,
                    reservation: None,
                    replayed: true,
                })
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::Utc;
    use swiftpass_core::trip::Trip;
    use uuid::Uuid;

    fn request(trip_id: Uuid, seats: i32, reference: &str) -> SettlementRequest {
        SettlementRequest {
            trip_id,
            number_of_seats: seats,
            firstname: "Aline".to_string(),
            lastname: "Uwase".to_string(),
            contact: "0781234567".to_string(),
            email: "aline@example.com".to_string(),
            amount: 5000,
            method: "momo".to_string(),
            transaction_ref: reference.to_string(),
        }
    }

    fn seeded_store(seats: i32) -> (Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let trip_id = Uuid::new_v4();
        store.add_trip(Trip {
            id: trip_id,
            departure_at: Utc::now(),
            arrival_estimate: None,
            available_seats: seats,
        });
        (store, trip_id)
    }

    #[tokio::test]
    async fn settle_creates_record_set_and_decrements_inventory() {
        let (store, trip_id) = seeded_store(10);
        let service = SettlementService::new(store.clone());

        let result = service.settle(request(trip_id, 3, "MOMO-1")).await.unwrap();

        assert!(!result.replayed);
        let reservation = result.reservation.unwrap();
        assert_eq!(reservation.previous_available, 10);
        assert_eq!(reservation.new_available, 7);
        assert_eq!(store.available_seats(trip_id), Some(7));

        let ticket = store.ticket(result.ids.ticket_id).unwrap();
        assert_eq!(ticket.state, swiftpass_core::ticket::TicketState::Unscanned);
        assert!(ticket.checked_at.is_none());
    }

    #[tokio::test]
    async fn settle_is_idempotent_per_reference() {
        let (store, trip_id) = seeded_store(10);
        let service = SettlementService::new(store.clone());

        let first = service.settle(request(trip_id, 3, "MOMO-1")).await.unwrap();
        let second = service.settle(request(trip_id, 3, "MOMO-1")).await.unwrap();

        assert!(second.replayed);
        assert_eq!(first.ids.booking_id, second.ids.booking_id);
        assert_eq!(first.ids.payment_id, second.ids.payment_id);
        assert_eq!(first.ids.ticket_id, second.ids.ticket_id);
        assert_eq!(first.ids.customer_id, second.ids.customer_id);
        // Inventory moved exactly once.
        assert_eq!(store.available_seats(trip_id), Some(7));
    }

    #[tokio::test]
    async fn settle_rejects_when_inventory_is_exhausted() {
        let (store, trip_id) = seeded_store(2);
        let service = SettlementService::new(store.clone());

        let err = service
            .settle(request(trip_id, 3, "MOMO-1"))
            .await
            .unwrap_err();
        match err {
            CoreError::InsufficientSeats {
                requested,
                available,
            } => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        // A failed reservation writes nothing.
        assert_eq!(store.available_seats(trip_id), Some(2));
        assert_eq!(store.record_counts(), (0, 0, 0, 0));
    }

    #[tokio::test]
    async fn settle_rejects_unknown_trip() {
        let (store, _trip_id) = seeded_store(2);
        let service = SettlementService::new(store);

        let err = service
            .settle(request(Uuid::new_v4(), 1, "MOMO-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::TripNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_settlements_never_oversell_the_last_seat() {
        let (store, trip_id) = seeded_store(1);
        let service = Arc::new(SettlementService::new(store.clone()));
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let mut handles = Vec::new();
        for n in 0..2 {
            let service = service.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                service
                    .settle(request(trip_id, 1, &format!("MOMO-{n}")))
                    .await
            }));
        }

        let mut successes = 0;
        let mut exhausted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(result) => {
                    assert_eq!(result.reservation.unwrap().new_available, 0);
                    successes += 1;
                }
                Err(CoreError::InsufficientSeats { .. }) => exhausted += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(exhausted, 1);
        assert_eq!(store.available_seats(trip_id), Some(0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_reservations_exhaust_but_never_go_negative() {
        // 20 seats, 8 requests of 3 = 24 requested. At most 6 can succeed.
        let (store, trip_id) = seeded_store(20);
        let service = Arc::new(SettlementService::new(store.clone()));
        let barrier = Arc::new(tokio::sync::Barrier::new(8));

        let mut handles = Vec::new();
        for n in 0..8 {
            let service = service.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                service
                    .settle(request(trip_id, 3, &format!("MOMO-{n}")))
                    .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(CoreError::InsufficientSeats { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        let remaining = store.available_seats(trip_id).unwrap();
        assert_eq!(remaining, 20 - successes * 3);
        assert!(remaining >= 0);
        assert!(remaining < 3, "requests kept failing while seats remained");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_triggers_for_the_same_payment_settle_once() {
        let (store, trip_id) = seeded_store(10);
        let service = Arc::new(SettlementService::new(store.clone()));
        let barrier = Arc::new(tokio::sync::Barrier::new(4));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let service = service.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                service.settle(request(trip_id, 2, "MOMO-SAME")).await
            }));
        }

        let mut bookings = std::collections::HashSet::new();
        let mut fresh = 0;
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            bookings.insert(result.ids.booking_id);
            if !result.replayed {
                fresh += 1;
            }
        }
        assert_eq!(bookings.len(), 1);
        assert_eq!(fresh, 1);
        assert_eq!(store.available_seats(trip_id), Some(8));
        assert_eq!(store.record_counts(), (1, 1, 1, 1));
    }
}
