use std::sync::Arc;

use swiftpass_core::repository::TicketStore;
use swiftpass_core::ticket::{RedeemOutcome, TicketDetails, TicketState};
use swiftpass_core::CoreResult;
use tracing::info;
use uuid::Uuid;

/// Checkpoint-facing ticket operations: one-way redemption plus read-only
/// status and verification.
pub struct TicketService {
    store: Arc<dyn TicketStore>,
}

impl TicketService {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Redeem a ticket at a checkpoint. Redemption is not retried: a ticket
    /// that was already scanned reports its original scan time and nothing
    /// is written.
    pub async fn redeem(&self, ticket_id: Uuid, scanner_info: &str) -> CoreResult<RedeemOutcome> {
        let outcome = self.store.redeem(ticket_id, scanner_info).await?;
        match &outcome {
            RedeemOutcome::Redeemed { scan_id, .. } => {
                info!(%ticket_id, %scan_id, scanner = scanner_info, "ticket scanned");
            }
            RedeemOutcome::AlreadyUsed { scanned_at } => {
                info!(%ticket_id, %scanned_at, "scan rejected, ticket already used");
            }
            RedeemOutcome::NotFound => {
                info!(%ticket_id, "scan rejected, unknown ticket");
            }
        }
        Ok(outcome)
    }

    pub async fn status(&self, ticket_id: Uuid) -> CoreResult<Option<TicketDetails>> {
        self.store.ticket_details(ticket_id).await
    }

    /// Read-only validity check for QR scanning: `used` vs `active`.
    pub async fn verify(&self, ticket_id: Uuid) -> CoreResult<Option<(TicketDetails, &'static str)>> {
        let details = self.store.ticket_details(ticket_id).await?;
        Ok(details.map(|d| {
            let label = match d.state {
                TicketState::Scanned => "used",
                TicketState::Unscanned => "active",
            };
            (d, label)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::settlement::SettlementService;
    use chrono::Utc;
    use swiftpass_core::booking::SettlementRequest;
    use swiftpass_core::trip::Trip;

    async fn settled_ticket(store: &Arc<MemoryStore>) -> Uuid {
        let trip_id = Uuid::new_v4();
        store.add_trip(Trip {
            id: trip_id,
            departure_at: Utc::now(),
            arrival_estimate: None,
            available_seats: 10,
        });
        let service = SettlementService::new(store.clone());
        let result = service
            .settle(SettlementRequest {
                trip_id,
                number_of_seats: 3,
                firstname: "Eric".to_string(),
                lastname: "Mugisha".to_string(),
                contact: "0791112233".to_string(),
                email: "eric@example.com".to_string(),
                amount: 5000,
                method: "momo".to_string(),
                transaction_ref: "MOMO-T".to_string(),
            })
            .await
            .unwrap();
        result.ids.ticket_id
    }

    #[tokio::test]
    async fn redeem_is_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let ticket_id = settled_ticket(&store).await;
        let service = TicketService::new(store.clone());

        let first = service.redeem(ticket_id, "gate-1").await.unwrap();
        let scanned_at = match first {
            RedeemOutcome::Redeemed { ticket, .. } => {
                assert_eq!(ticket.state, TicketState::Scanned);
                ticket.checked_at.unwrap()
            }
            other => panic!("expected Redeemed, got {other:?}"),
        };
        assert_eq!(store.scan_count(ticket_id), 1);

        let second = service.redeem(ticket_id, "gate-1").await.unwrap();
        match second {
            RedeemOutcome::AlreadyUsed { scanned_at: again } => {
                assert_eq!(again, scanned_at);
            }
            other => panic!("expected AlreadyUsed, got {other:?}"),
        }
        // No second audit row, timestamp untouched.
        assert_eq!(store.scan_count(ticket_id), 1);
        assert_eq!(store.ticket(ticket_id).unwrap().checked_at, Some(scanned_at));
    }

    #[tokio::test]
    async fn redeem_unknown_ticket_reports_not_found() {
        let store = Arc::new(MemoryStore::new());
        let service = TicketService::new(store);

        let outcome = service.redeem(Uuid::new_v4(), "gate-1").await.unwrap();
        assert!(matches!(outcome, RedeemOutcome::NotFound));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_scans_redeem_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let ticket_id = settled_ticket(&store).await;
        let service = Arc::new(TicketService::new(store.clone()));
        let barrier = Arc::new(tokio::sync::Barrier::new(4));

        let mut handles = Vec::new();
        for n in 0..4 {
            let service = service.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                service.redeem(ticket_id, &format!("gate-{n}")).await
            }));
        }

        let mut redeemed = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                RedeemOutcome::Redeemed { .. } => redeemed += 1,
                RedeemOutcome::AlreadyUsed { .. } => rejected += 1,
                RedeemOutcome::NotFound => panic!("ticket exists"),
            }
        }
        assert_eq!(redeemed, 1);
        assert_eq!(rejected, 3);
        assert_eq!(store.scan_count(ticket_id), 1);
    }

    #[tokio::test]
    async fn status_and_verify_read_without_mutating() {
        let store = Arc::new(MemoryStore::new());
        let ticket_id = settled_ticket(&store).await;
        let service = TicketService::new(store.clone());

        let details = service.status(ticket_id).await.unwrap().unwrap();
        assert_eq!(details.state, TicketState::Unscanned);
        assert_eq!(details.firstname, "Eric");
        assert_eq!(details.number_of_seats, 3);

        let (_, label) = service.verify(ticket_id).await.unwrap().unwrap();
        assert_eq!(label, "active");

        service.redeem(ticket_id, "gate-1").await.unwrap();
        let (_, label) = service.verify(ticket_id).await.unwrap().unwrap();
        assert_eq!(label, "used");

        assert!(service.status(Uuid::new_v4()).await.unwrap().is_none());
    }
}
