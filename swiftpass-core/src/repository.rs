use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::{Settlement, SettlementIds, SettlementRequest};
use crate::error::CoreResult;
use crate::ticket::{RedeemOutcome, TicketDetails};

/// Storage seam for settlement. Implementations must make `settle` a single
/// atomic unit: seat reservation and the four inserts commit together or
/// not at all.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Look up a previously settled payment by its gateway reference.
    async fn find_by_reference(&self, reference: &str) -> CoreResult<Option<SettlementIds>>;

    /// Reserve seats and materialize customer, booking, payment and ticket.
    /// Fails with `DuplicateReference` when the reference is already settled.
    async fn settle(&self, request: &SettlementRequest) -> CoreResult<Settlement>;
}

/// Storage seam for the ticket lifecycle. `redeem` must close the
/// check-and-set race: two concurrent scans of the same ticket may not both
/// observe it unscanned.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn redeem(&self, ticket_id: Uuid, scanner_info: &str) -> CoreResult<RedeemOutcome>;

    /// Pure read; no state change.
    async fn ticket_details(&self, ticket_id: Uuid) -> CoreResult<Option<TicketDetails>>;
}
