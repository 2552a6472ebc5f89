use std::sync::Arc;

use swiftpass_booking::{SettlementService, TicketService};
use swiftpass_core::payment::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub settlements: Arc<SettlementService>,
    pub tickets: Arc<TicketService>,
    pub gateway: Arc<dyn PaymentGateway>,
}
