use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreResult;

/// Gateway-side request-to-pay status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
    #[serde(other)]
    Unknown,
}

/// A collection request handed to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub msisdn: String,
    pub amount: i64,
    pub method: String,
}

/// Identifiers returned when a request-to-pay is accepted. The result is
/// observed later through status polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentHandle {
    pub reference_id: Uuid,
    pub external_id: Uuid,
    pub currency: String,
}

/// One status poll. `financial_transaction_id` is only present once the
/// gateway has executed the transfer.
#[derive(Debug, Clone)]
pub struct PaymentStatusReport {
    pub status: PaymentStatus,
    pub financial_transaction_id: Option<String>,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submit a request-to-pay. The payer approves it on their phone.
    async fn request_to_pay(&self, request: &PaymentRequest) -> CoreResult<PaymentHandle>;

    /// Poll the status of a previously submitted request.
    async fn payment_status(&self, reference_id: Uuid) -> CoreResult<PaymentStatusReport>;

    /// Whether gateway credentials have been provisioned for this process.
    async fn is_provisioned(&self) -> bool;
}
