pub mod app_config;
pub mod database;
pub mod inventory;
pub mod settlement_repo;
pub mod ticket_repo;

pub use database::DbClient;
pub use settlement_repo::PostgresSettlementStore;
pub use ticket_repo::PostgresTicketStore;

use swiftpass_core::CoreError;

/// Transient connection/transaction failures surface as retryable store
/// errors; callers may re-run the whole unit of work.
pub(crate) fn store_err(err: sqlx::Error) -> CoreError {
    CoreError::Store(err.to_string())
}
