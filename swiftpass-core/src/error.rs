use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Trip not found: {0}")]
    TripNotFound(Uuid),

    #[error("Not enough available seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("Ticket not found: {0}")]
    TicketNotFound(Uuid),

    #[error("Payment reference not found: {0}")]
    PaymentNotFound(Uuid),

    /// A settlement for this gateway reference already exists. Absorbed by
    /// the settlement service, which re-reads the existing record set.
    #[error("Settlement already recorded for reference {0}")]
    DuplicateReference(String),

    #[error("Storage failure: {0}")]
    Store(String),

    #[error("Payment gateway failure: {0}")]
    Gateway(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
