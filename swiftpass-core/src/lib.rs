pub mod booking;
pub mod error;
pub mod payment;
pub mod repository;
pub mod ticket;
pub mod trip;

pub use error::{CoreError, CoreResult};
