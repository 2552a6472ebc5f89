pub mod client;

pub use client::{MomoClient, MomoConfig};
