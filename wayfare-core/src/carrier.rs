use async_trait::async_trait;

use crate::reservation::{PassengerInput, SaleConfirmation, SeatLock, TripRef};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CarrierError {
    #[error("Seat unavailable: {0}")]
    SeatUnavailable(String),
    #[error("Confirmation rejected: {0}")]
    ConfirmationRejected(String),
    #[error("Carrier call timed out: {0}")]
    Timeout(String),
    #[error("Unexpected carrier response: {0}")]
    Protocol(String),
}

/// Typed access to the carrier's reservation backend.
///
/// Implementations attempt each call exactly once. A retried lock may hold a
/// second seat, so retry policy belongs to the caller.
#[async_trait]
pub trait CarrierGateway: Send + Sync {
    /// Hold one seat on the trip.
    async fn lock_seat(&self, trip: &TripRef, seat: &str) -> Result<SeatLock, CarrierError>;

    /// Turn a hold into a sale for the given passenger. The lock is consumed:
    /// its transaction id and operation number are single-use.
    async fn confirm_sale(
        &self,
        lock: SeatLock,
        passenger: &PassengerInput,
    ) -> Result<SaleConfirmation, CarrierError>;
}
