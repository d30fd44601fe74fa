use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use wayfare_core::{
    BookingError, BookingResult, CarrierError, CarrierGateway, PassengerInput, SaleConfirmation,
    SeatLock, TripRef,
};

/// Carrier calls with a deadline, translated into [`BookingError`].
#[derive(Clone)]
pub struct SeatSeller {
    gateway: Arc<dyn CarrierGateway>,
    call_timeout: Duration,
}

impl SeatSeller {
    pub fn new(gateway: Arc<dyn CarrierGateway>, call_timeout: Duration) -> Self {
        Self {
            gateway,
            call_timeout,
        }
    }

    pub async fn lock(&self, trip: &TripRef, seat: &str) -> BookingResult<SeatLock> {
        let lock = self
            .bounded("lock_seat", seat, self.gateway.lock_seat(trip, seat))
            .await?;
        debug!(seat, transaction_id = %lock.transaction_id, "Seat held");
        Ok(lock)
    }

    pub async fn confirm(
        &self,
        lock: SeatLock,
        passenger: &PassengerInput,
    ) -> BookingResult<SaleConfirmation> {
        let seat = lock.seat.clone();
        let sale = self
            .bounded("confirm_sale", &seat, self.gateway.confirm_sale(lock, passenger))
            .await?;
        debug!(seat = %seat, locator = %sale.locator, "Sale confirmed");
        Ok(sale)
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        seat: &str,
        call: impl Future<Output = Result<T, CarrierError>>,
    ) -> BookingResult<T> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(BookingError::from_carrier(e, operation, seat)),
            Err(_) => Err(BookingError::CarrierTimeout {
                operation,
                seat: seat.to_string(),
            }),
        }
    }
}
