//! Post-payment booking saga.
//!
//! For each (seat, passenger) pair, in request order: lock the seat, then
//! confirm the sale. Once every seat is sold the ticket record is cached and
//! notification fan-out is handed off. Any failure before the cache write
//! aborts the booking and nothing is cached. Booking an order that already
//! has a cached ticket returns that ticket without calling the carrier.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use wayfare_core::repository::DEFAULT_TICKET_TTL;
use wayfare_core::{
    BookingError, BookingResult, CarrierGateway, ReservationRequest, ReservationState,
    TicketRecord, TicketStore,
};

use crate::dispatcher::NotificationDispatcher;
use crate::seller::SeatSeller;
use crate::tracker::StateTracker;
use crate::Committed;

#[derive(Debug, Clone, Copy)]
pub struct SagaSettings {
    /// Deadline for each individual carrier call.
    pub call_timeout: Duration,
    pub ticket_ttl: Duration,
}

impl Default for SagaSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            ticket_ttl: DEFAULT_TICKET_TTL,
        }
    }
}

pub struct BookingSaga {
    seller: SeatSeller,
    store: Arc<dyn TicketStore>,
    tracker: StateTracker,
    notifier: Arc<NotificationDispatcher>,
    ticket_ttl: Duration,
}

impl BookingSaga {
    pub fn new(
        gateway: Arc<dyn CarrierGateway>,
        store: Arc<dyn TicketStore>,
        notifier: Arc<NotificationDispatcher>,
        settings: SagaSettings,
    ) -> Self {
        Self {
            seller: SeatSeller::new(gateway, settings.call_timeout),
            tracker: StateTracker::new(store.clone(), settings.ticket_ttl),
            store,
            notifier,
            ticket_ttl: settings.ticket_ttl,
        }
    }

    /// Books every requested seat and returns the cached ticket record.
    /// Notifications are sent in the background.
    pub async fn book(&self, request: ReservationRequest) -> BookingResult<TicketRecord> {
        self.execute(request).await.map(|committed| committed.record)
    }

    /// Like [`book`](Self::book), also handing back the notification task.
    #[tracing::instrument(
        skip(self, request),
        fields(order_id = %request.order_id, seats = request.seats.len())
    )]
    pub async fn execute(&self, request: ReservationRequest) -> BookingResult<Committed> {
        if let Err(e) = request.validate() {
            if !request.order_id.trim().is_empty() {
                self.tracker
                    .record_if_absent(
                        &request.order_id,
                        &ReservationState::Failed { reason: e.to_string() },
                    )
                    .await;
            }
            return Err(e);
        }

        // A redelivered request for a ticketed order gets the same ticket back.
        if let Some(record) = self
            .store
            .get(&request.order_id)
            .await
            .map_err(|e| BookingError::CacheReadFailure(e.to_string()))?
        {
            info!(seats = ?record.seats, "Order already ticketed, returning cached record");
            return Ok(Committed {
                record,
                notifications: None,
            });
        }

        let mut progress = self
            .tracker
            .begin(&request.order_id, ReservationState::Pending)
            .await
            .map_err(|e| {
                BookingError::InvalidRequest(format!(
                    "order {} already has a booking in progress ({})",
                    request.order_id, e
                ))
            })?;

        match self.sell_and_cache(&request, &mut progress).await {
            Ok(record) => {
                info!(
                    total_cents = record.total_cents,
                    locators = ?record.locators(),
                    "Booking committed"
                );
                let notifications = self.notifier.spawn_notify(record.clone());
                Ok(Committed {
                    record,
                    notifications: Some(notifications),
                })
            }
            Err(e) => {
                warn!(error_kind = e.kind(), "Booking aborted: {}", e);
                progress.fail(e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn sell_and_cache(
        &self,
        request: &ReservationRequest,
        progress: &mut crate::tracker::Progress,
    ) -> BookingResult<TicketRecord> {
        let mut sales = Vec::with_capacity(request.seats.len());
        let mut itinerary = None;

        for (seat, passenger) in request.pairs() {
            let lock = self.seller.lock(&request.trip, seat).await?;
            progress.advance(ReservationState::SeatLocked).await;

            if itinerary.is_none() {
                itinerary = Some(lock.itinerary.clone());
            }

            let sale = self.seller.confirm(lock, passenger).await?;
            progress.advance(ReservationState::SaleConfirmed).await;
            sales.push(sale);
        }

        let itinerary = itinerary
            .ok_or_else(|| BookingError::InvalidRequest("no seats requested".to_string()))?;

        let record = TicketRecord::issue(
            request.order_id.clone(),
            request.trip.clone(),
            itinerary,
            request.passengers.clone(),
            sales,
        );

        self.store
            .put(&request.order_id, &record, self.ticket_ttl)
            .await
            .map_err(|e| BookingError::CacheWriteFailure(e.to_string()))?;
        progress.advance(ReservationState::Cached).await;

        Ok(record)
    }
}
