use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use wayfare_core::{
    BookingError, BookingResult, CarrierGateway, ReservationState, TicketRecord, TicketStore,
};

use crate::dispatcher::NotificationDispatcher;
use crate::saga::SagaSettings;
use crate::seller::SeatSeller;
use crate::tracker::{Progress, StateTracker};
use crate::Committed;

/// Moves a confirmed single-seat reservation to another seat on the same trip.
///
/// The cached record is only replaced after the new sale is confirmed. On
/// failure the old record stays and the order's previous state is restored.
pub struct ReissueCoordinator {
    seller: SeatSeller,
    store: Arc<dyn TicketStore>,
    tracker: StateTracker,
    notifier: Arc<NotificationDispatcher>,
    ticket_ttl: Duration,
}

impl ReissueCoordinator {
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

    pub async fn reissue(&self, order_id: &str, new_seat: &str) -> BookingResult<TicketRecord> {
        self.execute(order_id, new_seat)
            .await
            .map(|committed| committed.record)
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, order_id: &str, new_seat: &str) -> BookingResult<Committed> {
        if new_seat.trim().is_empty() {
            return Err(BookingError::InvalidRequest("seat is blank".to_string()));
        }

        let current = self
            .store
            .get(order_id)
            .await
            .map_err(|e| BookingError::CacheReadFailure(e.to_string()))?
            .ok_or_else(|| BookingError::ReservationNotFound(order_id.to_string()))?;

        if current.seats.len() != 1 {
            return Err(BookingError::UnsupportedReissue(format!(
                "order {} holds {} seats; only single-seat orders can be reissued",
                order_id,
                current.seats.len()
            )));
        }
        if current.seat() == Some(new_seat) {
            return Err(BookingError::InvalidRequest(format!(
                "seat {} is already assigned to order {}",
                new_seat, order_id
            )));
        }

        let previous_state = match self.tracker.current(order_id).await {
            Ok(Some(state)) => state,
            Ok(None) => ReservationState::Cached,
            Err(e) => {
                warn!("Could not read reservation state, assuming CACHED: {}", e);
                ReservationState::Cached
            }
        };
        let mut progress = self.tracker.resume(order_id, previous_state.clone());

        match self.resell(&current, new_seat, &mut progress).await {
            Ok(record) => {
                info!(
                    previous_seat = ?record.previous_seat,
                    total_cents = record.total_cents,
                    "Reissue committed"
                );
                let notifications = self.notifier.spawn_notify(record.clone());
                Ok(Committed {
                    record,
                    notifications: Some(notifications),
                })
            }
            Err(e) => {
                warn!(error_kind = e.kind(), "Reissue aborted, keeping current ticket: {}", e);
                progress.restore(previous_state).await;
                Err(e)
            }
        }
    }

    async fn resell(
        &self,
        current: &TicketRecord,
        new_seat: &str,
        progress: &mut Progress,
    ) -> BookingResult<TicketRecord> {
        let passenger = current.lead_passenger().ok_or_else(|| {
            BookingError::UnsupportedReissue(format!("order {} has no passenger", current.order_id))
        })?;

        let lock = self.seller.lock(&current.trip, new_seat).await?;
        progress.advance(ReservationState::SeatLocked).await;
        let itinerary = lock.itinerary.clone();

        let sale = self.seller.confirm(lock, passenger).await?;
        progress.advance(ReservationState::SaleConfirmed).await;

        let next = current.reissue(itinerary, sale);
        self.store
            .put(&current.order_id, &next, self.ticket_ttl)
            .await
            .map_err(|e| BookingError::CacheWriteFailure(e.to_string()))?;
        progress.advance(ReservationState::Cached).await;

        Ok(next)
    }
}
