use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use wayfare_core::{ReservationState, StateError, StoreError, TicketStore};

/// Persists reservation state next to the ticket record.
///
/// Writes are best-effort: a failed write is logged and the operation that
/// triggered it carries on.
#[derive(Clone)]
pub struct StateTracker {
    store: Arc<dyn TicketStore>,
    ttl: Duration,
}

impl StateTracker {
    pub fn new(store: Arc<dyn TicketStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn record(&self, order_id: &str, state: &ReservationState) {
        match self.store.put_state(order_id, state, self.ttl).await {
            Ok(()) => debug!(order_id, state = %state, "Reservation state recorded"),
            Err(e) => warn!(order_id, state = %state, "Failed to record reservation state: {}", e),
        }
    }

    pub async fn current(&self, order_id: &str) -> Result<Option<ReservationState>, StoreError> {
        self.store.get_state(order_id).await
    }

    /// An unreadable state counts as absent.
    async fn current_or_none(&self, order_id: &str) -> Option<ReservationState> {
        self.current(order_id).await.unwrap_or_else(|e| {
            warn!(order_id, "Could not read reservation state: {}", e);
            None
        })
    }

    /// Records `state` only when the order has none yet.
    pub async fn record_if_absent(&self, order_id: &str, state: &ReservationState) {
        match self.current_or_none(order_id).await {
            None => self.record(order_id, state).await,
            Some(existing) => {
                debug!(order_id, existing = %existing, "Keeping existing reservation state")
            }
        }
    }

    /// Moves the order to `next` when its stored state allows it. Returns
    /// whether the write happened.
    pub async fn promote(&self, order_id: &str, next: ReservationState) -> bool {
        match self.current_or_none(order_id).await {
            Some(state) if state.can_transition_to(&next) => {
                self.record(order_id, &next).await;
                true
            }
            state => {
                debug!(order_id, current = ?state, next = %next, "State left unchanged");
                false
            }
        }
    }

    /// Starts a new attempt, recording `initial` right away. Refused while
    /// another attempt on the order is still selling seats; a failed or
    /// expired order may start over.
    pub async fn begin(
        &self,
        order_id: &str,
        initial: ReservationState,
    ) -> Result<Progress, StateError> {
        if let Some(state) = self.current_or_none(order_id).await {
            if state.is_in_flight() {
                return Err(StateError::InvalidTransition {
                    from: state.as_str().to_string(),
                    to: initial.as_str().to_string(),
                });
            }
        }
        self.record(order_id, &initial).await;
        Ok(self.resume(order_id, initial))
    }

    /// Continues from a state that is already persisted.
    pub fn resume(&self, order_id: &str, state: ReservationState) -> Progress {
        Progress {
            tracker: self.clone(),
            order_id: order_id.to_string(),
            state,
        }
    }
}

/// State of one running saga or reissue.
pub struct Progress {
    tracker: StateTracker,
    order_id: String,
    state: ReservationState,
}

impl Progress {
    pub fn state(&self) -> &ReservationState {
        &self.state
    }

    pub async fn advance(&mut self, next: ReservationState) {
        self.state = match self.state.clone().transition(next.clone()) {
            Ok(state) => state,
            Err(e) => {
                warn!(order_id = %self.order_id, "{}", e);
                next
            }
        };
        self.tracker.record(&self.order_id, &self.state).await;
    }

    pub async fn fail(&mut self, reason: String) {
        self.advance(ReservationState::Failed { reason }).await;
    }

    /// Puts back a state captured earlier, bypassing transition rules.
    pub async fn restore(&mut self, state: ReservationState) {
        self.state = state;
        self.tracker.record(&self.order_id, &self.state).await;
    }
}
