use serde::{Deserialize, Serialize};

/// Reservation lifecycle tracked per order id.
///
/// ```text
/// Pending ─► SeatLocked ─► SaleConfirmed ─┬─► Cached ─► Notified
///               ▲                         │      │          │
///               └──── next seat ──────────┘      └─ reissue ┴─► SeatLocked
/// ```
/// `Failed` is reachable from every non-terminal state and is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationState {
    #[default]
    Pending,
    SeatLocked,
    SaleConfirmed,
    Cached,
    Notified,
    Failed { reason: String },
}

impl ReservationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationState::Failed { .. })
    }

    /// A booking or reissue is part-way through its carrier calls.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            ReservationState::Pending | ReservationState::SeatLocked | ReservationState::SaleConfirmed
        )
    }

    /// True once a ticket record exists in the store for this order.
    pub fn has_ticket(&self) -> bool {
        matches!(self, ReservationState::Cached | ReservationState::Notified)
    }

    pub fn can_transition_to(&self, next: &ReservationState) -> bool {
        use ReservationState::*;

        match (self, next) {
            (Failed { .. }, _) => false,
            (_, Failed { .. }) => true,
            (Pending, SeatLocked) => true,
            (SeatLocked, SaleConfirmed) => true,
            // Multi-seat bookings lock the next seat after each confirmation.
            (SaleConfirmed, SeatLocked) => true,
            (SaleConfirmed, Cached) => true,
            (Cached, Notified) => true,
            // Reissue starts over from an existing ticket.
            (Cached, SeatLocked) | (Notified, SeatLocked) => true,
            _ => false,
        }
    }

    pub fn transition(self, next: ReservationState) -> Result<ReservationState, StateError> {
        if self.can_transition_to(&next) {
            Ok(next)
        } else {
            Err(StateError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Pending => "PENDING",
            ReservationState::SeatLocked => "SEAT_LOCKED",
            ReservationState::SaleConfirmed => "SALE_CONFIRMED",
            ReservationState::Cached => "CACHED",
            ReservationState::Notified => "NOTIFIED",
            ReservationState::Failed { .. } => "FAILED",
        }
    }
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservationState::Failed { reason } => write!(f, "FAILED({})", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}
