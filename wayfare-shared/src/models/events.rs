use uuid::Uuid;

/// Published on `reservation.confirmed` once a ticket record is cached.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct ReservationConfirmedEvent {
    pub event_id: Uuid,
    pub order_id: String,
    pub locators: Vec<String>,
    pub seats: Vec<String>,
    pub total_cents: i64,
    pub reissued: bool,
    pub timestamp: i64,
}

/// Published on `reservation.failed` so the payment side can compensate.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct ReservationFailedEvent {
    pub event_id: Uuid,
    pub order_id: String,
    pub error_kind: String,
    pub reason: String,
    pub timestamp: i64,
}

impl ReservationConfirmedEvent {
    pub fn new(
        order_id: String,
        locators: Vec<String>,
        seats: Vec<String>,
        total_cents: i64,
        reissued: bool,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            order_id,
            locators,
            seats,
            total_cents,
            reissued,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ReservationFailedEvent {
    pub fn new(order_id: String, error_kind: &str, reason: String) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            order_id,
            error_kind: error_kind.to_string(),
            reason,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
