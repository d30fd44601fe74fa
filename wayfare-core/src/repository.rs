use async_trait::async_trait;
use std::time::Duration;

use crate::reservation::TicketRecord;
use crate::state::ReservationState;

pub const TICKET_KEY_PREFIX: &str = "ticket:";
pub const STATE_KEY_PREFIX: &str = "reservation:";

/// Default lifetime of a cached ticket record (30 days).
pub const DEFAULT_TICKET_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

pub fn ticket_key(order_id: &str) -> String {
    format!("{}{}", TICKET_KEY_PREFIX, order_id)
}

pub fn state_key(order_id: &str) -> String {
    format!("{}{}", STATE_KEY_PREFIX, order_id)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),
    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A listed ticket with the time it has left before expiry.
/// `remaining_ttl` is `None` when the backend reports no expiry on the key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTicket {
    pub order_id: String,
    pub record: TicketRecord,
    pub remaining_ttl: Option<Duration>,
}

impl StoredTicket {
    pub fn approximate_age(&self, max_ttl: Duration) -> Option<Duration> {
        self.remaining_ttl.map(|remaining| approximate_age(max_ttl, remaining))
    }
}

/// No creation timestamp is kept next to the key, so age is derived as
/// `max_ttl - remaining`. Only correct while `max_ttl` equals the TTL the
/// records were written with.
pub fn approximate_age(max_ttl: Duration, remaining: Duration) -> Duration {
    max_ttl.saturating_sub(remaining)
}

/// Newest first. Entries without a TTL sort last.
pub fn sort_by_recency(entries: &mut [StoredTicket], max_ttl: Duration) {
    entries.sort_by_key(|entry| entry.approximate_age(max_ttl).unwrap_or(Duration::MAX));
}

/// Keyed cache of finalized tickets and in-flight reservation state.
///
/// All writes replace the whole value; there is no read-modify-write.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn put(
        &self,
        order_id: &str,
        record: &TicketRecord,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn get(&self, order_id: &str) -> Result<Option<TicketRecord>, StoreError>;

    /// Every live ticket whose order id starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredTicket>, StoreError>;

    async fn put_state(
        &self,
        order_id: &str,
        state: &ReservationState,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn get_state(&self, order_id: &str) -> Result<Option<ReservationState>, StoreError>;
}
