use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use wayfare_core::{ReservationState, StoreError, StoredTicket, TicketRecord, TicketStore};

#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at.checked_duration_since(now).filter(|d| !d.is_zero())
    }
}

#[derive(Debug, Default)]
struct Inner {
    tickets: HashMap<String, Expiring<TicketRecord>>,
    states: HashMap<String, Expiring<ReservationState>>,
}

/// Process-local ticket store with the same TTL semantics as Redis.
/// Expired entries are invisible to reads and dropped lazily on write.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTicketStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live ticket records.
    pub async fn ticket_count(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.read().await;
        inner
            .tickets
            .values()
            .filter(|e| e.remaining(now).is_some())
            .count()
    }

    fn purge_expired(inner: &mut Inner) {
        let now = Instant::now();
        inner.tickets.retain(|_, e| e.remaining(now).is_some());
        inner.states.retain(|_, e| e.remaining(now).is_some());
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn put(
        &self,
        order_id: &str,
        record: &TicketRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        Self::purge_expired(&mut inner);
        inner
            .tickets
            .insert(order_id.to_string(), Expiring::new(record.clone(), ttl));
        Ok(())
    }

    async fn get(&self, order_id: &str) -> Result<Option<TicketRecord>, StoreError> {
        let now = Instant::now();
        let inner = self.inner.read().await;
        Ok(inner
            .tickets
            .get(order_id)
            .filter(|e| e.remaining(now).is_some())
            .map(|e| e.value.clone()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredTicket>, StoreError> {
        let now = Instant::now();
        let inner = self.inner.read().await;
        Ok(inner
            .tickets
            .iter()
            .filter(|(order_id, _)| order_id.starts_with(prefix))
            .filter_map(|(order_id, entry)| {
                entry.remaining(now).map(|remaining| StoredTicket {
                    order_id: order_id.clone(),
                    record: entry.value.clone(),
                    remaining_ttl: Some(remaining),
                })
            })
            .collect())
    }

    async fn put_state(
        &self,
        order_id: &str,
        state: &ReservationState,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .states
            .insert(order_id.to_string(), Expiring::new(state.clone(), ttl));
        Ok(())
    }

    async fn get_state(&self, order_id: &str) -> Result<Option<ReservationState>, StoreError> {
        let now = Instant::now();
        let inner = self.inner.read().await;
        Ok(inner
            .states
            .get(order_id)
            .filter(|e| e.remaining(now).is_some())
            .map(|e| e.value.clone()))
    }
}
