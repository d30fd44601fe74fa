use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};
use wayfare_core::repository::{state_key, ticket_key, TICKET_KEY_PREFIX};
use wayfare_core::{ReservationState, StoreError, StoredTicket, TicketRecord, TicketStore};

const SCAN_BATCH: usize = 200;

fn backend(e: redis::RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Escapes glob metacharacters so an order-id prefix is matched literally.
fn escape_pattern(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Redis reply for TTL: -2 missing key, -1 no expiry.
/// `SET EX` rejects 0, so sub-second TTLs round up to one second.
fn expiry_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn remaining_from_reply(ttl: i64) -> Option<Duration> {
    if ttl >= 0 {
        Some(Duration::from_secs(ttl as u64))
    } else {
        None
    }
}

#[derive(Clone)]
pub struct RedisTicketStore {
    client: redis::Client,
}

impl RedisTicketStore {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(backend)?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys)
    }
}

#[async_trait]
impl TicketStore for RedisTicketStore {
    async fn put(
        &self,
        order_id: &str,
        record: &TicketRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.connection().await?;
        let seconds = expiry_seconds(ttl);
        conn.set_ex::<_, _, ()>(ticket_key(order_id), payload, seconds)
            .await
            .map_err(backend)?;
        info!(order_id, ttl_seconds = seconds, "Ticket record cached");
        Ok(())
    }

    async fn get(&self, order_id: &str) -> Result<Option<TicketRecord>, StoreError> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(ticket_key(order_id)).await.map_err(backend)?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredTicket>, StoreError> {
        let pattern = format!("{}{}*", TICKET_KEY_PREFIX, escape_pattern(prefix));
        let keys = self.scan_keys(&pattern).await?;
        let mut conn = self.connection().await?;
        let mut tickets = Vec::with_capacity(keys.len());

        for key in keys {
            let (payload, ttl): (Option<String>, i64) = redis::pipe()
                .get(&key)
                .ttl(&key)
                .query_async(&mut conn)
                .await
                .map_err(backend)?;

            // Expired between SCAN and GET.
            let Some(json) = payload else {
                debug!(key, "Ticket key vanished during listing");
                continue;
            };

            let order_id = key
                .strip_prefix(TICKET_KEY_PREFIX)
                .unwrap_or(key.as_str())
                .to_string();
            tickets.push(StoredTicket {
                order_id,
                record: serde_json::from_str(&json)?,
                remaining_ttl: remaining_from_reply(ttl),
            });
        }

        Ok(tickets)
    }

    async fn put_state(
        &self,
        order_id: &str,
        state: &ReservationState,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(state)?;
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(state_key(order_id), payload, expiry_seconds(ttl))
            .await
            .map_err(backend)
    }

    async fn get_state(&self, order_id: &str) -> Result<Option<ReservationState>, StoreError> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(state_key(order_id)).await.map_err(backend)?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_pattern() {
        assert_eq!(escape_pattern("2025-"), "2025-");
        assert_eq!(escape_pattern("a*b?[c]"), "a\\*b\\?\\[c\\]");
    }

    #[test]
    fn test_expiry_is_at_least_one_second() {
        assert_eq!(expiry_seconds(Duration::ZERO), 1);
        assert_eq!(expiry_seconds(Duration::from_millis(400)), 1);
        assert_eq!(expiry_seconds(Duration::from_secs(90)), 90);
    }

    #[test]
    fn test_remaining_from_reply() {
        assert_eq!(remaining_from_reply(120), Some(Duration::from_secs(120)));
        assert_eq!(remaining_from_reply(0), Some(Duration::ZERO));
        assert_eq!(remaining_from_reply(-1), None);
        assert_eq!(remaining_from_reply(-2), None);
    }
}
