use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wayfare_core::repository::sort_by_recency;

use crate::error::AppError;
use crate::middleware::admin_auth_middleware;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    #[serde(default)]
    pub prefix: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketSummary {
    pub order_id: String,
    pub seats: Vec<String>,
    pub total_cents: i64,
    pub display_date: String,
    pub issued_at: DateTime<Utc>,
    pub reissued: bool,
    pub remaining_ttl_seconds: Option<u64>,
    /// Derived from the remaining TTL, so only as accurate as the configured max TTL.
    pub approximate_age_seconds: Option<u64>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/tickets", get(list_tickets))
        .route_layer(axum::middleware::from_fn_with_state(state, admin_auth_middleware))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<Vec<TicketSummary>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let mut entries = state.store.list(&query.prefix).await?;
    sort_by_recency(&mut entries, state.max_ttl);

    let summaries = entries
        .into_iter()
        .take(limit)
        .map(|entry| TicketSummary {
            approximate_age_seconds: entry.approximate_age(state.max_ttl).map(|d| d.as_secs()),
            remaining_ttl_seconds: entry.remaining_ttl.map(|d| d.as_secs()),
            order_id: entry.order_id,
            seats: entry.record.seats,
            total_cents: entry.record.total_cents,
            display_date: entry.record.display_date,
            issued_at: entry.record.issued_at,
            reissued: entry.record.reissued,
        })
        .collect();

    Ok(Json(summaries))
}
