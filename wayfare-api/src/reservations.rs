use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use wayfare_core::{BookingResult, ReservationRequest, ReservationState, TicketRecord};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReissueRequest {
    pub seat: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(create_reservation))
        .route("/v1/reservations/{order_id}/reissue", post(reissue_reservation))
        .route("/v1/reservations/{order_id}/state", get(get_reservation_state))
}

fn outcome(result: &BookingResult<TicketRecord>) -> &'static str {
    match result {
        Ok(_) => "confirmed",
        Err(e) => e.kind(),
    }
}

/// Post-payment entrypoint: sells every seat and returns the cached ticket.
pub async fn create_reservation(
    State(state): State<AppState>,
    Json(request): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<TicketRecord>), AppError> {
    let result = state.saga.book(request).await;
    state.metrics.observe_booking("book", outcome(&result));

    Ok((StatusCode::CREATED, Json(result?)))
}

pub async fn reissue_reservation(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(body): Json<ReissueRequest>,
) -> Result<Json<TicketRecord>, AppError> {
    let result = state.reissue.reissue(&order_id, &body.seat).await;
    state.metrics.observe_booking("reissue", outcome(&result));

    Ok(Json(result?))
}

pub async fn get_reservation_state(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ReservationState>, AppError> {
    state
        .store
        .get_state(&order_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError(format!("No reservation state for {}", order_id)))
}
