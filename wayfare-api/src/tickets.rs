use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use wayfare_booking::DispatchReport;
use wayfare_core::TicketRecord;

use crate::error::AppError;
use crate::state::AppState;

// Reprint and resend read the cache only; the carrier is never called.

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/tickets/{order_id}", get(get_ticket))
        .route("/v1/tickets/{order_id}/artifact", get(get_artifact))
        .route("/v1/tickets/{order_id}/resend", post(resend_ticket))
}

async fn cached(state: &AppState, order_id: &str) -> Result<TicketRecord, AppError> {
    state
        .store
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("No ticket for order {}", order_id)))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<TicketRecord>, AppError> {
    Ok(Json(cached(&state, &order_id).await?))
}

pub async fn get_artifact(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = cached(&state, &order_id).await?;
    let artifact = state
        .renderer
        .render(&record)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    ))
}

/// Runs the notification fan-out again and waits for it to finish.
pub async fn resend_ticket(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<DispatchReport>, AppError> {
    let record = cached(&state, &order_id).await?;
    tracing::info!(order_id = %order_id, "Resending ticket notifications");
    Ok(Json(state.dispatcher.notify(&record).await))
}
