//! Unusual-flow query handler.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use flowcast_core::store::SnapshotOrder;
use flowcast_types::flow::FlowEvent;

use crate::http::error::AppError;
use crate::state::AppState;

/// Query parameters for `GET /api/flow/unusual`.
#[derive(Debug, Default, Deserialize)]
pub struct FlowQuery {
    /// `newest` (default) or `oldest`.
    pub order: Option<String>,
    /// Maximum number of events; the whole history when absent.
    pub limit: Option<usize>,
}

/// GET /api/flow/unusual - recent flow from the event store.
pub async fn get_unusual_flow(
    State(state): State<AppState>,
    Query(query): Query<FlowQuery>,
) -> Result<Json<Vec<FlowEvent>>, AppError> {
    let order = match query.order.as_deref() {
        Some(raw) => raw.parse::<SnapshotOrder>().map_err(AppError::Validation)?,
        None => SnapshotOrder::default(),
    };
    let limit = query.limit.unwrap_or_else(|| state.store.capacity());

    let events = state
        .store
        .latest(limit, order)
        .iter()
        .map(|event| event.as_ref().clone())
        .collect();

    Ok(Json(events))
}
