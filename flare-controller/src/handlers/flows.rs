//! Flow bookkeeping handlers

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::flow::FlowEntry;
use crate::{AppResult, AppState};

/// GET /flows: active mitigation entries across all datapaths.
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<FlowEntry>>> {
    Ok(Json(state.flows.active_entries().await))
}

/// GET /datapaths: connection state per managed datapath.
pub async fn datapaths(State(state): State<AppState>) -> AppResult<Json<Vec<Value>>> {
    let states = state
        .flows
        .datapath_states()
        .await
        .into_iter()
        .map(|(id, dp_state)| {
            json!({
                "datapath_id": id,
                "state": dp_state,
            })
        })
        .collect();
    Ok(Json(states))
}
