//! Alert ingestion handler

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::pipeline::process_alert;
use crate::{AppResult, AppState};

/// POST /alert: ingest one Alert, returning the processing summary.
/// Schema violations map to HTTP 400 with `result: "rejected"`.
pub async fn receive(State(state): State<AppState>, body: String) -> AppResult<Json<Value>> {
    let processed = process_alert(&state, &body).await?;

    Ok(Json(json!({
        "result": "processed",
        "alert_id": processed.alert_id,
        "tier": processed.tier,
        "actions": processed.actions,
        "drop_flow_datapaths": processed.drop_flow_datapaths,
    })))
}
