//! FLARE Controller
//!
//! The controller process of the alert lifecycle pipeline. Alerts arrive over
//! the tier TLS listeners or the HTTP ingestion endpoint, are re-validated at
//! the trust boundary, evaluated against the mitigation policy, dispatched to
//! the named action handlers, and realized as idempotent flow-table entries
//! on every active datapath.

use std::sync::Arc;

pub mod config;
pub mod dispatch;
pub mod error;
pub mod flow;
pub mod handlers;
pub mod listener;
pub mod pipeline;
pub mod policy;
pub mod pusher;

pub use error::{AppError, AppResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<Vec<policy::PolicyRule>>,
    pub dispatcher: Arc<dispatch::ActionDispatcher>,
    pub flows: Arc<flow::FlowTableManager>,
}
