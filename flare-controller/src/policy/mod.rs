//! Mitigation Policy
//!
//! Evaluates validated alerts against the externally configured, ordered rule
//! list and emits a deterministic mitigation action list. Pure decision
//! logic; actuation belongs to the dispatcher and the flow-table manager.

pub mod config;
pub mod engine;
pub mod types;

pub use config::{load_policy, PolicyConfigError};
pub use engine::evaluate;
pub use types::{FlagName, MitigationAction, MitigationKind, PolicyActionKind, PolicyRule};
