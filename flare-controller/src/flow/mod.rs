//! Flow-Table Management
//!
//! Realizes mitigation decisions as idempotent flow-table state across the
//! managed datapaths. All per-datapath bookkeeping lives here; no other
//! component mutates flow state directly.

pub mod manager;
pub mod types;

pub use manager::{FlowTableManager, InstallOutcome};
pub use types::{
    ActuationError, DatapathId, DatapathState, FlowAction, FlowEntry, FlowMatch, FlowProgrammer,
    DROP_IDLE_TIMEOUT_SECS, MITIGATION_DROP_PRIORITY, RATE_LIMIT_PRIORITY, TABLE_MISS_PRIORITY,
};
