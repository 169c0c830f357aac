//! Flow Types
//!
//! Flow-table data structures and the external control-plane seam.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Forwarding element identifier.
pub type DatapathId = u64;

/// Lowest priority, installed once per datapath connection; forwards
/// unmatched traffic to the control path.
pub const TABLE_MISS_PRIORITY: u16 = 0;

/// Priority for drop-style mitigation entries. Strictly above table-miss.
pub const MITIGATION_DROP_PRIORITY: u16 = 50_000;

/// Priority for rate-limit mitigation entries.
pub const RATE_LIMIT_PRIORITY: u16 = 40_000;

/// Idle timeout for mitigation drop entries (seconds).
pub const DROP_IDLE_TIMEOUT_SECS: u32 = 600;

// ============================================================================
// MATCH & ACTIONS
// ============================================================================

/// Endpoint-pair match key. At most one active entry exists per
/// `(datapath, match key)` at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowMatch {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl FlowMatch {
    /// Wildcard match (table-miss).
    pub const ANY: FlowMatch = FlowMatch {
        src: Ipv4Addr::UNSPECIFIED,
        dst: Ipv4Addr::UNSPECIFIED,
    };

    pub fn new(src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self { src, dst }
    }
}

impl std::fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.src, self.dst)
    }
}

/// Instruction applied to matching packets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    /// No output: matching traffic is discarded.
    Drop,
    /// Police matching traffic to the given rate (packets/s).
    RateLimit { rate: u64 },
    /// Punt to the control path.
    ToController,
}

// ============================================================================
// FLOW ENTRY
// ============================================================================

/// Bookkeeping record for one installed mitigation entry. Owned exclusively
/// by the flow-table manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowEntry {
    pub datapath_id: DatapathId,
    pub match_key: FlowMatch,
    pub priority: u16,
    pub actions: Vec<FlowAction>,
    pub idle_timeout: u32,
    pub hard_timeout: u32,
    pub installed_at: DateTime<Utc>,
}

/// Connection state of one managed datapath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DatapathState {
    Connecting,
    Active,
    Disconnected,
}

// ============================================================================
// ERRORS & SEAM
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum ActuationError {
    #[error("datapath {0} is not active")]
    DatapathUnavailable(DatapathId),

    #[error("no active datapath to install on")]
    NoActiveDatapath,

    #[error("mitigation entries must outrank the table-miss rule (priority {0})")]
    PriorityTooLow(u16),

    #[error("flow programming on datapath {datapath}: {reason}")]
    ProgramFailed { datapath: DatapathId, reason: String },

    #[error("handler failed: {0}")]
    HandlerFailed(String),
}

/// External flow-programming primitive of the control plane.
#[async_trait]
pub trait FlowProgrammer: Send + Sync {
    async fn install_flow(
        &self,
        datapath_id: DatapathId,
        match_key: FlowMatch,
        priority: u16,
        actions: &[FlowAction],
        idle_timeout: u32,
        hard_timeout: u32,
    ) -> Result<(), ActuationError>;

    async fn remove_flow(
        &self,
        datapath_id: DatapathId,
        match_key: FlowMatch,
    ) -> Result<(), ActuationError>;
}
