//! Policy Types
//!
//! Data structures only; decision logic lives in `engine`.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use flare_schema::TcpFlags;

// ============================================================================
// RULE CONDITIONS
// ============================================================================

/// Flag a rule can condition on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagName {
    RST,
    FIN,
    SYN,
    FRAG,
}

impl FlagName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagName::RST => "RST",
            FlagName::FIN => "FIN",
            FlagName::SYN => "SYN",
            FlagName::FRAG => "FRAG",
        }
    }

    /// Whether this flag is set on an alert.
    pub fn is_set(&self, flags: &TcpFlags) -> bool {
        match self {
            FlagName::RST => flags.rst,
            FlagName::FIN => flags.fin,
            FlagName::SYN => flags.syn,
            FlagName::FRAG => flags.frag,
        }
    }
}

impl std::fmt::Display for FlagName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// POLICY RULES
// ============================================================================

/// Action tag of a configured rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyActionKind {
    #[serde(rename = "RATE_LIMIT_FLAG")]
    RateLimitFlag,
    #[serde(rename = "DROP_FRAGMENT")]
    DropFragment,
    /// Recognized on the wire so a configured STATE_FLUSH rule can be
    /// rejected with a clear message at load time; it never fires from the
    /// rule list (standing policy, see `engine`).
    #[serde(rename = "STATE_FLUSH")]
    StateFlush,
}

impl PolicyActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyActionKind::RateLimitFlag => "RATE_LIMIT_FLAG",
            PolicyActionKind::DropFragment => "DROP_FRAGMENT",
            PolicyActionKind::StateFlush => "STATE_FLUSH",
        }
    }
}

/// One externally configured rule. Loaded once per process lifetime;
/// immutable for the duration of every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRule {
    pub action: PolicyActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<FlagName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<u64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub frag_type: Option<String>,
}

// ============================================================================
// MITIGATION ACTIONS
// ============================================================================

/// Concrete mitigation derived from policy evaluation. A pure value, never
/// re-evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct MitigationAction {
    pub kind: MitigationKind,
    /// Index of the configured rule that fired; `None` for the standing
    /// STATE_FLUSH policy.
    pub source_rule: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MitigationKind {
    RateLimit { flag: FlagName, rate: u64 },
    DropFragment { frag_type: String },
    StateFlush { target: Ipv4Addr },
}

impl MitigationKind {
    pub fn name(&self) -> &'static str {
        match self {
            MitigationKind::RateLimit { .. } => "rate_limit",
            MitigationKind::DropFragment { .. } => "drop_frag",
            MitigationKind::StateFlush { .. } => "flush_state",
        }
    }
}
