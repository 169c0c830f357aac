//! Policy Configuration
//!
//! Loads and validates the external mitigation policy document (YAML, read
//! once at process start). A malformed or missing document is fatal: the
//! controller must not operate under an undefined policy.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::types::{PolicyActionKind, PolicyRule};

#[derive(Debug, Error)]
pub enum PolicyConfigError {
    #[error("policy file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("policy file {path} is not valid YAML: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("policy rule {index}: {reason}")]
    InvalidRule { index: usize, reason: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyDocument {
    policies: Vec<PolicyRule>,
}

/// Load the ordered rule list, failing on any rule that could never fire as
/// written.
pub fn load_policy(path: impl AsRef<Path>) -> Result<Vec<PolicyRule>, PolicyConfigError> {
    let path_str = path.as_ref().display().to_string();

    let raw = std::fs::read_to_string(&path).map_err(|source| PolicyConfigError::Read {
        path: path_str.clone(),
        source,
    })?;

    let document: PolicyDocument =
        serde_yaml::from_str(&raw).map_err(|source| PolicyConfigError::Parse {
            path: path_str,
            source,
        })?;

    validate_rules(&document.policies)?;
    Ok(document.policies)
}

fn validate_rules(rules: &[PolicyRule]) -> Result<(), PolicyConfigError> {
    for (index, rule) in rules.iter().enumerate() {
        match rule.action {
            PolicyActionKind::RateLimitFlag => {
                if rule.flag.is_none() {
                    return Err(PolicyConfigError::InvalidRule {
                        index,
                        reason: "RATE_LIMIT_FLAG requires a flag".to_string(),
                    });
                }
                if rule.rate.is_none() {
                    return Err(PolicyConfigError::InvalidRule {
                        index,
                        reason: "RATE_LIMIT_FLAG requires a rate".to_string(),
                    });
                }
            }
            PolicyActionKind::DropFragment => {
                if rule.frag_type.is_none() {
                    return Err(PolicyConfigError::InvalidRule {
                        index,
                        reason: "DROP_FRAGMENT requires a fragment type".to_string(),
                    });
                }
            }
            PolicyActionKind::StateFlush => {
                // Standing policy, driven by the alert's recommended action.
                return Err(PolicyConfigError::InvalidRule {
                    index,
                    reason: "STATE_FLUSH is a standing policy and cannot be configured as a rule"
                        .to_string(),
                });
            }
        }
    }
    Ok(())
}
