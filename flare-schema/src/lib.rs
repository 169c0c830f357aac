//! FLARE Alert Schema
//!
//! Shared data model for the alert lifecycle pipeline. Both the sensor
//! process and the controller process depend on this crate so that schema
//! validation runs identically on both sides of the trust boundary.

pub mod alert;
pub mod risk;
pub mod validate;

pub use alert::{Alert, RecommendedAction, TcpFlags};
pub use risk::RiskTier;
pub use validate::SchemaViolation;
