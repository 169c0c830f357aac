//! Action Dispatcher
//!
//! Invokes exactly one named handler per mitigation action and records a
//! human-readable receipt per invocation. A handler failure is reported in
//! its receipt and does not abort the remaining actions of the same alert.
//! The dispatcher performs no deduplication across alerts; idempotence for
//! flow-affecting actions belongs to the flow-table manager.

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;

use flare_schema::Alert;

use crate::flow::{
    ActuationError, FlowAction, FlowMatch, FlowTableManager, DROP_IDLE_TIMEOUT_SECS,
    MITIGATION_DROP_PRIORITY, RATE_LIMIT_PRIORITY,
};
use crate::policy::{FlagName, MitigationAction, MitigationKind};

/// Idle timeout for rate-limit entries (seconds).
const RATE_LIMIT_IDLE_TIMEOUT_SECS: u32 = 300;

/// Record of one handler invocation.
#[derive(Debug)]
pub struct ActionReceipt {
    /// Handler name (`rate_limit`, `drop_frag`, `flush_state`).
    pub handler: String,
    pub outcome: Result<String, ActuationError>,
}

impl ActionReceipt {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    /// One-line summary for logs and ingestion responses.
    pub fn summary(&self) -> String {
        match &self.outcome {
            Ok(detail) => detail.clone(),
            Err(e) => format!("{} failed: {e}", self.handler),
        }
    }
}

/// Named mitigation handlers. Production wires these to the flow-table
/// manager; tests substitute in-memory implementations.
#[async_trait]
pub trait MitigationHandlers: Send + Sync {
    async fn rate_limit(
        &self,
        alert: &Alert,
        flag: FlagName,
        rate: u64,
    ) -> Result<String, ActuationError>;

    async fn drop_frag(&self, alert: &Alert, frag_type: &str) -> Result<String, ActuationError>;

    async fn flush_state(&self, target: Ipv4Addr) -> Result<String, ActuationError>;
}

pub struct ActionDispatcher {
    handlers: Arc<dyn MitigationHandlers>,
}

impl ActionDispatcher {
    pub fn new(handlers: Arc<dyn MitigationHandlers>) -> Self {
        Self { handlers }
    }

    /// Invoke the handler for each action, in order, isolating failures.
    pub async fn dispatch(
        &self,
        alert: &Alert,
        actions: &[MitigationAction],
    ) -> Vec<ActionReceipt> {
        let mut receipts = Vec::with_capacity(actions.len());

        for action in actions {
            let handler = action.kind.name();
            let outcome = match &action.kind {
                MitigationKind::RateLimit { flag, rate } => {
                    self.handlers.rate_limit(alert, *flag, *rate).await
                }
                MitigationKind::DropFragment { frag_type } => {
                    self.handlers.drop_frag(alert, frag_type).await
                }
                MitigationKind::StateFlush { target } => {
                    self.handlers.flush_state(*target).await
                }
            };

            match &outcome {
                Ok(detail) => tracing::info!("alert {}: {detail}", alert.alert_id),
                Err(e) => {
                    tracing::warn!("alert {}: {handler} failed: {e}", alert.alert_id)
                }
            }

            receipts.push(ActionReceipt {
                handler: handler.to_string(),
                outcome,
            });
        }
        receipts
    }
}

// ============================================================================
// PRODUCTION HANDLERS
// ============================================================================

/// Handlers that realize mitigations as flow-table state on every managed
/// datapath.
pub struct FlowMitigationHandlers {
    flows: Arc<FlowTableManager>,
}

impl FlowMitigationHandlers {
    pub fn new(flows: Arc<FlowTableManager>) -> Self {
        Self { flows }
    }

    fn tally(
        results: &[(u64, Result<crate::flow::InstallOutcome, ActuationError>)],
    ) -> Result<(usize, usize), ActuationError> {
        if results.is_empty() {
            return Err(ActuationError::NoActiveDatapath);
        }
        let ok = results.iter().filter(|(_, r)| r.is_ok()).count();
        if ok == 0 {
            // All datapaths failed; surface the first error.
            let (_, Err(first)) = &results[0] else {
                return Err(ActuationError::NoActiveDatapath);
            };
            return Err(first.clone());
        }
        Ok((ok, results.len()))
    }
}

#[async_trait]
impl MitigationHandlers for FlowMitigationHandlers {
    async fn rate_limit(
        &self,
        alert: &Alert,
        flag: FlagName,
        rate: u64,
    ) -> Result<String, ActuationError> {
        let match_key = FlowMatch::new(alert.source_ip, alert.destination_ip);
        let results = self
            .flows
            .install_on_all(
                match_key,
                RATE_LIMIT_PRIORITY,
                vec![FlowAction::RateLimit { rate }],
                RATE_LIMIT_IDLE_TIMEOUT_SECS,
                0,
            )
            .await;

        let (ok, total) = Self::tally(&results)?;
        Ok(format!(
            "rate limit {flag} @ {rate} on {ok}/{total} datapaths ({match_key})"
        ))
    }

    async fn drop_frag(&self, alert: &Alert, frag_type: &str) -> Result<String, ActuationError> {
        let match_key = FlowMatch::new(alert.source_ip, alert.destination_ip);
        let results = self
            .flows
            .install_on_all(
                match_key,
                MITIGATION_DROP_PRIORITY,
                vec![FlowAction::Drop],
                DROP_IDLE_TIMEOUT_SECS,
                0,
            )
            .await;

        let (ok, total) = Self::tally(&results)?;
        Ok(format!(
            "dropped frag: {frag_type} on {ok}/{total} datapaths ({match_key})"
        ))
    }

    async fn flush_state(&self, target: Ipv4Addr) -> Result<String, ActuationError> {
        let results = self.flows.flush_destination(target).await;
        if results.is_empty() {
            return Err(ActuationError::NoActiveDatapath);
        }

        let removed: usize = results
            .iter()
            .filter_map(|(_, r)| r.as_ref().ok())
            .sum();
        if results.iter().all(|(_, r)| r.is_err()) {
            let (_, Err(first)) = &results[0] else {
                return Err(ActuationError::NoActiveDatapath);
            };
            return Err(first.clone());
        }

        Ok(format!(
            "state flushed for destination {target} ({removed} entries)"
        ))
    }
}
