//! REST Flow Pusher
//!
//! [`FlowProgrammer`] implementation for controllers exposing a
//! Floodlight-style static flow pusher REST endpoint. Entries are named
//! deterministically from their key so that re-pushing the same entry
//! replaces rather than duplicates it on the controller side.

use async_trait::async_trait;
use serde_json::json;

use crate::flow::{ActuationError, DatapathId, FlowAction, FlowMatch, FlowProgrammer};

pub struct RestFlowPusher {
    endpoint: String,
    client: reqwest::Client,
}

impl RestFlowPusher {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ActuationError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ActuationError::HandlerFailed(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    /// Deterministic entry name per (datapath, match key).
    fn entry_name(datapath_id: DatapathId, match_key: &FlowMatch) -> String {
        format!("flare-{datapath_id:016x}-{}-{}", match_key.src, match_key.dst)
    }

    /// Static-flow-pusher action string for the entry's action list.
    fn action_field(actions: &[FlowAction]) -> String {
        actions
            .iter()
            .map(|a| match a {
                // An empty action set drops matching traffic.
                FlowAction::Drop => String::new(),
                FlowAction::RateLimit { rate } => format!("set_queue={rate}"),
                FlowAction::ToController => "output=controller".to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[async_trait]
impl FlowProgrammer for RestFlowPusher {
    async fn install_flow(
        &self,
        datapath_id: DatapathId,
        match_key: FlowMatch,
        priority: u16,
        actions: &[FlowAction],
        idle_timeout: u32,
        hard_timeout: u32,
    ) -> Result<(), ActuationError> {
        let payload = json!({
            "name": Self::entry_name(datapath_id, &match_key),
            "switch": format!("{datapath_id:016x}"),
            "priority": priority,
            "eth_type": "0x0800",
            "ipv4_src": match_key.src.to_string(),
            "ipv4_dst": match_key.dst.to_string(),
            "idle_timeout": idle_timeout,
            "hard_timeout": hard_timeout,
            "active": true,
            "actions": Self::action_field(actions),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ActuationError::ProgramFailed {
                datapath: datapath_id,
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ActuationError::ProgramFailed {
                datapath: datapath_id,
                reason: format!("flow pusher returned HTTP {}", response.status()),
            });
        }
        tracing::debug!("pushed flow {match_key} to datapath {datapath_id:x}");
        Ok(())
    }

    async fn remove_flow(
        &self,
        datapath_id: DatapathId,
        match_key: FlowMatch,
    ) -> Result<(), ActuationError> {
        let payload = json!({
            "name": Self::entry_name(datapath_id, &match_key),
        });

        let response = self
            .client
            .delete(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ActuationError::ProgramFailed {
                datapath: datapath_id,
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ActuationError::ProgramFailed {
                datapath: datapath_id,
                reason: format!("flow pusher returned HTTP {}", response.status()),
            });
        }
        Ok(())
    }
}
