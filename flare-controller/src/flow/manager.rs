//! Flow Table Manager
//!
//! Owns per-datapath flow bookkeeping. Installation is idempotent per
//! `(datapath, match key)`: a re-install refreshes the existing entry instead
//! of duplicating it. Each datapath runs a {Connecting, Active, Disconnected}
//! state machine; the table-miss rule is installed exactly once on entry to
//! Active.
//!
//! Locking: the datapath registry is a short-held `parking_lot::RwLock`; each
//! datapath's bookkeeping sits behind its own async mutex, which is the only
//! lock held across programmer calls. Installs on different datapaths proceed
//! concurrently; installs on the same datapath (and a fortiori the same key)
//! are mutually exclusive.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::types::{
    ActuationError, DatapathId, DatapathState, FlowAction, FlowEntry, FlowMatch, FlowProgrammer,
    TABLE_MISS_PRIORITY,
};

struct Datapath {
    state: DatapathState,
    table_miss_installed: bool,
    entries: HashMap<FlowMatch, FlowEntry>,
}

impl Datapath {
    fn new() -> Self {
        Self {
            state: DatapathState::Connecting,
            table_miss_installed: false,
            entries: HashMap::new(),
        }
    }
}

/// Result of one idempotent install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// New entry installed.
    Installed,
    /// Existing entry for the key refreshed in place.
    Refreshed,
}

pub struct FlowTableManager {
    programmer: Arc<dyn FlowProgrammer>,
    datapaths: RwLock<HashMap<DatapathId, Arc<Mutex<Datapath>>>>,
}

impl FlowTableManager {
    pub fn new(programmer: Arc<dyn FlowProgrammer>) -> Self {
        Self {
            programmer,
            datapaths: RwLock::new(HashMap::new()),
        }
    }

    fn datapath(&self, id: DatapathId) -> Option<Arc<Mutex<Datapath>>> {
        self.datapaths.read().get(&id).cloned()
    }

    /// A datapath connection came up. Transitions to Active and installs the
    /// table-miss rule exactly once per connection.
    pub async fn datapath_connected(&self, id: DatapathId) -> Result<(), ActuationError> {
        let dp = {
            let mut registry = self.datapaths.write();
            registry
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(Datapath::new())))
                .clone()
        };

        let mut dp = dp.lock().await;

        // Only become Active once the table-miss rule is in place; a failed
        // install leaves the datapath in its previous non-active state.
        if !dp.table_miss_installed {
            self.programmer
                .install_flow(
                    id,
                    FlowMatch::ANY,
                    TABLE_MISS_PRIORITY,
                    &[FlowAction::ToController],
                    0,
                    0,
                )
                .await?;
            dp.table_miss_installed = true;
            tracing::info!("datapath {id} active, table-miss rule installed");
        } else {
            tracing::info!("datapath {id} active");
        }
        dp.state = DatapathState::Active;
        Ok(())
    }

    /// A datapath connection dropped. Its table is gone along with every
    /// entry in it, so the bookkeeping is forgotten and the table-miss rule
    /// will be reinstalled on reconnect.
    pub async fn datapath_disconnected(&self, id: DatapathId) {
        if let Some(dp) = self.datapath(id) {
            let mut dp = dp.lock().await;
            dp.state = DatapathState::Disconnected;
            dp.table_miss_installed = false;
            dp.entries.clear();
            tracing::warn!("datapath {id} disconnected, bookkeeping cleared");
        }
    }

    /// The datapath reported that it expired/removed an entry; forget it.
    pub async fn flow_removed(&self, id: DatapathId, match_key: FlowMatch) {
        if let Some(dp) = self.datapath(id) {
            let mut dp = dp.lock().await;
            if dp.entries.remove(&match_key).is_some() {
                tracing::debug!("datapath {id}: entry {match_key} expired");
            }
        }
    }

    /// Install (or idempotently refresh) one mitigation entry on one
    /// datapath.
    pub async fn install(
        &self,
        id: DatapathId,
        match_key: FlowMatch,
        priority: u16,
        actions: Vec<FlowAction>,
        idle_timeout: u32,
        hard_timeout: u32,
    ) -> Result<InstallOutcome, ActuationError> {
        // Mitigation entries must never shadow or replace the table-miss rule.
        if priority <= TABLE_MISS_PRIORITY {
            return Err(ActuationError::PriorityTooLow(priority));
        }

        let dp = self
            .datapath(id)
            .ok_or(ActuationError::DatapathUnavailable(id))?;
        let mut dp = dp.lock().await;
        if dp.state != DatapathState::Active {
            return Err(ActuationError::DatapathUnavailable(id));
        }

        // Programming the same match again refreshes timeouts on the switch;
        // the bookkeeping mirrors that, keeping one entry per key.
        self.programmer
            .install_flow(id, match_key, priority, &actions, idle_timeout, hard_timeout)
            .await?;

        let outcome = match dp.entries.get_mut(&match_key) {
            Some(entry) => {
                entry.priority = priority;
                entry.actions = actions;
                entry.idle_timeout = idle_timeout;
                entry.hard_timeout = hard_timeout;
                entry.installed_at = Utc::now();
                InstallOutcome::Refreshed
            }
            None => {
                dp.entries.insert(
                    match_key,
                    FlowEntry {
                        datapath_id: id,
                        match_key,
                        priority,
                        actions,
                        idle_timeout,
                        hard_timeout,
                        installed_at: Utc::now(),
                    },
                );
                InstallOutcome::Installed
            }
        };
        Ok(outcome)
    }

    /// Install the same entry on every known datapath. A failure on one
    /// datapath is reported in its slot and does not stop the others.
    pub async fn install_on_all(
        &self,
        match_key: FlowMatch,
        priority: u16,
        actions: Vec<FlowAction>,
        idle_timeout: u32,
        hard_timeout: u32,
    ) -> Vec<(DatapathId, Result<InstallOutcome, ActuationError>)> {
        let ids: Vec<DatapathId> = self.datapaths.read().keys().copied().collect();

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self
                .install(
                    id,
                    match_key,
                    priority,
                    actions.clone(),
                    idle_timeout,
                    hard_timeout,
                )
                .await;
            if let Err(e) = &result {
                tracing::warn!("install {match_key} on datapath {id} failed: {e}");
            }
            results.push((id, result));
        }
        results
    }

    /// Remove every entry whose match destination equals `target`, across all
    /// datapaths. Returns per-datapath removal counts.
    pub async fn flush_destination(
        &self,
        target: Ipv4Addr,
    ) -> Vec<(DatapathId, Result<usize, ActuationError>)> {
        let dps: Vec<(DatapathId, Arc<Mutex<Datapath>>)> = self
            .datapaths
            .read()
            .iter()
            .map(|(id, dp)| (*id, dp.clone()))
            .collect();

        let mut results = Vec::with_capacity(dps.len());
        for (id, dp) in dps {
            let mut dp = dp.lock().await;
            if dp.state != DatapathState::Active {
                results.push((id, Err(ActuationError::DatapathUnavailable(id))));
                continue;
            }

            let keys: Vec<FlowMatch> = dp
                .entries
                .keys()
                .filter(|key| key.dst == target)
                .copied()
                .collect();

            let mut removed = 0;
            let mut failure = None;
            for key in keys {
                match self.programmer.remove_flow(id, key).await {
                    Ok(()) => {
                        dp.entries.remove(&key);
                        removed += 1;
                    }
                    Err(e) => {
                        tracing::warn!("remove {key} on datapath {id} failed: {e}");
                        failure = Some(e);
                    }
                }
            }

            match failure {
                Some(e) if removed == 0 => results.push((id, Err(e))),
                _ => results.push((id, Ok(removed))),
            }
        }
        results
    }

    /// Snapshot of all active bookkeeping entries.
    pub async fn active_entries(&self) -> Vec<FlowEntry> {
        let dps: Vec<Arc<Mutex<Datapath>>> =
            self.datapaths.read().values().cloned().collect();

        let mut entries = Vec::new();
        for dp in dps {
            let dp = dp.lock().await;
            entries.extend(dp.entries.values().cloned());
        }
        entries.sort_by_key(|e| (e.datapath_id, e.installed_at));
        entries
    }

    /// Current state of every known datapath.
    pub async fn datapath_states(&self) -> Vec<(DatapathId, DatapathState)> {
        let dps: Vec<(DatapathId, Arc<Mutex<Datapath>>)> = self
            .datapaths
            .read()
            .iter()
            .map(|(id, dp)| (*id, dp.clone()))
            .collect();

        let mut states = Vec::with_capacity(dps.len());
        for (id, dp) in dps {
            states.push((id, dp.lock().await.state));
        }
        states.sort_by_key(|(id, _)| *id);
        states
    }
}
