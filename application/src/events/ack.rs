//! Acknowledgment registry
//!
//! Events that request acknowledgment get a unique id (`eid`) and a record
//! with a deadline. A missed deadline is only logged; it never changes what
//! the orchestrator does.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Default acknowledgment deadline
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(10_000);

/// What an acknowledgment record is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckInfo {
    pub event_type: String,
    pub function: Option<String>,
    pub thread_id: Option<String>,
}

#[derive(Debug)]
struct AckRecord {
    info: AckInfo,
    deadline: Instant,
}

/// Unacknowledged record, as reported by [`AckRegistry::pending`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAck {
    pub eid: String,
    pub info: AckInfo,
    pub overdue: bool,
}

/// Side registry `eid → {metadata, deadline}`
#[derive(Debug)]
pub struct AckRegistry {
    records: Mutex<HashMap<String, AckRecord>>,
    timeout: Duration,
}

impl Default for AckRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ACK_TIMEOUT)
    }
}

impl AckRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register a record and return its fresh id.
    pub fn register(&self, info: AckInfo) -> String {
        let eid = Uuid::new_v4().simple().to_string();
        if let Ok(mut records) = self.records.lock() {
            records.insert(
                eid.clone(),
                AckRecord {
                    info,
                    deadline: Instant::now() + self.timeout,
                },
            );
        }
        eid
    }

    /// Mark `eid` acknowledged. Returns whether it was pending.
    pub fn acknowledge(&self, eid: &str) -> bool {
        self.records
            .lock()
            .map(|mut records| records.remove(eid).is_some())
            .unwrap_or(false)
    }

    /// Remove `eid` if it is still pending and past its deadline.
    pub fn expire(&self, eid: &str) -> Option<AckInfo> {
        let mut records = self.records.lock().ok()?;
        let overdue = records
            .get(eid)
            .is_some_and(|record| record.deadline <= Instant::now());
        if overdue {
            records.remove(eid).map(|record| record.info)
        } else {
            None
        }
    }

    /// Remove and return every record past its deadline.
    pub fn prune_expired(&self) -> Vec<(String, AckInfo)> {
        let Ok(mut records) = self.records.lock() else {
            return Vec::new();
        };
        let now = Instant::now();
        let expired: Vec<String> = records
            .iter()
            .filter(|(_, record)| record.deadline <= now)
            .map(|(eid, _)| eid.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|eid| records.remove(&eid).map(|record| (eid, record.info)))
            .collect()
    }

    /// Records not yet acknowledged.
    pub fn pending(&self) -> Vec<PendingAck> {
        let Ok(records) = self.records.lock() else {
            return Vec::new();
        };
        let now = Instant::now();
        records
            .iter()
            .map(|(eid, record)| PendingAck {
                eid: eid.clone(),
                info: record.info.clone(),
                overdue: record.deadline <= now,
            })
            .collect()
    }
}
