use std::collections::HashMap;

use crate::common::UnreadCount;

/// Per-peer count of messages received while that peer was not active.
#[derive(Debug, Default, Clone)]
pub struct UnreadCounters {
    counts: HashMap<String, u32>,
}

impl UnreadCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace local counters with the server report.
    pub fn load(&mut self, report: Vec<UnreadCount>) {
        self.counts = report
            .into_iter()
            .filter(|entry| entry.count > 0)
            .map(|entry| (entry.sender, entry.count))
            .collect();
    }

    pub fn increment(&mut self, peer_id: &str) -> u32 {
        let count = self.counts.entry(peer_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn clear(&mut self, peer_id: &str) {
        self.counts.remove(peer_id);
    }

    pub fn get(&self, peer_id: &str) -> u32 {
        self.counts.get(peer_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn snapshot(&self) -> HashMap<String, u32> {
        self.counts.clone()
    }
}
