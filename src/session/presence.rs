use std::collections::HashSet;

/// Set of users currently connected to the realtime channel.
///
/// Every server push carries the full list, so the set is replaced rather than
/// merged. A missed push leaves a stale view until the next one arrives.
#[derive(Debug, Default, Clone)]
pub struct PresenceSet {
    online: HashSet<String>,
}

impl PresenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.online = ids.into_iter().collect();
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    pub fn len(&self) -> usize {
        self.online.len()
    }

    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }

    /// Sorted copy for display and for handing to the front end.
    pub fn online_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.online.iter().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_replaces_previous_members() {
        let mut presence = PresenceSet::new();
        presence.replace(vec!["a".to_string(), "b".to_string()]);
        assert!(presence.is_online("a"));

        presence.replace(vec!["c".to_string(), "b".to_string(), "b".to_string()]);
        assert!(!presence.is_online("a"));
        assert!(presence.is_online("c"));
        assert_eq!(presence.len(), 2);
        assert_eq!(presence.online_ids(), vec!["b", "c"]);

        presence.replace(Vec::new());
        assert!(presence.is_empty());
    }
}
