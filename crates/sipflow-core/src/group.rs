//! Selections of calls viewed together, such as a call and its correlated
//! legs in a flow diagram.
//!
//! Grouped calls are locked in the store so rotation cannot evict them while
//! they are on screen; removing a call from the group unlocks it.

use crate::call::Call;
use crate::message::Message;
use crate::store::CallStore;

#[derive(Debug, Clone, Default)]
pub struct CallGroup {
    calls: Vec<u64>,
    /// Call-ID the group was opened for; its new correlated legs join the
    /// group automatically.
    call_id: Option<String>,
}

impl CallGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group holding `index` and every call correlated to it.
    pub fn with_correlated(store: &mut CallStore, index: u64) -> Option<Self> {
        let call = store.find_by_index(index)?;
        let call_id = call.call_id().to_string();
        let legs = call.correlated().to_vec();

        let mut group = Self {
            calls: Vec::new(),
            call_id: Some(call_id),
        };
        group.add(store, index);
        group.add_all(store, &legs);
        Some(group)
    }

    /// Add and lock a call. Unknown indexes and existing members are ignored.
    pub fn add(&mut self, store: &mut CallStore, index: u64) -> bool {
        if self.contains(index) || !store.set_locked(index, true) {
            return false;
        }
        self.calls.push(index);
        true
    }

    pub fn add_all(&mut self, store: &mut CallStore, indexes: &[u64]) {
        for &index in indexes {
            self.add(store, index);
        }
    }

    /// Remove and unlock a call.
    pub fn remove(&mut self, store: &mut CallStore, index: u64) -> bool {
        let Some(pos) = self.calls.iter().position(|&i| i == index) else {
            return false;
        };
        self.calls.remove(pos);
        store.set_locked(index, false);
        true
    }

    /// Unlock every member and empty the group.
    pub fn release(&mut self, store: &mut CallStore) {
        for index in self.calls.drain(..) {
            store.set_locked(index, false);
        }
    }

    pub fn contains(&self, index: u64) -> bool {
        self.calls.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Member indexes in insertion order.
    pub fn indexes(&self) -> &[u64] {
        &self.calls
    }

    /// Members still present in the store.
    pub fn calls<'a>(&self, store: &'a CallStore) -> Vec<&'a Call> {
        self.calls
            .iter()
            .filter_map(|&index| store.find_by_index(index))
            .collect()
    }

    pub fn message_count(&self, store: &CallStore) -> usize {
        self.calls(store).iter().map(|call| call.message_count()).sum()
    }

    /// Messages of every member in capture-time order.
    ///
    /// Messages with equal (or missing) timestamps keep member order, then
    /// arrival order.
    pub fn messages<'a>(&self, store: &'a CallStore) -> Vec<&'a Message> {
        let mut messages: Vec<&Message> = self
            .calls(store)
            .into_iter()
            .flat_map(|call| call.messages().iter())
            .collect();
        messages.sort_by(|a, b| {
            let ts = |m: &Message| m.timestamp().unwrap_or(f64::NEG_INFINITY);
            ts(a).total_cmp(&ts(b))
        });
        messages
    }

    /// Whether any member received messages or media since the last check.
    ///
    /// Every member's flag is consumed. For a group opened on a Call-ID,
    /// legs correlated to that call since the last check are added.
    pub fn has_changed(&mut self, store: &mut CallStore) -> bool {
        let mut changed = false;
        let mut new_legs = Vec::new();
        for call in self.calls(store) {
            if call.take_changed() {
                changed = true;
                if self.call_id.as_deref() == Some(call.call_id()) {
                    new_legs.extend_from_slice(call.correlated());
                }
            }
        }
        self.add_all(store, &new_legs);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::CallGroup;
    use crate::config::StoreConfig;
    use crate::packet::{Packet, Transport};
    use crate::store::CallStore;

    fn ingest(store: &mut CallStore, call_id: &str, extra: &str, ts: f64) {
        let payload = format!(
            "INVITE sip:bob@b SIP/2.0\r\nCall-ID: {call_id}\r\n{extra}CSeq: 1 INVITE\r\nX-Seq: {ts}\r\n\r\n"
        );
        store.ingest(
            &Packet::new(
                "10.0.0.1:5060".parse().unwrap(),
                "10.0.0.2:5060".parse().unwrap(),
                Transport::Udp,
                payload.into_bytes(),
            )
            .with_timestamp(ts),
        );
    }

    #[test]
    fn messages_merge_chronologically() {
        let mut store = CallStore::new(StoreConfig::default()).unwrap();
        ingest(&mut store, "a", "", 1.0);
        ingest(&mut store, "b", "", 2.0);
        ingest(&mut store, "a", "", 3.0);

        let mut group = CallGroup::new();
        group.add(&mut store, 1);
        group.add(&mut store, 2);
        let times: Vec<f64> = group
            .messages(&store)
            .iter()
            .filter_map(|m| m.timestamp())
            .collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
        assert_eq!(group.message_count(&store), 3);
    }

    #[test]
    fn members_are_locked_until_removed() {
        let mut store = CallStore::new(StoreConfig::default()).unwrap();
        ingest(&mut store, "a", "", 1.0);
        let mut group = CallGroup::new();
        assert!(group.add(&mut store, 1));
        assert!(!group.add(&mut store, 1));
        assert!(!group.add(&mut store, 42));
        assert!(store.find_by_index(1).unwrap().is_locked());
        assert!(group.remove(&mut store, 1));
        assert!(!store.find_by_index(1).unwrap().is_locked());
    }

    #[test]
    fn correlated_legs_join_on_change() {
        let mut store = CallStore::new(StoreConfig::default()).unwrap();
        ingest(&mut store, "parent", "", 1.0);
        let mut group = CallGroup::with_correlated(&mut store, 1).unwrap();
        assert!(group.has_changed(&mut store));
        assert!(!group.has_changed(&mut store));

        ingest(&mut store, "leg", "X-Call-ID: parent\r\n", 2.0);
        assert!(!group.contains(2));
        ingest(&mut store, "parent", "", 3.0);
        assert!(group.has_changed(&mut store));
        assert!(group.contains(2));
        assert_eq!(group.len(), 2);

        group.release(&mut store);
        assert!(!store.find_by_index(2).unwrap().is_locked());
    }
}
