// Replicated state store: single-writer containers whose mutations produce an
// ordered op stream for observers and fire change listeners on both sides.

use std::collections::HashMap;
use std::hash::Hash;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A mutation was attempted through a non-authority bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorityViolation;

/// Operation kind carried by every replicated mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Update,
    Add,
    Remove,
    Clear,
}

/// One replicated mutation. Ops are delivered to observers in issue order;
/// map ordering matters for join-in-progress correctness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationOp {
    pub channel: String,
    pub kind: OpKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: Value,
}

/// Per-session op stream. The authority flag lives here so every replicated
/// container enforces the single-writer invariant through the same gate.
#[derive(Debug)]
pub struct ReplicationBus {
    authority: bool,
    outbound: Vec<ReplicationOp>,
}

impl ReplicationBus {
    pub fn authority() -> Self {
        Self {
            authority: true,
            outbound: Vec::new(),
        }
    }

    pub fn observer() -> Self {
        Self {
            authority: false,
            outbound: Vec::new(),
        }
    }

    pub fn is_authority(&self) -> bool {
        self.authority
    }

    fn push(&mut self, op: ReplicationOp) {
        self.outbound.push(op);
    }

    /// Takes every op issued since the last drain, preserving issue order.
    pub fn drain(&mut self) -> Vec<ReplicationOp> {
        std::mem::take(&mut self.outbound)
    }

    pub fn pending(&self) -> usize {
        self.outbound.len()
    }
}

/// Handle returned by `subscribe`; pass it back to `unsubscribe` to detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

type ValueListener<T> = Box<dyn FnMut(&T, &T, bool) + Send>;

/// Authority-owned scalar. Every `set` stores the value, appends one op to
/// the bus, and synchronously fires listeners with (old, new, from_authority).
/// Writes are unconditional: an equal-value write still replicates and fires.
pub struct ReplicatedValue<T> {
    channel: &'static str,
    value: T,
    listeners: Vec<(u64, ValueListener<T>)>,
    next_subscription: u64,
}

impl<T: Clone + Serialize + DeserializeOwned> ReplicatedValue<T> {
    pub fn new(channel: &'static str, initial: T) -> Self {
        Self {
            channel,
            value: initial,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn channel(&self) -> &'static str {
        self.channel
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Authority-side write. Rejected without side effects on an observer bus.
    pub fn set(&mut self, next: T, bus: &mut ReplicationBus) -> Result<(), AuthorityViolation> {
        if !bus.is_authority() {
            return Err(AuthorityViolation);
        }
        let previous = std::mem::replace(&mut self.value, next);
        bus.push(ReplicationOp {
            channel: self.channel.to_string(),
            kind: OpKind::Update,
            key: None,
            value: serde_json::to_value(&self.value).unwrap_or(Value::Null),
        });
        for (_, listener) in self.listeners.iter_mut() {
            listener(&previous, &self.value, true);
        }
        Ok(())
    }

    /// Observer-side application of a replicated op. Fires the same listener
    /// contract with the authority-origin flag cleared.
    pub fn apply(&mut self, op: &ReplicationOp) {
        if op.channel != self.channel {
            return;
        }
        let Ok(next) = serde_json::from_value::<T>(op.value.clone()) else {
            return;
        };
        let previous = std::mem::replace(&mut self.value, next);
        for (_, listener) in self.listeners.iter_mut() {
            listener(&previous, &self.value, false);
        }
    }

    /// Op that reconstructs the current value on a freshly joined observer.
    pub fn sync_op(&self) -> ReplicationOp {
        ReplicationOp {
            channel: self.channel.to_string(),
            kind: OpKind::Update,
            key: None,
            value: serde_json::to_value(&self.value).unwrap_or(Value::Null),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&T, &T, bool) + Send + 'static) -> Subscription {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        Subscription(id)
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) {
        self.listeners.retain(|(id, _)| *id != subscription.0);
    }
}

/// Change notification passed to map listeners.
#[derive(Debug)]
pub enum MapChange<'a, K, V> {
    Added { key: &'a K, value: &'a V },
    Updated { key: &'a K, value: &'a V },
    Removed { key: &'a K },
    Cleared,
}

type MapListener<K, V> = Box<dyn FnMut(MapChange<'_, K, V>, bool) + Send>;

/// Authority-owned associative collection with per-operation replication.
/// Keys travel on the wire as strings, so they must round-trip through
/// `ToString`/`FromStr`.
pub struct ReplicatedMap<K, V> {
    channel: &'static str,
    entries: HashMap<K, V>,
    listeners: Vec<(u64, MapListener<K, V>)>,
    next_subscription: u64,
}

impl<K, V> ReplicatedMap<K, V>
where
    K: Clone + Eq + Hash + ToString + FromStr,
    V: Clone + Serialize + DeserializeOwned,
{
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            entries: HashMap::new(),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn channel(&self) -> &'static str {
        self.channel
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    /// Inserts or overwrites, replicating Add or Update accordingly.
    pub fn insert(
        &mut self,
        key: K,
        value: V,
        bus: &mut ReplicationBus,
    ) -> Result<(), AuthorityViolation> {
        if !bus.is_authority() {
            return Err(AuthorityViolation);
        }
        let kind = if self.entries.contains_key(&key) {
            OpKind::Update
        } else {
            OpKind::Add
        };
        bus.push(ReplicationOp {
            channel: self.channel.to_string(),
            kind,
            key: Some(key.to_string()),
            value: serde_json::to_value(&value).unwrap_or(Value::Null),
        });
        self.entries.insert(key.clone(), value);
        let stored = &self.entries[&key];
        for (_, listener) in self.listeners.iter_mut() {
            let change = match kind {
                OpKind::Add => MapChange::Added {
                    key: &key,
                    value: stored,
                },
                _ => MapChange::Updated {
                    key: &key,
                    value: stored,
                },
            };
            listener(change, true);
        }
        Ok(())
    }

    /// Removes a key if present, returning the removed value. Removing an
    /// absent key replicates nothing.
    pub fn remove(
        &mut self,
        key: &K,
        bus: &mut ReplicationBus,
    ) -> Result<Option<V>, AuthorityViolation> {
        if !bus.is_authority() {
            return Err(AuthorityViolation);
        }
        let Some(removed) = self.entries.remove(key) else {
            return Ok(None);
        };
        bus.push(ReplicationOp {
            channel: self.channel.to_string(),
            kind: OpKind::Remove,
            key: Some(key.to_string()),
            value: Value::Null,
        });
        for (_, listener) in self.listeners.iter_mut() {
            listener(MapChange::Removed { key }, true);
        }
        Ok(Some(removed))
    }

    pub fn clear(&mut self, bus: &mut ReplicationBus) -> Result<(), AuthorityViolation> {
        if !bus.is_authority() {
            return Err(AuthorityViolation);
        }
        self.entries.clear();
        bus.push(ReplicationOp {
            channel: self.channel.to_string(),
            kind: OpKind::Clear,
            key: None,
            value: Value::Null,
        });
        for (_, listener) in self.listeners.iter_mut() {
            listener(MapChange::Cleared, true);
        }
        Ok(())
    }

    /// Observer-side application of a single replicated map op.
    pub fn apply(&mut self, op: &ReplicationOp) {
        if op.channel != self.channel {
            return;
        }
        match op.kind {
            OpKind::Clear => {
                self.entries.clear();
                for (_, listener) in self.listeners.iter_mut() {
                    listener(MapChange::Cleared, false);
                }
            }
            OpKind::Remove => {
                let Some(key) = op.key.as_ref().and_then(|k| k.parse::<K>().ok()) else {
                    return;
                };
                if self.entries.remove(&key).is_some() {
                    for (_, listener) in self.listeners.iter_mut() {
                        listener(MapChange::Removed { key: &key }, false);
                    }
                }
            }
            OpKind::Add | OpKind::Update => {
                let Some(key) = op.key.as_ref().and_then(|k| k.parse::<K>().ok()) else {
                    return;
                };
                let Ok(value) = serde_json::from_value::<V>(op.value.clone()) else {
                    return;
                };
                let existed = self.entries.contains_key(&key);
                self.entries.insert(key.clone(), value);
                let stored = &self.entries[&key];
                for (_, listener) in self.listeners.iter_mut() {
                    let change = if existed {
                        MapChange::Updated {
                            key: &key,
                            value: stored,
                        }
                    } else {
                        MapChange::Added {
                            key: &key,
                            value: stored,
                        }
                    };
                    listener(change, false);
                }
            }
        }
    }

    /// Ops that rebuild this map on a freshly joined observer: a Clear
    /// followed by one Add per entry.
    pub fn sync_ops(&self) -> Vec<ReplicationOp> {
        let mut ops = Vec::with_capacity(self.entries.len() + 1);
        ops.push(ReplicationOp {
            channel: self.channel.to_string(),
            kind: OpKind::Clear,
            key: None,
            value: Value::Null,
        });
        for (key, value) in &self.entries {
            ops.push(ReplicationOp {
                channel: self.channel.to_string(),
                kind: OpKind::Add,
                key: Some(key.to_string()),
                value: serde_json::to_value(value).unwrap_or(Value::Null),
            });
        }
        ops
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(MapChange<'_, K, V>, bool) + Send + 'static,
    ) -> Subscription {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        Subscription(id)
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) {
        self.listeners.retain(|(id, _)| *id != subscription.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn every_write_produces_exactly_one_op_in_write_order() {
        let mut bus = ReplicationBus::authority();
        let mut value = ReplicatedValue::new("test.counter", 0i32);

        for i in 1..=5 {
            value.set(i, &mut bus).expect("authority write");
        }

        let ops = bus.drain();
        assert_eq!(ops.len(), 5);
        for (i, op) in ops.iter().enumerate() {
            assert_eq!(op.channel, "test.counter");
            assert_eq!(op.kind, OpKind::Update);
            assert_eq!(op.value, serde_json::json!(i as i32 + 1));
        }
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn equal_value_write_is_not_suppressed() {
        let mut bus = ReplicationBus::authority();
        let mut value = ReplicatedValue::new("test.flag", true);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_listener = fired.clone();
        value.subscribe(move |_, _, _| {
            fired_in_listener.fetch_add(1, Ordering::SeqCst);
        });

        value.set(true, &mut bus).expect("authority write");
        value.set(true, &mut bus).expect("authority write");

        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(bus.drain().len(), 2);
    }

    #[test]
    fn non_authority_write_is_rejected_without_side_effects() {
        let mut bus = ReplicationBus::observer();
        let mut value = ReplicatedValue::new("test.counter", 7i32);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_listener = fired.clone();
        value.subscribe(move |_, _, _| {
            fired_in_listener.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(value.set(8, &mut bus), Err(AuthorityViolation));
        assert_eq!(*value.get(), 7);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn non_authority_map_mutations_are_rejected_without_side_effects() {
        let mut authority_bus = ReplicationBus::authority();
        let mut bus = ReplicationBus::observer();
        let mut map: ReplicatedMap<u64, String> = ReplicatedMap::new("test.names");
        map.insert(1, "seed".to_string(), &mut authority_bus)
            .expect("seed insert");
        authority_bus.drain();

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_listener = fired.clone();
        map.subscribe(move |_, _| {
            fired_in_listener.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(
            map.insert(2, "intruder".to_string(), &mut bus),
            Err(AuthorityViolation)
        );
        assert_eq!(map.remove(&1, &mut bus), Err(AuthorityViolation));
        assert_eq!(map.clear(&mut bus), Err(AuthorityViolation));

        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1).map(String::as_str), Some("seed"));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn observer_applies_ops_identically_and_flags_remote_origin() {
        let mut bus = ReplicationBus::authority();
        let mut authority = ReplicatedValue::new("test.score", 0i32);
        let mut replica = ReplicatedValue::new("test.score", 0i32);

        let seen: Arc<Mutex<Vec<(i32, i32, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_in_listener = seen.clone();
        replica.subscribe(move |old, new, from_authority| {
            seen_in_listener
                .lock()
                .expect("listener lock")
                .push((*old, *new, from_authority));
        });

        authority.set(10, &mut bus).expect("authority write");
        authority.set(25, &mut bus).expect("authority write");
        for op in bus.drain() {
            replica.apply(&op);
        }

        assert_eq!(*replica.get(), 25);
        let seen = seen.lock().expect("test lock");
        assert_eq!(seen.as_slice(), &[(0, 10, false), (10, 25, false)]);
    }

    #[test]
    fn unsubscribe_detaches_listener() {
        let mut bus = ReplicationBus::authority();
        let mut value = ReplicatedValue::new("test.counter", 0i32);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_listener = fired.clone();
        let subscription = value.subscribe(move |_, _, _| {
            fired_in_listener.fetch_add(1, Ordering::SeqCst);
        });

        value.set(1, &mut bus).expect("authority write");
        value.unsubscribe(subscription);
        value.set(2, &mut bus).expect("authority write");

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn map_ops_carry_kind_key_and_value() {
        let mut bus = ReplicationBus::authority();
        let mut map: ReplicatedMap<u64, String> = ReplicatedMap::new("test.names");

        map.insert(3, "alpha".to_string(), &mut bus).expect("insert");
        map.insert(3, "bravo".to_string(), &mut bus).expect("update");
        map.remove(&3, &mut bus).expect("remove");
        map.remove(&99, &mut bus).expect("absent remove is silent");
        map.clear(&mut bus).expect("clear");

        let ops = bus.drain();
        let kinds: Vec<OpKind> = ops.iter().map(|op| op.kind).collect();
        assert_eq!(kinds, vec![OpKind::Add, OpKind::Update, OpKind::Remove, OpKind::Clear]);
        assert_eq!(ops[0].key.as_deref(), Some("3"));
        assert_eq!(ops[1].value, serde_json::json!("bravo"));
    }

    #[test]
    fn map_replica_mirrors_authority_through_op_stream() {
        let mut bus = ReplicationBus::authority();
        let mut authority: ReplicatedMap<u64, i32> = ReplicatedMap::new("test.scores");
        let mut replica: ReplicatedMap<u64, i32> = ReplicatedMap::new("test.scores");

        authority.insert(1, 10, &mut bus).expect("insert");
        authority.insert(2, 20, &mut bus).expect("insert");
        authority.insert(1, 30, &mut bus).expect("update");
        authority.remove(&2, &mut bus).expect("remove");

        for op in bus.drain() {
            replica.apply(&op);
        }

        assert_eq!(replica.len(), 1);
        assert_eq!(replica.get(&1), Some(&30));
        assert!(!replica.contains_key(&2));
    }

    #[test]
    fn sync_ops_rebuild_a_fresh_replica() {
        let mut bus = ReplicationBus::authority();
        let mut authority: ReplicatedMap<u64, i32> = ReplicatedMap::new("test.scores");
        authority.insert(1, 10, &mut bus).expect("insert");
        authority.insert(2, 20, &mut bus).expect("insert");
        bus.drain();

        // The late joiner missed every live op.
        let mut replica: ReplicatedMap<u64, i32> = ReplicatedMap::new("test.scores");
        for op in authority.sync_ops() {
            replica.apply(&op);
        }

        assert_eq!(replica.len(), 2);
        assert_eq!(replica.get(&1), Some(&10));
        assert_eq!(replica.get(&2), Some(&20));
    }

    #[test]
    fn ops_for_other_channels_are_ignored() {
        let mut bus = ReplicationBus::authority();
        let mut source = ReplicatedValue::new("test.a", 1i32);
        let mut other = ReplicatedValue::new("test.b", 0i32);

        source.set(5, &mut bus).expect("authority write");
        for op in bus.drain() {
            other.apply(&op);
        }

        assert_eq!(*other.get(), 0);
    }
}
