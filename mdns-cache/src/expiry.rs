use std::collections::HashMap;
use std::net::IpAddr;

/// Coalescing key for a scheduled expiry/refresh action.
///
/// Re-scheduling under the same key replaces the previous deadline and
/// action rather than stacking a second entry, which is what keeps a
/// service that keeps getting re-advertised from accumulating one expiry
/// per announcement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExpiryKey {
    /// A heard or owned service's SRV-driven lifetime, keyed by fqdn.
    Service(String),
    /// A heard service *name* (PTR instance), keyed by fqdn.
    ServiceName(String),
    /// A heard service *type* (PTR type enumeration), keyed by the type string.
    ServiceType(String),
    /// A heard TXT record, keyed by fqdn.
    Text(String),
    /// A heard address bound to a host, keyed by (host, address).
    HostAddress(String, IpAddr),
}

/// What to do once an [`ExpiryKey`]'s deadline passes. Kept as a plain enum
/// rather than a boxed closure: the wheel only needs to hand these back to
/// the engine on `tick`, and an enum is cheaper to construct, easier to
/// test, and doesn't need the entry to be `Send` on the engine's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryAction {
    ExpireServiceType { type_fqdn: String },
    ExpireServiceName { type_fqdn: String, fqdn: String },
    ReannounceService { fqdn: String },
    ExpireService { fqdn: String },
    WipeText { fqdn: String },
    RemoveHostAddress { host: String, addr: IpAddr },
}

struct Entry {
    deadline_ms: u64,
    action: ExpiryAction,
}

/// Keyed, coalescing timer queue. The map is not ordered by deadline: with
/// wake-ups roughly every five seconds, a full scan per tick is cheap enough
/// that a binary heap would only add key-replace bookkeeping for no real
/// benefit at this scale.
#[derive(Default)]
pub struct ExpiryWheel {
    entries: HashMap<ExpiryKey, Entry>,
}

impl ExpiryWheel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `action` to run at `now_ms + ttl_secs * 1000`, replacing
    /// whatever was previously scheduled under `key`. `ttl_secs == 0`
    /// schedules for the next `tick`.
    pub fn schedule(&mut self, key: ExpiryKey, ttl_secs: u32, now_ms: u64, action: ExpiryAction) {
        let deadline_ms = now_ms + (ttl_secs as u64) * 1000;
        self.entries.insert(key, Entry { deadline_ms, action });
    }

    pub fn cancel(&mut self, key: &ExpiryKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &ExpiryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the deadline scheduled under `key`, if any — used by tests
    /// asserting the "expiry entry keyed by the service" protocol invariant.
    pub fn deadline(&self, key: &ExpiryKey) -> Option<u64> {
        self.entries.get(key).map(|entry| entry.deadline_ms)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops and returns every action whose deadline has passed as of
    /// `now_ms`. Iteration order is not deadline order (see module docs).
    pub fn tick(&mut self, now_ms: u64) -> Vec<ExpiryAction> {
        let due: Vec<ExpiryKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline_ms <= now_ms)
            .map(|(key, _)| key.clone())
            .collect();

        due.into_iter()
            .filter_map(|key| self.entries.remove(&key).map(|entry| entry.action))
            .collect()
    }
}
