use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::net::IpAddr;

use mdns_wire::InterfaceId;
use serde::{Deserialize, Serialize};

/// Per-record-type TTLs a service was last heard or configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTtls {
    pub ptr: u32,
    pub srv: u32,
    pub txt: u32,
    pub a: u32,
}

impl Default for ServiceTtls {
    fn default() -> Self {
        Self {
            ptr: 28_800,
            srv: 120,
            txt: 4_500,
            a: 120,
        }
    }
}

/// An ordered TXT-record-shaped key/value map: insertion order is load
/// bearing (it is part of record equality and of the change-detection
/// `setText` relies on).
pub type TextRecord = Vec<(String, Option<String>)>;

/// A service instance, either announced by this responder (`owner`) or
/// heard on the network. `fqdn` is the sole identity: two `Service`
/// values with the same fqdn are the same service even if every other
/// field differs, since the fqdn already encodes the zeroconf instance
/// name, type and domain together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub fqdn: String,
    pub name: String,
    pub service_type: String,
    pub domain: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub text: Option<TextRecord>,
    pub addresses: HashMap<IpAddr, HashSet<InterfaceId>>,
    pub ttl: ServiceTtls,
    pub owner: bool,
    pub cancelled: bool,
    #[serde(skip)]
    modified: bool,
}

impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.fqdn == other.fqdn
    }
}

impl Eq for Service {}

impl Hash for Service {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fqdn.hash(state);
    }
}

impl Service {
    pub fn new(name: impl Into<String>, service_type: impl Into<String>, domain: impl Into<String>) -> Self {
        let name = name.into();
        let service_type = service_type.into();
        let domain = domain.into();
        let fqdn = format!("{name}.{service_type}.{domain}");
        Self {
            fqdn,
            name,
            service_type,
            domain,
            host: None,
            port: None,
            text: None,
            addresses: HashMap::new(),
            ttl: ServiceTtls::default(),
            owner: false,
            cancelled: false,
            modified: false,
        }
    }

    pub fn owned(mut self) -> Self {
        self.owner = true;
        self
    }

    /// The DNS-SD type name this service is announced under, e.g.
    /// `_http._tcp.local`.
    pub fn type_fqdn(&self) -> String {
        format!("{}.{}", self.service_type, self.domain)
    }

    /// Whether any mutator below has flipped state since the last flush.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Reads and clears the modified flag, used by the engine once per
    /// packet integration pass to decide which notifications to emit.
    pub fn take_modified(&mut self) -> bool {
        std::mem::take(&mut self.modified)
    }

    pub fn set_host(&mut self, host: impl Into<String>, port: u16) -> bool {
        let host = host.into();
        let changed = self.host.as_deref() != Some(host.as_str()) || self.port != Some(port);
        if changed {
            self.host = Some(host);
            self.port = Some(port);
            self.modified = true;
        }
        changed
    }

    /// Returns true iff the ordered content (keys and values both)
    /// differs from what is already cached.
    pub fn set_text(&mut self, text: TextRecord) -> bool {
        let changed = self.text.as_ref() != Some(&text);
        if changed {
            self.text = Some(text);
            self.modified = true;
        }
        changed
    }

    /// Adds `nic` to `addr`'s set. Reports modified iff `addr` itself was
    /// not already known, regardless of whether `nic` was already one of
    /// its interfaces.
    pub fn add_address(&mut self, addr: IpAddr, nic: InterfaceId) -> bool {
        let is_new = !self.addresses.contains_key(&addr);
        self.addresses.entry(addr).or_default().insert(nic);
        if is_new {
            self.modified = true;
        }
        is_new
    }

    pub fn remove_address(&mut self, addr: &IpAddr) -> bool {
        let removed = self.addresses.remove(addr).is_some();
        if removed {
            self.modified = true;
        }
        removed
    }

    /// Nulls out a TXT record that has expired without a replacement
    /// arriving. Returns whether there was anything to clear.
    pub fn clear_text(&mut self) -> bool {
        let had_text = self.text.take().is_some();
        if had_text {
            self.modified = true;
        }
        had_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn nic(name: &str) -> InterfaceId {
        InterfaceId::new(name)
    }

    #[test]
    fn set_host_reports_modified_only_on_change() {
        let mut service = Service::new("MyWeb", "_http._tcp", "local");
        assert!(service.set_host("h.local", 8080));
        assert!(!service.set_host("h.local", 8080));
        assert!(service.set_host("h.local", 9090));
    }

    #[test]
    fn set_text_compares_ordered_content() {
        let mut service = Service::new("MyWeb", "_http._tcp", "local");
        let text = vec![("path".to_owned(), Some("/a".to_owned()))];
        assert!(service.set_text(text.clone()));
        assert!(!service.set_text(text));
        let reordered = vec![
            ("other".to_owned(), None),
            ("path".to_owned(), Some("/a".to_owned())),
        ];
        assert!(service.set_text(reordered.clone()));
        assert_eq!(service.text, Some(reordered));
    }

    #[test]
    fn add_and_remove_address_report_modification() {
        let mut service = Service::new("MyWeb", "_http._tcp", "local");
        let addr: IpAddr = "192.0.2.10".parse().unwrap();
        assert!(service.add_address(addr, nic("eth0")));
        assert!(!service.add_address(addr, nic("eth0")));
        assert!(service.remove_address(&addr));
        assert!(!service.remove_address(&addr));
    }

    #[test]
    fn clear_text_nulls_existing_text_only() {
        let mut service = Service::new("MyWeb", "_http._tcp", "local");
        assert!(!service.clear_text());
        service.set_text(vec![("path".to_owned(), Some("/a".to_owned()))]);
        assert!(service.clear_text());
        assert!(service.text.is_none());
        assert!(!service.clear_text());
    }

    #[test]
    fn take_modified_clears_the_flag() {
        let mut service = Service::new("MyWeb", "_http._tcp", "local");
        service.set_host("h.local", 8080);
        assert!(service.take_modified());
        assert!(!service.is_modified());
    }

    #[test]
    fn equality_and_hash_are_fqdn_only() {
        let mut a = Service::new("MyWeb", "_http._tcp", "local");
        let mut b = Service::new("MyWeb", "_http._tcp", "local");
        b.set_host("different.local", 1);
        assert_eq!(a, b);
        a.set_host("other.local", 2);
        assert_eq!(a, b);
    }
}
