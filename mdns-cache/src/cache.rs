use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use mdns_wire::Packet;

use crate::service::Service;

/// The live service cache: heard services plus the type and instance-name
/// sets used to answer DNS-SD enumeration queries, and the announced map
/// the engine replays for reannounce/goodbye.
///
/// Exclusively mutated by the engine thread; external readers only ever see
/// it through a [`CacheHandle`] snapshot.
#[derive(Default)]
pub struct ServiceCache {
    heard_services: HashMap<String, Service>,
    heard_service_types: HashSet<String>,
    heard_service_names: HashSet<String>,
    announced: HashMap<String, (Service, Packet)>,
}

impl ServiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heard(&self, fqdn: &str) -> Option<&Service> {
        self.heard_services.get(fqdn)
    }

    pub fn heard_mut(&mut self, fqdn: &str) -> Option<&mut Service> {
        self.heard_services.get_mut(fqdn)
    }

    pub fn heard_iter(&self) -> impl Iterator<Item = &Service> {
        self.heard_services.values()
    }

    pub fn heard_iter_mut(&mut self) -> impl Iterator<Item = &mut Service> {
        self.heard_services.values_mut()
    }

    pub fn insert_heard(&mut self, service: Service) {
        self.heard_services.insert(service.fqdn.clone(), service);
    }

    pub fn remove_heard(&mut self, fqdn: &str) -> Option<Service> {
        self.heard_services.remove(fqdn)
    }

    pub fn is_heard(&self, fqdn: &str) -> bool {
        self.heard_services.contains_key(fqdn)
    }

    pub fn heard_types(&self) -> &HashSet<String> {
        &self.heard_service_types
    }

    /// Adds `type_fqdn`, returning whether it was newly seen.
    pub fn add_heard_type(&mut self, type_fqdn: impl Into<String>) -> bool {
        self.heard_service_types.insert(type_fqdn.into())
    }

    pub fn remove_heard_type(&mut self, type_fqdn: &str) -> bool {
        self.heard_service_types.remove(type_fqdn)
    }

    pub fn heard_names(&self) -> &HashSet<String> {
        &self.heard_service_names
    }

    /// Adds `fqdn` to the heard-names set, returning whether it was newly seen.
    pub fn add_heard_name(&mut self, fqdn: impl Into<String>) -> bool {
        self.heard_service_names.insert(fqdn.into())
    }

    pub fn remove_heard_name(&mut self, fqdn: &str) -> bool {
        self.heard_service_names.remove(fqdn)
    }

    pub fn announced(&self, fqdn: &str) -> Option<&(Service, Packet)> {
        self.announced.get(fqdn)
    }

    pub fn is_announced(&self, fqdn: &str) -> bool {
        self.announced.contains_key(fqdn)
    }

    pub fn announced_iter(&self) -> impl Iterator<Item = &(Service, Packet)> {
        self.announced.values()
    }

    pub fn insert_announced(&mut self, service: Service, packet: Packet) {
        self.announced.insert(service.fqdn.clone(), (service, packet));
    }

    pub fn remove_announced(&mut self, fqdn: &str) -> Option<(Service, Packet)> {
        self.announced.remove(fqdn)
    }

    pub fn take_handle(self_arc: &Arc<RwLock<Self>>) -> CacheHandle {
        CacheHandle {
            inner: self_arc.clone(),
        }
    }
}

/// A read-only, cheaply-cloneable view over a [`ServiceCache`], the only way
/// external threads see cache state. Every getter copies out of the lock
/// rather than handing back a reference tied to the guard's lifetime.
#[derive(Clone)]
pub struct CacheHandle {
    inner: Arc<RwLock<ServiceCache>>,
}

impl CacheHandle {
    pub fn new(cache: Arc<RwLock<ServiceCache>>) -> Self {
        Self { inner: cache }
    }

    pub fn heard(&self) -> Vec<Service> {
        self.inner.read().expect("cache lock poisoned").heard_iter().cloned().collect()
    }

    pub fn heard_types(&self) -> HashSet<String> {
        self.inner.read().expect("cache lock poisoned").heard_types().clone()
    }

    pub fn heard_names(&self) -> HashSet<String> {
        self.inner.read().expect("cache lock poisoned").heard_names().clone()
    }

    pub fn announced(&self) -> Vec<Service> {
        self.inner
            .read()
            .expect("cache lock poisoned")
            .announced_iter()
            .map(|(service, _)| service.clone())
            .collect()
    }

    pub fn find_heard(&self, fqdn: &str) -> Option<Service> {
        self.inner.read().expect("cache lock poisoned").heard(fqdn).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str) -> Service {
        Service::new(name, "_http._tcp", "local")
    }

    #[test]
    fn heard_types_and_names_track_distinct_inserts() {
        let mut cache = ServiceCache::new();
        assert!(cache.add_heard_type("_http._tcp.local"));
        assert!(!cache.add_heard_type("_http._tcp.local"));
        assert!(cache.add_heard_name("MyWeb._http._tcp.local"));
        assert_eq!(cache.heard_types().len(), 1);
        assert_eq!(cache.heard_names().len(), 1);
    }

    #[test]
    fn insert_and_remove_heard_round_trips() {
        let mut cache = ServiceCache::new();
        cache.insert_heard(service("Other"));
        assert!(cache.is_heard("Other._http._tcp.local"));
        let removed = cache.remove_heard("Other._http._tcp.local");
        assert!(removed.is_some());
        assert!(!cache.is_heard("Other._http._tcp.local"));
    }

    #[test]
    fn cache_handle_reads_through_the_lock() {
        let cache = Arc::new(RwLock::new(ServiceCache::new()));
        cache.write().unwrap().insert_heard(service("Other"));
        let handle = CacheHandle::new(cache.clone());
        assert_eq!(handle.heard().len(), 1);
        cache.write().unwrap().insert_heard(service("Another"));
        assert_eq!(handle.heard().len(), 2);
    }
}
