use mdns_cache::Service;
use mdns_wire::{InterfaceId, Packet};

/// The core's notification surface. Modeled as a trait with default no-op
/// methods rather than an enum dispatched
/// through a channel, so an embedder only implements the handful of events
/// it cares about.
///
/// Every method is invoked inline on the engine's own task and must not
/// block; a listener that panics is caught and logged rather than allowed
/// to take the loop down with it (see [`notify`]).
pub trait Listener: Send + Sync {
    fn packet_sent(&self, _packet: &Packet) {}
    fn packet_received(&self, _packet: &Packet) {}
    fn packet_error(&self, _packet: Option<&Packet>, _message: &str) {}
    fn topology_change(&self, _nic: &InterfaceId) {}
    fn type_named(&self, _type_fqdn: &str) {}
    fn type_name_expired(&self, _type_fqdn: &str) {}
    fn service_named(&self, _type_fqdn: &str, _name: &str) {}
    fn service_name_expired(&self, _type_fqdn: &str, _name: &str) {}
    fn service_announced(&self, _service: &Service) {}
    fn service_modified(&self, _service: &Service) {}
    fn service_expired(&self, _service: &Service) {}
}

/// A `Listener` that does nothing, used when an embedder doesn't care about
/// events at all.
#[derive(Debug, Default)]
pub struct NoopListener;

impl Listener for NoopListener {}

/// Runs `f` (a call into a [`Listener`] method), catching and logging a
/// panic instead of letting one misbehaving listener halt the loop.
pub(crate) fn notify<F>(f: F)
where
    F: FnOnce() + std::panic::UnwindSafe,
{
    if let Err(payload) = std::panic::catch_unwind(f) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        tracing::error!(message, "listener panicked; continuing");
    }
}
