use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use tokio::net::UdpSocket;

/// Per-interface multicast socket lifecycle.
///
/// Sockets are `Arc`-wrapped so the engine can hand the same socket to both
/// the receive loop and the send path at once, and race readiness across
/// every open socket without fighting the borrow checker. They close simply
/// by dropping, on removal, topology changes, or engine shutdown.
pub struct InterfaceEntry {
    pub name: String,
    pub ipv4_addresses: Vec<(Ipv4Addr, u8)>,
    pub ipv6_addresses: Vec<(Ipv6Addr, u8)>,
    pub socket_v4: Option<Arc<UdpSocket>>,
    pub socket_v6: Option<Arc<UdpSocket>>,
    /// `true` if added explicitly through the engine's interface API
    /// rather than discovered by the topology scan; affects the fault
    /// quarantine policy's first-failure behaviour.
    pub manual: bool,
    pub disabled_until_ms: Option<u64>,
    pub packets_sent: u32,
}

impl InterfaceEntry {
    pub fn new(name: impl Into<String>, manual: bool) -> Self {
        Self {
            name: name.into(),
            ipv4_addresses: Vec::new(),
            ipv6_addresses: Vec::new(),
            socket_v4: None,
            socket_v6: None,
            manual,
            disabled_until_ms: None,
            packets_sent: 0,
        }
    }

    pub fn is_up(&self) -> bool {
        self.socket_v4.is_some() || self.socket_v6.is_some()
    }

    pub fn is_disabled(&self, now_ms: u64) -> bool {
        self.disabled_until_ms.is_some_and(|deadline| now_ms < deadline)
    }

    pub fn has_addresses(&self) -> bool {
        !self.ipv4_addresses.is_empty() || !self.ipv6_addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_is_up_only_once_a_socket_opens() {
        let entry = InterfaceEntry::new("eth0", false);
        assert!(!entry.is_up());
    }

    #[test]
    fn disabled_until_tracks_the_deadline() {
        let mut entry = InterfaceEntry::new("eth0", false);
        entry.disabled_until_ms = Some(10_000);
        assert!(entry.is_disabled(5_000));
        assert!(!entry.is_disabled(10_000));
        assert!(!entry.is_disabled(15_000));
    }
}
