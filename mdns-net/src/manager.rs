use std::collections::{HashMap, HashSet};

use mdns_wire::{InterfaceId, NicSubnet};

use crate::error::Error;
use crate::interface::InterfaceEntry;
use crate::scan;
use crate::socket::{self, group_addr_v4, group_addr_v6};

/// How long a send-faulted interface sits out before it's tried again.
pub const QUARANTINE_MS: u64 = 10_000;

/// Owns every interface's sockets and runs the topology reconciliation the
/// engine calls once per loop iteration.
pub struct InterfaceManager {
    interfaces: HashMap<InterfaceId, InterfaceEntry>,
    ipv4_enabled: bool,
    ipv6_enabled: bool,
    /// `None` means "every up, non-loopback, multicast-capable interface";
    /// `Some` restricts reconciliation to the named subset.
    allowed: Option<HashSet<String>>,
}

impl InterfaceManager {
    pub fn new(ipv4_enabled: bool, ipv6_enabled: bool, allowed: Option<HashSet<String>>) -> Self {
        Self {
            interfaces: HashMap::new(),
            ipv4_enabled,
            ipv6_enabled,
            allowed,
        }
    }

    pub fn get(&self, id: &InterfaceId) -> Option<&InterfaceEntry> {
        self.interfaces.get(id)
    }

    pub fn ids(&self) -> Vec<InterfaceId> {
        self.interfaces.keys().cloned().collect()
    }

    /// Interfaces with at least one open socket and not currently
    /// quarantined — the send path's candidate set.
    pub fn ready_ids(&self, now_ms: u64) -> Vec<InterfaceId> {
        self.interfaces
            .iter()
            .filter(|(_, entry)| entry.is_up() && !entry.is_disabled(now_ms))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Every currently-open socket, tagged with the interface it belongs
    /// to and readable for the engine's selector step to race readiness
    /// across.
    pub fn sockets(&self) -> Vec<(InterfaceId, std::sync::Arc<tokio::net::UdpSocket>)> {
        let mut sockets = Vec::new();
        for (id, entry) in &self.interfaces {
            // Quarantine only gates sends (see `send`); a disabled nic's
            // socket is still worth reading from.
            if let Some(socket) = &entry.socket_v4 {
                sockets.push((id.clone(), socket.clone()));
            }
            if let Some(socket) = &entry.socket_v6 {
                sockets.push((id.clone(), socket.clone()));
            }
        }
        sockets
    }

    pub fn subnets(&self) -> Vec<NicSubnet> {
        let mut subnets = Vec::new();
        for (id, entry) in &self.interfaces {
            for (addr, prefix_len) in &entry.ipv4_addresses {
                subnets.push(NicSubnet {
                    nic: id.clone(),
                    network: std::net::IpAddr::V4(*addr),
                    prefix_len: *prefix_len,
                });
            }
            for (addr, prefix_len) in &entry.ipv6_addresses {
                subnets.push(NicSubnet {
                    nic: id.clone(),
                    network: std::net::IpAddr::V6(*addr),
                    prefix_len: *prefix_len,
                });
            }
        }
        subnets
    }

    /// Adds `name` to the manually-managed set; present even with no
    /// addresses yet, and exempt from the first-failure silent-quarantine
    /// rule below.
    pub fn add_manual(&mut self, name: impl Into<String>) {
        let id = InterfaceId::new(name.into());
        self.interfaces
            .entry(id.clone())
            .or_insert_with(|| InterfaceEntry::new(id.name(), true));
    }

    pub fn remove(&mut self, id: &InterfaceId) -> bool {
        self.interfaces.remove(id).is_some()
    }

    /// Re-scans system interfaces, opening/closing sockets on non-empty
    /// ↔ empty address transitions, and returns the ids whose address set
    /// changed. Must run on a thread with an active Tokio reactor, since
    /// opening a socket registers it with the runtime.
    pub fn reconcile(&mut self) -> std::io::Result<Vec<InterfaceId>> {
        let scanned = scan::scan()?;
        let mut changed = Vec::new();
        let mut seen = HashSet::new();

        for found in scanned {
            if let Some(allowed) = &self.allowed {
                if !allowed.contains(&found.name) {
                    continue;
                }
            }
            seen.insert(found.name.clone());

            let ipv4 = if self.ipv4_enabled { found.ipv4 } else { Vec::new() };
            let ipv6 = if self.ipv6_enabled { found.ipv6 } else { Vec::new() };
            let id = InterfaceId::new(found.name.as_str());

            let entry = self
                .interfaces
                .entry(id.clone())
                .or_insert_with(|| InterfaceEntry::new(found.name.as_str(), false));

            let was_up = entry.has_addresses();
            let addresses_changed = entry.ipv4_addresses != ipv4 || entry.ipv6_addresses != ipv6;
            entry.ipv4_addresses = ipv4;
            entry.ipv6_addresses = ipv6;
            let is_up = entry.has_addresses();

            if was_up != is_up {
                if is_up {
                    open_sockets(entry);
                } else {
                    entry.socket_v4 = None;
                    entry.socket_v6 = None;
                }
                changed.push(id.clone());
            } else if addresses_changed {
                changed.push(id.clone());
            }
        }

        let disappeared: Vec<InterfaceId> = self
            .interfaces
            .iter()
            .filter(|(id, entry)| !entry.manual && !seen.contains(id.name()))
            .map(|(id, _)| id.clone())
            .collect();
        for id in disappeared {
            self.interfaces.remove(&id);
            changed.push(id);
        }

        Ok(changed)
    }

    /// Sends `bytes` on every open socket of `id` (v4 socket to the v4
    /// group, v6 socket to the v6 group), applying the fault-quarantine
    /// policy on failure.
    pub async fn send(&mut self, id: &InterfaceId, now_ms: u64, bytes: &[u8]) -> Result<(), Error> {
        let had_prior_success = self
            .interfaces
            .get(id)
            .map(|entry| entry.packets_sent > 0)
            .unwrap_or(false);
        let is_manual = self.interfaces.get(id).map(|entry| entry.manual).unwrap_or(false);

        let entry = match self.interfaces.get_mut(id) {
            Some(entry) => entry,
            None => return Err(Error::NoSuchInterface(id.name().to_owned())),
        };

        let mut sent_any = false;
        let mut last_err = None;

        if let Some(socket) = entry.socket_v4.as_ref() {
            match socket.send_to(bytes, group_addr_v4()).await {
                Ok(_) => sent_any = true,
                Err(err) => last_err = Some(err),
            }
        }
        if let Some(socket) = entry.socket_v6.as_ref() {
            match socket.send_to(bytes, group_addr_v6()).await {
                Ok(_) => sent_any = true,
                Err(err) => last_err = Some(err),
            }
        }

        if sent_any {
            entry.packets_sent += 1;
            return Ok(());
        }

        if let Some(err) = last_err {
            let loud = had_prior_success || is_manual;
            if loud {
                tracing::warn!(nic = %id, %err, "send failed, quarantining interface");
            } else {
                tracing::debug!(nic = %id, %err, "first send failed on auto interface, quarantining silently");
            }
            entry.disabled_until_ms = Some(now_ms + QUARANTINE_MS);
            return Err(Error::Io(err));
        }

        Ok(())
    }
}

fn open_sockets(entry: &mut InterfaceEntry) {
    use std::sync::Arc;

    if let Some((addr, _)) = entry.ipv4_addresses.first() {
        match socket::open_v4(*addr) {
            Ok(socket) => entry.socket_v4 = Some(Arc::new(socket)),
            Err(err) => tracing::warn!(nic = %entry.name, %err, "failed to open ipv4 multicast socket"),
        }
    }
    if !entry.ipv6_addresses.is_empty() {
        match socket::open_v6(&entry.name) {
            Ok(socket) => entry.socket_v6 = Some(Arc::new(socket)),
            Err(err) => tracing::warn!(nic = %entry.name, %err, "failed to open ipv6 multicast socket"),
        }
    }
}
