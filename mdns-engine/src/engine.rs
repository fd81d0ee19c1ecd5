//! The engine loop: one task owns the cache, expiry wheel, interface
//! manager and pending probes, and is the only thing that ever touches a
//! socket. Everything else talks to it through [`EngineHandle`].

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};

use mdns_cache::{CacheHandle, ExpiryAction, ExpiryWheel, Service, ServiceCache};
use mdns_net::InterfaceManager;
use mdns_wire::packet::question::QueryType;
use mdns_wire::{InterfaceId, Packet, MAX_PACKET_SIZE};

use crate::announce::{build_announcement, build_goodbye, PendingProbe};
use crate::answer::answer_questions;
use crate::config::Config;
use crate::event::{notify, Listener};
use crate::integrator::{integrate, IntegrationOutcome};

/// A request sent from an [`EngineHandle`] to the loop it's attached to.
pub enum Command {
    Announce(Service, oneshot::Sender<bool>),
    Unannounce(String, oneshot::Sender<bool>),
    EnqueuePacket(Packet),
    AddInterface(String),
    RemoveInterface(String),
    Close,
}

/// A cheaply-cloneable, `Send` handle to a running [`Engine`]. The only way
/// code outside the engine's own task touches it.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
    cache: CacheHandle,
}

impl EngineHandle {
    pub fn cache(&self) -> &CacheHandle {
        &self.cache
    }

    /// Probes `service`'s fqdn and, if clear, announces it. Resolves to
    /// `false` if the fqdn was already announced, already heard, or a
    /// conflicting response arrived during probing.
    pub async fn announce(&self, service: Service) -> Result<bool, crate::error::Error> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Announce(service, tx))
            .map_err(|_| crate::error::Error::Closed)?;
        rx.await.map_err(|_| crate::error::Error::Closed)
    }

    /// Sends a goodbye for `fqdn` and drops it from the announced set.
    /// Resolves to `false` if it wasn't announced.
    pub async fn unannounce(&self, fqdn: impl Into<String>) -> Result<bool, crate::error::Error> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Unannounce(fqdn.into(), tx))
            .map_err(|_| crate::error::Error::Closed)?;
        rx.await.map_err(|_| crate::error::Error::Closed)
    }

    pub fn enqueue(&self, packet: Packet) -> Result<(), crate::error::Error> {
        self.commands
            .send(Command::EnqueuePacket(packet))
            .map_err(|_| crate::error::Error::Closed)
    }

    pub fn add_interface(&self, name: impl Into<String>) -> Result<(), crate::error::Error> {
        self.commands
            .send(Command::AddInterface(name.into()))
            .map_err(|_| crate::error::Error::Closed)
    }

    pub fn remove_interface(&self, name: impl Into<String>) -> Result<(), crate::error::Error> {
        self.commands
            .send(Command::RemoveInterface(name.into()))
            .map_err(|_| crate::error::Error::Closed)
    }

    pub fn close(&self) -> Result<(), crate::error::Error> {
        self.commands.send(Command::Close).map_err(|_| crate::error::Error::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    Cancelled,
}

/// Owns every piece of mutable state the loop touches. Never `Clone`, never
/// shared: external code only ever sees it through an [`EngineHandle`].
pub struct Engine<L: Listener> {
    config: Config,
    listener: Arc<L>,
    cache: Arc<RwLock<ServiceCache>>,
    expiry: ExpiryWheel,
    manager: InterfaceManager,
    commands: mpsc::UnboundedReceiver<Command>,
    outbound: VecDeque<Packet>,
    pending_probes: Vec<PendingProbe>,
    next_id: u16,
    state: State,
    clock: std::time::Instant,
}

impl<L: Listener + 'static> Engine<L> {
    pub fn new(config: Config, listener: L) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cache = Arc::new(RwLock::new(ServiceCache::new()));
        let manager = InterfaceManager::new(
            config.ipv4_enabled,
            config.ipv6_enabled,
            config.network_interfaces.clone(),
        );
        let handle = EngineHandle {
            commands: tx,
            cache: CacheHandle::new(cache.clone()),
        };
        let engine = Self {
            config,
            listener: Arc::new(listener),
            cache,
            expiry: ExpiryWheel::new(),
            manager,
            commands: rx,
            outbound: VecDeque::new(),
            pending_probes: Vec::new(),
            next_id: 1,
            state: State::Running,
            clock: std::time::Instant::now(),
        };
        (engine, handle)
    }

    fn now_ms(&self) -> u64 {
        self.clock.elapsed().as_millis() as u64
    }

    fn next_id(&mut self) -> u16 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// How long the loop can sleep before it must wake up on its own: the
    /// ~5s expiry-tick cadence, or sooner if a probe round is due before
    /// then (250ms spacing).
    fn next_wake_delay_ms(&self, now_ms: u64) -> u64 {
        self.pending_probes
            .iter()
            .map(|probe| probe.next_send_at_ms.saturating_sub(now_ms))
            .min()
            .unwrap_or(5_000)
            .max(1)
    }

    /// Runs until a [`Command::Close`] arrives, then unannounces every
    /// owned service before returning.
    #[tracing::instrument(skip_all)]
    pub async fn run(mut self) {
        if let Err(err) = self.manager.reconcile() {
            tracing::warn!(%err, "initial interface scan failed");
        }

        loop {
            let now_ms = self.now_ms();
            self.drain_one_outbound(now_ms).await;
            self.drive_pending_probes(now_ms).await;

            let sockets = self.manager.sockets();
            let wake_after = Duration::from_millis(self.next_wake_delay_ms(now_ms));
            tokio::select! {
                _ = tokio::time::sleep(wake_after) => {}
                Some(command) = self.commands.recv() => {
                    self.handle_command(command, now_ms).await;
                }
                received = recv_any(&sockets) => {
                    if let Some((nic, bytes)) = received {
                        self.on_datagram(nic, bytes).await;
                    }
                }
            }

            if self.state == State::Cancelled {
                break;
            }

            let tick_now = self.now_ms();
            self.process_expiry(tick_now).await;

            match self.manager.reconcile() {
                Ok(changed) if !changed.is_empty() => {
                    for nic in &changed {
                        let listener = self.listener.clone();
                        let nic = nic.clone();
                        notify(std::panic::AssertUnwindSafe(|| listener.topology_change(&nic)));
                    }
                    if self.has_announced() {
                        self.reannounce_all();
                    }
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(%err, "topology reconciliation failed"),
            }
        }

        self.shutdown().await;
    }

    async fn handle_command(&mut self, command: Command, now_ms: u64) {
        match command {
            Command::Announce(mut service, reply) => {
                let fqdn = service.fqdn.clone();
                let conflicts = {
                    let cache = self.cache.read().expect("cache lock poisoned");
                    cache.is_announced(&fqdn) || cache.is_heard(&fqdn)
                };
                if conflicts {
                    let _ = reply.send(false);
                    return;
                }
                service.ttl = self.config.service_ttls();
                if service.host.is_none() {
                    service.host = Some(self.config.local_host_name.clone());
                }
                self.pending_probes.push(PendingProbe::new(service, now_ms, reply));
            }
            Command::Unannounce(fqdn, reply) => {
                let removed = { self.cache.write().expect("cache lock poisoned").remove_announced(&fqdn) };
                match removed {
                    Some((_, packet)) => {
                        self.outbound.push_back(build_goodbye(&packet, now_ms));
                        let _ = reply.send(true);
                    }
                    None => {
                        let _ = reply.send(false);
                    }
                }
            }
            Command::EnqueuePacket(packet) => self.outbound.push_back(packet),
            Command::AddInterface(name) => self.manager.add_manual(name),
            Command::RemoveInterface(name) => {
                self.manager.remove(&InterfaceId::new(name));
            }
            Command::Close => self.state = State::Cancelled,
        }
    }

    /// Sends one due round for every pending probe, then finalizes any
    /// that have completed all three rounds.
    async fn drive_pending_probes(&mut self, now_ms: u64) {
        let due: Vec<usize> = self
            .pending_probes
            .iter()
            .enumerate()
            .filter(|(_, probe)| probe.is_due(now_ms))
            .map(|(i, _)| i)
            .collect();

        for idx in due {
            let fqdn = self.pending_probes[idx].fqdn.clone();
            let id = self.next_id();
            let packet = Packet::query(id, fqdn, QueryType::Any, now_ms);
            self.send_packet(&packet, now_ms).await;
            self.pending_probes[idx].record_round_sent(now_ms);
        }

        let completed: Vec<usize> = self
            .pending_probes
            .iter()
            .enumerate()
            .filter(|(_, probe)| probe.is_complete())
            .map(|(i, _)| i)
            .collect();

        for idx in completed.into_iter().rev() {
            let probe = self.pending_probes.remove(idx);
            self.finalize_announce(probe, now_ms).await;
        }
    }

    async fn finalize_announce(&mut self, probe: PendingProbe, now_ms: u64) {
        let id = self.next_id();
        let packet = build_announcement(&probe.service, id, now_ms);
        {
            self.cache
                .write()
                .expect("cache lock poisoned")
                .insert_announced(probe.service.clone(), packet.clone());
        }
        self.outbound.push_back(packet);
        let _ = probe.reply.send(true);
    }

    /// Aborts any pending probe whose fqdn (case-insensitively) matches an
    /// answer name in `packet`: any response seen for a name still being
    /// probed means another host already holds it.
    fn check_probe_conflicts(&mut self, packet: &Packet) {
        if self.pending_probes.is_empty() {
            return;
        }
        let conflicted: Vec<usize> = self
            .pending_probes
            .iter()
            .enumerate()
            .filter(|(_, probe)| {
                packet
                    .answers
                    .iter()
                    .chain(&packet.additionals)
                    .any(|record| record.name.eq_ignore_ascii_case(&probe.fqdn))
            })
            .map(|(i, _)| i)
            .collect();

        for idx in conflicted.into_iter().rev() {
            let probe = self.pending_probes.remove(idx);
            let _ = probe.reply.send(false);
        }
    }

    async fn on_datagram(&mut self, nic: InterfaceId, bytes: Vec<u8>) {
        let now_ms = self.now_ms();
        match Packet::decoded(&bytes, Some(nic), now_ms) {
            Ok(packet) => self.handle_inbound(packet, now_ms),
            Err(err) => {
                let listener = self.listener.clone();
                let message = err.to_string();
                notify(std::panic::AssertUnwindSafe(|| listener.packet_error(None, &message)));
                tracing::debug!(%err, "dropping malformed packet");
            }
        }
    }

    /// The part of inbound-packet handling that never touches a socket:
    /// conflict-checks pending probes, answers any questions, integrates
    /// every record into the cache, and emits listener notifications.
    /// Split out from [`Self::on_datagram`] so it can be exercised without
    /// a Tokio reactor or real interfaces.
    fn handle_inbound(&mut self, packet: Packet, now_ms: u64) {
        self.check_probe_conflicts(&packet);

        let listener = self.listener.clone();
        notify(std::panic::AssertUnwindSafe(|| listener.packet_received(&packet)));

        let enumeration_name = self.config.dns_sd_enumeration_name();

        if !packet.questions.is_empty() {
            let announced: Vec<(Service, Packet)> = {
                let cache = self.cache.read().expect("cache lock poisoned");
                cache.announced_iter().cloned().collect()
            };
            if let Some(response) = answer_questions(&packet, &announced, &enumeration_name) {
                self.outbound.push_back(response);
            }
        }

        let outcome = {
            let mut cache = self.cache.write().expect("cache lock poisoned");
            integrate(&packet, &mut cache, &mut self.expiry, now_ms, &enumeration_name)
        };

        self.emit_integration_events(&packet, &outcome);
    }

    fn emit_integration_events(&self, packet: &Packet, outcome: &IntegrationOutcome) {
        let listener = self.listener.clone();
        let cache = self.cache.read().expect("cache lock poisoned");

        for message in &outcome.errors {
            let listener = listener.clone();
            let message = message.clone();
            notify(std::panic::AssertUnwindSafe(|| listener.packet_error(Some(packet), &message)));
        }

        for type_fqdn in &outcome.type_named {
            let listener = listener.clone();
            let type_fqdn = type_fqdn.clone();
            notify(std::panic::AssertUnwindSafe(|| listener.type_named(&type_fqdn)));
        }
        for (type_fqdn, name) in &outcome.service_named {
            let listener = listener.clone();
            let (type_fqdn, name) = (type_fqdn.clone(), name.clone());
            notify(std::panic::AssertUnwindSafe(|| listener.service_named(&type_fqdn, &name)));
        }
        for fqdn in &outcome.new_services {
            if let Some(service) = cache.heard(fqdn) {
                let listener = listener.clone();
                let service = service.clone();
                notify(std::panic::AssertUnwindSafe(|| listener.service_announced(&service)));
            }
        }
        for fqdn in &outcome.modified_services {
            if let Some(service) = cache.heard(fqdn) {
                let listener = listener.clone();
                let service = service.clone();
                notify(std::panic::AssertUnwindSafe(|| listener.service_modified(&service)));
            }
        }
    }

    async fn process_expiry(&mut self, now_ms: u64) {
        let actions = self.expiry.tick(now_ms);
        for action in actions {
            self.apply_expiry_action(action).await;
        }
    }

    async fn apply_expiry_action(&mut self, action: ExpiryAction) {
        match action {
            ExpiryAction::ExpireServiceType { type_fqdn } => {
                let removed = self
                    .cache
                    .write()
                    .expect("cache lock poisoned")
                    .remove_heard_type(&type_fqdn);
                if removed {
                    let listener = self.listener.clone();
                    notify(std::panic::AssertUnwindSafe(|| listener.type_name_expired(&type_fqdn)));
                }
            }
            ExpiryAction::ExpireServiceName { type_fqdn, fqdn } => {
                let removed = self
                    .cache
                    .write()
                    .expect("cache lock poisoned")
                    .remove_heard_name(&fqdn);
                if removed {
                    let name = fqdn.strip_suffix(&format!(".{type_fqdn}")).unwrap_or(&fqdn).to_owned();
                    let listener = self.listener.clone();
                    notify(std::panic::AssertUnwindSafe(|| listener.service_name_expired(&type_fqdn, &name)));
                }
            }
            ExpiryAction::ReannounceService { fqdn } => {
                let packet = {
                    let cache = self.cache.read().expect("cache lock poisoned");
                    cache.announced(&fqdn).map(|(_, packet)| packet.clone())
                };
                if let Some(packet) = packet {
                    self.outbound.push_back(packet);
                }
            }
            ExpiryAction::ExpireService { fqdn } => {
                let removed = self.cache.write().expect("cache lock poisoned").remove_heard(&fqdn);
                if let Some(service) = removed {
                    let listener = self.listener.clone();
                    notify(std::panic::AssertUnwindSafe(|| listener.service_expired(&service)));
                }
            }
            ExpiryAction::WipeText { fqdn } => {
                let mut cache = self.cache.write().expect("cache lock poisoned");
                if let Some(service) = cache.heard_mut(&fqdn) {
                    service.clear_text();
                }
            }
            ExpiryAction::RemoveHostAddress { host, addr } => {
                let mut cache = self.cache.write().expect("cache lock poisoned");
                for service in cache.heard_iter_mut() {
                    if service.host.as_deref() == Some(host.as_str()) {
                        service.remove_address(&addr);
                    }
                }
            }
        }
    }

    fn has_announced(&self) -> bool {
        self.cache.read().expect("cache lock poisoned").announced_iter().next().is_some()
    }

    /// Requeues every owned service's cached announcement packet, run
    /// after a topology change.
    fn reannounce_all(&mut self) {
        let packets: Vec<Packet> = {
            let cache = self.cache.read().expect("cache lock poisoned");
            cache.announced_iter().map(|(_, packet)| packet.clone()).collect()
        };
        self.outbound.extend(packets);
    }

    async fn drain_one_outbound(&mut self, now_ms: u64) {
        if let Some(packet) = self.outbound.pop_front() {
            self.send_packet(&packet, now_ms).await;
        }
    }

    /// Sends `packet` on every ready interface, trimmed per-nic by
    /// [`Packet::applied_to`].
    async fn send_packet(&mut self, packet: &Packet, now_ms: u64) {
        let subnets = self.manager.subnets();
        let ready = self.manager.ready_ids(now_ms);

        for nic in ready {
            if let Some(target) = &packet.nic {
                if target != &nic {
                    continue;
                }
            }
            let Some(applied) = packet.applied_to(&nic, &subnets) else {
                continue;
            };
            let bytes = match applied.encode() {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(nic = %nic, %err, "failed to encode outbound packet");
                    continue;
                }
            };
            match self.manager.send(&nic, now_ms, &bytes).await {
                Ok(()) => {
                    let listener = self.listener.clone();
                    notify(std::panic::AssertUnwindSafe(|| listener.packet_sent(&applied)));
                }
                Err(err) => {
                    let listener = self.listener.clone();
                    let message = err.to_string();
                    notify(std::panic::AssertUnwindSafe(|| listener.packet_error(Some(&applied), &message)));
                }
            }
        }
    }

    /// Unannounces every owned service before the loop returns.
    async fn shutdown(&mut self) {
        let announced: Vec<(Service, Packet)> = {
            let cache = self.cache.read().expect("cache lock poisoned");
            cache.announced_iter().cloned().collect()
        };
        let now_ms = self.now_ms();
        for (_, packet) in announced {
            let goodbye = build_goodbye(&packet, now_ms);
            self.send_packet(&goodbye, now_ms).await;
        }
    }
}

/// Races every open socket's `recv_from`, since the live socket set
/// changes as interfaces come and go and `tokio::select!`'s arms can't be
/// rebuilt at runtime.
async fn recv_any(sockets: &[(InterfaceId, Arc<UdpSocket>)]) -> Option<(InterfaceId, Vec<u8>)> {
    if sockets.is_empty() {
        std::future::pending::<()>().await;
        return None;
    }

    let polled = sockets.iter().map(|(id, socket)| {
        let id = id.clone();
        let socket = socket.clone();
        Box::pin(async move {
            let mut buf = vec![0u8; MAX_PACKET_SIZE];
            match socket.recv_from(&mut buf).await {
                Ok((len, _)) if len > 0 => Some((id, buf[..len].to_vec())),
                Ok(_) => None,
                Err(err) => {
                    tracing::debug!(nic = %id, %err, "recv_from failed");
                    None
                }
            }
        }) as Pin<Box<dyn Future<Output = Option<(InterfaceId, Vec<u8>)>> + Send>>
    });

    let (result, _, _) = futures::future::select_all(polled).await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Mutex;

    use mdns_wire::packet::record::{Record, RecordData};

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    impl RecordingListener {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Listener for RecordingListener {
        fn type_named(&self, type_fqdn: &str) {
            self.events.lock().unwrap().push(format!("type_named:{type_fqdn}"));
        }
        fn type_name_expired(&self, type_fqdn: &str) {
            self.events.lock().unwrap().push(format!("type_name_expired:{type_fqdn}"));
        }
        fn service_named(&self, type_fqdn: &str, name: &str) {
            self.events.lock().unwrap().push(format!("service_named:{type_fqdn}:{name}"));
        }
        fn service_name_expired(&self, type_fqdn: &str, name: &str) {
            self.events.lock().unwrap().push(format!("service_name_expired:{type_fqdn}:{name}"));
        }
        fn service_announced(&self, service: &Service) {
            self.events.lock().unwrap().push(format!("service_announced:{}", service.fqdn));
        }
        fn service_expired(&self, service: &Service) {
            self.events.lock().unwrap().push(format!("service_expired:{}", service.fqdn));
        }
        fn packet_error(&self, _packet: Option<&Packet>, message: &str) {
            self.events.lock().unwrap().push(format!("packet_error:{message}"));
        }
    }

    fn ptr_instance(ttl: u32) -> Record {
        Record::new("_http._tcp.local", ttl, RecordData::Ptr("Other._http._tcp.local".to_owned()))
    }

    fn srv(ttl: u32, port: u16) -> Record {
        Record::new(
            "Other._http._tcp.local",
            ttl,
            RecordData::Srv {
                priority: 0,
                weight: 0,
                port,
                target: "peer.local".to_owned(),
            },
        )
    }

    #[test]
    fn incoming_ptr_and_srv_announce_a_heard_service_with_bare_instance_name() {
        let (mut engine, _handle) = Engine::new(Config::default(), RecordingListener::default());
        let packet = Packet {
            answers: vec![ptr_instance(120), srv(60, 9000)],
            ..Packet::query(1, "x", QueryType::Any, 0)
        };
        engine.handle_inbound(packet, 0);

        let events = engine.listener.events();
        assert!(events.contains(&"type_named:_http._tcp.local".to_owned()));
        assert!(events.contains(&"service_named:_http._tcp.local:Other".to_owned()));
        assert!(events.iter().any(|e| e.starts_with("service_announced:Other._http._tcp.local")));
    }

    #[test]
    fn malformed_srv_fqdn_surfaces_a_packet_error_instead_of_panicking() {
        let (mut engine, _handle) = Engine::new(Config::default(), RecordingListener::default());
        let bad_srv = Record::new(
            "nodots",
            120,
            RecordData::Srv {
                priority: 0,
                weight: 0,
                port: 8080,
                target: "h.local".to_owned(),
            },
        );
        let packet = Packet {
            answers: vec![bad_srv],
            ..Packet::query(1, "x", QueryType::Any, 0)
        };
        engine.handle_inbound(packet, 0);

        let events = engine.listener.events();
        assert!(events.iter().any(|e| e.starts_with("packet_error:")));
        assert!(!engine.cache.read().unwrap().is_heard("nodots"));
    }

    #[tokio::test]
    async fn srv_expiry_fires_service_expired_and_drops_from_the_cache() {
        let (mut engine, _handle) = Engine::new(Config::default(), RecordingListener::default());
        let packet = Packet {
            answers: vec![ptr_instance(120), srv(60, 9000)],
            ..Packet::query(1, "x", QueryType::Any, 0)
        };
        engine.handle_inbound(packet, 0);

        engine.process_expiry(60_000).await;

        let events = engine.listener.events();
        assert!(events.iter().any(|e| e.starts_with("service_expired:Other._http._tcp.local")));
        assert!(!engine.cache.read().unwrap().is_heard("Other._http._tcp.local"));
    }

    #[tokio::test]
    async fn question_about_announced_service_queues_a_response() {
        let (mut engine, _handle) = Engine::new(Config::default(), RecordingListener::default());
        let mut service = Service::new("MyWeb", "_http._tcp", "local").owned();
        service.set_host("h.local", 8080);
        let packet = build_announcement(&service, 1, 0);
        engine.cache.write().unwrap().insert_announced(service.clone(), packet);

        let question = Packet::query(5, "_http._tcp.local", QueryType::Ptr, 0);
        engine.handle_inbound(question, 0);

        let response = engine.outbound.pop_front().expect("queued response");
        assert!(response.is_response());
        assert_eq!(response.answers.len(), 1);
    }

    #[tokio::test]
    async fn announce_stamps_the_service_with_configured_ttls_and_default_host() {
        let config = Config::default()
            .with_ttl_ptr(60)
            .unwrap()
            .with_ttl_srv(60)
            .unwrap()
            .with_ttl_txt(60)
            .unwrap()
            .with_ttl_a(60)
            .unwrap()
            .with_local_host_name("fallback.local");
        let (mut engine, _handle) = Engine::new(config, RecordingListener::default());
        let mut service = Service::new("MyWeb", "_http._tcp", "local").owned();
        service.port = Some(8080);
        let fqdn = service.fqdn.clone();

        let (tx, rx) = oneshot::channel();
        engine.handle_command(Command::Announce(service, tx), 0).await;

        let pending = engine.pending_probes.iter().find(|p| p.fqdn == fqdn).unwrap();
        assert_eq!(pending.service.ttl.ptr, 60);
        assert_eq!(pending.service.ttl.srv, 60);
        assert_eq!(pending.service.ttl.txt, 60);
        assert_eq!(pending.service.ttl.a, 60);
        assert_eq!(pending.service.host.as_deref(), Some("fallback.local"));

        drop(rx);
    }

    #[tokio::test]
    async fn probe_completes_after_three_silent_rounds_and_announces() {
        let (mut engine, _handle) = Engine::new(Config::default(), RecordingListener::default());
        let mut service = Service::new("MyWeb", "_http._tcp", "local").owned();
        service.set_host("h.local", 8080);
        let fqdn = service.fqdn.clone();

        let (tx, rx) = oneshot::channel();
        engine.handle_command(Command::Announce(service, tx), 0).await;
        assert_eq!(engine.pending_probes.len(), 1);

        engine.drive_pending_probes(0).await;
        engine.drive_pending_probes(250).await;
        engine.drive_pending_probes(500).await;

        assert!(engine.pending_probes.is_empty());
        assert!(rx.await.unwrap());
        assert!(engine.cache.read().unwrap().is_announced(&fqdn));
    }

    #[tokio::test]
    async fn probe_aborts_when_a_conflicting_response_arrives() {
        let (mut engine, _handle) = Engine::new(Config::default(), RecordingListener::default());
        let mut service = Service::new("MyWeb", "_http._tcp", "local").owned();
        service.set_host("h.local", 8080);
        let fqdn = service.fqdn.clone();

        let (tx, rx) = oneshot::channel();
        engine.handle_command(Command::Announce(service, tx), 0).await;

        let conflicting = Packet {
            answers: vec![Record::new(
                &fqdn,
                120,
                RecordData::Srv {
                    priority: 0,
                    weight: 0,
                    port: 1,
                    target: "other.local".to_owned(),
                },
            )],
            ..Packet::query(99, "x", QueryType::Any, 0)
        };
        engine.handle_inbound(conflicting, 10);

        assert!(engine.pending_probes.is_empty());
        assert!(!rx.await.unwrap());
    }

    #[tokio::test]
    async fn announce_is_refused_for_an_already_heard_fqdn() {
        let (mut engine, _handle) = Engine::new(Config::default(), RecordingListener::default());
        engine
            .cache
            .write()
            .unwrap()
            .insert_heard(Service::new("MyWeb", "_http._tcp", "local"));

        let service = Service::new("MyWeb", "_http._tcp", "local").owned();
        let (tx, rx) = oneshot::channel();
        engine.handle_command(Command::Announce(service, tx), 0).await;

        assert!(engine.pending_probes.is_empty());
        assert!(!rx.await.unwrap());
    }

    #[tokio::test]
    async fn unannounce_queues_a_goodbye_with_every_ttl_zeroed() {
        let (mut engine, _handle) = Engine::new(Config::default(), RecordingListener::default());
        let mut service = Service::new("MyWeb", "_http._tcp", "local").owned();
        service.set_host("h.local", 8080);
        let packet = build_announcement(&service, 1, 0);
        engine.cache.write().unwrap().insert_announced(service.clone(), packet);

        let (tx, rx) = oneshot::channel();
        engine
            .handle_command(Command::Unannounce(service.fqdn.clone(), tx), 0)
            .await;

        assert!(rx.await.unwrap());
        let goodbye = engine.outbound.pop_front().expect("queued goodbye");
        assert!(goodbye.answers.iter().all(|record| record.ttl == 0));
        assert!(!engine.cache.read().unwrap().is_announced(&service.fqdn));
    }

    #[tokio::test]
    async fn wipe_text_expiry_nulls_text_without_dropping_the_service() {
        let (mut engine, _handle) = Engine::new(Config::default(), RecordingListener::default());
        let mut service = Service::new("MyWeb", "_http._tcp", "local");
        service.set_host("h.local", 8080);
        service.set_text(vec![("path".to_owned(), Some("/a".to_owned()))]);
        engine.cache.write().unwrap().insert_heard(service);

        engine
            .apply_expiry_action(ExpiryAction::WipeText {
                fqdn: "MyWeb._http._tcp.local".to_owned(),
            })
            .await;

        let cache = engine.cache.read().unwrap();
        let service = cache.heard("MyWeb._http._tcp.local").unwrap();
        assert!(service.text.is_none());
    }

    #[tokio::test]
    async fn remove_host_address_expiry_strips_the_address_from_every_matching_service() {
        let (mut engine, _handle) = Engine::new(Config::default(), RecordingListener::default());
        let addr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10));
        let mut service = Service::new("MyWeb", "_http._tcp", "local");
        service.set_host("h.local", 8080);
        service.add_address(addr, InterfaceId::new("eth0"));
        engine.cache.write().unwrap().insert_heard(service);

        engine
            .apply_expiry_action(ExpiryAction::RemoveHostAddress {
                host: "h.local".to_owned(),
                addr,
            })
            .await;

        let cache = engine.cache.read().unwrap();
        let service = cache.heard("MyWeb._http._tcp.local").unwrap();
        assert!(!service.addresses.contains_key(&addr));
    }

    #[test]
    fn recv_any_with_no_sockets_never_resolves_on_the_first_poll() {
        let sockets: Vec<(InterfaceId, Arc<UdpSocket>)> = Vec::new();
        let mut future = Box::pin(recv_any(&sockets));
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);
        assert!(matches!(future.as_mut().poll(&mut cx), std::task::Poll::Pending));
    }
}
