use std::net::IpAddr;

use mdns_cache::Service;
use mdns_wire::packet::record::{Record, RecordData};
use mdns_wire::Packet;

/// How many probe rounds are sent before a name is considered clear, and
/// the spacing between them.
pub const PROBE_ROUNDS: u8 = 3;
pub const PROBE_INTERVAL_MS: u64 = 250;

/// Builds the full announcement tuple for `service`: one PTR(type→fqdn),
/// one SRV(fqdn→host:port), one TXT(fqdn) as answers, plus one address
/// record per known address as additionals.
pub fn build_announcement(service: &Service, id: u16, timestamp: u64) -> Packet {
    let type_fqdn = service.type_fqdn();
    let host = service.host.clone().unwrap_or_else(|| service.fqdn.clone());
    let port = service.port.unwrap_or_default();

    let answers = vec![
        Record::new(type_fqdn, service.ttl.ptr, RecordData::Ptr(service.fqdn.clone()))
            .with_cache_flush(),
        Record::new(
            service.fqdn.clone(),
            service.ttl.srv,
            RecordData::Srv {
                priority: 0,
                weight: 0,
                port,
                target: host.clone(),
            },
        )
        .with_cache_flush(),
        Record::new(
            service.fqdn.clone(),
            service.ttl.txt,
            RecordData::Txt(service.text.clone().unwrap_or_default()),
        )
        .with_cache_flush(),
    ];

    let additionals = service
        .addresses
        .keys()
        .map(|addr| address_record(&host, *addr, service.ttl.a))
        .collect();

    Packet {
        id,
        flags: 0,
        questions: Vec::new(),
        answers,
        authorities: Vec::new(),
        additionals,
        nic: None,
        timestamp,
    }
}

fn address_record(host: &str, addr: IpAddr, ttl: u32) -> Record {
    let data = match addr {
        IpAddr::V4(addr) => RecordData::A(addr),
        IpAddr::V6(addr) => RecordData::Aaaa(addr),
    };
    Record::new(host, ttl, data).with_cache_flush()
}

/// A goodbye is the announcement packet with every record's TTL forced to
/// zero.
pub fn build_goodbye(announced: &Packet, timestamp: u64) -> Packet {
    Packet {
        answers: announced.answers.iter().map(Record::as_goodbye).collect(),
        authorities: announced.authorities.iter().map(Record::as_goodbye).collect(),
        additionals: announced.additionals.iter().map(Record::as_goodbye).collect(),
        timestamp,
        ..announced.clone()
    }
}

/// In-flight probe state for one `announce()` call: a bounded loop of three
/// rounds spaced 250ms apart. Driven by the engine's own loop rather than a
/// nested blocking wait, since the engine owns all mutable state and must
/// stay responsive to inbound packets while a probe is outstanding.
pub struct PendingProbe {
    pub fqdn: String,
    pub service: Service,
    pub rounds_sent: u8,
    pub next_send_at_ms: u64,
    pub reply: tokio::sync::oneshot::Sender<bool>,
}

impl PendingProbe {
    pub fn new(service: Service, now_ms: u64, reply: tokio::sync::oneshot::Sender<bool>) -> Self {
        Self {
            fqdn: service.fqdn.clone(),
            service,
            rounds_sent: 0,
            next_send_at_ms: now_ms,
            reply,
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.rounds_sent < PROBE_ROUNDS && self.next_send_at_ms <= now_ms
    }

    pub fn is_complete(&self) -> bool {
        self.rounds_sent >= PROBE_ROUNDS
    }

    pub fn record_round_sent(&mut self, now_ms: u64) {
        self.rounds_sent += 1;
        self.next_send_at_ms = now_ms + PROBE_INTERVAL_MS;
    }
}
