use std::net::IpAddr;

use mdns_cache::{ExpiryAction, ExpiryKey, ExpiryWheel, Service, ServiceCache};
use mdns_wire::packet::question::QueryType;
use mdns_wire::packet::record::{Record, RecordData};
use mdns_wire::{InterfaceId, Packet};

/// What changed in the cache during one `integrate` call, for the engine to
/// turn into listener notifications.
#[derive(Debug, Default)]
pub struct IntegrationOutcome {
    pub type_named: Vec<String>,
    pub service_named: Vec<(String, String)>,
    pub new_services: Vec<String>,
    pub modified_services: Vec<String>,
    /// Name/semantic errors encountered while integrating this packet: a
    /// malformed SRV fqdn, or a PTR whose rdata doesn't end with its own
    /// type. Neither aborts integration of the rest of the packet; the
    /// engine turns each of these into a `packetError` notification.
    pub errors: Vec<String>,
}

/// Runs the fixed six-pass integration order over one inbound packet:
/// PTR-answers, PTR-additionals, SRV-answers, SRV-additionals,
/// other-answers, other-additionals. SRV must follow PTR so a
/// freshly-learned type/name pair already exists by the time a matching SRV
/// tries to create the service; TXT/address must follow SRV so they never
/// create a service on their own.
pub fn integrate(
    packet: &Packet,
    cache: &mut ServiceCache,
    expiry: &mut ExpiryWheel,
    now_ms: u64,
    enumeration_name: &str,
) -> IntegrationOutcome {
    let mut outcome = IntegrationOutcome::default();

    for record in ptr_records(&packet.answers) {
        process_ptr(record, cache, expiry, now_ms, enumeration_name, &mut outcome);
    }
    for record in ptr_records(&packet.additionals) {
        process_ptr(record, cache, expiry, now_ms, enumeration_name, &mut outcome);
    }
    for record in srv_records(&packet.answers) {
        process_srv(record, cache, expiry, now_ms, &mut outcome);
    }
    for record in srv_records(&packet.additionals) {
        process_srv(record, cache, expiry, now_ms, &mut outcome);
    }
    for record in &packet.answers {
        process_other(record, cache, expiry, now_ms, packet.nic.as_ref(), &mut outcome);
    }
    for record in &packet.additionals {
        process_other(record, cache, expiry, now_ms, packet.nic.as_ref(), &mut outcome);
    }

    outcome.modified_services.retain(|fqdn| !outcome.new_services.contains(fqdn));
    let mut seen = std::collections::HashSet::new();
    outcome.modified_services.retain(|fqdn| seen.insert(fqdn.clone()));
    outcome
}

fn ptr_records(records: &[Record]) -> impl Iterator<Item = &Record> {
    records.iter().filter(|record| record.query_type() == QueryType::Ptr)
}

fn srv_records(records: &[Record]) -> impl Iterator<Item = &Record> {
    records.iter().filter(|record| record.query_type() == QueryType::Srv)
}

fn process_ptr(
    record: &Record,
    cache: &mut ServiceCache,
    expiry: &mut ExpiryWheel,
    now_ms: u64,
    enumeration_name: &str,
    outcome: &mut IntegrationOutcome,
) {
    let RecordData::Ptr(rdata) = &record.data else { return };
    let expiring = record.ttl == 0;

    if record.name.eq_ignore_ascii_case(enumeration_name) {
        let type_fqdn = rdata.clone();
        if !cache.heard_types().contains(&type_fqdn) && !expiring {
            cache.add_heard_type(type_fqdn.clone());
            outcome.type_named.push(type_fqdn.clone());
        }
        expiry.schedule(
            ExpiryKey::ServiceType(type_fqdn.clone()),
            record.ttl,
            now_ms,
            ExpiryAction::ExpireServiceType { type_fqdn },
        );
        return;
    }

    // A PTR naming a type: `record.name` is the type, `rdata` the instance fqdn.
    let type_fqdn = record.name.clone();
    let fqdn = rdata.clone();

    if !cache.heard_types().contains(&type_fqdn) && !expiring {
        cache.add_heard_type(type_fqdn.clone());
        outcome.type_named.push(type_fqdn.clone());
    }
    expiry.schedule(
        ExpiryKey::ServiceType(type_fqdn.clone()),
        record.ttl,
        now_ms,
        ExpiryAction::ExpireServiceType {
            type_fqdn: type_fqdn.clone(),
        },
    );

    if !fqdn.to_ascii_lowercase().ends_with(&type_fqdn.to_ascii_lowercase()) {
        outcome
            .errors
            .push(format!("PTR rdata '{fqdn}' does not end with its type '{type_fqdn}'"));
        return;
    }

    if !cache.heard_names().contains(&fqdn) && !expiring {
        cache.add_heard_name(fqdn.clone());
        outcome.service_named.push((type_fqdn.clone(), instance_name(&fqdn, &type_fqdn)));
    }
    expiry.schedule(
        ExpiryKey::ServiceName(fqdn.clone()),
        record.ttl,
        now_ms,
        ExpiryAction::ExpireServiceName { type_fqdn, fqdn },
    );
}

fn process_srv(record: &Record, cache: &mut ServiceCache, expiry: &mut ExpiryWheel, now_ms: u64, outcome: &mut IntegrationOutcome) {
    let RecordData::Srv { port, target, .. } = &record.data else { return };
    let fqdn = record.name.clone();
    let expiring = record.ttl == 0;

    if cache.is_announced(&fqdn) {
        if !expiring {
            let refresh_secs = (record.ttl * 9 / 10).min(record.ttl.saturating_sub(5));
            expiry.schedule(
                ExpiryKey::Service(fqdn.clone()),
                refresh_secs,
                now_ms,
                ExpiryAction::ReannounceService { fqdn },
            );
        }
        return;
    }

    let is_new = !cache.is_heard(&fqdn);
    if is_new {
        if expiring {
            return;
        }
        match split_fqdn(&fqdn) {
            Some((name, service_type, domain)) => {
                cache.insert_heard(Service::new(name, service_type, domain));
                outcome.new_services.push(fqdn.clone());
            }
            None => {
                outcome
                    .errors
                    .push(format!("SRV fqdn '{fqdn}' cannot be split into (instance, type, domain)"));
                return;
            }
        }
    }

    if let Some(service) = cache.heard_mut(&fqdn) {
        let changed = service.set_host(target.clone(), *port);
        if changed && !is_new {
            outcome.modified_services.push(fqdn.clone());
        }
    }

    if expiring {
        cache.remove_heard(&fqdn);
        expiry.cancel(&ExpiryKey::Service(fqdn));
    } else {
        expiry.schedule(
            ExpiryKey::Service(fqdn.clone()),
            record.ttl,
            now_ms,
            ExpiryAction::ExpireService { fqdn },
        );
    }
}

fn process_other(
    record: &Record,
    cache: &mut ServiceCache,
    expiry: &mut ExpiryWheel,
    now_ms: u64,
    nic: Option<&InterfaceId>,
    outcome: &mut IntegrationOutcome,
) {
    match &record.data {
        RecordData::Txt(entries) => process_txt(record, entries, cache, expiry, now_ms, outcome),
        RecordData::A(addr) => process_address(record, IpAddr::V4(*addr), cache, expiry, now_ms, nic, outcome),
        RecordData::Aaaa(addr) => process_address(record, IpAddr::V6(*addr), cache, expiry, now_ms, nic, outcome),
        // Ptr/Srv already integrated above; Cname/Nsec/Unknown pass through untouched.
        _ => {}
    }
}

fn process_txt(
    record: &Record,
    entries: &[(String, Option<String>)],
    cache: &mut ServiceCache,
    expiry: &mut ExpiryWheel,
    now_ms: u64,
    outcome: &mut IntegrationOutcome,
) {
    let fqdn = record.name.clone();
    if cache.is_announced(&fqdn) {
        return;
    }
    if let Some(service) = cache.heard_mut(&fqdn) {
        if service.set_text(entries.to_vec()) {
            outcome.modified_services.push(fqdn.clone());
        }
    }
    expiry.schedule(ExpiryKey::Text(fqdn.clone()), record.ttl, now_ms, ExpiryAction::WipeText { fqdn });
}

fn process_address(
    record: &Record,
    addr: IpAddr,
    cache: &mut ServiceCache,
    expiry: &mut ExpiryWheel,
    now_ms: u64,
    nic: Option<&InterfaceId>,
    outcome: &mut IntegrationOutcome,
) {
    let host = record.name.clone();
    let expiring = record.ttl == 0;
    let nic = nic.cloned().unwrap_or_else(|| InterfaceId::new(""));

    let mut any_match = false;
    for service in cache.heard_iter_mut() {
        if service.host.as_deref() != Some(host.as_str()) {
            continue;
        }
        any_match = true;
        if !expiring && service.add_address(addr, nic.clone()) {
            outcome.modified_services.push(service.fqdn.clone());
        }
    }

    if !any_match {
        return;
    }

    if expiring {
        expiry.cancel(&ExpiryKey::HostAddress(host, addr));
    } else {
        expiry.schedule(
            ExpiryKey::HostAddress(host.clone(), addr),
            record.ttl,
            now_ms,
            ExpiryAction::RemoveHostAddress { host, addr },
        );
    }
}

/// Strips the `.{type_fqdn}` suffix off an instance fqdn, returning just
/// the bare instance name.
fn instance_name(fqdn: &str, type_fqdn: &str) -> String {
    fqdn.strip_suffix(&format!(".{type_fqdn}")).unwrap_or(fqdn).to_owned()
}

/// Splits an instance fqdn into (name, `_service._proto`, domain). Returns
/// `None` when the name doesn't carry a two-label, underscore-prefixed
/// service type.
fn split_fqdn(fqdn: &str) -> Option<(String, String, String)> {
    let parts: Vec<&str> = fqdn.split('.').collect();
    if parts.len() < 4 {
        return None;
    }
    let domain = parts[parts.len() - 1];
    let proto = parts[parts.len() - 2];
    let svc = parts[parts.len() - 3];
    if !proto.starts_with('_') || !svc.starts_with('_') {
        return None;
    }
    let name = parts[..parts.len() - 3].join(".");
    if name.is_empty() {
        return None;
    }
    Some((name, format!("{svc}.{proto}"), domain.to_owned()))
}
