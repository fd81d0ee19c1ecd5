use mdns_cache::Service;
use mdns_wire::packet::question::QueryType;
use mdns_wire::packet::record::{Record, RecordData};
use mdns_wire::Packet;

/// Builds the response to `request` against the currently announced
/// services, or `None` if nothing in `request` matched anything announced.
pub fn answer_questions(
    request: &Packet,
    announced: &[(Service, Packet)],
    enumeration_name: &str,
) -> Option<Packet> {
    let mut answers: Vec<Record> = Vec::new();
    let mut additionals: Vec<Record> = Vec::new();

    for question in &request.questions {
        if question.name.eq_ignore_ascii_case(enumeration_name)
            && matches!(question.qtype, QueryType::Ptr | QueryType::Any)
        {
            answers.extend(enumeration_answers(announced, enumeration_name));
            continue;
        }

        for (_, packet) in announced {
            for record in &packet.answers {
                if !record.name.eq_ignore_ascii_case(&question.name) {
                    continue;
                }
                if question.qtype != QueryType::Any && question.qtype != record.query_type() {
                    continue;
                }
                answers.push(record.clone());
                additionals.extend(additionals_for(question, record, packet));
            }
        }
    }

    if answers.is_empty() {
        return None;
    }

    dedupe_against(&mut additionals, &answers);
    Some(Packet::response_to(request, answers, additionals, request.timestamp))
}

/// One PTR per distinct announced type, under `_services._dns-sd._udp.local`,
/// TTL'd to the longest-lived PTR among that type's announced instances.
fn enumeration_answers(announced: &[(Service, Packet)], enumeration_name: &str) -> Vec<Record> {
    let mut ttl_by_type: std::collections::HashMap<String, u32> = std::collections::HashMap::new();
    for (service, _) in announced {
        let type_fqdn = service.type_fqdn();
        let ttl = ttl_by_type.entry(type_fqdn).or_insert(0);
        *ttl = (*ttl).max(service.ttl.ptr);
    }

    ttl_by_type
        .into_iter()
        .map(|(type_fqdn, ttl)| Record::new(enumeration_name, ttl, RecordData::Ptr(type_fqdn)).with_cache_flush())
        .collect()
}

/// DNS-SD additionals for one matched answer (RFC 6763 §12): a PTR
/// pulls in its service's SRV/TXT/address; an SRV pulls in its
/// address/TXT. Only applies when the question itself was not ANY — an ANY
/// query already gets every record type back as a direct answer elsewhere
/// in the loop over questions.
fn additionals_for(question: &mdns_wire::packet::question::Question, record: &Record, packet: &Packet) -> Vec<Record> {
    if question.qtype == QueryType::Any {
        return Vec::new();
    }

    match &record.data {
        RecordData::Ptr(fqdn) => {
            let mut extra = Vec::new();
            if let Some(srv) = find_answer(packet, fqdn, |data| matches!(data, RecordData::Srv { .. })) {
                if let RecordData::Srv { target, .. } = &srv.data {
                    extra.extend(address_records(packet, target));
                }
                extra.push(srv.clone());
            }
            if let Some(txt) = find_answer(packet, fqdn, |data| matches!(data, RecordData::Txt(_))) {
                extra.push(txt.clone());
            }
            extra
        }
        RecordData::Srv { target, .. } => {
            let mut extra = address_records(packet, target);
            if let Some(txt) = find_answer(packet, &record.name, |data| matches!(data, RecordData::Txt(_))) {
                extra.push(txt.clone());
            }
            extra
        }
        _ => Vec::new(),
    }
}

fn find_answer<'a>(packet: &'a Packet, name: &str, matches_type: impl Fn(&RecordData) -> bool) -> Option<&'a Record> {
    packet
        .answers
        .iter()
        .find(|record| record.name.eq_ignore_ascii_case(name) && matches_type(&record.data))
}

fn address_records(packet: &Packet, host: &str) -> Vec<Record> {
    packet
        .additionals
        .iter()
        .filter(|record| {
            record.name.eq_ignore_ascii_case(host) && matches!(record.data, RecordData::A(_) | RecordData::Aaaa(_))
        })
        .cloned()
        .collect()
}

fn dedupe_against(additionals: &mut Vec<Record>, answers: &[Record]) {
    additionals.retain(|record| !answers.contains(record));
    let mut seen = Vec::new();
    additionals.retain(|record| {
        if seen.contains(record) {
            false
        } else {
            seen.push(record.clone());
            true
        }
    });
}
