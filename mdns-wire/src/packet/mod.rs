pub mod header;
pub mod question;
pub mod record;

use std::fmt;
use std::net::IpAddr;

use serde::de::Deserializer;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::buffer::{reader::ReaderError, writer::WriterError, BytePacketBuffer};
use crate::interface::InterfaceId;
use header::{Header, FLAG_AUTHORITATIVE, FLAG_RESPONSE};
use question::{QueryType, Question};
use record::{Record, RecordData};

#[derive(Debug)]
pub enum PacketError {
    Reader(ReaderError),
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader(err) => write!(f, "malformed packet: {err}"),
        }
    }
}

impl std::error::Error for PacketError {}

impl From<ReaderError> for PacketError {
    fn from(value: ReaderError) -> Self {
        Self::Reader(value)
    }
}

/// One network's worth of address space for a given interface, used by
/// [`Packet::applied_to`] to decide which answers belong on which link.
#[derive(Debug, Clone)]
pub struct NicSubnet {
    pub nic: InterfaceId,
    pub network: IpAddr,
    pub prefix_len: u8,
}

impl NicSubnet {
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = mask32(self.prefix_len);
                (u32::from(net) & mask) == (u32::from(addr) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = mask128(self.prefix_len);
                (u128::from(net) & mask) == (u128::from(addr) & mask)
            }
            _ => false,
        }
    }
}

fn mask32(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len.min(32))
    }
}

fn mask128(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        u128::MAX << (128 - prefix_len.min(128))
    }
}

/// An immutable DNS message: header flags plus the four record sections.
/// Built once by a constructor and never mutated afterwards — `applied_to`
/// and the integrator both work by producing new packets rather than
/// editing one in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub id: u16,
    pub flags: u16,
    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
    pub authorities: Vec<Record>,
    pub additionals: Vec<Record>,
    pub nic: Option<InterfaceId>,
    pub timestamp: u64,
}

impl Packet {
    /// A question packet for `name`/`qtype`. When `qtype` is A or AAAA the
    /// other address family is asked for too, so a single round trip can
    /// return both.
    pub fn query(id: u16, name: impl Into<String>, qtype: QueryType, timestamp: u64) -> Self {
        let name = name.into();
        let mut questions = vec![Question::new(name.clone(), qtype)];
        match qtype {
            QueryType::A => questions.push(Question::new(name, QueryType::Aaaa)),
            QueryType::Aaaa => questions.push(Question::new(name, QueryType::A)),
            _ => {}
        }
        Self {
            id,
            flags: 0,
            questions,
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
            nic: None,
            timestamp,
        }
    }

    /// A response to `request`: inherits its id and nic, marked
    /// authoritative + response.
    pub fn response_to(
        request: &Packet,
        answers: Vec<Record>,
        additionals: Vec<Record>,
        timestamp: u64,
    ) -> Self {
        Self {
            id: request.id,
            flags: FLAG_RESPONSE | FLAG_AUTHORITATIVE,
            questions: Vec::new(),
            answers,
            authorities: Vec::new(),
            additionals,
            nic: request.nic.clone(),
            timestamp,
        }
    }

    pub fn is_response(&self) -> bool {
        self.flags & FLAG_RESPONSE != 0
    }

    pub fn is_authoritative(&self) -> bool {
        self.flags & FLAG_AUTHORITATIVE != 0
    }

    /// Parses a received datagram, tagging it with the interface it
    /// arrived on.
    pub fn decoded(
        bytes: &[u8],
        nic: Option<InterfaceId>,
        timestamp: u64,
    ) -> Result<Self, PacketError> {
        let mut buffer = BytePacketBuffer::from_received(bytes);
        let header = Header::read(&mut buffer)?;

        let mut questions = Vec::with_capacity(header.questions as usize);
        for _ in 0..header.questions {
            questions.push(Question::read(&mut buffer)?);
        }
        let mut answers = Vec::with_capacity(header.answers as usize);
        for _ in 0..header.answers {
            answers.push(Record::read(&mut buffer)?);
        }
        let mut authorities = Vec::with_capacity(header.authorities as usize);
        for _ in 0..header.authorities {
            authorities.push(Record::read(&mut buffer)?);
        }
        let mut additionals = Vec::with_capacity(header.additionals as usize);
        for _ in 0..header.additionals {
            additionals.push(Record::read(&mut buffer)?);
        }

        Ok(Self {
            id: header.id,
            flags: header.flags,
            questions,
            answers,
            authorities,
            additionals,
            nic,
            timestamp,
        })
    }

    /// Encodes into a fresh 64 KiB buffer, returning only the bytes
    /// actually written.
    pub fn encode(&self) -> Result<Vec<u8>, WriterError> {
        let mut buffer = BytePacketBuffer::default();
        let header = Header {
            id: self.id,
            flags: self.flags,
            questions: self.questions.len() as u16,
            answers: self.answers.len() as u16,
            authorities: self.authorities.len() as u16,
            additionals: self.additionals.len() as u16,
        };
        header.write(&mut buffer)?;
        for question in &self.questions {
            question.write(&mut buffer)?;
        }
        for record in self.answers.iter().chain(&self.authorities).chain(&self.additionals) {
            record.write(&mut buffer)?;
        }
        Ok(buffer.filled().to_vec())
    }

    /// A shallow clone restricted to the records that belong on `nic`:
    /// address-carrying records stay only on the nic whose subnet
    /// contains them, or go everywhere if no known nic claims that
    /// address. Returns `None` if every section would end up empty.
    pub fn applied_to(&self, nic: &InterfaceId, all_nics: &[NicSubnet]) -> Option<Self> {
        let filter = |records: &[Record]| -> Vec<Record> {
            records
                .iter()
                .filter(|record| record_applies(record, nic, all_nics))
                .cloned()
                .collect()
        };

        let answers = filter(&self.answers);
        let authorities = filter(&self.authorities);
        let additionals = filter(&self.additionals);

        if self.questions.is_empty() && answers.is_empty() && authorities.is_empty() && additionals.is_empty()
        {
            return None;
        }

        Some(Self {
            answers,
            authorities,
            additionals,
            nic: Some(nic.clone()),
            ..self.clone()
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

fn record_address(record: &Record) -> Option<IpAddr> {
    match &record.data {
        RecordData::A(addr) => Some(IpAddr::V4(*addr)),
        RecordData::Aaaa(addr) => Some(IpAddr::V6(*addr)),
        _ => None,
    }
}

fn record_applies(record: &Record, nic: &InterfaceId, all_nics: &[NicSubnet]) -> bool {
    let addr = match record_address(record) {
        Some(addr) => addr,
        // Questions, PTR, SRV, TXT: no address, always included.
        None => return true,
    };

    let claimed_by_any = all_nics.iter().any(|subnet| subnet.contains(addr));
    if !claimed_by_any {
        // No known nic's subnet contains this address: broadcast everywhere.
        return true;
    }
    all_nics
        .iter()
        .any(|subnet| &subnet.nic == nic && subnet.contains(addr))
}

impl Serialize for Packet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Packet", 10)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("flags", &self.flags)?;
        state.serialize_field("response", &self.is_response())?;
        state.serialize_field("authoritative", &self.is_authoritative())?;
        state.serialize_field("questions", &self.questions)?;
        state.serialize_field("answers", &self.answers)?;
        state.serialize_field("authorities", &self.authorities)?;
        state.serialize_field("additionals", &self.additionals)?;
        state.serialize_field("nic", &self.nic)?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.end()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PacketDto {
    id: u16,
    flags: u16,
    #[serde(default)]
    questions: Vec<Question>,
    #[serde(default)]
    answers: Vec<Record>,
    #[serde(default)]
    authorities: Vec<Record>,
    #[serde(default)]
    additionals: Vec<Record>,
    #[serde(default)]
    nic: Option<InterfaceId>,
    #[serde(default)]
    timestamp: u64,
}

impl<'de> Deserialize<'de> for Packet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let dto = PacketDto::deserialize(deserializer)?;
        Ok(Self {
            id: dto.id,
            flags: dto.flags,
            questions: dto.questions,
            answers: dto.answers,
            authorities: dto.authorities,
            additionals: dto.additionals,
            nic: dto.nic,
            timestamp: dto.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample_answer() -> Record {
        Record::new(
            "MyWeb._http._tcp.local",
            120,
            RecordData::Srv {
                priority: 0,
                weight: 0,
                port: 8080,
                target: "h.local".to_owned(),
            },
        )
    }

    #[test]
    fn query_for_a_also_asks_for_aaaa() {
        let packet = Packet::query(1, "h.local", QueryType::A, 0);
        assert_eq!(packet.questions.len(), 2);
        assert_eq!(packet.questions[0].qtype, QueryType::A);
        assert_eq!(packet.questions[1].qtype, QueryType::Aaaa);
    }

    #[test]
    fn response_to_inherits_id_and_nic() {
        let nic = InterfaceId::new("eth0");
        let mut request = Packet::query(7, "h.local", QueryType::Ptr, 0);
        request.nic = Some(nic.clone());
        let response = Packet::response_to(&request, vec![sample_answer()], vec![], 1);
        assert_eq!(response.id, 7);
        assert_eq!(response.nic, Some(nic));
        assert!(response.is_response());
        assert!(response.is_authoritative());
    }

    #[test]
    fn encode_decode_round_trips_a_response() {
        let nic = InterfaceId::new("eth0");
        let mut request = Packet::query(7, "h.local", QueryType::Ptr, 0);
        request.nic = Some(nic);
        let response = Packet::response_to(&request, vec![sample_answer()], vec![], 1);

        let bytes = response.encode().unwrap();
        let decoded = Packet::decoded(&bytes, response.nic.clone(), response.timestamp).unwrap();

        assert_eq!(decoded.id, response.id);
        assert_eq!(decoded.flags, response.flags);
        assert_eq!(decoded.answers, response.answers);
    }

    #[test]
    fn json_round_trips_to_an_equivalent_packet() {
        let nic = InterfaceId::new("eth0");
        let mut request = Packet::query(7, "h.local", QueryType::Ptr, 0);
        request.nic = Some(nic);
        let response = Packet::response_to(&request, vec![sample_answer()], vec![], 42);

        let text = response.to_json().unwrap();
        assert!(text.contains("\"response\":true"));
        let decoded = Packet::from_json(&text).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn applied_to_broadcasts_addresses_unknown_to_every_nic() {
        let eth0 = InterfaceId::new("eth0");
        let packet = Packet {
            id: 0,
            flags: 0,
            questions: Vec::new(),
            answers: vec![Record::new(
                "h.local",
                120,
                RecordData::A(Ipv4Addr::new(203, 0, 113, 5)),
            )],
            authorities: Vec::new(),
            additionals: Vec::new(),
            nic: None,
            timestamp: 0,
        };

        let subnets = vec![NicSubnet {
            nic: eth0.clone(),
            network: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 0)),
            prefix_len: 24,
        }];

        let applied = packet.applied_to(&eth0, &subnets).unwrap();
        assert_eq!(applied.answers, packet.answers);
    }

    #[test]
    fn applied_to_partitions_addresses_across_nics() {
        let eth0 = InterfaceId::new("eth0");
        let eth1 = InterfaceId::new("eth1");
        let on_eth0 = Record::new("h.local", 120, RecordData::A(Ipv4Addr::new(192, 0, 2, 10)));
        let on_eth1 = Record::new("h.local", 120, RecordData::A(Ipv4Addr::new(198, 51, 100, 10)));
        let packet = Packet {
            id: 0,
            flags: 0,
            questions: Vec::new(),
            answers: vec![on_eth0.clone(), on_eth1.clone()],
            authorities: Vec::new(),
            additionals: Vec::new(),
            nic: None,
            timestamp: 0,
        };

        let subnets = vec![
            NicSubnet {
                nic: eth0.clone(),
                network: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 0)),
                prefix_len: 24,
            },
            NicSubnet {
                nic: eth1.clone(),
                network: IpAddr::V4(Ipv4Addr::new(198, 51, 100, 0)),
                prefix_len: 24,
            },
        ];

        let applied_eth0 = packet.applied_to(&eth0, &subnets).unwrap();
        assert_eq!(applied_eth0.answers, vec![on_eth0]);

        let applied_eth1 = packet.applied_to(&eth1, &subnets).unwrap();
        assert_eq!(applied_eth1.answers, vec![on_eth1]);
    }

    #[test]
    fn applied_to_returns_none_when_every_section_empties() {
        let eth0 = InterfaceId::new("eth0");
        let eth1 = InterfaceId::new("eth1");
        let packet = Packet {
            id: 0,
            flags: 0,
            questions: Vec::new(),
            answers: vec![Record::new(
                "h.local",
                120,
                RecordData::A(Ipv4Addr::new(192, 0, 2, 10)),
            )],
            authorities: Vec::new(),
            additionals: Vec::new(),
            nic: None,
            timestamp: 0,
        };
        let subnets = vec![
            NicSubnet {
                nic: eth0,
                network: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 0)),
                prefix_len: 24,
            },
        ];
        assert!(packet.applied_to(&eth1, &subnets).is_none());
    }
}
