use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use super::question::{QueryType, CLASS_IN};
use crate::buffer::{reader::ReaderError, writer::WriterError, BytePacketBuffer};

/// Set on every record this responder creates; the read side preserves
/// whatever the network actually sent.
pub const CACHE_FLUSH_FLAG: u16 = 0x8000;

/// Type-tagged record payload. `Cname` and `Nsec` are decoded so the
/// engine can see them pass through the integrator untouched, rather than
/// round-tripping as opaque bytes (whose embedded compression pointers
/// would otherwise point at the wrong offsets once re-encoded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ptr(String),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    /// Ordered `key` / `key=value` pairs; empty keys are dropped on decode.
    Txt(Vec<(String, Option<String>)>),
    Cname(String),
    Nsec(Vec<u8>),
    Unknown { qtype: u16, data: Vec<u8> },
}

impl RecordData {
    pub fn query_type(&self) -> QueryType {
        match self {
            Self::A(_) => QueryType::A,
            Self::Aaaa(_) => QueryType::Aaaa,
            Self::Ptr(_) => QueryType::Ptr,
            Self::Srv { .. } => QueryType::Srv,
            Self::Txt(_) => QueryType::Txt,
            Self::Cname(_) => QueryType::Cname,
            Self::Nsec(_) => QueryType::Nsec,
            Self::Unknown { qtype, .. } => QueryType::Unknown(*qtype),
        }
    }
}

/// A single resource record: a name, a class, a TTL and a type-specific
/// payload. Questions are modelled separately ([`super::question::Question`])
/// since they carry no TTL/rdata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub class: u16,
    pub ttl: u32,
    pub data: RecordData,
}

impl Record {
    pub fn new(name: impl Into<String>, ttl: u32, data: RecordData) -> Self {
        Self {
            name: name.into(),
            class: CLASS_IN,
            ttl,
            data,
        }
    }

    /// Records this responder originates are announced cache-flush, class
    /// IN (wire value `0x8001`).
    pub fn with_cache_flush(mut self) -> Self {
        self.class |= CACHE_FLUSH_FLAG;
        self
    }

    pub fn cache_flush(&self) -> bool {
        self.class & CACHE_FLUSH_FLAG != 0
    }

    pub fn query_type(&self) -> QueryType {
        self.data.query_type()
    }

    /// A goodbye is the same record with its TTL forced to zero.
    pub fn as_goodbye(&self) -> Self {
        Self {
            ttl: 0,
            ..self.clone()
        }
    }

    pub fn read(buffer: &mut BytePacketBuffer) -> Result<Self, ReaderError> {
        let name = buffer.read_qname()?;
        let qtype = QueryType::from_num(buffer.read_u16()?);
        let class = buffer.read_u16()?;
        let ttl = buffer.read_u32()?;
        let rdlen = buffer.read_u16()? as usize;
        let rdata_end = buffer.pos() + rdlen;

        let data = match qtype {
            QueryType::A => {
                let bytes = buffer.read_bytes(4)?;
                RecordData::A(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))
            }
            QueryType::Aaaa => {
                let bytes = buffer.read_bytes(16)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&bytes);
                RecordData::Aaaa(Ipv6Addr::from(octets))
            }
            QueryType::Ptr => RecordData::Ptr(buffer.read_qname()?),
            QueryType::Cname => RecordData::Cname(buffer.read_qname()?),
            QueryType::Srv => {
                let priority = buffer.read_u16()?;
                let weight = buffer.read_u16()?;
                let port = buffer.read_u16()?;
                let target = buffer.read_qname()?;
                RecordData::Srv {
                    priority,
                    weight,
                    port,
                    target,
                }
            }
            QueryType::Txt => {
                let mut entries = Vec::new();
                while buffer.pos() < rdata_end {
                    let len = buffer.read()? as usize;
                    let bytes = buffer.read_bytes(len)?;
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    if text.is_empty() {
                        continue;
                    }
                    match text.split_once('=') {
                        Some((key, _)) if key.is_empty() => continue,
                        Some((key, value)) => entries.push((key.to_owned(), Some(value.to_owned()))),
                        None => entries.push((text, None)),
                    }
                }
                RecordData::Txt(entries)
            }
            QueryType::Nsec => RecordData::Nsec(buffer.read_bytes(rdlen)?),
            QueryType::Any | QueryType::Unknown(_) => RecordData::Unknown {
                qtype: qtype.to_num(),
                data: buffer.read_bytes(rdlen)?,
            },
        };

        // A malformed record claiming a shorter rdlen than its own
        // fixed-size payload would otherwise leave the cursor short of
        // rdata_end; realign so the next record in the section starts in
        // the right place.
        if buffer.pos() < rdata_end {
            buffer.step(rdata_end - buffer.pos())?;
        }

        Ok(Self {
            name,
            class,
            ttl,
            data,
        })
    }

    pub fn write(&self, buffer: &mut BytePacketBuffer) -> Result<(), WriterError> {
        buffer.write_qname(&self.name)?;
        buffer.write_u16(self.query_type().to_num())?;
        buffer.write_u16(self.class)?;
        buffer.write_u32(self.ttl)?;

        let rdlen_pos = buffer.pos;
        buffer.write_u16(0)?;
        let rdata_start = buffer.pos;

        match &self.data {
            RecordData::A(addr) => buffer.write_bytes(&addr.octets())?,
            RecordData::Aaaa(addr) => buffer.write_bytes(&addr.octets())?,
            RecordData::Ptr(name) => buffer.write_qname(name)?,
            RecordData::Cname(name) => buffer.write_qname(name)?,
            RecordData::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                buffer.write_u16(*priority)?;
                buffer.write_u16(*weight)?;
                buffer.write_u16(*port)?;
                buffer.write_qname(target)?;
            }
            RecordData::Txt(entries) => {
                if entries.is_empty() {
                    buffer.write_u8(0)?;
                } else {
                    for (key, value) in entries {
                        let text = match value {
                            Some(value) => format!("{key}={value}"),
                            None => key.clone(),
                        };
                        if text.len() > 0xFF {
                            return Err(WriterError::TxtEntryTooLong(text.len()));
                        }
                        buffer.write_u8(text.len() as u8)?;
                        buffer.write_bytes(text.as_bytes())?;
                    }
                }
            }
            RecordData::Nsec(bytes) | RecordData::Unknown { data: bytes, .. } => {
                buffer.write_bytes(bytes)?;
            }
        }

        let rdlen = (buffer.pos - rdata_start) as u16;
        buffer.set_u16(rdlen_pos, rdlen)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn round_trip(record: &Record) -> Record {
        let mut buffer = BytePacketBuffer::default();
        record.write(&mut buffer).unwrap();
        buffer.pos = 0;
        Record::read(&mut buffer).unwrap()
    }

    #[test]
    fn should_round_trip_a_record() {
        let record = Record::new("h.local", 120, RecordData::A(Ipv4Addr::new(192, 0, 2, 10)))
            .with_cache_flush();
        let decoded = round_trip(&record);
        assert_eq!(decoded, record);
        assert!(decoded.cache_flush());
    }

    #[test]
    fn should_round_trip_srv_record() {
        let record = Record::new(
            "MyWeb._http._tcp.local",
            120,
            RecordData::Srv {
                priority: 0,
                weight: 0,
                port: 8080,
                target: "h.local".to_owned(),
            },
        );
        assert_eq!(round_trip(&record), record);
    }

    #[test]
    fn should_round_trip_txt_with_key_value_pairs() {
        let record = Record::new(
            "MyWeb._http._tcp.local",
            4500,
            RecordData::Txt(vec![("path".to_owned(), Some("/path/to/service".to_owned()))]),
        );
        assert_eq!(round_trip(&record), record);
    }

    #[test]
    fn empty_txt_rdata_is_a_single_zero_byte() {
        let record = Record::new("a.local", 4500, RecordData::Txt(Vec::new()));
        let mut buffer = BytePacketBuffer::default();
        record.write(&mut buffer).unwrap();
        // name(2) + type(2) + class(2) + ttl(4) + rdlen(2) + rdata(1)
        assert_eq!(buffer.pos, 2 + 2 + 2 + 4 + 2 + 1);
        assert_eq!(round_trip(&record), record);
    }

    #[test]
    fn txt_decode_skips_empty_keys() {
        let mut buffer = BytePacketBuffer::default();
        buffer.write_qname("a.local").unwrap();
        buffer.write_u16(QueryType::Txt.to_num()).unwrap();
        buffer.write_u16(CLASS_IN).unwrap();
        buffer.write_u32(4500).unwrap();
        buffer.write_u16(2).unwrap(); // rdlen: one zero-length string entry
        buffer.write_u8(0).unwrap();
        buffer.write_u8(0).unwrap();
        buffer.pos = 0;
        let record = Record::read(&mut buffer).unwrap();
        assert_eq!(record.data, RecordData::Txt(Vec::new()));
    }

    #[test]
    fn txt_decode_skips_entries_with_an_empty_key_before_the_equals() {
        let mut buffer = BytePacketBuffer::default();
        buffer.write_qname("a.local").unwrap();
        buffer.write_u16(QueryType::Txt.to_num()).unwrap();
        buffer.write_u16(CLASS_IN).unwrap();
        buffer.write_u32(4500).unwrap();
        let entry = b"=value";
        buffer.write_u16(entry.len() as u16 + 1).unwrap();
        buffer.write_u8(entry.len() as u8).unwrap();
        for byte in entry {
            buffer.write_u8(*byte).unwrap();
        }
        buffer.pos = 0;
        let record = Record::read(&mut buffer).unwrap();
        assert_eq!(record.data, RecordData::Txt(Vec::new()));
    }

    #[test]
    fn cname_and_nsec_decode_without_interpretation() {
        let cname = Record::new("alias.local", 60, RecordData::Cname("canonical.local".to_owned()));
        assert_eq!(round_trip(&cname), cname);

        let nsec = Record::new("h.local", 60, RecordData::Nsec(vec![0x00, 0x01, 0x04]));
        assert_eq!(round_trip(&nsec), nsec);
    }
}
