use serde::{Deserialize, Serialize};

use crate::buffer::{reader::ReaderError, writer::WriterError, BytePacketBuffer};

/// Bit 0x8000 of a question's class: "I'd accept a unicast reply".
/// Exposed to callers but never acted on by this responder.
pub const UNICAST_RESPONSE_FLAG: u16 = 0x8000;

/// The Internet class, as laid out on the wire.
pub const CLASS_IN: u16 = 1;

/// Record types this responder acts on, plus the wildcard. Anything else
/// round-trips through `Unknown` without the engine inspecting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryType {
    A,
    Ptr,
    Txt,
    Aaaa,
    Srv,
    Nsec,
    Cname,
    Any,
    Unknown(u16),
}

impl QueryType {
    pub fn to_num(self) -> u16 {
        match self {
            Self::A => 1,
            Self::Cname => 5,
            Self::Ptr => 12,
            Self::Txt => 16,
            Self::Aaaa => 28,
            Self::Srv => 33,
            Self::Nsec => 47,
            Self::Any => 255,
            Self::Unknown(n) => n,
        }
    }

    pub fn from_num(num: u16) -> Self {
        match num {
            1 => Self::A,
            5 => Self::Cname,
            12 => Self::Ptr,
            16 => Self::Txt,
            28 => Self::Aaaa,
            33 => Self::Srv,
            47 => Self::Nsec,
            255 => Self::Any,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub name: String,
    pub qtype: QueryType,
    pub qclass: u16,
}

impl Question {
    pub fn new(name: impl Into<String>, qtype: QueryType) -> Self {
        Self {
            name: name.into(),
            qtype,
            qclass: CLASS_IN,
        }
    }

    pub fn unicast_response(&self) -> bool {
        self.qclass & UNICAST_RESPONSE_FLAG != 0
    }

    pub fn read(buffer: &mut BytePacketBuffer) -> Result<Self, ReaderError> {
        let name = buffer.read_qname()?;
        let qtype = QueryType::from_num(buffer.read_u16()?);
        let qclass = buffer.read_u16()?;
        Ok(Self { name, qtype, qclass })
    }

    pub fn write(&self, buffer: &mut BytePacketBuffer) -> Result<(), WriterError> {
        buffer.write_qname(&self.name)?;
        buffer.write_u16(self.qtype.to_num())?;
        buffer.write_u16(self.qclass)?;
        Ok(())
    }
}
