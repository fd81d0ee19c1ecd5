use crate::buffer::{reader::ReaderError, writer::WriterError, BytePacketBuffer};

/// Set on responses; clear on questions/announcements probes.
pub const FLAG_RESPONSE: u16 = 1 << 15;
/// Set on authoritative answers (every response the responder itself sends).
pub const FLAG_AUTHORITATIVE: u16 = 1 << 10;

/// The fixed 12-byte envelope in front of the four record sections.
///
/// Only bit 15 (response) and bit 10 (authoritative) of `flags` carry
/// meaning to this engine; the remaining bits are preserved verbatim on a
/// decode/encode round-trip but otherwise untouched, since this is a
/// multicast responder and not a full recursive resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
    pub questions: u16,
    pub answers: u16,
    pub authorities: u16,
    pub additionals: u16,
}

impl Header {
    pub fn is_response(&self) -> bool {
        self.flags & FLAG_RESPONSE != 0
    }

    pub fn is_authoritative(&self) -> bool {
        self.flags & FLAG_AUTHORITATIVE != 0
    }

    pub fn set_response(&mut self, value: bool) {
        self.set_flag(FLAG_RESPONSE, value);
    }

    pub fn set_authoritative(&mut self, value: bool) {
        self.set_flag(FLAG_AUTHORITATIVE, value);
    }

    fn set_flag(&mut self, bit: u16, value: bool) {
        if value {
            self.flags |= bit;
        } else {
            self.flags &= !bit;
        }
    }

    pub fn read(buffer: &mut BytePacketBuffer) -> Result<Self, ReaderError> {
        Ok(Self {
            id: buffer.read_u16()?,
            flags: buffer.read_u16()?,
            questions: buffer.read_u16()?,
            answers: buffer.read_u16()?,
            authorities: buffer.read_u16()?,
            additionals: buffer.read_u16()?,
        })
    }

    pub fn write(&self, buffer: &mut BytePacketBuffer) -> Result<(), WriterError> {
        buffer.write_u16(self.id)?;
        buffer.write_u16(self.flags)?;
        buffer.write_u16(self.questions)?;
        buffer.write_u16(self.answers)?;
        buffer.write_u16(self.authorities)?;
        buffer.write_u16(self.additionals)?;
        Ok(())
    }
}
