//! Binary mDNS/DNS wire codec and immutable packet model.
//!
//! Decoding and encoding both run through a [`buffer::BytePacketBuffer`];
//! [`packet::Packet`] is the immutable, serde-debuggable value the rest of
//! the responder works with once a datagram has been parsed.

pub mod buffer;
pub mod interface;
pub mod packet;

pub use buffer::{reader::ReaderError, writer::WriterError, BytePacketBuffer, MAX_PACKET_SIZE};
pub use interface::InterfaceId;
pub use packet::{
    header::Header,
    question::{Question, QueryType, CLASS_IN, UNICAST_RESPONSE_FLAG},
    record::{Record, RecordData, CACHE_FLUSH_FLAG},
    NicSubnet, Packet,
};
