use std::fmt;

use mdns_wire::packet::PacketError;

/// Manual `Display`/`From` error enum composing the lower crates' own
/// error types rather than reaching for `thiserror` in a crate this size.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Net(mdns_net::Error),
    Packet(PacketError),
    /// The engine loop has already been asked to shut down.
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "engine i/o error: {err}"),
            Self::Net(err) => write!(f, "interface error: {err}"),
            Self::Packet(err) => write!(f, "packet error: {err}"),
            Self::Closed => write!(f, "engine is closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<mdns_net::Error> for Error {
    fn from(value: mdns_net::Error) -> Self {
        Self::Net(value)
    }
}

impl From<PacketError> for Error {
    fn from(value: PacketError) -> Self {
        Self::Packet(value)
    }
}
