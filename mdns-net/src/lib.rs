//! Per-interface multicast socket lifecycle and topology reconciliation.
//!
//! [`InterfaceManager`] owns every cooperating NIC's IPv4/IPv6 sockets,
//! reconciles them against the OS-reported address list on every engine
//! loop iteration, and quarantines interfaces whose sends start failing.

pub mod error;
pub mod interface;
pub mod manager;
pub mod scan;
pub mod socket;

pub use error::Error;
pub use interface::InterfaceEntry;
pub use manager::{InterfaceManager, QUARANTINE_MS};
pub use scan::ScannedInterface;
pub use socket::{MDNS_GROUP_V4, MDNS_GROUP_V6, MDNS_PORT};
