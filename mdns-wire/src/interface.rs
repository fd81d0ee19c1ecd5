use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a network interface the engine is cooperating with.
///
/// Kept as a thin newtype over the OS-reported interface name rather than
/// an index: names are stable across the address changes the topology
/// reconciler watches for, while indices are not guaranteed to be.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceId(String);

impl InterfaceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for InterfaceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for InterfaceId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
