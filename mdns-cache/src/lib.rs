//! TTL-indexed cache of heard/announced mDNS services and the coalescing
//! expiry wheel driving it.
//!
//! [`ServiceCache`] is owned exclusively by the engine thread; external
//! readers only ever see a [`CacheHandle`] snapshot copied out from behind
//! its lock. [`ExpiryWheel`] is the keyed, coalescing timer queue that
//! drives TTL expiry and refresh callbacks.

pub mod cache;
pub mod expiry;
pub mod service;

pub use cache::{CacheHandle, ServiceCache};
pub use expiry::{ExpiryAction, ExpiryKey, ExpiryWheel};
pub use service::{Service, ServiceTtls, TextRecord};
