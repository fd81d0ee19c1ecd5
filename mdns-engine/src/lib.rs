//! Single-task mDNS I/O loop: pairs `mdns-cache`'s service cache/expiry
//! wheel and `mdns-net`'s interface manager with the answer generator and
//! probe/announce/goodbye state machine defined here.

pub mod announce;
pub mod answer;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod integrator;

pub use answer::answer_questions;
pub use announce::{build_announcement, build_goodbye, PendingProbe, PROBE_INTERVAL_MS, PROBE_ROUNDS};
pub use config::{Config, ConfigError};
pub use engine::{Command, Engine, EngineHandle};
pub use error::Error;
pub use event::{Listener, NoopListener};
pub use integrator::{integrate, IntegrationOutcome};
