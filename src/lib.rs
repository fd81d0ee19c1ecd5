//! mDNS / DNS-Service-Discovery responder and resolver core.
//!
//! This crate is a thin facade over the engine workspace: `mdns-wire`'s
//! codec, `mdns-cache`'s service cache, `mdns-net`'s interface manager and
//! `mdns-engine`'s single-task I/O loop. Building a `Service` and driving
//! [`Engine::run`] on a Tokio runtime is left to the embedding application.

pub use mdns_cache::{CacheHandle, Service, ServiceTtls, TextRecord};
pub use mdns_engine::{
    answer_questions, build_announcement, build_goodbye, integrate, Command, Config, ConfigError,
    Engine, EngineHandle, Error, IntegrationOutcome, Listener, NoopListener, PendingProbe,
};
pub use mdns_net::{InterfaceEntry, QUARANTINE_MS};
pub use mdns_wire::{InterfaceId, Packet, QueryType, Question, Record, RecordData};

/// Initializes a `tracing-subscriber` `fmt` layer driven by `RUST_LOG`.
/// Left for the embedding binary (out of scope here) or tests to call; the
/// engine itself only ever emits through `tracing`, never configures a
/// subscriber on its own.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, registry, EnvFilter};

    let _ = registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_ansi(cfg!(debug_assertions)))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use std::collections::HashSet;

    /// No interfaces match an empty allow-list, so `reconcile()` never
    /// opens a real socket — keeps these tests hermetic.
    fn interfaceless_config() -> Config {
        Config::default().with_network_interfaces(HashSet::new())
    }

    #[tokio::test]
    async fn engine_runs_and_shuts_down_cleanly_on_close() {
        let (engine, handle) = Engine::new(interfaceless_config(), NoopListener);
        let task = tokio::spawn(engine.run());
        handle.close().expect("close channel still open");
        task.await.expect("engine task should not panic");
    }

    #[tokio::test]
    async fn announce_then_unannounce_round_trips_through_the_handle() {
        let (engine, handle) = Engine::new(interfaceless_config(), NoopListener);
        let task = tokio::spawn(engine.run());

        let mut service = Service::new("MyWeb", "_http._tcp", "local").owned();
        service.set_host("h.local", 8080);
        let fqdn = service.fqdn.clone();

        let announced = handle.announce(service).await.expect("engine still running");
        assert!(announced, "probing on an interface-less engine never conflicts");
        let fqdns: Vec<String> = handle.cache().announced().iter().map(|s| s.fqdn.clone()).collect();
        assert_eq!(fqdns, vec![fqdn.clone()]);

        let unannounced = handle.unannounce(fqdn).await.expect("engine still running");
        assert!(unannounced);

        handle.close().expect("close channel still open");
        task.await.expect("engine task should not panic");
    }
}
