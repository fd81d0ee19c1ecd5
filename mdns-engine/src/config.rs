use std::collections::HashSet;

use mdns_cache::ServiceTtls;

/// Builder-rejected range for any per-record TTL.
const TTL_RANGE: std::ops::RangeInclusive<u32> = 5..=86_400;

const DEFAULT_TTL_PTR: u32 = 28_800;
const DEFAULT_TTL_SRV: u32 = 120;
const DEFAULT_TTL_TXT: u32 = 4_500;
const DEFAULT_TTL_A: u32 = 120;

#[derive(Debug)]
pub enum ConfigError {
    TtlOutOfRange { field: &'static str, value: u32 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TtlOutOfRange { field, value } => {
                write!(f, "{field} of {value}s is outside the allowed [5, 86400] range")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Engine configuration. Not file/env driven by design: every option is a
/// plain field set through `with_*` builder methods, since there's nothing
/// here to read from disk.
#[derive(Debug, Clone)]
pub struct Config {
    pub domain: String,
    pub local_host_name: String,
    pub ipv4_enabled: bool,
    pub ipv6_enabled: bool,
    pub network_interfaces: Option<HashSet<String>>,
    pub ttl_ptr: u32,
    pub ttl_srv: u32,
    pub ttl_txt: u32,
    pub ttl_a: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: "local".to_owned(),
            local_host_name: default_host_name(),
            ipv4_enabled: true,
            ipv6_enabled: true,
            network_interfaces: None,
            ttl_ptr: DEFAULT_TTL_PTR,
            ttl_srv: DEFAULT_TTL_SRV,
            ttl_txt: DEFAULT_TTL_TXT,
            ttl_a: DEFAULT_TTL_A,
        }
    }
}

impl Config {
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_local_host_name(mut self, name: impl Into<String>) -> Self {
        self.local_host_name = name.into();
        self
    }

    pub fn with_ipv4_enabled(mut self, enabled: bool) -> Self {
        self.ipv4_enabled = enabled;
        self
    }

    pub fn with_ipv6_enabled(mut self, enabled: bool) -> Self {
        self.ipv6_enabled = enabled;
        self
    }

    pub fn with_network_interfaces(mut self, names: HashSet<String>) -> Self {
        self.network_interfaces = Some(names);
        self
    }

    pub fn with_ttl_ptr(mut self, ttl: u32) -> Result<Self, ConfigError> {
        self.ttl_ptr = validate_ttl("ttl_ptr", ttl)?;
        Ok(self)
    }

    pub fn with_ttl_srv(mut self, ttl: u32) -> Result<Self, ConfigError> {
        self.ttl_srv = validate_ttl("ttl_srv", ttl)?;
        Ok(self)
    }

    pub fn with_ttl_txt(mut self, ttl: u32) -> Result<Self, ConfigError> {
        self.ttl_txt = validate_ttl("ttl_txt", ttl)?;
        Ok(self)
    }

    pub fn with_ttl_a(mut self, ttl: u32) -> Result<Self, ConfigError> {
        self.ttl_a = validate_ttl("ttl_a", ttl)?;
        Ok(self)
    }

    /// The DNS-SD enumeration name, e.g. `_services._dns-sd._udp.local`.
    pub fn dns_sd_enumeration_name(&self) -> String {
        format!("_services._dns-sd._udp.{}", self.domain)
    }

    /// The per-record TTLs configured here, ready to stamp onto a service
    /// at announce time.
    pub fn service_ttls(&self) -> ServiceTtls {
        ServiceTtls {
            ptr: self.ttl_ptr,
            srv: self.ttl_srv,
            txt: self.ttl_txt,
            a: self.ttl_a,
        }
    }

    /// Appends the configured domain to a bare `_svc._proto` type, leaving
    /// already-qualified types (with a second dot) untouched. A helper for
    /// callers building a [`mdns_cache::Service`] from a bare type string
    /// before constructing it; the engine itself never calls this since
    /// `Service::new` already takes the domain as an explicit argument.
    pub fn qualify_type(&self, service_type: &str) -> String {
        if service_type.matches('.').count() >= 2 {
            service_type.to_owned()
        } else {
            format!("{}.{}", service_type, self.domain)
        }
    }
}

fn validate_ttl(field: &'static str, value: u32) -> Result<u32, ConfigError> {
    if TTL_RANGE.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::TtlOutOfRange { field, value })
    }
}

fn default_host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttls_match_spec() {
        let config = Config::default();
        assert_eq!(config.ttl_ptr, 28_800);
        assert_eq!(config.ttl_srv, 120);
        assert_eq!(config.ttl_txt, 4_500);
        assert_eq!(config.ttl_a, 120);
    }

    #[test]
    fn ttl_builder_rejects_out_of_range() {
        assert!(Config::default().with_ttl_srv(2).is_err());
        assert!(Config::default().with_ttl_srv(100_000).is_err());
        assert!(Config::default().with_ttl_srv(60).is_ok());
    }

    #[test]
    fn qualify_type_appends_domain_only_when_missing() {
        let config = Config::default().with_domain("local");
        assert_eq!(config.qualify_type("_http._tcp"), "_http._tcp.local");
        assert_eq!(config.qualify_type("_http._tcp.local"), "_http._tcp.local");
    }
}
