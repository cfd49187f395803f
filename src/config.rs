use crate::dns::constants::DNS_PORT;
use crate::error::ConfigError;
use crate::resolver::{IpFamily, ResolverSettings};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const RESOLV_CONF: &str = "/etc/resolv.conf";

#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// Recursive resolvers used for the sanity check and NS bootstrap lookups
    pub local_servers: Vec<IpAddr>,

    /// Destination port for every query
    pub port: u16,

    /// Timeout for a single query to a single server
    pub timeout: Duration,

    /// Retries per server before moving on to the next one
    pub retries: u8,

    /// Use TCP instead of UDP
    pub use_tcp: bool,

    /// Address families servers may be contacted on
    pub ip_family: IpFamily,

    /// Shuffle the server set before each query
    pub randomize: bool,

    /// Give up after the first failing server instead of trying the rest
    pub fail_fast: bool,

    /// Verbose resolver logging
    pub debug: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        let local_servers = read_resolv_conf(Path::new(RESOLV_CONF));
        Self {
            local_servers: if local_servers.is_empty() {
                fallback_local_servers()
            } else {
                local_servers
            },
            port: DNS_PORT,
            timeout: Duration::from_secs(5),
            retries: 2,
            use_tcp: false,
            ip_family: IpFamily::Any,
            randomize: true,
            fail_fast: false,
            debug: false,
        }
    }
}

fn fallback_local_servers() -> Vec<IpAddr> {
    vec![
        "1.1.1.1".parse().expect("Cloudflare DNS is valid"),
        "8.8.8.8".parse().expect("Google DNS is valid"),
    ]
}

impl TraceConfig {
    /// Create a TraceConfig from environment variables
    /// Returns Err if critical configuration is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(servers) = std::env::var("SECURETRACE_LOCAL_SERVERS") {
            config.local_servers = parse_server_list(&servers)?;
        }

        if let Ok(port) = std::env::var("SECURETRACE_PORT") {
            config.port = port
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }

        if let Ok(timeout_str) = std::env::var("SECURETRACE_TIMEOUT") {
            let timeout_secs = timeout_str
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(timeout_str.clone()))?;
            config.timeout = Duration::from_secs(timeout_secs);
        }

        if let Ok(retries) = std::env::var("SECURETRACE_RETRIES") {
            config.retries = retries
                .parse::<u8>()
                .map_err(|_| ConfigError::InvalidRetries(retries.clone()))?;
        }

        if let Ok(use_tcp) = std::env::var("SECURETRACE_USE_TCP") {
            config.use_tcp = parse_bool(&use_tcp, false);
        }

        if let Ok(family) = std::env::var("SECURETRACE_IP_FAMILY") {
            config.ip_family = family
                .parse()
                .map_err(|_| ConfigError::InvalidIpFamily(family.clone()))?;
        }

        if let Ok(randomize) = std::env::var("SECURETRACE_RANDOMIZE") {
            config.randomize = parse_bool(&randomize, true);
        }

        if let Ok(fail_fast) = std::env::var("SECURETRACE_FAIL_FAST") {
            config.fail_fast = parse_bool(&fail_fast, false);
        }

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_servers.is_empty() {
            return Err(ConfigError::InvalidLocalServer(
                "No local servers configured".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort("Port must be greater than 0".to_string()));
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if self.timeout.as_secs() > 300 {
            return Err(ConfigError::InvalidTimeout(
                "Timeout too large (max 300 seconds)".to_string(),
            ));
        }

        if self.retries > 10 {
            return Err(ConfigError::InvalidRetries(
                "Retry count too large (max 10)".to_string(),
            ));
        }

        if !self.local_servers.iter().any(|addr| self.ip_family.allows(addr)) {
            return Err(ConfigError::InvalidLocalServer(format!(
                "No local server usable with IP family {}",
                self.ip_family
            )));
        }

        Ok(())
    }

    /// Transport settings for the local (recursive) resolver
    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            ip_family: self.ip_family,
            port: self.port,
            debug: self.debug,
            fail_fast: self.fail_fast,
            use_tcp: self.use_tcp,
            randomize: self.randomize,
            recursive: true,
            dnssec: false,
            timeout: self.timeout,
            retries: self.retries,
        }
    }
}

/// Read `nameserver` lines from a resolv.conf style file. A missing or
/// unreadable file yields an empty list.
pub fn read_resolv_conf(path: &Path) -> Vec<IpAddr> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            debug!("Cannot read {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                // Drop IPv6 zone ids such as fe80::1%eth0
                (Some("nameserver"), Some(addr)) => addr.split('%').next()?.parse().ok(),
                _ => None,
            }
        })
        .collect()
}

fn parse_server_list(servers: &str) -> Result<Vec<IpAddr>, ConfigError> {
    let servers = servers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpAddr>()
                .map_err(|_| ConfigError::InvalidLocalServer(s.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if servers.is_empty() {
        return Err(ConfigError::InvalidLocalServer(
            "No valid local servers provided".to_string(),
        ));
    }
    Ok(servers)
}

/// Parse a boolean from a string, with a default value for invalid input
fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}

/// The well-known root server addresses the trace starts from.
///
/// Read-only once built; the trace engine takes it by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootHints {
    addresses: Vec<IpAddr>,
}

impl RootHints {
    pub fn new(addresses: Vec<IpAddr>) -> Self {
        Self { addresses }
    }

    pub fn addresses(&self) -> &[IpAddr] {
        &self.addresses
    }
}

impl Default for RootHints {
    fn default() -> Self {
        // a.root-servers.net through m.root-servers.net
        const ROOTS: [&str; 26] = [
            "198.41.0.4",
            "2001:503:ba3e::2:30",
            "170.247.170.2",
            "2801:1b8:10::b",
            "192.33.4.12",
            "2001:500:2::c",
            "199.7.91.13",
            "2001:500:2d::d",
            "192.203.230.10",
            "2001:500:a8::e",
            "192.5.5.241",
            "2001:500:2f::f",
            "192.112.36.4",
            "2001:500:12::d0d",
            "198.97.190.53",
            "2001:500:1::53",
            "192.36.148.17",
            "2001:7fe::53",
            "192.58.128.30",
            "2001:503:c27::2:30",
            "193.0.14.129",
            "2001:7fd::1",
            "199.7.83.42",
            "2001:500:9f::42",
            "202.12.27.33",
            "2001:dc3::35",
        ];
        Self {
            addresses: ROOTS
                .iter()
                .map(|addr| addr.parse().expect("root hint address is valid"))
                .collect(),
        }
    }
}
