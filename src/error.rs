use std::net::IpAddr;

use thiserror::Error;

use crate::dns::ParseError;
use crate::dns::name::DomainName;
use crate::dnssec::DnsSecError;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Query for {name} timed out")]
    Timeout { name: String },

    #[error("No nameservers configured on resolver")]
    NoNameservers,

    #[error("All nameservers failed for {name}: {reason}")]
    AllServersFailed { name: String, reason: String },

    #[error("Cannot use local resolver: {0}")]
    LocalResolver(String),

    #[error("No packet received for {0}, aborting")]
    NoResponse(DomainName),

    #[error("Could not find the nameserver ip addr for {0}; abort")]
    NoNameserverAddress(DomainName),

    #[error("Error adding new nameservers: {0}")]
    ServerSet(String),

    #[error("Invalid nameserver address: {0}")]
    InvalidServerAddress(IpAddr),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Trusted keys: {0}")]
    KeyFile(#[from] DnsSecError),

    #[error("Cannot render report: {0}")]
    Output(#[from] serde_json::Error),
}

impl From<std::io::Error> for TraceError {
    fn from(err: std::io::Error) -> Self {
        TraceError::Io(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid local server: {0}")]
    InvalidLocalServer(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid retry count: {0}")]
    InvalidRetries(String),

    #[error("Invalid IP family: {0}")]
    InvalidIpFamily(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, TraceError>;
