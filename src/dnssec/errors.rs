use thiserror::Error;

/// Errors raised while loading or comparing DNSSEC key material
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DnsSecError {
    #[error("Cannot read key file {path}: {reason}")]
    KeyFileRead { path: String, reason: String },

    #[error("Key file {path}, line {line}: {reason}")]
    KeyFileSyntax {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("No DNSKEY or DS records found in {0}")]
    NoKeys(String),

    #[error("Unsupported digest type: {0}")]
    UnsupportedDigestType(u8),

    #[error("Record is not a DNSKEY: {0}")]
    NotAKey(String),
}

pub type Result<T> = std::result::Result<T, DnsSecError>;
