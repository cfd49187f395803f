pub mod algorithm;
pub mod digest;
pub mod errors;
pub mod key_tag;
pub mod matcher;
pub mod trust_anchor;

pub use algorithm::DnsSecAlgorithm;
pub use digest::{DigestType, ds_digest, ds_from_dnskey};
pub use errors::DnsSecError;
pub use key_tag::{calculate_key_tag, record_key_tag};
pub use matcher::{compare_ds, ds_key_match};
pub use trust_anchor::{load_trusted_keys, root_trust_anchors};

/// DNSKEY flag bits (RFC 4034 2.1.1, RFC 5011)
pub mod flags {
    pub const ZONE_KEY: u16 = 0x0100;
    pub const SECURE_ENTRY_POINT: u16 = 0x0001;
    pub const REVOKE: u16 = 0x0080;
}
