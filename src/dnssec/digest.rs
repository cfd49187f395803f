
use ring::digest;

use super::errors::{DnsSecError, Result};
use crate::dns::name::DomainName;
use crate::dns::resource::{DNSResource, RData};

/// DS digest type algorithms (RFC 4034, 4509, 5933, 6605)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DigestType {
    /// SHA-1 (RFC 3658)
    Sha1 = 1,
    /// SHA-256 (RFC 4509)
    Sha256 = 2,
    /// GOST R 34.11-94 (RFC 5933)
    Gost94 = 3,
    /// SHA-384 (RFC 6605)
    Sha384 = 4,
}

impl DigestType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Sha1),
            2 => Some(Self::Sha256),
            3 => Some(Self::Gost94),
            4 => Some(Self::Sha384),
            _ => None,
        }
    }

    /// Hash `data`, or `None` for digest types ring does not implement.
    pub fn digest(&self, data: &[u8]) -> Option<Vec<u8>> {
        let algorithm = match self {
            Self::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            Self::Sha256 => &digest::SHA256,
            Self::Sha384 => &digest::SHA384,
            Self::Gost94 => return None,
        };
        Some(digest::digest(algorithm, data).as_ref().to_vec())
    }
}

/// DS digest over a key: hash(canonical owner name | DNSKEY RDATA), RFC 4034 5.1.4
pub fn ds_digest(owner: &DomainName, dnskey_rdata: &[u8], digest_type: u8) -> Result<Vec<u8>> {
    let kind =
        DigestType::from_u8(digest_type).ok_or(DnsSecError::UnsupportedDigestType(digest_type))?;

    let mut data = owner.to_canonical_wire();
    data.extend_from_slice(dnskey_rdata);
    kind.digest(&data)
        .ok_or(DnsSecError::UnsupportedDigestType(digest_type))
}

/// Build the DS record a parent would publish for `dnskey`.
pub fn ds_from_dnskey(dnskey: &DNSResource, digest_type: u8) -> Result<DNSResource> {
    let Some(RData::DNSKEY { algorithm, .. }) = &dnskey.parsed_rdata else {
        return Err(DnsSecError::NotAKey(dnskey.to_string()));
    };

    let digest = ds_digest(&dnskey.name, &dnskey.rdata, digest_type)?;
    Ok(DNSResource::new(
        dnskey.name.clone(),
        dnskey.rclass,
        dnskey.ttl,
        RData::DS {
            key_tag: super::key_tag::key_tag_of(&dnskey.rdata),
            algorithm: *algorithm,
            digest_type,
            digest,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnssec::trust_anchor::root_trust_anchors;

    #[test]
    fn test_root_ksk_ds() {
        // Published root DS for KSK-2017: 20326 8 2 e06d44b8...
        let anchors = root_trust_anchors();
        let ksk = anchors
            .iter()
            .find(|rr| rr.rtype == crate::dns::enums::DNSResourceType::DNSKEY)
            .unwrap();
        let ds = ds_from_dnskey(ksk, 2).unwrap();

        match ds.parsed_rdata {
            Some(RData::DS {
                key_tag,
                algorithm,
                digest_type,
                ref digest,
            }) => {
                assert_eq!(key_tag, 20326);
                assert_eq!(algorithm, 8);
                assert_eq!(digest_type, 2);
                assert_eq!(
                    hex::encode(digest),
                    "e06d44b80b8f1d39a95c0b0d7c65d08458e880409bbc683457104237c7f8ec8d"
                );
            }
            other => panic!("expected DS, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_digest_type() {
        let owner: DomainName = "example.".parse().unwrap();
        assert_eq!(
            ds_digest(&owner, &[1, 2, 3], 3),
            Err(DnsSecError::UnsupportedDigestType(3))
        );
        assert_eq!(
            ds_digest(&owner, &[1, 2, 3], 9),
            Err(DnsSecError::UnsupportedDigestType(9))
        );
        assert_eq!(ds_digest(&owner, &[1, 2, 3], 1).unwrap().len(), 20);
        assert_eq!(ds_digest(&owner, &[1, 2, 3], 4).unwrap().len(), 48);
    }
}
