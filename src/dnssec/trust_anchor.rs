//! Trusted key material: the built-in root anchor and key files.
//!
//! Key files hold DNSKEY or DS records in zone-file presentation format,
//! one record per line:
//!
//! ```text
//! ; root KSK
//! .  172800  IN  DNSKEY  257 3 8 AwEAAa...
//! example.com.  IN  DS  12345 13 2 3f6c...
//! ```

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use super::algorithm::DnsSecAlgorithm;
use super::errors::{DnsSecError, Result};
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::name::DomainName;
use crate::dns::resource::{DNSResource, RData};

/// Root KSK-2017 (key tag 20326)
const ROOT_KSK_2017: &str = "AwEAAaz/tAm8yTn4Mfeh5eyI96WSVexTBAvkMgJzkKTOiW1vkIbzxeF3\
+/4RgWOq7HrxRixHlFlExOLAJr5emLvN7SWXgnLh4+B5xQlNVz8Og8kv\
ArMtNROxVQuCaSnIDdD5LKyWbRd2n9WGe2R8PzgCmr3EgVLrjyBxWezF\
0jLHwVN8efS3rCj/EWgvIWgb9tarpVUDK/b58Da+sqqls3eNbuv7pr+e\
oZG+SrDK6nWeL3c6H5Apxz7LjVc1uTIdsIXxuOLYA4/ilBmSVIzuDWfd\
RUfhHdY6+cn8HFRm+2hM8AnXGXws9555KrUB5qihylGa8subX2Nn6UwN\
R1AkUTV74bU=";

const DEFAULT_TTL: u32 = 3600;

/// The IANA root trust anchor as a DNSKEY record.
pub fn root_trust_anchors() -> Vec<DNSResource> {
    let public_key = STANDARD
        .decode(ROOT_KSK_2017)
        .expect("built-in root key is valid base64");

    vec![DNSResource::new(
        DomainName::root(),
        DNSResourceClass::IN,
        172800,
        RData::DNSKEY {
            flags: 257,
            protocol: 3,
            algorithm: DnsSecAlgorithm::RsaSha256.to_u8(),
            public_key,
        },
    )]
}

/// Load every DNSKEY and DS record from a key file.
pub fn load_trusted_keys(path: &Path) -> Result<Vec<DNSResource>> {
    let path_str = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|e| DnsSecError::KeyFileRead {
        path: path_str.clone(),
        reason: e.to_string(),
    })?;

    let keys = parse_trusted_keys(&contents).map_err(|(line, reason)| {
        DnsSecError::KeyFileSyntax {
            path: path_str.clone(),
            line,
            reason,
        }
    })?;

    if keys.is_empty() {
        return Err(DnsSecError::NoKeys(path_str));
    }
    debug!("Loaded {} trusted keys from {}", keys.len(), path_str);
    Ok(keys)
}

/// Parse key file contents. Errors carry the 1-based line number.
pub fn parse_trusted_keys(contents: &str) -> std::result::Result<Vec<DNSResource>, (usize, String)> {
    let mut keys = Vec::new();
    for (index, raw) in contents.lines().enumerate() {
        let line = match raw.find(';') {
            Some(comment) => &raw[..comment],
            None => raw,
        };
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_key_line(line).map_err(|reason| (index + 1, reason))?;
        keys.push(record);
    }
    Ok(keys)
}

fn parse_key_line(line: &str) -> std::result::Result<DNSResource, String> {
    let mut tokens = line
        .split_whitespace()
        .filter(|token| *token != "(" && *token != ")");

    let owner: DomainName = tokens
        .next()
        .ok_or("missing owner name")?
        .parse()
        .map_err(|e| format!("bad owner name: {}", e))?;

    // TTL and class are optional and may come in either order
    let mut ttl = DEFAULT_TTL;
    let mut rclass = DNSResourceClass::IN;
    let rtype = loop {
        let token = tokens.next().ok_or("missing record type")?;
        if let Ok(value) = token.parse::<u32>() {
            ttl = value;
        } else if let Ok(class) = token.parse::<DNSResourceClass>() {
            rclass = class;
        } else {
            break token
                .parse::<DNSResourceType>()
                .map_err(|e| e.to_string())?;
        }
    };

    let fields: Vec<&str> = tokens.collect();
    let data = match rtype {
        DNSResourceType::DNSKEY => parse_dnskey_fields(&fields)?,
        DNSResourceType::DS => parse_ds_fields(&fields)?,
        other => return Err(format!("expected DNSKEY or DS, found {}", other)),
    };

    Ok(DNSResource::new(owner, rclass, ttl, data))
}

fn parse_algorithm(field: &str) -> std::result::Result<u8, String> {
    field.parse::<DnsSecAlgorithm>().map(DnsSecAlgorithm::to_u8)
}

fn parse_dnskey_fields(fields: &[&str]) -> std::result::Result<RData, String> {
    let [flags, protocol, algorithm, key @ ..] = fields else {
        return Err("DNSKEY needs flags, protocol, algorithm and key data".to_string());
    };
    if key.is_empty() {
        return Err("DNSKEY has no key data".to_string());
    }

    Ok(RData::DNSKEY {
        flags: flags.parse().map_err(|_| format!("bad flags: {}", flags))?,
        protocol: protocol
            .parse()
            .map_err(|_| format!("bad protocol: {}", protocol))?,
        algorithm: parse_algorithm(algorithm)?,
        public_key: STANDARD
            .decode(key.concat())
            .map_err(|e| format!("bad key data: {}", e))?,
    })
}

fn parse_ds_fields(fields: &[&str]) -> std::result::Result<RData, String> {
    let [key_tag, algorithm, digest_type, digest @ ..] = fields else {
        return Err("DS needs key tag, algorithm, digest type and digest".to_string());
    };
    if digest.is_empty() {
        return Err("DS has no digest".to_string());
    }

    Ok(RData::DS {
        key_tag: key_tag
            .parse()
            .map_err(|_| format!("bad key tag: {}", key_tag))?,
        algorithm: parse_algorithm(algorithm)?,
        digest_type: digest_type
            .parse()
            .map_err(|_| format!("bad digest type: {}", digest_type))?,
        digest: hex::decode(digest.concat()).map_err(|e| format!("bad digest: {}", e))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_root_anchor() {
        let anchors = root_trust_anchors();
        assert_eq!(anchors.len(), 1);
        assert!(anchors[0].name.is_root());
        assert_eq!(
            crate::dnssec::key_tag::record_key_tag(&anchors[0]),
            Some(20326)
        );
    }

    #[test]
    fn test_parse_lines() {
        let contents = "\
; trusted keys
example.com. 3600 IN DS 12345 13 2 3F6C 0A0B
example.com. IN 600 DNSKEY 257 3 ECDSAP256SHA256 AQID BAU=

.  DS 20326 8 2 e06d44b80b8f1d39a95c0b0d7c65d08458e880409bbc683457104237c7f8ec8d ; root
";
        let keys = parse_trusted_keys(contents).unwrap();
        assert_eq!(keys.len(), 3);

        assert_eq!(keys[0].rtype, DNSResourceType::DS);
        assert_eq!(keys[0].ttl, 3600);
        assert_eq!(
            keys[0].parsed_rdata,
            Some(RData::DS {
                key_tag: 12345,
                algorithm: 13,
                digest_type: 2,
                digest: vec![0x3f, 0x6c, 0x0a, 0x0b],
            })
        );

        assert_eq!(keys[1].ttl, 600);
        assert_eq!(
            keys[1].parsed_rdata,
            Some(RData::DNSKEY {
                flags: 257,
                protocol: 3,
                algorithm: 13,
                public_key: vec![1, 2, 3, 4, 5],
            })
        );

        assert!(keys[2].name.is_root());
        assert_eq!(keys[2].ttl, DEFAULT_TTL);
    }

    #[test]
    fn test_errors_carry_line_number() {
        let contents = "example.com. DS 1 13 2 aabb\nexample.com. A 192.0.2.1\n";
        let (line, reason) = parse_trusted_keys(contents).unwrap_err();
        assert_eq!(line, 2);
        assert!(reason.contains("expected DNSKEY or DS"));

        let (line, _) = parse_trusted_keys("\n\nexample.com. DS 1 13 2 zz\n").unwrap_err();
        assert_eq!(line, 3);

        let (_, reason) = parse_trusted_keys("example.com. DNSKEY 257 3\n").unwrap_err();
        assert!(reason.contains("DNSKEY needs"));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "example.org. IN DS 4242 8 2 00ff").unwrap();
        let keys = load_trusted_keys(file.path()).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name, "example.org.".parse().unwrap());
    }

    #[test]
    fn test_load_file_errors() {
        let empty = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            load_trusted_keys(empty.path()),
            Err(DnsSecError::NoKeys(_))
        ));

        assert!(matches!(
            load_trusted_keys(Path::new("/nonexistent/keys")),
            Err(DnsSecError::KeyFileRead { .. })
        ));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "; header").unwrap();
        writeln!(bad, "example.org. DNSKEY 257 3 8 !!!").unwrap();
        assert!(matches!(
            load_trusted_keys(bad.path()),
            Err(DnsSecError::KeyFileSyntax { line: 2, .. })
        ));
    }
}
