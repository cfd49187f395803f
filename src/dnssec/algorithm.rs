use std::fmt;
use std::str::FromStr;

/// DNSSEC Algorithm numbers (RFC 4034, 5155, 5702, 5933, 6605, 8080, 8624)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DnsSecAlgorithm {
    /// Delete DS (RFC 8078)
    DeleteDS = 0,
    /// RSA/MD5 (deprecated)
    RsaMd5 = 1,
    /// Diffie-Hellman (deprecated)
    DH = 2,
    /// DSA/SHA1 (RFC 2536)
    DSA = 3,
    /// RSA/SHA-1 (RFC 3110)
    RsaSha1 = 5,
    /// DSA-NSEC3-SHA1 (RFC 5155)
    DsaNsec3Sha1 = 6,
    /// RSASHA1-NSEC3-SHA1 (RFC 5155)
    RsaSha1Nsec3Sha1 = 7,
    /// RSA/SHA-256 (RFC 5702)
    RsaSha256 = 8,
    /// RSA/SHA-512 (RFC 5702)
    RsaSha512 = 10,
    /// GOST R 34.10-2001 (RFC 5933)
    EccGost = 12,
    /// ECDSA Curve P-256 with SHA-256 (RFC 6605)
    EcdsaP256Sha256 = 13,
    /// ECDSA Curve P-384 with SHA-384 (RFC 6605)
    EcdsaP384Sha384 = 14,
    Ed25519 = 15,
    Ed448 = 16,
    Indirect = 252,
    PrivateDNS = 253,
    PrivateOID = 254,
}

const ALGORITHMS: [DnsSecAlgorithm; 17] = [
    DnsSecAlgorithm::DeleteDS,
    DnsSecAlgorithm::RsaMd5,
    DnsSecAlgorithm::DH,
    DnsSecAlgorithm::DSA,
    DnsSecAlgorithm::RsaSha1,
    DnsSecAlgorithm::DsaNsec3Sha1,
    DnsSecAlgorithm::RsaSha1Nsec3Sha1,
    DnsSecAlgorithm::RsaSha256,
    DnsSecAlgorithm::RsaSha512,
    DnsSecAlgorithm::EccGost,
    DnsSecAlgorithm::EcdsaP256Sha256,
    DnsSecAlgorithm::EcdsaP384Sha384,
    DnsSecAlgorithm::Ed25519,
    DnsSecAlgorithm::Ed448,
    DnsSecAlgorithm::Indirect,
    DnsSecAlgorithm::PrivateDNS,
    DnsSecAlgorithm::PrivateOID,
];

impl DnsSecAlgorithm {
    /// Create from algorithm number
    pub fn from_u8(value: u8) -> Option<Self> {
        ALGORITHMS.iter().copied().find(|alg| alg.to_u8() == value)
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for DnsSecAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeleteDS => write!(f, "DELETE"),
            Self::RsaMd5 => write!(f, "RSAMD5"),
            Self::DH => write!(f, "DH"),
            Self::DSA => write!(f, "DSA"),
            Self::RsaSha1 => write!(f, "RSASHA1"),
            Self::DsaNsec3Sha1 => write!(f, "DSA-NSEC3-SHA1"),
            Self::RsaSha1Nsec3Sha1 => write!(f, "RSASHA1-NSEC3-SHA1"),
            Self::RsaSha256 => write!(f, "RSASHA256"),
            Self::RsaSha512 => write!(f, "RSASHA512"),
            Self::EccGost => write!(f, "ECC-GOST"),
            Self::EcdsaP256Sha256 => write!(f, "ECDSAP256SHA256"),
            Self::EcdsaP384Sha384 => write!(f, "ECDSAP384SHA384"),
            Self::Ed25519 => write!(f, "ED25519"),
            Self::Ed448 => write!(f, "ED448"),
            Self::Indirect => write!(f, "INDIRECT"),
            Self::PrivateDNS => write!(f, "PRIVATEDNS"),
            Self::PrivateOID => write!(f, "PRIVATEOID"),
        }
    }
}

impl FromStr for DnsSecAlgorithm {
    type Err = String;

    /// Accepts either the number or the mnemonic, as zone files may use both.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(number) = s.parse::<u8>() {
            return Self::from_u8(number).ok_or_else(|| format!("unknown algorithm: {}", s));
        }
        ALGORITHMS
            .iter()
            .copied()
            .find(|alg| alg.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown algorithm: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_round_trip() {
        assert_eq!(DnsSecAlgorithm::from_u8(13), Some(DnsSecAlgorithm::EcdsaP256Sha256));
        assert_eq!(DnsSecAlgorithm::from_u8(4), None);
        assert_eq!(DnsSecAlgorithm::RsaSha256.to_u8(), 8);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("8".parse(), Ok(DnsSecAlgorithm::RsaSha256));
        assert_eq!("ecdsap256sha256".parse(), Ok(DnsSecAlgorithm::EcdsaP256Sha256));
        assert!("RSAFOO".parse::<DnsSecAlgorithm>().is_err());
        assert!("200".parse::<DnsSecAlgorithm>().is_err());
    }
}
