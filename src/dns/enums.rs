use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum DNSResourceType {
    #[default]
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    DNAME,
    OPT,
    DS,
    SSHFP,
    RRSIG,
    NSEC,
    DNSKEY,
    NSEC3,
    NSEC3PARAM,
    TLSA,
    CDS,
    CDNSKEY,
    HTTPS,
    AXFR,
    ANY,
    CAA,
    Unknown(u16),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum DNSResourceClass {
    #[default]
    IN,
    CS,
    CH,
    HS,
    NONE,
    ANY,
    Unknown(u16),
}

impl From<u16> for DNSResourceClass {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceClass::IN,
            2 => DNSResourceClass::CS,
            3 => DNSResourceClass::CH,
            4 => DNSResourceClass::HS,
            254 => DNSResourceClass::NONE,
            255 => DNSResourceClass::ANY,
            x => DNSResourceClass::Unknown(x),
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(class: DNSResourceClass) -> Self {
        match class {
            DNSResourceClass::IN => 1,
            DNSResourceClass::CS => 2,
            DNSResourceClass::CH => 3,
            DNSResourceClass::HS => 4,
            DNSResourceClass::NONE => 254,
            DNSResourceClass::ANY => 255,
            DNSResourceClass::Unknown(x) => x,
        }
    }
}

impl From<u16> for DNSResourceType {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceType::A,
            2 => DNSResourceType::NS,
            5 => DNSResourceType::CNAME,
            6 => DNSResourceType::SOA,
            12 => DNSResourceType::PTR,
            15 => DNSResourceType::MX,
            16 => DNSResourceType::TXT,
            28 => DNSResourceType::AAAA,
            33 => DNSResourceType::SRV,
            39 => DNSResourceType::DNAME,
            41 => DNSResourceType::OPT,
            43 => DNSResourceType::DS,
            44 => DNSResourceType::SSHFP,
            46 => DNSResourceType::RRSIG,
            47 => DNSResourceType::NSEC,
            48 => DNSResourceType::DNSKEY,
            50 => DNSResourceType::NSEC3,
            51 => DNSResourceType::NSEC3PARAM,
            52 => DNSResourceType::TLSA,
            59 => DNSResourceType::CDS,
            60 => DNSResourceType::CDNSKEY,
            65 => DNSResourceType::HTTPS,
            252 => DNSResourceType::AXFR,
            255 => DNSResourceType::ANY,
            257 => DNSResourceType::CAA,
            x => DNSResourceType::Unknown(x),
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(rtype: DNSResourceType) -> Self {
        match rtype {
            DNSResourceType::A => 1,
            DNSResourceType::NS => 2,
            DNSResourceType::CNAME => 5,
            DNSResourceType::SOA => 6,
            DNSResourceType::PTR => 12,
            DNSResourceType::MX => 15,
            DNSResourceType::TXT => 16,
            DNSResourceType::AAAA => 28,
            DNSResourceType::SRV => 33,
            DNSResourceType::DNAME => 39,
            DNSResourceType::OPT => 41,
            DNSResourceType::DS => 43,
            DNSResourceType::SSHFP => 44,
            DNSResourceType::RRSIG => 46,
            DNSResourceType::NSEC => 47,
            DNSResourceType::DNSKEY => 48,
            DNSResourceType::NSEC3 => 50,
            DNSResourceType::NSEC3PARAM => 51,
            DNSResourceType::TLSA => 52,
            DNSResourceType::CDS => 59,
            DNSResourceType::CDNSKEY => 60,
            DNSResourceType::HTTPS => 65,
            DNSResourceType::AXFR => 252,
            DNSResourceType::ANY => 255,
            DNSResourceType::CAA => 257,
            DNSResourceType::Unknown(x) => x,
        }
    }
}

impl fmt::Display for DNSResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // RFC 3597 generic notation
            DNSResourceType::Unknown(x) => write!(f, "TYPE{}", x),
            other => write!(f, "{:?}", other),
        }
    }
}

impl fmt::Display for DNSResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DNSResourceClass::Unknown(x) => write!(f, "CLASS{}", x),
            other => write!(f, "{:?}", other),
        }
    }
}

impl FromStr for DNSResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        if let Some(number) = upper.strip_prefix("TYPE") {
            return number
                .parse::<u16>()
                .map(DNSResourceType::from)
                .map_err(|_| format!("invalid record type: {}", s));
        }

        let rtype = match upper.as_str() {
            "A" => DNSResourceType::A,
            "NS" => DNSResourceType::NS,
            "CNAME" => DNSResourceType::CNAME,
            "SOA" => DNSResourceType::SOA,
            "PTR" => DNSResourceType::PTR,
            "MX" => DNSResourceType::MX,
            "TXT" => DNSResourceType::TXT,
            "AAAA" => DNSResourceType::AAAA,
            "SRV" => DNSResourceType::SRV,
            "DNAME" => DNSResourceType::DNAME,
            "DS" => DNSResourceType::DS,
            "SSHFP" => DNSResourceType::SSHFP,
            "RRSIG" => DNSResourceType::RRSIG,
            "NSEC" => DNSResourceType::NSEC,
            "DNSKEY" => DNSResourceType::DNSKEY,
            "NSEC3" => DNSResourceType::NSEC3,
            "NSEC3PARAM" => DNSResourceType::NSEC3PARAM,
            "TLSA" => DNSResourceType::TLSA,
            "CDS" => DNSResourceType::CDS,
            "CDNSKEY" => DNSResourceType::CDNSKEY,
            "HTTPS" => DNSResourceType::HTTPS,
            "AXFR" => DNSResourceType::AXFR,
            "ANY" => DNSResourceType::ANY,
            "CAA" => DNSResourceType::CAA,
            _ => return Err(format!("unknown record type: {}", s)),
        };
        Ok(rtype)
    }
}

impl FromStr for DNSResourceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        if let Some(number) = upper.strip_prefix("CLASS") {
            return number
                .parse::<u16>()
                .map(DNSResourceClass::from)
                .map_err(|_| format!("invalid record class: {}", s));
        }

        match upper.as_str() {
            "IN" => Ok(DNSResourceClass::IN),
            "CS" => Ok(DNSResourceClass::CS),
            "CH" => Ok(DNSResourceClass::CH),
            "HS" => Ok(DNSResourceClass::HS),
            "NONE" => Ok(DNSResourceClass::NONE),
            "ANY" => Ok(DNSResourceClass::ANY),
            _ => Err(format!("unknown record class: {}", s)),
        }
    }
}
