use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};
use serde::{Serialize, Serializer};

use super::{
    ParseError,
    common::{PacketComponent, read_name_at},
    enums::{DNSResourceClass, DNSResourceType},
    name::DomainName,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSResource {
    pub name: DomainName,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    /// Uncompressed RDATA; names inside it never carry compression pointers.
    pub rdata: Vec<u8>,
    pub parsed_rdata: Option<RData>,
}

/// Decoded RDATA for the record types the trace looks at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    NS(DomainName),
    CNAME(DomainName),
    PTR(DomainName),
    MX {
        preference: u16,
        exchange: DomainName,
    },
    SOA {
        mname: DomainName,
        rname: DomainName,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    TXT(Vec<Vec<u8>>),
    DS {
        key_tag: u16,
        algorithm: u8,
        digest_type: u8,
        digest: Vec<u8>,
    },
    DNSKEY {
        flags: u16,
        protocol: u8,
        algorithm: u8,
        public_key: Vec<u8>,
    },
    RRSIG {
        type_covered: DNSResourceType,
        algorithm: u8,
        labels: u8,
        original_ttl: u32,
        expiration: u32,
        inception: u32,
        key_tag: u16,
        signer_name: DomainName,
        signature: Vec<u8>,
    },
    NSEC {
        next_domain: DomainName,
        type_bitmaps: Vec<u8>,
    },
}

impl DNSResource {
    pub fn new(
        name: DomainName,
        rclass: DNSResourceClass,
        ttl: u32,
        data: RData,
    ) -> Self {
        Self {
            name,
            rtype: data.rtype(),
            rclass,
            ttl,
            rdata: data.to_wire(),
            parsed_rdata: Some(data),
        }
    }

    /// The address carried by an A or AAAA record.
    pub fn address(&self) -> Option<IpAddr> {
        match self.parsed_rdata {
            Some(RData::A(ip)) => Some(IpAddr::V4(ip)),
            Some(RData::AAAA(ip)) => Some(IpAddr::V6(ip)),
            _ => None,
        }
    }

    /// The nameserver host of an NS record.
    pub fn ns_target(&self) -> Option<&DomainName> {
        match &self.parsed_rdata {
            Some(RData::NS(target)) => Some(target),
            _ => None,
        }
    }
}

impl PacketComponent for DNSResource {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        self.write_name(writer, &self.name)?;
        writer.write_var::<u16>(16, self.rtype.into())?;
        writer.write_var::<u16>(16, self.rclass.into())?;
        writer.write_var::<u32>(32, self.ttl)?;
        writer.write_var::<u16>(16, self.rdata.len() as u16)?;
        writer.write_bytes(&self.rdata)?;
        Ok(())
    }

    fn read<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet_buf: &[u8],
    ) -> Result<(), ParseError> {
        self.name = self.read_name(reader, packet_buf)?;
        self.rtype = reader.read_var::<u16>(16)?.into();
        self.rclass = reader.read_var::<u16>(16)?.into();
        self.ttl = reader.read_var::<u32>(32)?;
        let rdlength = reader.read_var::<u16>(16)?;
        let mut raw = vec![0_u8; rdlength as usize];
        reader.read_bytes(&mut raw)?;

        match RData::decode(self.rtype, &raw, packet_buf)? {
            Some(data) => {
                self.rdata = data.to_wire();
                self.parsed_rdata = Some(data);
            }
            None => {
                self.rdata = raw;
                self.parsed_rdata = None;
            }
        }

        Ok(())
    }
}

impl RData {
    pub fn rtype(&self) -> DNSResourceType {
        match self {
            RData::A(_) => DNSResourceType::A,
            RData::AAAA(_) => DNSResourceType::AAAA,
            RData::NS(_) => DNSResourceType::NS,
            RData::CNAME(_) => DNSResourceType::CNAME,
            RData::PTR(_) => DNSResourceType::PTR,
            RData::MX { .. } => DNSResourceType::MX,
            RData::SOA { .. } => DNSResourceType::SOA,
            RData::TXT(_) => DNSResourceType::TXT,
            RData::DS { .. } => DNSResourceType::DS,
            RData::DNSKEY { .. } => DNSResourceType::DNSKEY,
            RData::RRSIG { .. } => DNSResourceType::RRSIG,
            RData::NSEC { .. } => DNSResourceType::NSEC,
        }
    }

    /// Decodes `raw` as RDATA of `rtype`. Returns `None` for types that are
    /// kept opaque.
    pub fn decode(
        rtype: DNSResourceType,
        raw: &[u8],
        packet_buf: &[u8],
    ) -> Result<Option<Self>, ParseError> {
        let mut pos = 0;
        let data = match rtype {
            DNSResourceType::A => {
                let octets: [u8; 4] = raw.try_into().map_err(|_| ParseError::InvalidRdata)?;
                RData::A(Ipv4Addr::from(octets))
            }
            DNSResourceType::AAAA => {
                let octets: [u8; 16] = raw.try_into().map_err(|_| ParseError::InvalidRdata)?;
                RData::AAAA(Ipv6Addr::from(octets))
            }
            DNSResourceType::NS => RData::NS(read_name_at(raw, &mut pos, packet_buf)?),
            DNSResourceType::CNAME => RData::CNAME(read_name_at(raw, &mut pos, packet_buf)?),
            DNSResourceType::PTR => RData::PTR(read_name_at(raw, &mut pos, packet_buf)?),
            DNSResourceType::MX => {
                let preference = read_u16(raw, &mut pos)?;
                let exchange = read_name_at(raw, &mut pos, packet_buf)?;
                RData::MX {
                    preference,
                    exchange,
                }
            }
            DNSResourceType::SOA => {
                let mname = read_name_at(raw, &mut pos, packet_buf)?;
                let rname = read_name_at(raw, &mut pos, packet_buf)?;
                RData::SOA {
                    mname,
                    rname,
                    serial: read_u32(raw, &mut pos)?,
                    refresh: read_u32(raw, &mut pos)?,
                    retry: read_u32(raw, &mut pos)?,
                    expire: read_u32(raw, &mut pos)?,
                    minimum: read_u32(raw, &mut pos)?,
                }
            }
            DNSResourceType::TXT => {
                let mut strings = Vec::new();
                while pos < raw.len() {
                    let len = raw[pos] as usize;
                    let chunk = raw
                        .get(pos + 1..pos + 1 + len)
                        .ok_or(ParseError::InvalidRdata)?;
                    strings.push(chunk.to_vec());
                    pos += 1 + len;
                }
                RData::TXT(strings)
            }
            DNSResourceType::DS => {
                if raw.len() < 4 {
                    return Err(ParseError::InvalidRdata);
                }
                RData::DS {
                    key_tag: u16::from_be_bytes([raw[0], raw[1]]),
                    algorithm: raw[2],
                    digest_type: raw[3],
                    digest: raw[4..].to_vec(),
                }
            }
            DNSResourceType::DNSKEY => {
                if raw.len() < 4 {
                    return Err(ParseError::InvalidRdata);
                }
                RData::DNSKEY {
                    flags: u16::from_be_bytes([raw[0], raw[1]]),
                    protocol: raw[2],
                    algorithm: raw[3],
                    public_key: raw[4..].to_vec(),
                }
            }
            DNSResourceType::RRSIG => {
                if raw.len() < 18 {
                    return Err(ParseError::InvalidRdata);
                }
                let type_covered = DNSResourceType::from(read_u16(raw, &mut pos)?);
                let algorithm = raw[2];
                let labels = raw[3];
                pos = 4;
                let original_ttl = read_u32(raw, &mut pos)?;
                let expiration = read_u32(raw, &mut pos)?;
                let inception = read_u32(raw, &mut pos)?;
                let key_tag = read_u16(raw, &mut pos)?;
                let signer_name = read_name_at(raw, &mut pos, packet_buf)?;
                RData::RRSIG {
                    type_covered,
                    algorithm,
                    labels,
                    original_ttl,
                    expiration,
                    inception,
                    key_tag,
                    signer_name,
                    signature: raw[pos..].to_vec(),
                }
            }
            DNSResourceType::NSEC => {
                let next_domain = read_name_at(raw, &mut pos, packet_buf)?;
                RData::NSEC {
                    next_domain,
                    type_bitmaps: raw[pos..].to_vec(),
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(data))
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            RData::A(ip) => out.extend_from_slice(&ip.octets()),
            RData::AAAA(ip) => out.extend_from_slice(&ip.octets()),
            RData::NS(name) | RData::CNAME(name) | RData::PTR(name) => {
                out.extend_from_slice(&name.to_wire())
            }
            RData::MX {
                preference,
                exchange,
            } => {
                out.extend_from_slice(&preference.to_be_bytes());
                out.extend_from_slice(&exchange.to_wire());
            }
            RData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                out.extend_from_slice(&mname.to_wire());
                out.extend_from_slice(&rname.to_wire());
                for value in [serial, refresh, retry, expire, minimum] {
                    out.extend_from_slice(&value.to_be_bytes());
                }
            }
            RData::TXT(strings) => {
                for s in strings {
                    out.push(s.len() as u8);
                    out.extend_from_slice(s);
                }
            }
            RData::DS {
                key_tag,
                algorithm,
                digest_type,
                digest,
            } => {
                out.extend_from_slice(&key_tag.to_be_bytes());
                out.push(*algorithm);
                out.push(*digest_type);
                out.extend_from_slice(digest);
            }
            RData::DNSKEY {
                flags,
                protocol,
                algorithm,
                public_key,
            } => {
                out.extend_from_slice(&flags.to_be_bytes());
                out.push(*protocol);
                out.push(*algorithm);
                out.extend_from_slice(public_key);
            }
            RData::RRSIG {
                type_covered,
                algorithm,
                labels,
                original_ttl,
                expiration,
                inception,
                key_tag,
                signer_name,
                signature,
            } => {
                out.extend_from_slice(&u16::from(*type_covered).to_be_bytes());
                out.push(*algorithm);
                out.push(*labels);
                out.extend_from_slice(&original_ttl.to_be_bytes());
                out.extend_from_slice(&expiration.to_be_bytes());
                out.extend_from_slice(&inception.to_be_bytes());
                out.extend_from_slice(&key_tag.to_be_bytes());
                out.extend_from_slice(&signer_name.to_wire());
                out.extend_from_slice(signature);
            }
            RData::NSEC {
                next_domain,
                type_bitmaps,
            } => {
                out.extend_from_slice(&next_domain.to_wire());
                out.extend_from_slice(type_bitmaps);
            }
        }
        out
    }
}

fn read_u16(raw: &[u8], pos: &mut usize) -> Result<u16, ParseError> {
    let bytes = raw.get(*pos..*pos + 2).ok_or(ParseError::InvalidRdata)?;
    *pos += 2;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u32(raw: &[u8], pos: &mut usize) -> Result<u32, ParseError> {
    let bytes = raw.get(*pos..*pos + 4).ok_or(ParseError::InvalidRdata)?;
    *pos += 4;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::A(ip) => write!(f, "{}", ip),
            RData::AAAA(ip) => write!(f, "{}", ip),
            RData::NS(name) | RData::CNAME(name) | RData::PTR(name) => write!(f, "{}", name),
            RData::MX {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            RData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{} {} {} {} {} {} {}",
                mname, rname, serial, refresh, retry, expire, minimum
            ),
            RData::TXT(strings) => {
                let quoted: Vec<String> = strings
                    .iter()
                    .map(|s| format!("\"{}\"", String::from_utf8_lossy(s)))
                    .collect();
                write!(f, "{}", quoted.join(" "))
            }
            RData::DS {
                key_tag,
                algorithm,
                digest_type,
                digest,
            } => write!(
                f,
                "{} {} {} {}",
                key_tag,
                algorithm,
                digest_type,
                hex::encode(digest)
            ),
            RData::DNSKEY {
                flags,
                protocol,
                algorithm,
                public_key,
            } => write!(
                f,
                "{} {} {} {}",
                flags,
                protocol,
                algorithm,
                STANDARD.encode(public_key)
            ),
            RData::RRSIG {
                type_covered,
                algorithm,
                labels,
                original_ttl,
                expiration,
                inception,
                key_tag,
                signer_name,
                signature,
            } => write!(
                f,
                "{} {} {} {} {} {} {} {} {}",
                type_covered,
                algorithm,
                labels,
                original_ttl,
                expiration,
                inception,
                key_tag,
                signer_name,
                STANDARD.encode(signature)
            ),
            RData::NSEC {
                next_domain,
                type_bitmaps,
            } => write!(f, "{} {}", next_domain, hex::encode(type_bitmaps)),
        }
    }
}

impl fmt::Display for DNSResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t{}\t", self.name, self.ttl, self.rclass, self.rtype)?;
        match &self.parsed_rdata {
            Some(data) => write!(f, "{}", data),
            // RFC 3597 unknown RDATA
            None => write!(f, "\\# {} {}", self.rdata.len(), hex::encode(&self.rdata)),
        }
    }
}

impl Serialize for DNSResource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
