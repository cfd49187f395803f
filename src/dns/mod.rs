pub mod common;
pub mod constants;
pub mod edns;
pub mod enums;
pub mod header;
pub mod name;
pub mod question;
pub mod resource;

use bitstream_io::{BigEndian, BitReader, BitWrite, BitWriter};
use common::PacketComponent;
use constants::{DNSRcode, DNSSEC_UDP_SIZE};
use edns::EdnsOpt;
use enums::{DNSResourceClass, DNSResourceType};
use header::DNSHeader;
use name::DomainName;
use question::DNSQuestion;
use resource::DNSResource;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
    /// EDNS0 OPT record if present (extracted from additional records)
    pub edns: Option<EdnsOpt>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid DNS label")]
    InvalidLabel,
    #[error("DNS name too long")]
    NameTooLong,
    #[error("Compression pointer loop")]
    CompressionLoop,
    #[error("Message truncated")]
    Truncated,
    #[error("Invalid record data")]
    InvalidRdata,
    #[error("Invalid bit stream: {0}")]
    InvalidBitStream(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::InvalidBitStream(e.to_string())
    }
}

/// Message sections a record list can be taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Answer,
    Authority,
    Additional,
}

/// Coarse classification of a reply, in the sense of what the trace can do
/// with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ReplyType {
    Answer,
    Referral,
    NxDomain,
    NoData,
    Unknown,
}

impl DNSPacket {
    /// Build a query with a fresh random id.
    pub fn new_query(
        name: &DomainName,
        qtype: DNSResourceType,
        qclass: DNSResourceClass,
        recursion_desired: bool,
        dnssec_ok: bool,
    ) -> Self {
        let mut packet = DNSPacket {
            header: DNSHeader {
                id: rand::random::<u16>(),
                rd: recursion_desired,
                qdcount: 1,
                ..Default::default()
            },
            questions: vec![DNSQuestion::new(name.clone(), qtype, qclass)],
            ..Default::default()
        };
        if dnssec_ok {
            let mut edns = EdnsOpt::with_payload_size(DNSSEC_UDP_SIZE);
            edns.set_do_flag(true);
            packet.edns = Some(edns);
        }
        packet
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        trace!("Parsing DNS packet, size: {} bytes", buf.len());
        let mut reader = BitReader::<_, BigEndian>::new(buf);
        let mut packet = DNSPacket::default();
        packet.header.read(&mut reader, buf)?;
        debug!(
            "Parsed DNS header: id={}, rcode={}, an={}, ns={}, ar={}",
            packet.header.id,
            packet.header.rcode,
            packet.header.ancount,
            packet.header.nscount,
            packet.header.arcount
        );

        for _ in 0..packet.header.qdcount {
            let mut question = DNSQuestion::default();
            question.read(&mut reader, buf)?;
            packet.questions.push(question);
        }

        for _ in 0..packet.header.ancount {
            let mut answer = DNSResource::default();
            answer.read(&mut reader, buf)?;
            packet.answers.push(answer);
        }

        for _ in 0..packet.header.nscount {
            let mut authority = DNSResource::default();
            authority.read(&mut reader, buf)?;
            packet.authorities.push(authority);
        }

        for _ in 0..packet.header.arcount {
            let mut resource = DNSResource::default();
            resource.read(&mut reader, buf)?;

            if resource.rtype == DNSResourceType::OPT && resource.name.is_root() {
                // CLASS of an OPT record is the payload size, not a class
                let payload_size = u16::from(resource.rclass);
                match EdnsOpt::parse_from_resource(payload_size, resource.ttl, &resource.rdata) {
                    Ok(edns) => {
                        packet.edns = Some(edns);
                        continue;
                    }
                    Err(e) => debug!("Failed to parse EDNS OPT record: {}", e),
                }
            }

            packet.resources.push(resource);
        }

        Ok(packet)
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::new();
        let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);

        let mut header = self.header.clone();
        header.qdcount = self.questions.len() as u16;
        header.ancount = self.answers.len() as u16;
        header.nscount = self.authorities.len() as u16;
        header.arcount = self.resources.len() as u16 + u16::from(self.edns.is_some());
        header.write(&mut writer)?;

        for question in &self.questions {
            question.write(&mut writer)?;
        }
        for answer in &self.answers {
            answer.write(&mut writer)?;
        }
        for authority in &self.authorities {
            authority.write(&mut writer)?;
        }
        for resource in &self.resources {
            resource.write(&mut writer)?;
        }

        if let Some(edns) = &self.edns {
            let (udp_payload_size, ttl, rdata) = edns.to_resource_format();
            // Root owner name
            writer.write_var::<u8>(8, 0)?;
            writer.write_var::<u16>(16, DNSResourceType::OPT.into())?;
            writer.write_var::<u16>(16, udp_payload_size)?;
            writer.write_var::<u32>(32, ttl)?;
            writer.write_var::<u16>(16, rdata.len() as u16)?;
            writer.write_bytes(&rdata)?;
        }

        Ok(buf)
    }

    /// True when the message carries no records in any section.
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty() && self.authorities.is_empty() && self.resources.is_empty()
    }

    pub fn section(&self, section: Section) -> &[DNSResource] {
        match section {
            Section::Answer => &self.answers,
            Section::Authority => &self.authorities,
            Section::Additional => &self.resources,
        }
    }

    /// Records of `rtype` in `section`, in message order.
    pub fn rr_list_by_type(&self, rtype: DNSResourceType, section: Section) -> Vec<DNSResource> {
        self.section(section)
            .iter()
            .filter(|rr| rr.rtype == rtype)
            .cloned()
            .collect()
    }

    /// Records owned by `name` of `rtype` in `section`, in message order.
    pub fn rr_list_by_name_and_type(
        &self,
        name: &DomainName,
        rtype: DNSResourceType,
        section: Section,
    ) -> Vec<DNSResource> {
        self.section(section)
            .iter()
            .filter(|rr| rr.rtype == rtype && rr.name == *name)
            .cloned()
            .collect()
    }

    /// Classify the reply.
    ///
    /// NODATA is an empty answer with an SOA and no NS in the authority
    /// section; a referral is an empty answer with NS in the authority
    /// section. Error rcodes other than NXDOMAIN are `Unknown`.
    pub fn reply_type(&self) -> ReplyType {
        match self.header.rcode {
            DNSRcode::NXDOMAIN => return ReplyType::NxDomain,
            DNSRcode::NOERROR => {}
            _ => return ReplyType::Unknown,
        }
        if !self.answers.is_empty() {
            return ReplyType::Answer;
        }

        let has_authority = |rtype| self.authorities.iter().any(|rr| rr.rtype == rtype);
        if has_authority(DNSResourceType::NS) {
            ReplyType::Referral
        } else if has_authority(DNSResourceType::SOA) {
            ReplyType::NoData
        } else {
            ReplyType::Answer
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use resource::RData;
    use std::net::Ipv4Addr;

    fn name(s: &str) -> DomainName {
        s.parse().unwrap()
    }

    #[test]
    fn test_query_wire_format() {
        let query = DNSPacket::new_query(
            &name("example.com."),
            DNSResourceType::DNSKEY,
            DNSResourceClass::IN,
            false,
            true,
        );
        let bytes = query.serialize().unwrap();

        // header(12) + qname(13) + qtype/qclass(4) + OPT(11)
        assert_eq!(bytes.len(), 40);
        assert_eq!(bytes[2] & 0x01, 0, "RD must be clear");
        assert_eq!(&bytes[12..25], b"\x07example\x03com\x00");
        assert_eq!(&bytes[25..27], &[0x00, 48]);

        let parsed = DNSPacket::parse(&bytes).unwrap();
        assert!(parsed.edns.as_ref().is_some_and(|edns| edns.do_flag()));
        assert!(parsed.resources.is_empty());
        assert_eq!(parsed.questions[0].name, name("example.com."));
    }

    #[test]
    fn test_compressed_referral_parsing() {
        let mut buf = vec![
            0x12, 0x34, 0x80, 0x00, // id, QR
            0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, // counts
        ];
        // question: com. NS IN (offset 12)
        buf.extend_from_slice(b"\x03com\x00\x00\x02\x00\x01");
        // authority: com. NS a.gtld-servers.net.
        buf.extend_from_slice(&[0xc0, 0x0c, 0x00, 0x02, 0x00, 0x01, 0x00, 0x02, 0xa3, 0x00]);
        let rdata = b"\x01a\x0cgtld-servers\x03net\x00";
        buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        let ns_offset = buf.len();
        buf.extend_from_slice(rdata);
        // additional: pointer to the NS target, A 192.5.6.30
        buf.extend_from_slice(&[0xc0, ns_offset as u8, 0x00, 0x01, 0x00, 0x01]);
        buf.extend_from_slice(&[0x00, 0x02, 0xa3, 0x00, 0x00, 0x04, 192, 5, 6, 30]);

        let packet = DNSPacket::parse(&buf).unwrap();
        assert_eq!(packet.reply_type(), ReplyType::Referral);
        assert_eq!(packet.authorities[0].name, name("com."));
        assert_eq!(
            packet.authorities[0].ns_target(),
            Some(&name("a.gtld-servers.net."))
        );
        assert_eq!(packet.resources[0].name, name("a.gtld-servers.net."));
        assert_eq!(
            packet.resources[0].parsed_rdata,
            Some(RData::A(Ipv4Addr::new(192, 5, 6, 30)))
        );
    }

    #[test]
    fn test_reply_type() {
        let soa = DNSResource::new(
            name("example.com."),
            DNSResourceClass::IN,
            60,
            RData::SOA {
                mname: name("ns.example.com."),
                rname: name("hostmaster.example.com."),
                serial: 1,
                refresh: 2,
                retry: 3,
                expire: 4,
                minimum: 5,
            },
        );
        let a = DNSResource::new(
            name("example.com."),
            DNSResourceClass::IN,
            60,
            RData::A(Ipv4Addr::LOCALHOST),
        );

        let mut packet = DNSPacket::default();
        assert_eq!(packet.reply_type(), ReplyType::Answer);

        packet.authorities.push(soa);
        assert_eq!(packet.reply_type(), ReplyType::NoData);

        packet.header.rcode = DNSRcode::SERVFAIL;
        assert_eq!(packet.reply_type(), ReplyType::Unknown);

        packet.header.rcode = DNSRcode::NXDOMAIN;
        packet.answers.push(a);
        assert_eq!(packet.reply_type(), ReplyType::NxDomain);

        packet.header.rcode = DNSRcode::NOERROR;
        assert_eq!(packet.reply_type(), ReplyType::Answer);
    }

    #[test]
    fn test_binary_owner_parses() {
        let mut buf = vec![
            0xab, 0xcd, 0x80, 0x00, // id, QR
            0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, // counts
        ];
        // answer: \255.com. A 192.0.2.9
        buf.extend_from_slice(b"\x01\xff\x03com\x00\x00\x01\x00\x01");
        buf.extend_from_slice(&[0x00, 0x00, 0x0e, 0x10, 0x00, 0x04, 192, 0, 2, 9]);

        let packet = DNSPacket::parse(&buf).unwrap();
        assert_eq!(packet.answers.len(), 1);
        assert_eq!(packet.answers[0].name.to_string(), "\\255.com.");
        assert_eq!(packet.answers[0].name.labels()[0], vec![0xff]);
    }

    #[test]
    fn test_truncated_message_fails() {
        let buf = [0x12, 0x34, 0x81, 0x80, 0x00, 0x01];
        assert!(DNSPacket::parse(&buf).is_err());
    }
}
