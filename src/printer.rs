//! Human readable and JSON output for a trace.

use std::io::{self, Write};

use tracing::warn;

use crate::dns::constants::DNSRcode;
use crate::dns::name::DomainName;
use crate::dns::resource::{DNSResource, RData};
use crate::dns::{DNSPacket, Section};
use crate::dnssec::{DnsSecAlgorithm, calculate_key_tag, flags};
use crate::trace::{TraceReport, TraceReporter, TrustStatus, ZoneCutReport};

/// Prints each RRset as it arrives, one block per zone cut.
pub struct TextReporter<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TextReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            warn!("Failed to write trace output: {}", e);
        }
    }

    fn print_rrset(&mut self, records: &[DNSResource]) {
        let result = records.iter().try_for_each(|rr| match key_comment(rr) {
            Some(comment) => writeln!(self.out, "{} ;{{{}}}", rr, comment),
            None => writeln!(self.out, "{}", rr),
        });
        self.emit(result);
    }
}

impl TextReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TraceReporter for TextReporter<W> {
    fn root_sanity(&mut self, response: &DNSPacket) {
        let result = write_packet(&mut self.out, response);
        self.emit(result);
    }

    fn nameservers(&mut self, _zone: &DomainName, records: &[DNSResource]) {
        self.print_rrset(records);
        let result = writeln!(self.out);
        self.emit(result);
    }

    fn dnskeys(&mut self, _zone: &DomainName, records: &[DNSResource]) {
        self.print_rrset(records);
    }

    fn ds(&mut self, _zone: &DomainName, records: &[DNSResource]) {
        self.print_rrset(records);
    }

    fn referral_ds(&mut self, _zone: &DomainName, records: &[DNSResource]) {
        self.print_rrset(records);
    }

    fn cut_finished(&mut self, cut: &ZoneCutReport) {
        let result = if cut.trust == TrustStatus::Unchecked {
            writeln!(self.out)
        } else {
            writeln!(self.out, ";; {} {}\n", cut.zone, cut.trust)
        };
        self.emit(result);
    }
}

/// `id = 20326 (ksk), alg = RSASHA256` for DNSKEY records.
fn key_comment(rr: &DNSResource) -> Option<String> {
    let Some(RData::DNSKEY {
        flags: key_flags,
        protocol,
        algorithm,
        public_key,
    }) = &rr.parsed_rdata
    else {
        return None;
    };

    let mut role = if key_flags & flags::SECURE_ENTRY_POINT != 0 {
        "ksk".to_string()
    } else {
        "zsk".to_string()
    };
    if key_flags & flags::REVOKE != 0 {
        role.push_str(", revoked");
    }
    let alg = DnsSecAlgorithm::from_u8(*algorithm)
        .map(|alg| alg.to_string())
        .unwrap_or_else(|| algorithm.to_string());

    let key_tag = calculate_key_tag(*key_flags, *protocol, *algorithm, public_key);
    Some(format!("id = {} ({}), alg = {}", key_tag, role, alg))
}

/// dig-style dump of a whole message.
pub fn write_packet<W: Write>(out: &mut W, packet: &DNSPacket) -> io::Result<()> {
    let header = &packet.header;
    writeln!(
        out,
        ";; ->>HEADER<<- opcode: {}, rcode: {}, id: {}",
        header.opcode,
        DNSRcode::name(header.rcode),
        header.id
    )?;

    let mut flags = Vec::new();
    for (set, flag) in [
        (header.qr, "qr"),
        (header.aa, "aa"),
        (header.tc, "tc"),
        (header.rd, "rd"),
        (header.ra, "ra"),
        (header.ad, "ad"),
        (header.cd, "cd"),
    ] {
        if set {
            flags.push(flag);
        }
    }
    writeln!(
        out,
        ";; flags: {} ; QUERY: {}, ANSWER: {}, AUTHORITY: {}, ADDITIONAL: {}",
        flags.join(" "),
        packet.questions.len(),
        packet.answers.len(),
        packet.authorities.len(),
        packet.resources.len()
    )?;

    writeln!(out, ";; QUESTION SECTION:")?;
    for question in &packet.questions {
        writeln!(out, ";; {}\t{}\t{}", question.name, question.qclass, question.qtype)?;
    }

    for (title, section) in [
        ("ANSWER", Section::Answer),
        ("AUTHORITY", Section::Authority),
        ("ADDITIONAL", Section::Additional),
    ] {
        writeln!(out, "\n;; {} SECTION:", title)?;
        for rr in packet.section(section) {
            writeln!(out, "{}", rr)?;
        }
    }
    writeln!(out)
}

pub fn render_json(report: &TraceReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}
