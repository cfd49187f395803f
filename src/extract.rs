//! Pulling DNSSEC record sets out of responses.
//!
//! Two distinct paths exist: records owned by a known name in the answer
//! section, and records carried in the authority section of a referral.
//! They look at different sections and must stay separate.

use crate::dns::enums::DNSResourceType;
use crate::dns::name::DomainName;
use crate::dns::resource::DNSResource;
use crate::dns::{DNSPacket, ReplyType, Section};

/// Records found by one extraction, with the reply classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub records: Vec<DNSResource>,
    pub reply: ReplyType,
}

impl Extracted {
    fn terminal(reply: ReplyType) -> Self {
        Self {
            records: Vec::new(),
            reply,
        }
    }
}

fn terminal_reply(packet: &DNSPacket) -> Option<ReplyType> {
    match packet.reply_type() {
        reply @ (ReplyType::NxDomain | ReplyType::NoData) => Some(reply),
        _ => None,
    }
}

/// Records of (`owner`, `rtype`) from the answer section. RRSIGs at `owner`
/// in the answer section are appended to `sigs`.
pub fn extract_by_owner(
    packet: &DNSPacket,
    owner: &DomainName,
    rtype: DNSResourceType,
    sigs: &mut Vec<DNSResource>,
) -> Extracted {
    if let Some(reply) = terminal_reply(packet) {
        return Extracted::terminal(reply);
    }

    let records = packet.rr_list_by_name_and_type(owner, rtype, Section::Answer);
    sigs.extend(packet.rr_list_by_name_and_type(owner, DNSResourceType::RRSIG, Section::Answer));

    Extracted {
        records,
        reply: ReplyType::Answer,
    }
}

/// Records of `rtype` from the authority section, as found in a referral.
/// Every authority-section RRSIG is appended to `sigs`.
pub fn extract_by_referral(
    packet: &DNSPacket,
    rtype: DNSResourceType,
    sigs: &mut Vec<DNSResource>,
) -> Extracted {
    if let Some(reply) = terminal_reply(packet) {
        return Extracted::terminal(reply);
    }

    let records = packet.rr_list_by_type(rtype, Section::Authority);
    sigs.extend(packet.rr_list_by_type(DNSResourceType::RRSIG, Section::Authority));

    Extracted {
        records,
        reply: ReplyType::Answer,
    }
}
