use crate::dns::resource::{DNSResource, RData};

/// Key tag over raw DNSKEY RDATA (RFC 4034 Appendix B)
pub fn key_tag_of(rdata: &[u8]) -> u16 {
    // RSAMD5 keys use the low 16 bits of the modulus (B.1)
    if rdata.get(3) == Some(&1) {
        return match rdata.len() {
            len if len >= 6 => u16::from_be_bytes([rdata[len - 3], rdata[len - 2]]),
            _ => 0,
        };
    }

    let mut accumulator = rdata
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => (u32::from(*hi) << 8) | u32::from(*lo),
            [hi] => u32::from(*hi) << 8,
            _ => 0,
        })
        .sum::<u32>();
    accumulator += accumulator >> 16;
    (accumulator & 0xFFFF) as u16
}

/// Calculate the key tag for a DNSKEY from its fields
pub fn calculate_key_tag(flags: u16, protocol: u8, algorithm: u8, public_key: &[u8]) -> u16 {
    let mut rdata = Vec::with_capacity(4 + public_key.len());
    rdata.extend_from_slice(&flags.to_be_bytes());
    rdata.push(protocol);
    rdata.push(algorithm);
    rdata.extend_from_slice(public_key);
    key_tag_of(&rdata)
}

/// The key tag a record refers to: computed for DNSKEY, carried for DS and RRSIG.
pub fn record_key_tag(rr: &DNSResource) -> Option<u16> {
    match &rr.parsed_rdata {
        Some(RData::DNSKEY { .. }) => Some(key_tag_of(&rr.rdata)),
        Some(RData::DS { key_tag, .. }) | Some(RData::RRSIG { key_tag, .. }) => Some(*key_tag),
        _ => None,
    }
}
