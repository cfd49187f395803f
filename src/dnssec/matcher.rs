//! Recognizing a verified handoff: which trusted keys does a DS set point at?

use tracing::trace;

use super::digest::ds_from_dnskey;
use crate::dns::resource::{DNSResource, RData};

/// DS-equivalence between two records.
///
/// Two DS records match on owner and RDATA. A DNSKEY matches a DS when its
/// digest under the DS's digest type equals the DS. Two DNSKEYs match on
/// owner and RDATA. Anything else never matches.
pub fn compare_ds(a: &DNSResource, b: &DNSResource) -> bool {
    if a.name != b.name {
        return false;
    }

    match (&a.parsed_rdata, &b.parsed_rdata) {
        (Some(RData::DS { .. }), Some(RData::DS { .. }))
        | (Some(RData::DNSKEY { .. }), Some(RData::DNSKEY { .. })) => a.rdata == b.rdata,
        (Some(RData::DNSKEY { .. }), Some(RData::DS { digest_type, .. })) => {
            key_matches_ds(a, *digest_type, b)
        }
        (Some(RData::DS { digest_type, .. }), Some(RData::DNSKEY { .. })) => {
            key_matches_ds(b, *digest_type, a)
        }
        _ => false,
    }
}

fn key_matches_ds(dnskey: &DNSResource, digest_type: u8, ds: &DNSResource) -> bool {
    match ds_from_dnskey(dnskey, digest_type) {
        Ok(computed) => computed.rdata == ds.rdata,
        Err(e) => {
            trace!("Cannot digest {} for comparison: {}", dnskey.name, e);
            false
        }
    }
}

/// The trusted records that some record of `candidate_ds` matches.
///
/// One entry is pushed per matching (trusted, candidate) pair, so a trusted
/// record matching several candidates appears several times. `None` when
/// either input is empty or nothing matched.
pub fn ds_key_match(
    candidate_ds: &[DNSResource],
    trusted: &[DNSResource],
) -> Option<Vec<DNSResource>> {
    if candidate_ds.is_empty() || trusted.is_empty() {
        return None;
    }

    let mut matched = Vec::new();
    for trusted_rr in trusted {
        for candidate in candidate_ds {
            if compare_ds(trusted_rr, candidate) {
                matched.push(trusted_rr.clone());
            }
        }
    }

    if matched.is_empty() {
        None
    } else {
        Some(matched)
    }
}
