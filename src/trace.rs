//! The secure trace: walk from the root to a name, one zone cut at a time,
//! collecting the NS, DNSKEY and DS material published at each cut.
//!
//! The working resolver is re-pointed at every cut: its server set is
//! emptied and replaced by the addresses of the nameservers the local
//! resolver reports for that cut. Nothing here verifies signatures; a
//! [`CutVerifier`] may annotate each cut but never stops the walk.

use std::fmt;
use std::net::IpAddr;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RootHints;
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::name::DomainName;
use crate::dns::resource::DNSResource;
use crate::dns::{DNSPacket, ReplyType, Section};
use crate::dnssec::ds_key_match;
use crate::error::{Result, TraceError};
use crate::extract::{extract_by_owner, extract_by_referral};
use crate::resolver::{ZoneResolver, addresses_of};

/// What to trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceQuery {
    pub name: DomainName,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl TraceQuery {
    pub fn new(name: DomainName, qtype: DNSResourceType, qclass: DNSResourceClass) -> Self {
        Self { name, qtype, qclass }
    }
}

/// Annotation attached to a cut by a [`CutVerifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustStatus {
    /// No verifier was configured
    #[default]
    Unchecked,
    /// A key at the cut matches a caller-supplied trusted key
    Trusted,
    /// A key at the cut matches a DS vouched for by a trusted parent
    Chained,
    /// Keys were found but none matched
    Untrusted,
    /// No DNSKEY was found at the cut
    Unsigned,
}

impl fmt::Display for TrustStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustStatus::Unchecked => write!(f, "[UNCHECKED]"),
            TrustStatus::Trusted => write!(f, "[TRUST]"),
            TrustStatus::Chained => write!(f, "[CHAIN]"),
            TrustStatus::Untrusted => write!(f, "[UNTRUSTED]"),
            TrustStatus::Unsigned => write!(f, "[UNSIGNED]"),
        }
    }
}

/// Everything collected at one zone cut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneCutReport {
    pub zone: DomainName,
    pub nameservers: Vec<DNSResource>,
    /// Addresses the working resolver queried for this cut
    pub servers: Vec<IpAddr>,
    pub dnskeys: Vec<DNSResource>,
    pub dnskey_sigs: Vec<DNSResource>,
    /// DS records owned by the zone
    pub ds: Vec<DNSResource>,
    pub ds_sigs: Vec<DNSResource>,
    /// DS records found in a referral while asking for the query name's keys
    pub referral_ds: Vec<DNSResource>,
    pub referral_ds_sigs: Vec<DNSResource>,
    pub trust: TrustStatus,
}

impl ZoneCutReport {
    fn new(zone: DomainName, nameservers: Vec<DNSResource>, servers: Vec<IpAddr>) -> Self {
        Self {
            zone,
            nameservers,
            servers,
            dnskeys: Vec::new(),
            dnskey_sigs: Vec::new(),
            ds: Vec::new(),
            ds_sigs: Vec::new(),
            referral_ds: Vec::new(),
            referral_ds_sigs: Vec::new(),
            trust: TrustStatus::Unchecked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceReport {
    pub query: TraceQuery,
    /// Classification of the working resolver's first answer for the query
    pub initial_reply: ReplyType,
    /// Cuts in walk order, root first
    pub cuts: Vec<ZoneCutReport>,
}

/// Receives trace material as it is collected.
///
/// Per cut the order is: nameservers, DNSKEYs, DS by owner, DS by
/// referral, then `cut_finished`. Empty RRsets are not reported.
pub trait TraceReporter: Send {
    fn root_sanity(&mut self, _response: &DNSPacket) {}
    fn nameservers(&mut self, _zone: &DomainName, _records: &[DNSResource]) {}
    fn dnskeys(&mut self, _zone: &DomainName, _records: &[DNSResource]) {}
    fn ds(&mut self, _zone: &DomainName, _records: &[DNSResource]) {}
    fn referral_ds(&mut self, _zone: &DomainName, _records: &[DNSResource]) {}
    fn cut_finished(&mut self, _cut: &ZoneCutReport) {}
}

/// A reporter that discards everything.
#[derive(Debug, Default)]
pub struct SilentReporter;

impl TraceReporter for SilentReporter {}

/// Outcome of verifying one cut.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Verdict {
    pub status: TrustStatus,
    /// Records the cut vouches for, trusted at later cuts
    pub vouched: Vec<DNSResource>,
}

/// Hook run after each cut is collected. It annotates; it cannot abort.
pub trait CutVerifier: Send + Sync {
    /// `anchors` are the caller's trusted keys, `chain` what earlier cuts
    /// vouched for.
    fn verify(
        &self,
        cut: &ZoneCutReport,
        anchors: &[DNSResource],
        chain: &[DNSResource],
    ) -> Verdict;
}

/// Marks a cut trusted when one of its DNSKEYs matches a trusted key or
/// vouched DS. Trusted cuts vouch for the DS records they returned.
///
/// Matching is by digest only; RRSIGs are not checked.
#[derive(Debug, Default)]
pub struct DsMatchAnnotator;

impl CutVerifier for DsMatchAnnotator {
    fn verify(
        &self,
        cut: &ZoneCutReport,
        anchors: &[DNSResource],
        chain: &[DNSResource],
    ) -> Verdict {
        if cut.dnskeys.is_empty() {
            return Verdict {
                status: TrustStatus::Unsigned,
                vouched: Vec::new(),
            };
        }

        let status = if let Some(matched) = ds_key_match(&cut.dnskeys, anchors) {
            debug!("{}: {} trusted key matches", cut.zone, matched.len());
            TrustStatus::Trusted
        } else if let Some(matched) = ds_key_match(&cut.dnskeys, chain) {
            debug!("{}: {} chained DS matches", cut.zone, matched.len());
            TrustStatus::Chained
        } else {
            return Verdict {
                status: TrustStatus::Untrusted,
                vouched: Vec::new(),
            };
        };

        let vouched = cut
            .ds
            .iter()
            .chain(&cut.referral_ds)
            .filter(|rr| rr.name != cut.zone)
            .cloned()
            .collect();
        Verdict { status, vouched }
    }
}

pub struct TraceEngine {
    root_hints: RootHints,
    verifier: Option<Box<dyn CutVerifier>>,
}

impl TraceEngine {
    pub fn new(root_hints: RootHints) -> Self {
        Self {
            root_hints,
            verifier: None,
        }
    }

    pub fn with_verifier(mut self, verifier: Box<dyn CutVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Trace `query` from the root down.
    ///
    /// `local` is the caller's recursive resolver; it answers the sanity
    /// check and the per-cut NS lookups. A working resolver forked from it
    /// talks to the authoritative servers.
    pub async fn trace<R: ZoneResolver>(
        &self,
        local: &R,
        query: &TraceQuery,
        trusted: &[DNSResource],
        reporter: &mut dyn TraceReporter,
    ) -> Result<TraceReport> {
        let mut working = local.fork(local.settings().for_iteration())?;
        install(&mut working, self.root_hints.addresses())?;

        match local
            .send(&DomainName::root(), DNSResourceType::NS, query.qclass)
            .await
        {
            Ok(response) if response.is_empty() => warn!("No root server information received"),
            Ok(response) => reporter.root_sanity(&response),
            Err(e) => return Err(TraceError::LocalResolver(e.to_string())),
        }

        let initial = working
            .send(&query.name, query.qtype, query.qclass)
            .await
            .map_err(|e| {
                debug!("Initial query failed: {}", e);
                TraceError::NoResponse(query.name.clone())
            })?;
        let initial_reply = initial.reply_type();
        info!("Tracing {} {} ({:?})", query.name, query.qtype, initial_reply);

        let mut chain: Vec<DNSResource> = Vec::new();
        let mut cuts = Vec::new();

        for zone in query.name.label_chain().into_iter().rev() {
            let mut cut = self
                .collect_cut(local, &mut working, &zone, query, reporter)
                .await?;

            if let Some(verifier) = &self.verifier {
                let verdict = verifier.verify(&cut, trusted, &chain);
                cut.trust = verdict.status;
                chain.extend(verdict.vouched);
            }

            reporter.cut_finished(&cut);
            cuts.push(cut);
        }

        Ok(TraceReport {
            query: query.clone(),
            initial_reply,
            cuts,
        })
    }

    async fn collect_cut<R: ZoneResolver>(
        &self,
        local: &R,
        working: &mut R,
        zone: &DomainName,
        query: &TraceQuery,
        reporter: &mut dyn TraceReporter,
    ) -> Result<ZoneCutReport> {
        debug!("Zone cut {}", zone);

        let referral = local.send(zone, DNSResourceType::NS, query.qclass).await?;
        let glue_a = referral.rr_list_by_type(DNSResourceType::A, Section::Additional);
        let glue_aaaa = referral.rr_list_by_type(DNSResourceType::AAAA, Section::Additional);
        let mut nameservers = referral.rr_list_by_type(DNSResourceType::NS, Section::Authority);
        if nameservers.is_empty() {
            nameservers = referral.rr_list_by_type(DNSResourceType::NS, Section::Answer);
        }

        working.clear_servers();

        if glue_a.is_empty() && glue_aaaa.is_empty() {
            let mut resolved = Vec::new();
            for target in nameservers.iter().filter_map(DNSResource::ns_target) {
                resolved.extend(local.resolve_addresses(target, query.qclass).await);
            }
            if resolved.is_empty() {
                return Err(TraceError::NoNameserverAddress(zone.clone()));
            }
            debug!("{}: no glue, resolved {} addresses", zone, resolved.len());
            install(working, &addresses_of(&resolved)?)?;
        }
        install(working, &addresses_of(&glue_aaaa)?)?;
        install(working, &addresses_of(&glue_a)?)?;

        reporter.nameservers(zone, &nameservers);
        let mut cut = ZoneCutReport::new(zone.clone(), nameservers, working.servers().to_vec());

        if let Some(packet) = dnssec_query(working, zone, DNSResourceType::DNSKEY).await {
            let found =
                extract_by_owner(&packet, zone, DNSResourceType::DNSKEY, &mut cut.dnskey_sigs);
            cut.dnskeys = found.records;
        }
        if !cut.dnskeys.is_empty() {
            reporter.dnskeys(zone, &cut.dnskeys);
        }

        if let Some(packet) = dnssec_query(working, zone, DNSResourceType::DS).await {
            let found = extract_by_owner(&packet, zone, DNSResourceType::DS, &mut cut.ds_sigs);
            cut.ds = found.records;
        }
        if !cut.ds.is_empty() {
            reporter.ds(zone, &cut.ds);
        }

        // Asking for the query name's keys may get a referral carrying DS
        if let Some(packet) = dnssec_query(working, &query.name, DNSResourceType::DNSKEY).await {
            let found =
                extract_by_referral(&packet, DNSResourceType::DS, &mut cut.referral_ds_sigs);
            cut.referral_ds = found.records;
        }
        if !cut.referral_ds.is_empty() {
            reporter.referral_ds(zone, &cut.referral_ds);
        }

        Ok(cut)
    }
}

fn install<R: ZoneResolver>(resolver: &mut R, addrs: &[IpAddr]) -> Result<()> {
    if addrs.is_empty() {
        return Ok(());
    }
    resolver.push_servers(addrs).map_err(|e| match e {
        TraceError::ServerSet(_) => e,
        other => TraceError::ServerSet(other.to_string()),
    })
}

/// DNSSEC sub-queries are always class IN. Transport failures count as
/// an empty answer.
async fn dnssec_query<R: ZoneResolver>(
    resolver: &R,
    name: &DomainName,
    qtype: DNSResourceType,
) -> Option<DNSPacket> {
    match resolver.send(name, qtype, DNSResourceClass::IN).await {
        Ok(packet) => Some(packet),
        Err(e) => {
            warn!("{} {} query failed: {}", name, qtype, e);
            None
        }
    }
}
