//! Shared fixtures for the trace integration tests: record builders, a
//! scripted resolver and a reporter that records what it was told.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use securetrace::dns::constants::DNSRcode;
use securetrace::dns::enums::{DNSResourceClass, DNSResourceType};
use securetrace::dns::header::DNSHeader;
use securetrace::dns::name::DomainName;
use securetrace::dns::resource::{DNSResource, RData};
use securetrace::dns::DNSPacket;
use securetrace::error::{Result, TraceError};
use securetrace::resolver::{IpFamily, ResolverSettings, ZoneResolver};
use securetrace::trace::{TraceReporter, ZoneCutReport};

pub const LOCAL_SERVER: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 53));

pub fn name(s: &str) -> DomainName {
    s.parse().expect("valid test name")
}

pub fn ns(zone: &str, target: &str) -> DNSResource {
    DNSResource::new(name(zone), DNSResourceClass::IN, 172800, RData::NS(name(target)))
}

pub fn cname(owner: &str, target: &str) -> DNSResource {
    DNSResource::new(name(owner), DNSResourceClass::IN, 3600, RData::CNAME(name(target)))
}

pub fn a(owner: &str, addr: [u8; 4]) -> DNSResource {
    DNSResource::new(
        name(owner),
        DNSResourceClass::IN,
        172800,
        RData::A(Ipv4Addr::from(addr)),
    )
}

pub fn aaaa(owner: &str, addr: &str) -> DNSResource {
    let ip: Ipv6Addr = addr.parse().expect("valid test address");
    DNSResource::new(name(owner), DNSResourceClass::IN, 172800, RData::AAAA(ip))
}

pub fn dnskey(owner: &str, key: &[u8]) -> DNSResource {
    DNSResource::new(
        name(owner),
        DNSResourceClass::IN,
        3600,
        RData::DNSKEY {
            flags: 257,
            protocol: 3,
            algorithm: 13,
            public_key: key.to_vec(),
        },
    )
}

pub fn rrsig(owner: &str, covered: DNSResourceType, signer: &str) -> DNSResource {
    DNSResource::new(
        name(owner),
        DNSResourceClass::IN,
        3600,
        RData::RRSIG {
            type_covered: covered,
            algorithm: 13,
            labels: name(owner).labels().len() as u8,
            original_ttl: 3600,
            expiration: 1_900_000_000,
            inception: 1_700_000_000,
            key_tag: 1,
            signer_name: name(signer),
            signature: vec![0x5a; 64],
        },
    )
}

pub fn soa(zone: &str) -> DNSResource {
    let suffix = if zone == "." { "" } else { zone };
    DNSResource::new(
        name(zone),
        DNSResourceClass::IN,
        900,
        RData::SOA {
            mname: name(&format!("ns1.{}", suffix)),
            rname: name(&format!("hostmaster.{}", suffix)),
            serial: 2024010101,
            refresh: 7200,
            retry: 3600,
            expire: 1209600,
            minimum: 3600,
        },
    )
}

/// A NOERROR response with the given sections.
pub fn response(
    answers: Vec<DNSResource>,
    authorities: Vec<DNSResource>,
    additional: Vec<DNSResource>,
) -> DNSPacket {
    DNSPacket {
        header: DNSHeader {
            qr: true,
            ..Default::default()
        },
        answers,
        authorities,
        resources: additional,
        ..Default::default()
    }
}

pub fn nxdomain(zone: &str) -> DNSPacket {
    let mut packet = response(vec![], vec![soa(zone)], vec![]);
    packet.header.rcode = DNSRcode::NXDOMAIN;
    packet
}

pub fn nodata(zone: &str) -> DNSPacket {
    response(vec![], vec![soa(zone)], vec![])
}

/// Referral data for a cut as a recursive resolver returns it.
pub fn delegation(zone: &str, servers: &[(&str, [u8; 4])]) -> DNSPacket {
    let nameservers = servers.iter().map(|(host, _)| ns(zone, host)).collect();
    let glue = servers.iter().map(|(host, addr)| a(host, *addr)).collect();
    response(vec![], nameservers, glue)
}

#[derive(Debug, Clone)]
enum Reply {
    Packet(DNSPacket),
    Fail,
}

type Key = (bool, Option<IpAddr>, String, DNSResourceType);

/// One query the scripted resolvers were asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentQuery {
    pub recursive: bool,
    pub name: DomainName,
    pub qtype: DNSResourceType,
    pub servers: Vec<IpAddr>,
}

/// Canned answers keyed by resolver kind, name and type, optionally also by
/// the first installed server. Several answers for one key are handed out
/// in order, the last one repeating. Unscripted queries get an empty
/// NOERROR response.
#[derive(Debug, Default)]
pub struct Script {
    replies: Mutex<HashMap<Key, VecDeque<Reply>>>,
    sent: Mutex<Vec<SentQuery>>,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn key(
        recursive: bool,
        server: Option<IpAddr>,
        owner: &DomainName,
        qtype: DNSResourceType,
    ) -> Key {
        (recursive, server, owner.to_string().to_ascii_lowercase(), qtype)
    }

    fn push(&self, key: Key, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .push_back(reply);
    }

    /// Answer for the local (recursive) resolver.
    pub fn local(&self, owner: &str, qtype: DNSResourceType, packet: DNSPacket) {
        self.push(Self::key(true, None, &name(owner), qtype), Reply::Packet(packet));
    }

    /// Answer for the working (iterative) resolver.
    pub fn working(&self, owner: &str, qtype: DNSResourceType, packet: DNSPacket) {
        self.push(Self::key(false, None, &name(owner), qtype), Reply::Packet(packet));
    }

    /// Answer for the working resolver while `server` leads its server set.
    pub fn working_at(
        &self,
        server: [u8; 4],
        owner: &str,
        qtype: DNSResourceType,
        packet: DNSPacket,
    ) {
        let server = Some(IpAddr::from(server));
        self.push(Self::key(false, server, &name(owner), qtype), Reply::Packet(packet));
    }

    /// Like [`Script::local`] but drops anything scripted for the key before.
    pub fn local_replace(&self, owner: &str, qtype: DNSResourceType, packet: DNSPacket) {
        let key = Self::key(true, None, &name(owner), qtype);
        self.replies.lock().unwrap().remove(&key);
        self.push(key, Reply::Packet(packet));
    }

    pub fn local_fails(&self, owner: &str, qtype: DNSResourceType) {
        self.push(Self::key(true, None, &name(owner), qtype), Reply::Fail);
    }

    pub fn working_fails(&self, owner: &str, qtype: DNSResourceType) {
        self.push(Self::key(false, None, &name(owner), qtype), Reply::Fail);
    }

    pub fn sent(&self) -> Vec<SentQuery> {
        self.sent.lock().unwrap().clone()
    }

    /// Queries the working resolver sent, in order.
    pub fn sent_iterative(&self) -> Vec<SentQuery> {
        self.sent().into_iter().filter(|q| !q.recursive).collect()
    }

    fn next_reply(&self, key: &Key) -> Option<Reply> {
        let mut replies = self.replies.lock().unwrap();
        let queue = replies.get_mut(key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    fn answer(&self, query: SentQuery) -> Result<DNSPacket> {
        self.sent.lock().unwrap().push(query.clone());

        let leader = query.servers.first().copied();
        let reply = self
            .next_reply(&Self::key(query.recursive, leader, &query.name, query.qtype))
            .or_else(|| {
                self.next_reply(&Self::key(query.recursive, None, &query.name, query.qtype))
            });

        match reply {
            Some(Reply::Packet(packet)) => Ok(packet),
            Some(Reply::Fail) => Err(TraceError::AllServersFailed {
                name: query.name.to_string(),
                reason: "scripted failure".to_string(),
            }),
            None => Ok(response(vec![], vec![], vec![])),
        }
    }
}

pub fn local_settings() -> ResolverSettings {
    ResolverSettings {
        ip_family: IpFamily::Any,
        port: 53,
        debug: false,
        fail_fast: false,
        use_tcp: false,
        randomize: false,
        recursive: true,
        dnssec: false,
        timeout: Duration::from_secs(1),
        retries: 0,
    }
}

/// A `ZoneResolver` that answers from a [`Script`] instead of the network.
/// Forks share the script, so every query of a trace is logged in one place.
#[derive(Debug, Clone)]
pub struct ScriptedResolver {
    settings: ResolverSettings,
    servers: Vec<IpAddr>,
    script: Arc<Script>,
}

impl ScriptedResolver {
    /// The caller's local resolver, pointed at [`LOCAL_SERVER`].
    pub fn local(script: Arc<Script>) -> Self {
        Self {
            settings: local_settings(),
            servers: vec![LOCAL_SERVER],
            script,
        }
    }
}

#[async_trait]
impl ZoneResolver for ScriptedResolver {
    fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    fn fork(&self, settings: ResolverSettings) -> Result<Self> {
        Ok(Self {
            settings,
            servers: Vec::new(),
            script: Arc::clone(&self.script),
        })
    }

    fn servers(&self) -> &[IpAddr] {
        &self.servers
    }

    fn push_servers(&mut self, addrs: &[IpAddr]) -> Result<()> {
        if let Some(bad) = addrs.iter().find(|addr| addr.is_unspecified()) {
            return Err(TraceError::InvalidServerAddress(*bad));
        }
        self.servers.extend_from_slice(addrs);
        Ok(())
    }

    fn pop_server(&mut self) -> Option<IpAddr> {
        self.servers.pop()
    }

    async fn send(
        &self,
        name: &DomainName,
        qtype: DNSResourceType,
        _qclass: DNSResourceClass,
    ) -> Result<DNSPacket> {
        if self.servers.is_empty() {
            return Err(TraceError::NoNameservers);
        }
        self.script.answer(SentQuery {
            recursive: self.settings.recursive,
            name: name.clone(),
            qtype,
            servers: self.servers.clone(),
        })
    }
}

/// Reporter events, rendered as short strings such as `"ns com."`.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<String>,
    pub cuts: Vec<ZoneCutReport>,
}

impl RecordingReporter {
    fn record(&mut self, kind: &str, zone: &DomainName, records: &[DNSResource]) {
        self.events.push(format!("{} {} ({})", kind, zone, records.len()));
    }
}

impl TraceReporter for RecordingReporter {
    fn root_sanity(&mut self, response: &DNSPacket) {
        self.events
            .push(format!("root ({})", response.answers.len()));
    }

    fn nameservers(&mut self, zone: &DomainName, records: &[DNSResource]) {
        self.record("ns", zone, records);
    }

    fn dnskeys(&mut self, zone: &DomainName, records: &[DNSResource]) {
        self.record("dnskey", zone, records);
    }

    fn ds(&mut self, zone: &DomainName, records: &[DNSResource]) {
        self.record("ds", zone, records);
    }

    fn referral_ds(&mut self, zone: &DomainName, records: &[DNSResource]) {
        self.record("referral_ds", zone, records);
    }

    fn cut_finished(&mut self, cut: &ZoneCutReport) {
        self.events.push(format!("cut {}", cut.zone));
        self.cuts.push(cut.clone());
    }
}

pub const ROOT_SERVER: [u8; 4] = [198, 41, 0, 4];
pub const COM_SERVER: [u8; 4] = [192, 5, 6, 30];
pub const EXAMPLE_SERVER: [u8; 4] = [192, 0, 2, 1];
pub const WWW_SERVER: [u8; 4] = [192, 0, 2, 80];

/// A script for `www.example.com`: every cut is delegated with glue, and
/// the initial and sanity queries succeed.
pub fn example_com_script() -> Arc<Script> {
    let script = Script::new();
    populate_example_com(&script);
    script
}

/// Add the `www.example.com` delegations to `script`, after anything
/// already queued.
pub fn populate_example_com(script: &Script) {

    script.working(
        "www.example.com.",
        DNSResourceType::A,
        response(vec![a("www.example.com.", [192, 0, 2, 80])], vec![], vec![]),
    );

    // Recursive resolvers answer `. NS` in the answer section
    script.local(
        ".",
        DNSResourceType::NS,
        response(
            vec![ns(".", "a.root-servers.net.")],
            vec![],
            vec![a("a.root-servers.net.", ROOT_SERVER)],
        ),
    );
    script.local(
        "com.",
        DNSResourceType::NS,
        delegation("com.", &[("a.gtld-servers.net.", COM_SERVER)]),
    );
    script.local(
        "example.com.",
        DNSResourceType::NS,
        delegation("example.com.", &[("ns1.example.com.", EXAMPLE_SERVER)]),
    );
    script.local(
        "www.example.com.",
        DNSResourceType::NS,
        delegation("www.example.com.", &[("ns.www.example.com.", WWW_SERVER)]),
    );
}
