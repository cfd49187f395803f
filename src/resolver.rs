use crate::dns::DNSPacket;
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::name::DomainName;
use crate::dns::resource::DNSResource;
use crate::error::{Result, TraceError};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

/// Which address families servers may be contacted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpFamily {
    #[default]
    Any,
    V4Only,
    V6Only,
}

impl IpFamily {
    pub fn allows(&self, addr: &IpAddr) -> bool {
        match self {
            IpFamily::Any => true,
            IpFamily::V4Only => addr.is_ipv4(),
            IpFamily::V6Only => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::Any => write!(f, "any"),
            IpFamily::V4Only => write!(f, "ipv4"),
            IpFamily::V6Only => write!(f, "ipv6"),
        }
    }
}

impl FromStr for IpFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "any" | "all" => Ok(IpFamily::Any),
            "4" | "v4" | "ipv4" => Ok(IpFamily::V4Only),
            "6" | "v6" | "ipv6" => Ok(IpFamily::V6Only),
            _ => Err(format!("unknown IP family: {}", s)),
        }
    }
}

/// Transport and query settings of a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    pub ip_family: IpFamily,
    pub port: u16,
    pub debug: bool,
    /// Stop at the first failing server
    pub fail_fast: bool,
    pub use_tcp: bool,
    /// Shuffle the server set before each query
    pub randomize: bool,
    /// Set RD on outgoing queries
    pub recursive: bool,
    /// Send EDNS0 with the DO bit
    pub dnssec: bool,
    pub timeout: Duration,
    pub retries: u8,
}

impl ResolverSettings {
    /// The settings for the trace's working resolver: transport copied from
    /// `self`, recursion off, DNSSEC on.
    pub fn for_iteration(&self) -> Self {
        Self {
            recursive: false,
            dnssec: true,
            ..self.clone()
        }
    }
}

/// A resolver that queries a replaceable set of servers.
///
/// This is the only seam through which the trace touches the network.
#[async_trait]
pub trait ZoneResolver: Send + Sync + Sized {
    fn settings(&self) -> &ResolverSettings;

    /// A new resolver with the same transport and the given settings, and
    /// an empty server set.
    fn fork(&self, settings: ResolverSettings) -> Result<Self>;

    /// The installed servers, in installation order.
    fn servers(&self) -> &[IpAddr];

    /// Append servers to the set.
    fn push_servers(&mut self, addrs: &[IpAddr]) -> Result<()>;

    /// Remove and return the most recently installed server.
    fn pop_server(&mut self) -> Option<IpAddr>;

    fn clear_servers(&mut self) {
        while self.pop_server().is_some() {}
    }

    async fn send(
        &self,
        name: &DomainName,
        qtype: DNSResourceType,
        qclass: DNSResourceClass,
    ) -> Result<DNSPacket>;

    /// Address records (AAAA then A) for `name`, from the answer sections.
    /// Owners are not checked, so addresses reached through a CNAME count.
    /// Lookup failures yield an empty list.
    async fn resolve_addresses(
        &self,
        name: &DomainName,
        qclass: DNSResourceClass,
    ) -> Vec<DNSResource> {
        let mut addrs = Vec::new();
        for qtype in [DNSResourceType::AAAA, DNSResourceType::A] {
            match self.send(name, qtype, qclass).await {
                Ok(response) => {
                    addrs.extend(response.answers.into_iter().filter(|rr| rr.rtype == qtype))
                }
                Err(e) => debug!("{} {} lookup failed: {}", name, qtype, e),
            }
        }
        addrs
    }
}

/// Network resolver speaking plain DNS over UDP (TCP on truncation or when
/// forced).
#[derive(Debug, Clone)]
pub struct StubResolver {
    settings: ResolverSettings,
    servers: Vec<IpAddr>,
}

impl StubResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self {
            settings,
            servers: Vec::new(),
        }
    }

    fn query_order(&self) -> Vec<SocketAddr> {
        let mut servers: Vec<SocketAddr> = self
            .servers
            .iter()
            .filter(|addr| self.settings.ip_family.allows(addr))
            .map(|addr| SocketAddr::new(*addr, self.settings.port))
            .collect();
        if self.settings.randomize {
            servers.shuffle(&mut rand::rng());
        }
        servers
    }

    /// Query a specific server, retrying on failure
    async fn query_server(&self, query_bytes: &[u8], server: SocketAddr) -> Result<DNSPacket> {
        let mut last_error = None;
        for retry in 0..=self.settings.retries {
            match self.send_query_with_timeout(query_bytes, server).await {
                Ok(response) => {
                    if retry > 0 {
                        debug!("Query succeeded on retry {}", retry);
                    }
                    return Ok(response);
                }
                Err(e) => {
                    debug!("Query attempt {} to {} failed: {}", retry + 1, server, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(TraceError::NoNameservers))
    }

    async fn send_query_with_timeout(
        &self,
        query_bytes: &[u8],
        server: SocketAddr,
    ) -> Result<DNSPacket> {
        let query_future = async {
            if self.settings.use_tcp {
                return self.send_tcp_query(query_bytes, server).await;
            }
            let response = self.send_udp_query(query_bytes, server).await?;
            if response.header.tc {
                debug!("UDP response from {} truncated, retrying with TCP", server);
                self.send_tcp_query(query_bytes, server).await
            } else {
                Ok(response)
            }
        };

        timeout(self.settings.timeout, query_future)
            .await
            .map_err(|_| TraceError::Timeout {
                name: server.to_string(),
            })?
    }

    async fn send_udp_query(&self, query_bytes: &[u8], server: SocketAddr) -> Result<DNSPacket> {
        let bind_addr = if server.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(server).await?;
        socket.send(query_bytes).await?;

        let mut response_buf = vec![0u8; 65535];
        let response_len = socket.recv(&mut response_buf).await?;
        trace!(
            "Raw UDP response data ({} bytes): {:02x?}",
            response_len,
            &response_buf[..response_len.min(64)]
        );

        Ok(DNSPacket::parse(&response_buf[..response_len])?)
    }

    async fn send_tcp_query(&self, query_bytes: &[u8], server: SocketAddr) -> Result<DNSPacket> {
        let mut stream = TcpStream::connect(server).await?;

        let query_length = query_bytes.len() as u16;
        stream.write_all(&query_length.to_be_bytes()).await?;
        stream.write_all(query_bytes).await?;
        stream.flush().await?;

        let mut length_buf = [0u8; 2];
        stream.read_exact(&mut length_buf).await?;
        let response_length = u16::from_be_bytes(length_buf) as usize;

        let mut response_buf = vec![0; response_length];
        stream.read_exact(&mut response_buf).await?;
        trace!(
            "Raw TCP response data ({} bytes): {:02x?}",
            response_length,
            &response_buf[..response_length.min(64)]
        );

        Ok(DNSPacket::parse(&response_buf)?)
    }
}

#[async_trait]
impl ZoneResolver for StubResolver {
    fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    fn fork(&self, settings: ResolverSettings) -> Result<Self> {
        Ok(Self::new(settings))
    }

    fn servers(&self) -> &[IpAddr] {
        &self.servers
    }

    fn push_servers(&mut self, addrs: &[IpAddr]) -> Result<()> {
        if let Some(bad) = addrs
            .iter()
            .find(|addr| addr.is_unspecified() || addr.is_multicast())
        {
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
        qclass: DNSResourceClass,
    ) -> Result<DNSPacket> {
        let order = self.query_order();
        if order.is_empty() {
            return Err(TraceError::NoNameservers);
        }

        let query = DNSPacket::new_query(
            name,
            qtype,
            qclass,
            self.settings.recursive,
            self.settings.dnssec,
        );
        let query_bytes = query.serialize()?;
        debug!(
            "Sending {} {} {} to {} servers (rd={}, do={})",
            name,
            qclass,
            qtype,
            order.len(),
            self.settings.recursive,
            self.settings.dnssec
        );

        let mut last_error = None;
        for server in order {
            match self.query_server(&query_bytes, server).await {
                Ok(response) if response.header.id != query.header.id => {
                    warn!(
                        "Response id mismatch from {} (sent {}, got {})",
                        server, query.header.id, response.header.id
                    );
                    last_error = Some(TraceError::Io(format!("id mismatch from {}", server)));
                }
                Ok(response) => {
                    if self.settings.debug {
                        debug!(
                            "{} answered: rcode={}, an={}, ns={}, ar={}",
                            server,
                            response.header.rcode,
                            response.answers.len(),
                            response.authorities.len(),
                            response.resources.len()
                        );
                    }
                    return Ok(response);
                }
                Err(e) => {
                    warn!("Failed to query {}: {}", server, e);
                    last_error = Some(e);
                }
            }
            if self.settings.fail_fast {
                break;
            }
        }

        Err(TraceError::AllServersFailed {
            name: name.to_string(),
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no response".to_string()),
        })
    }
}

/// Convert address records to server addresses. Any record that is not an
/// A or AAAA record is an error.
pub fn addresses_of(records: &[DNSResource]) -> Result<Vec<IpAddr>> {
    records
        .iter()
        .map(|rr| {
            rr.address().ok_or_else(|| {
                TraceError::ServerSet(format!("{} is not an address record", rr.name))
            })
        })
        .collect()
}
