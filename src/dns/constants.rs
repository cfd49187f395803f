/// DNS Response Code constants from RFC 1035
pub struct DNSRcode;

impl DNSRcode {
    pub const NOERROR: u8 = 0;
    pub const FORMERR: u8 = 1;
    pub const SERVFAIL: u8 = 2;
    pub const NXDOMAIN: u8 = 3;
    pub const NOTIMP: u8 = 4;
    pub const REFUSED: u8 = 5;

    pub fn name(rcode: u8) -> &'static str {
        match rcode {
            Self::NOERROR => "NOERROR",
            Self::FORMERR => "FORMERR",
            Self::SERVFAIL => "SERVFAIL",
            Self::NXDOMAIN => "NXDOMAIN",
            Self::NOTIMP => "NOTIMP",
            Self::REFUSED => "REFUSED",
            _ => "UNKNOWN",
        }
    }
}

/// Default EDNS0 payload size advertised on DNSSEC queries
pub const DNSSEC_UDP_SIZE: u16 = 4096;

/// Well-known DNS port
pub const DNS_PORT: u16 = 53;
