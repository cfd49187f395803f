use super::ParseError;

/// DNSSEC OK bit in the EDNS flags (RFC 3225)
const DO_BIT: u16 = 0x8000;

/// EDNS0 OPT pseudo-record
/// RFC 6891: https://tools.ietf.org/html/rfc6891
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdnsOpt {
    /// UDP payload size that can be handled by the requestor
    pub udp_payload_size: u16,
    /// Extended RCODE (high 8 bits)
    pub extended_rcode: u8,
    pub version: u8,
    pub flags: u16,
    pub options: Vec<EdnsOption>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdnsOption {
    pub code: u16,
    pub data: Vec<u8>,
}

impl EdnsOpt {
    pub fn new() -> Self {
        Self {
            udp_payload_size: 4096,
            extended_rcode: 0,
            version: 0,
            flags: 0,
            options: Vec::new(),
        }
    }

    pub fn with_payload_size(payload_size: u16) -> Self {
        Self {
            udp_payload_size: payload_size,
            ..Self::new()
        }
    }

    pub fn do_flag(&self) -> bool {
        (self.flags & DO_BIT) != 0
    }

    pub fn set_do_flag(&mut self, value: bool) {
        if value {
            self.flags |= DO_BIT;
        } else {
            self.flags &= !DO_BIT;
        }
    }

    /// Parse the OPT pseudo-record fields.
    ///
    /// CLASS carries the UDP payload size and TTL carries
    /// extended RCODE (8) | version (8) | flags (16).
    pub fn parse_from_resource(class: u16, ttl: u32, rdata: &[u8]) -> Result<Self, ParseError> {
        let mut options = Vec::new();
        let mut pos = 0;

        while pos + 4 <= rdata.len() {
            let code = u16::from_be_bytes([rdata[pos], rdata[pos + 1]]);
            let len = u16::from_be_bytes([rdata[pos + 2], rdata[pos + 3]]) as usize;
            pos += 4;

            let data = rdata
                .get(pos..pos + len)
                .ok_or(ParseError::InvalidRdata)?
                .to_vec();
            pos += len;
            options.push(EdnsOption { code, data });
        }

        Ok(EdnsOpt {
            udp_payload_size: class,
            extended_rcode: ((ttl >> 24) & 0xFF) as u8,
            version: ((ttl >> 16) & 0xFF) as u8,
            flags: (ttl & 0xFFFF) as u16,
            options,
        })
    }

    pub fn to_resource_format(&self) -> (u16, u32, Vec<u8>) {
        let ttl = ((self.extended_rcode as u32) << 24)
            | ((self.version as u32) << 16)
            | (self.flags as u32);

        let mut rdata = Vec::new();
        for option in &self.options {
            rdata.extend_from_slice(&option.code.to_be_bytes());
            rdata.extend_from_slice(&(option.data.len() as u16).to_be_bytes());
            rdata.extend_from_slice(&option.data);
        }

        (self.udp_payload_size, ttl, rdata)
    }
}
