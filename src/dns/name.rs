use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::ParseError;

/// Maximum length of a single label (RFC 1035 2.3.4)
pub const MAX_LABEL_LEN: usize = 63;

/// Maximum wire length of a name including length octets and the root label
pub const MAX_NAME_LEN: usize = 255;

/// An absolute domain name.
///
/// Labels are raw octets stored leftmost first and never include the empty
/// root label; the root name is the empty label list. Comparison is ASCII
/// case-insensitive as required by RFC 4343.
#[derive(Clone, Debug, Default, Eq)]
pub struct DomainName {
    labels: Vec<Vec<u8>>,
}

impl DomainName {
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    pub fn from_labels(labels: Vec<Vec<u8>>) -> Result<Self, ParseError> {
        let labels: Vec<Vec<u8>> = labels.into_iter().filter(|l| !l.is_empty()).collect();
        let mut wire_len = 1;
        for label in &labels {
            if label.len() > MAX_LABEL_LEN {
                return Err(ParseError::InvalidLabel);
            }
            wire_len += label.len() + 1;
        }
        if wire_len > MAX_NAME_LEN {
            return Err(ParseError::NameTooLong);
        }
        Ok(Self { labels })
    }

    pub fn labels(&self) -> &[Vec<u8>] {
        &self.labels
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of labels, counting the root label.
    pub fn label_count(&self) -> usize {
        self.labels.len() + 1
    }

    /// The name with its leftmost label removed. The root chops to itself.
    pub fn chop_left(&self) -> Self {
        Self {
            labels: self.labels.iter().skip(1).cloned().collect(),
        }
    }

    /// Progressively shorter suffixes of this name.
    ///
    /// Entry 0 is the name itself and the last entry is the root; the chain
    /// always has `label_count()` entries.
    pub fn label_chain(&self) -> Vec<DomainName> {
        let mut chain = Vec::with_capacity(self.label_count());
        chain.push(self.clone());
        for i in 1..self.label_count() {
            let next = chain[i - 1].chop_left();
            chain.push(next);
        }
        chain
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        for label in &self.labels {
            out.push(label.len() as u8);
            out.extend_from_slice(label);
        }
        out.push(0);
        out
    }

    /// Lowercased wire form, as used for DS digests (RFC 4034 6.2)
    pub fn to_canonical_wire(&self) -> Vec<u8> {
        let mut out = self.to_wire();
        out.make_ascii_lowercase();
        out
    }

    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }
}

impl PartialEq for DomainName {
    fn eq(&self, other: &Self) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(other.labels.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for label in &self.labels {
            for &octet in label {
                match octet {
                    b'.' | b' ' | b'"' | b'\\' | b';' | b'(' | b')' => {
                        write!(f, "\\{}", octet as char)?
                    }
                    0x21..=0x7E => write!(f, "{}", octet as char)?,
                    _ => write!(f, "\\{:03}", octet)?,
                }
            }
            f.write_str(".")?;
        }
        Ok(())
    }
}

/// Splits presentation form into labels, resolving `\c` and `\DDD` escapes.
fn parse_labels(s: &str) -> Result<Vec<Vec<u8>>, ParseError> {
    let mut labels = Vec::new();
    let mut current = Vec::new();
    let mut octets = s.bytes();

    while let Some(octet) = octets.next() {
        match octet {
            b'.' => {
                if current.is_empty() {
                    return Err(ParseError::InvalidLabel);
                }
                labels.push(std::mem::take(&mut current));
            }
            b'\\' => {
                let first = octets.next().ok_or(ParseError::InvalidLabel)?;
                if first.is_ascii_digit() {
                    let mut value = u16::from(first - b'0');
                    for _ in 0..2 {
                        let digit = octets
                            .next()
                            .filter(u8::is_ascii_digit)
                            .ok_or(ParseError::InvalidLabel)?;
                        value = value * 10 + u16::from(digit - b'0');
                    }
                    let octet = u8::try_from(value).map_err(|_| ParseError::InvalidLabel)?;
                    current.push(octet);
                } else {
                    current.push(first);
                }
            }
            _ => current.push(octet),
        }
    }
    if !current.is_empty() {
        labels.push(current);
    }
    Ok(labels)
}

impl FromStr for DomainName {
    type Err = ParseError;

    /// Parses a name in presentation form. Relative names are taken to be
    /// relative to the root.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "." {
            return Ok(Self::root());
        }
        Self::from_labels(parse_labels(trimmed)?)
    }
}

impl Serialize for DomainName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
