pub mod config;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod extract;
pub mod printer;
pub mod resolver;
pub mod trace;

pub use dns::DNSPacket;
pub use error::{Result, TraceError};
pub use trace::{TraceEngine, TraceQuery, TraceReport};
