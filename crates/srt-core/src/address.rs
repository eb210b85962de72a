//! Endpoint identifiers and the address hasher used inside correlation keys.
//!
//! Every key field that names a peer carries a `u32` digest of the peer
//! rather than the peer itself. Structured MTP3 point codes are folded
//! directly into the digest; every other address kind is hashed through its
//! printable form.
//!
//! Both the creation path and the lookup path of a key field must hash the
//! same representation of a peer. A BEGIN seen with a point code and an END
//! seen with an IP address will not correlate.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Point code format, following the MTP3 variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointCodeVariant {
    /// ITU-T 14-bit point code, written zone-area-signalling point (3-8-3).
    Itu,
    /// ANSI 24-bit point code, written network-cluster-member (8-8-8).
    Ansi,
    /// Chinese national 24-bit point code.
    Chinese,
    /// Japanese national 16-bit point code.
    Japan,
}

impl PointCodeVariant {
    fn tag(self) -> u32 {
        match self {
            PointCodeVariant::Itu => 1,
            PointCodeVariant::Ansi => 2,
            PointCodeVariant::Chinese => 3,
            PointCodeVariant::Japan => 4,
        }
    }
}

/// A structured MTP3 signalling point code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointCode {
    /// Raw point code value (only the low 24 bits are significant).
    pub value: u32,
    /// Format of `value`.
    pub variant: PointCodeVariant,
    /// Network indicator from the service information octet.
    pub network_indicator: u8,
}

impl PointCode {
    /// Creates a new point code.
    pub fn new(value: u32, variant: PointCodeVariant, network_indicator: u8) -> Self {
        Self {
            value,
            variant,
            network_indicator,
        }
    }

    /// Shorthand for an ITU point code on the international network.
    pub fn itu(value: u32) -> Self {
        Self::new(value, PointCodeVariant::Itu, 0)
    }

    /// Shorthand for an ANSI point code on the national network.
    pub fn ansi(value: u32) -> Self {
        Self::new(value, PointCodeVariant::Ansi, 2)
    }

    /// Folds the point code fields into a single digest.
    ///
    /// Layout: value in bits 0..24, variant in bits 24..28, network
    /// indicator in bits 28..32.
    pub fn digest(&self) -> u32 {
        (self.value & 0x00ff_ffff)
            | (self.variant.tag() << 24)
            | ((u32::from(self.network_indicator) & 0x0f) << 28)
    }
}

impl fmt::Display for PointCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.value;
        match self.variant {
            PointCodeVariant::Itu => write!(f, "{}-{}-{}", (v >> 11) & 0x7, (v >> 3) & 0xff, v & 0x7),
            PointCodeVariant::Ansi | PointCodeVariant::Chinese => {
                write!(f, "{}-{}-{}", (v >> 16) & 0xff, (v >> 8) & 0xff, v & 0xff)
            }
            PointCodeVariant::Japan => write!(f, "{}", v & 0xffff),
        }
    }
}

/// One side of an observed message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    /// A structured MTP3 point code.
    PointCode(PointCode),
    /// An IP address (SIGTRAN transports without a usable point code).
    Ip(IpAddr),
    /// Any other address, already in printable form (global title, etc.).
    Other(String),
    /// Address information was missing or malformed.
    Unknown,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::PointCode(pc) => write!(f, "{}", pc),
            Endpoint::Ip(ip) => write!(f, "{}", ip),
            Endpoint::Other(s) => f.write_str(s),
            Endpoint::Unknown => Ok(()),
        }
    }
}

impl From<PointCode> for Endpoint {
    fn from(pc: PointCode) -> Self {
        Endpoint::PointCode(pc)
    }
}

impl From<IpAddr> for Endpoint {
    fn from(ip: IpAddr) -> Self {
        Endpoint::Ip(ip)
    }
}

impl From<&str> for Endpoint {
    fn from(s: &str) -> Self {
        Endpoint::Other(s.to_string())
    }
}

/// Source and destination of a message, as seen by the observer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointPair {
    pub src: Endpoint,
    pub dst: Endpoint,
}

impl EndpointPair {
    pub fn new(src: impl Into<Endpoint>, dst: impl Into<Endpoint>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
        }
    }

    /// The same pair seen from the other peer.
    pub fn swapped(&self) -> Self {
        Self {
            src: self.dst.clone(),
            dst: self.src.clone(),
        }
    }

    pub fn src_hash(&self) -> u32 {
        hash_endpoint(&self.src)
    }

    pub fn dst_hash(&self) -> u32 {
        hash_endpoint(&self.dst)
    }
}

/// Reduces an endpoint to the `u32` used inside correlation keys.
///
/// Point codes use [`PointCode::digest`]; everything else is hashed through
/// its printable form with [`djb2`]. [`Endpoint::Unknown`] hashes as the empty
/// string.
pub fn hash_endpoint(endpoint: &Endpoint) -> u32 {
    match endpoint {
        Endpoint::PointCode(pc) => pc.digest(),
        Endpoint::Other(s) => djb2(s),
        other => djb2(&other.to_string()),
    }
}

/// Bernstein's string hash (`h = h * 33 + c`, seeded with 5381).
pub fn djb2(s: &str) -> u32 {
    s.bytes()
        .fold(5381u32, |h, b| h.wrapping_shl(5).wrapping_add(h).wrapping_add(u32::from(b)))
}
