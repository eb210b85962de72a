//! Correlation keys, one shape per message kind.
//!
//! Keys are pure values built fresh for every lookup. The endpoint fields hold
//! digests from [`hash_endpoint`](crate::address::hash_endpoint), never the
//! endpoints themselves.
//!
//! | Key | Fields | Equality |
//! |-----|--------|----------|
//! | [`BeginKey`] | tid, pc | exact |
//! | [`ContKey`] | src tid, dst tid, opc, dpc | forward or swapped |
//! | [`EndKey`] | tid, opc, dpc | forward or swapped endpoints |
//! | [`AnsiKey`] | tid, opc, dpc | forward or swapped endpoints |
//!
//! `Hash` is written by hand for the symmetric keys so that both orientations
//! of the same key land in the same bucket.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::address::EndpointPair;

/// Key of a BEGIN: the originator's transaction id and the originator's address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BeginKey {
    pub tid: u32,
    pub pc_hash: u32,
}

impl BeginKey {
    pub fn new(tid: u32, pc_hash: u32) -> Self {
        Self { tid, pc_hash }
    }
}

impl fmt::Display for BeginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Begin({:#x}@{:08x})", self.tid, self.pc_hash)
    }
}

/// Key of a CONTINUE exchange.
///
/// Two keys are equal when all four fields match either as stored or with
/// both the tids and the endpoints swapped, since the two peers disagree on
/// which side is the source.
#[derive(Debug, Clone, Copy)]
pub struct ContKey {
    pub src_tid: u32,
    pub dst_tid: u32,
    pub opc_hash: u32,
    pub dpc_hash: u32,
}

impl ContKey {
    pub fn new(src_tid: u32, dst_tid: u32, opc_hash: u32, dpc_hash: u32) -> Self {
        Self {
            src_tid,
            dst_tid,
            opc_hash,
            dpc_hash,
        }
    }

    /// Builds the key from a message's tids and its observed endpoints.
    pub fn from_message(src_tid: u32, dst_tid: u32, endpoints: &EndpointPair) -> Self {
        Self::new(src_tid, dst_tid, endpoints.src_hash(), endpoints.dst_hash())
    }

    /// The key as the other peer would build it.
    pub fn reversed(&self) -> Self {
        Self::new(self.dst_tid, self.src_tid, self.dpc_hash, self.opc_hash)
    }

    fn same_orientation(&self, other: &Self) -> bool {
        self.src_tid == other.src_tid
            && self.dst_tid == other.dst_tid
            && self.opc_hash == other.opc_hash
            && self.dpc_hash == other.dpc_hash
    }
}

impl PartialEq for ContKey {
    fn eq(&self, other: &Self) -> bool {
        self.same_orientation(other) || self.same_orientation(&other.reversed())
    }
}

impl Eq for ContKey {}

impl Hash for ContKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Commutative combinations so both orientations hash alike
        self.src_tid.wrapping_add(self.dst_tid).hash(state);
        (self.opc_hash ^ self.dpc_hash).hash(state);
    }
}

impl fmt::Display for ContKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cont({:#x}@{:08x} <-> {:#x}@{:08x})",
            self.src_tid, self.opc_hash, self.dst_tid, self.dpc_hash
        )
    }
}

/// Key under which an END or ABORT is expected.
///
/// Either peer may close the dialogue, so the endpoints match in either
/// orientation; the tid must match as stored.
#[derive(Debug, Clone, Copy)]
pub struct EndKey {
    pub tid: u32,
    pub opc_hash: u32,
    pub dpc_hash: u32,
}

impl EndKey {
    pub fn new(tid: u32, opc_hash: u32, dpc_hash: u32) -> Self {
        Self {
            tid,
            opc_hash,
            dpc_hash,
        }
    }

    pub fn from_message(tid: u32, endpoints: &EndpointPair) -> Self {
        Self::new(tid, endpoints.src_hash(), endpoints.dst_hash())
    }
}

impl PartialEq for EndKey {
    fn eq(&self, other: &Self) -> bool {
        self.tid == other.tid
            && ((self.opc_hash == other.opc_hash && self.dpc_hash == other.dpc_hash)
                || (self.opc_hash == other.dpc_hash && self.dpc_hash == other.opc_hash))
    }
}

impl Eq for EndKey {}

impl Hash for EndKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tid.hash(state);
        (self.opc_hash ^ self.dpc_hash).hash(state);
    }
}

impl fmt::Display for EndKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "End({:#x} {:08x}<->{:08x})", self.tid, self.opc_hash, self.dpc_hash)
    }
}

/// Key of the unified ANSI table: one tid, endpoints in either orientation.
#[derive(Debug, Clone, Copy)]
pub struct AnsiKey {
    pub tid: u32,
    pub opc_hash: u32,
    pub dpc_hash: u32,
}

impl AnsiKey {
    pub fn new(tid: u32, opc_hash: u32, dpc_hash: u32) -> Self {
        Self {
            tid,
            opc_hash,
            dpc_hash,
        }
    }

    pub fn from_message(tid: u32, endpoints: &EndpointPair) -> Self {
        Self::new(tid, endpoints.src_hash(), endpoints.dst_hash())
    }
}

impl PartialEq for AnsiKey {
    fn eq(&self, other: &Self) -> bool {
        self.tid == other.tid
            && ((self.opc_hash == other.opc_hash && self.dpc_hash == other.dpc_hash)
                || (self.opc_hash == other.dpc_hash && self.dpc_hash == other.opc_hash))
    }
}

impl Eq for AnsiKey {}

impl Hash for AnsiKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tid.hash(state);
        (self.opc_hash ^ self.dpc_hash).hash(state);
    }
}

impl fmt::Display for AnsiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ansi({:#x} {:08x}<->{:08x})", self.tid, self.opc_hash, self.dpc_hash)
    }
}
