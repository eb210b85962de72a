//! Per-message inputs handed to the engine by the decoding layer.
//!
//! A decoded message reaches the engine as two parts:
//!
//! - [`Frame`]: facts about the captured message itself (its reference, its
//!   capture time, the endpoints it travelled between).
//! - [`MessageInfo`]: the TCAP facts extracted from it (kind, transaction ids)
//!   plus an optional close hook.
//!
//! `MessageInfo` values are scratch data; decoders usually take them from an
//! [`InfoRing`] and must not hold on to them after correlation returns.

use std::fmt;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::EndpointPair;
use crate::context::Context;

/// Number of scratch slots in an [`InfoRing`].
pub const INFO_RING_SIZE: usize = 10;

/// TCAP message kind as seen by the correlation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MessageKind {
    #[default]
    Begin,
    Continue,
    End,
    Abort,
    /// Any ANSI TCAP package; request and response are told apart by order.
    AnsiUnified,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Begin => write!(f, "BEGIN"),
            MessageKind::Continue => write!(f, "CONTINUE"),
            MessageKind::End => write!(f, "END"),
            MessageKind::Abort => write!(f, "ABORT"),
            MessageKind::AnsiUnified => write!(f, "ANSI"),
        }
    }
}

/// Totally ordered reference to a captured message (a frame number).
///
/// `MessageRef(0)` is reserved for "no message".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct MessageRef(pub u32);

impl MessageRef {
    pub const NONE: MessageRef = MessageRef(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// The message right before this one, never below `NONE`.
    pub fn previous(self) -> MessageRef {
        MessageRef(self.0.saturating_sub(1))
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for MessageRef {
    fn from(n: u32) -> Self {
        MessageRef(n)
    }
}

/// Absolute capture time of a message, as a duration since the Unix epoch.
///
/// Timeouts compare these carried values, never the wall clock of the
/// process running the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub fn new(since_epoch: Duration) -> Self {
        Timestamp(since_epoch)
    }

    pub fn from_secs(secs: u64) -> Self {
        Timestamp(Duration::from_secs(secs))
    }

    pub fn from_millis(millis: u64) -> Self {
        Timestamp(Duration::from_millis(millis))
    }

    pub fn since_epoch(&self) -> Duration {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_since(&self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }

    /// `true` when `self` lies strictly after `start + window`.
    pub fn is_past(&self, start: Timestamp, window: Duration) -> bool {
        match start.0.checked_add(window) {
            Some(deadline) => self.0 > deadline,
            None => false,
        }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(t: SystemTime) -> Self {
        Timestamp(t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(t: DateTime<Utc>) -> Self {
        let secs = u64::try_from(t.timestamp()).unwrap_or(0);
        Timestamp(Duration::new(secs, t.timestamp_subsec_nanos()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.0.as_secs(), self.0.subsec_nanos())
    }
}

/// The captured message being correlated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub message: MessageRef,
    pub time: Timestamp,
    pub endpoints: EndpointPair,
}

impl Frame {
    pub fn new(message: impl Into<MessageRef>, time: Timestamp, endpoints: EndpointPair) -> Self {
        Self {
            message: message.into(),
            time,
            endpoints,
        }
    }
}

/// Hook bound to a session and invoked once, when that session closes.
pub type ContextCloseHook = Rc<dyn Fn(&Context)>;

/// TCAP facts extracted from one message.
///
/// Which tid matters depends on `kind`:
///
/// - BEGIN: `src_tid` (originating transaction id)
/// - CONTINUE: both
/// - END / ABORT: `dst_tid`, with `src_tid` as a fallback
/// - ANSI: `src_tid`
#[derive(Clone, Default)]
pub struct MessageInfo {
    pub kind: MessageKind,
    pub src_tid: u32,
    pub dst_tid: u32,
    pub close_hook: Option<ContextCloseHook>,
}

impl MessageInfo {
    pub fn new(kind: MessageKind, src_tid: u32, dst_tid: u32) -> Self {
        Self {
            kind,
            src_tid,
            dst_tid,
            close_hook: None,
        }
    }

    pub fn begin(tid: u32) -> Self {
        Self::new(MessageKind::Begin, tid, 0)
    }

    pub fn cont(src_tid: u32, dst_tid: u32) -> Self {
        Self::new(MessageKind::Continue, src_tid, dst_tid)
    }

    pub fn end(dst_tid: u32) -> Self {
        Self::new(MessageKind::End, 0, dst_tid)
    }

    pub fn abort(dst_tid: u32) -> Self {
        Self::new(MessageKind::Abort, 0, dst_tid)
    }

    pub fn ansi(tid: u32) -> Self {
        Self::new(MessageKind::AnsiUnified, tid, 0)
    }

    pub fn with_close_hook(mut self, hook: ContextCloseHook) -> Self {
        self.close_hook = Some(hook);
        self
    }

    fn clear(&mut self) {
        self.kind = MessageKind::default();
        self.src_tid = 0;
        self.dst_tid = 0;
        self.close_hook = None;
    }
}

impl fmt::Debug for MessageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageInfo")
            .field("kind", &self.kind)
            .field("src_tid", &self.src_tid)
            .field("dst_tid", &self.dst_tid)
            .field("close_hook", &self.close_hook.is_some())
            .finish()
    }
}

/// Fixed ring of scratch [`MessageInfo`] slots reused across messages.
///
/// Each call to [`InfoRing::next_slot`] clears and returns the next slot;
/// after `INFO_RING_SIZE` calls the first slot is handed out again.
#[derive(Debug)]
pub struct InfoRing {
    slots: Vec<MessageInfo>,
    cursor: usize,
}

impl InfoRing {
    pub fn new() -> Self {
        Self {
            slots: vec![MessageInfo::default(); INFO_RING_SIZE],
            cursor: 0,
        }
    }

    pub fn next_slot(&mut self) -> &mut MessageInfo {
        self.cursor = (self.cursor + 1) % INFO_RING_SIZE;
        let slot = &mut self.slots[self.cursor];
        slot.clear();
        slot
    }
}

impl Default for InfoRing {
    fn default() -> Self {
        Self::new()
    }
}
