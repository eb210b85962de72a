//! Dialogue contexts.
//!
//! A [`Context`] is one correlated TCAP dialogue. The engine owns every live
//! context; chain records only refer to it by [`SessionId`]. Callers get owned
//! snapshots back from [`CorrelationEngine::correlate`](crate::CorrelationEngine::correlate).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chain::ChainId;
use crate::message::{MessageRef, Timestamp};

/// Identity of a dialogue, unique for the lifetime of one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle naming the payload decoder chosen for a dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecoderHandle(pub u32);

/// One correlated dialogue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Context {
    pub session_id: SessionId,
    /// Message that opened the dialogue.
    pub first_message: MessageRef,
    /// Message that closed the dialogue, or the best guess at where it ended
    /// when a later dialogue reused its transaction id.
    pub last_message: Option<MessageRef>,
    pub begin_time: Timestamp,
    pub end_time: Option<Timestamp>,
    /// The peer answered (CONTINUE, END/ABORT or ANSI response seen).
    pub responded: bool,
    pub closed: bool,
    /// Negotiated application context, once learned.
    pub app_context_id: Option<String>,
    pub decoder: Option<DecoderHandle>,

    #[serde(skip)]
    pub(crate) begin_link: Option<ChainId>,
    #[serde(skip)]
    pub(crate) cont_link: Option<ChainId>,
    #[serde(skip)]
    pub(crate) end_link: Option<ChainId>,
    #[serde(skip)]
    pub(crate) ansi_link: Option<ChainId>,
}

impl Context {
    pub(crate) fn new(session_id: SessionId, first_message: MessageRef, begin_time: Timestamp) -> Self {
        Self {
            session_id,
            first_message,
            last_message: None,
            begin_time,
            end_time: None,
            responded: false,
            closed: false,
            app_context_id: None,
            decoder: None,
            begin_link: None,
            cont_link: None,
            end_link: None,
            ansi_link: None,
        }
    }

    /// Service response time: `end_time - begin_time`, once known.
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end.saturating_since(self.begin_time))
    }

    /// Whether a CONTINUE exchange is already bound to this dialogue.
    pub fn has_continue(&self) -> bool {
        self.cont_link.is_some()
    }

    /// `true` when `message` lies inside `[first_message, last_message]`,
    /// the upper bound being open while `last_message` is unknown.
    pub fn spans(&self, message: MessageRef) -> bool {
        message >= self.first_message && self.last_message.map_or(true, |last| message <= last)
    }

    /// `true` when `message` may be the one closing this dialogue.
    pub(crate) fn accepts_terminal(&self, message: MessageRef) -> bool {
        message > self.first_message && self.last_message.map_or(true, |last| last == message)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session {} begin in frame {}", self.session_id, self.first_message)?;
        if let Some(last) = self.last_message {
            write!(f, ", end in frame {}", last)?;
        }
        if let Some(d) = self.duration() {
            write!(f, ", duration {:.3}s", d.as_secs_f64())?;
        }
        Ok(())
    }
}
