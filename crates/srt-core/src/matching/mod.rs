//! The four matching procedures, one per message kind.
//!
//! Each submodule adds one `match_*` method to
//! [`CorrelationEngine`](crate::CorrelationEngine):
//!
//! - [`begin`]: BEGIN opens a dialogue, or is recognised as a revisit or a
//!   retransmission
//! - [`cont`]: CONTINUE binds the answering side to the BEGIN it answers
//! - [`end`]: END/ABORT finds the dialogue to close
//! - [`ansi`]: ANSI packages, request vs. response decided by frame order
//!
//! BEGIN and ANSI share the tid-reuse decision (`reuse_verdict`) and the
//! end-marker backfill for superseded dialogues.

pub mod ansi;
pub mod begin;
pub mod cont;
pub mod end;

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

use tracing::debug;

use crate::chain::ChainTable;
use crate::context::{Context, SessionId};
use crate::engine::CorrelationEngine;
use crate::message::{Frame, MessageRef};

/// What to do with a request whose key already heads a chain, judged against
/// the dialogue at the tail of that chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReuseVerdict {
    /// The tid was reused by an unrelated dialogue.
    NewDialogue,
    /// The request is a retransmission of the tail dialogue's request.
    Duplicate {
        session_id: SessionId,
        first_message: MessageRef,
    },
}

/// First session in the chain under `key` whose context satisfies `accept`.
pub(crate) fn find_matching<K>(
    table: &ChainTable<K>,
    contexts: &BTreeMap<SessionId, Context>,
    key: &K,
    accept: impl Fn(&Context) -> bool,
) -> Option<SessionId>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    table
        .walk(key)
        .filter_map(|(_, rec)| contexts.get(&rec.session))
        .find(|ctx| accept(ctx))
        .map(|ctx| ctx.session_id)
}

impl CorrelationEngine {
    /// Decides whether `frame` starts a new dialogue reusing the key of
    /// `tail`, or repeats `tail`'s request.
    ///
    /// A new dialogue is assumed when the tail is closed, or when `frame`
    /// comes after the tail's first message and outside its timeout: the
    /// repetition timeout once the tail was answered, the lost timeout
    /// otherwise.
    pub(crate) fn reuse_verdict(&self, tail: SessionId, frame: &Frame) -> ReuseVerdict {
        let Some(prev) = self.contexts.get(&tail) else {
            return ReuseVerdict::NewDialogue;
        };

        let window = if prev.responded {
            self.config.repetition_timeout
        } else {
            self.config.lost_timeout
        };
        let expired = frame.message > prev.first_message && frame.time.is_past(prev.begin_time, window);

        if expired || prev.closed {
            ReuseVerdict::NewDialogue
        } else {
            ReuseVerdict::Duplicate {
                session_id: prev.session_id,
                first_message: prev.first_message,
            }
        }
    }

    /// Marks where a superseded dialogue ended when it never saw its end:
    /// right before the message that reused its key.
    pub(crate) fn backfill_last_message(&mut self, superseded: SessionId, frame: &Frame) {
        if let Some(prev) = self.contexts.get_mut(&superseded) {
            if prev.last_message.is_none() {
                prev.last_message = Some(frame.message.previous());
                debug!(
                    session = %superseded,
                    last = %frame.message.previous(),
                    "superseded session given an end marker"
                );
            }
        }
    }
}
