//! ANSI TCAP matching.
//!
//! ANSI packages are not told apart as BEGIN/CONTINUE/END at this layer, so
//! one symmetric table keyed by tid and endpoint pair serves every package.
//! Request and response are decided by frame order while walking the chain:
//!
//! - a dialogue first or last seen at this very message: revisit;
//! - the first dialogue opened before this message and still unanswered:
//!   this message is its response, which also closes it;
//! - at the last dialogue opened before this message: the same reuse
//!   decision as for BEGIN;
//! - otherwise: this message is a request opening a new dialogue.
//!
//! Direction is not considered, so a request retransmitted before the answer
//! arrives is taken as the response.
//!
//! Answered ANSI dialogues stay in the table so both of their frames can be
//! revisited.

use tracing::debug;

use super::ReuseVerdict;
use crate::chain::ChainId;
use crate::context::SessionId;
use crate::engine::{CorrelationEngine, Outcome};
use crate::key::AnsiKey;
use crate::message::{Frame, MessageInfo};

enum AnsiStep {
    Revisit(SessionId),
    Respond(SessionId),
    Tail(ChainId, SessionId),
}

impl CorrelationEngine {
    pub(crate) fn match_ansi(&mut self, frame: &Frame, info: &MessageInfo) -> Option<(SessionId, Outcome)> {
        let message = frame.message;
        let key = AnsiKey::from_message(info.src_tid, &frame.endpoints);

        let mut step = None;
        for (id, rec) in self.ansi.walk(&key) {
            let Some(ctx) = self.contexts.get(&rec.session) else {
                continue;
            };
            if ctx.first_message == message || (ctx.closed && ctx.last_message == Some(message)) {
                step = Some(AnsiStep::Revisit(rec.session));
                break;
            }
            if message < ctx.first_message {
                break;
            }
            if ctx.last_message.is_none() {
                step = Some(AnsiStep::Respond(rec.session));
                break;
            }
            step = Some(AnsiStep::Tail(id, rec.session));
        }

        let matched = match step {
            None => {
                let session = self.open_session(frame)?;
                let id = self.ansi.push_front(key, session);
                if let Some(ctx) = self.contexts.get_mut(&session) {
                    ctx.ansi_link = Some(id);
                }
                (session, Outcome::Created)
            }
            Some(AnsiStep::Revisit(session)) => (session, Outcome::Revisited),
            Some(AnsiStep::Respond(session)) => {
                if let Some(ctx) = self.contexts.get_mut(&session) {
                    ctx.last_message = Some(message);
                    ctx.end_time = Some(frame.time);
                    ctx.responded = true;
                    ctx.closed = true;
                    debug!(
                        %key,
                        session = %session,
                        first = %ctx.first_message,
                        response_ms = frame.time.saturating_since(ctx.begin_time).as_millis() as u64,
                        "ANSI response"
                    );
                }
                (session, Outcome::Closed)
            }
            Some(AnsiStep::Tail(tail_id, tail_session)) => match self.reuse_verdict(tail_session, frame) {
                ReuseVerdict::NewDialogue => {
                    let session = self.open_session(frame)?;
                    if let Some(id) = self.ansi.append(tail_id, session) {
                        if let Some(ctx) = self.contexts.get_mut(&session) {
                            ctx.ansi_link = Some(id);
                        }
                    }
                    self.backfill_last_message(tail_session, frame);
                    debug!(%key, previous = %tail_session, session = %session, "ANSI transaction id reused");
                    (session, Outcome::Created)
                }
                ReuseVerdict::Duplicate {
                    session_id,
                    first_message,
                } => {
                    debug!(%key, session = %session_id, first = %first_message, "duplicate ANSI request");
                    (
                        session_id,
                        Outcome::Duplicate {
                            session_id,
                            first_message,
                        },
                    )
                }
            },
        };
        Some(matched)
    }
}
