//! BEGIN matching.
//!
//! The key is the originator's tid plus the originator's address. Walking the
//! chain under that key:
//!
//! 1. a dialogue first opened by this very message: revisit, return it;
//! 2. at the last dialogue opened before this message, `reuse_verdict`
//!    decides between a new dialogue linked in behind it and a duplicate of
//!    that dialogue. Dialogues opened after this message are never its
//!    originals;
//! 3. no chain, or none opened before this message: a new dialogue.

use tracing::debug;

use super::ReuseVerdict;
use crate::context::SessionId;
use crate::engine::{CorrelationEngine, Outcome};
use crate::key::BeginKey;
use crate::message::{Frame, MessageInfo};

impl CorrelationEngine {
    pub(crate) fn match_begin(&mut self, frame: &Frame, info: &MessageInfo) -> Option<(SessionId, Outcome)> {
        let key = BeginKey::new(info.src_tid, frame.endpoints.src_hash());

        let mut tail = None;
        let mut has_chain = false;
        for (id, rec) in self.begin.walk(&key) {
            has_chain = true;
            if let Some(ctx) = self.contexts.get(&rec.session) {
                if ctx.first_message == frame.message {
                    return Some((rec.session, Outcome::Revisited));
                }
                if ctx.first_message > frame.message {
                    break;
                }
            }
            tail = Some((id, rec.session));
        }

        let Some((tail_id, tail_session)) = tail else {
            let session = self.open_session(frame)?;
            let id = if has_chain {
                self.begin.push_front(key, session)
            } else {
                self.begin.insert_head(key, session)
            };
            if let Some(ctx) = self.contexts.get_mut(&session) {
                ctx.begin_link = Some(id);
            }
            return Some((session, Outcome::Created));
        };

        let matched = match self.reuse_verdict(tail_session, frame) {
            ReuseVerdict::NewDialogue => {
                let session = self.open_session(frame)?;
                if let Some(id) = self.begin.append(tail_id, session) {
                    if let Some(ctx) = self.contexts.get_mut(&session) {
                        ctx.begin_link = Some(id);
                    }
                }
                self.backfill_last_message(tail_session, frame);
                debug!(%key, previous = %tail_session, session = %session, "transaction id reused");
                (session, Outcome::Created)
            }
            ReuseVerdict::Duplicate {
                session_id,
                first_message,
            } => {
                debug!(
                    %key,
                    session = %session_id,
                    first = %first_message,
                    message = %frame.message,
                    "duplicate BEGIN"
                );
                (
                    session_id,
                    Outcome::Duplicate {
                        session_id,
                        first_message,
                    },
                )
            }
        };
        Some(matched)
    }
}
