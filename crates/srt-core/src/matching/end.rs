//! END / ABORT matching.
//!
//! Finds the dialogue a terminating message closes; the closing itself is
//! done by the engine. Lookup order:
//!
//! 1. the END key registered when the dialogue's CONTINUE was bound, accepting
//!    only a dialogue not yet closed by some other message;
//! 2. the BEGIN chain by (dst tid, dst address): an END answering the BEGIN
//!    directly, with no CONTINUE in between;
//! 3. the BEGIN chain by (src tid, src address).

use tracing::trace;

use super::find_matching;
use crate::context::SessionId;
use crate::engine::CorrelationEngine;
use crate::key::{BeginKey, EndKey};
use crate::message::{Frame, MessageInfo};

impl CorrelationEngine {
    pub(crate) fn match_end(&self, frame: &Frame, info: &MessageInfo) -> Option<SessionId> {
        let message = frame.message;
        let end_key = EndKey::from_message(info.dst_tid, &frame.endpoints);

        if let Some(session) = find_matching(&self.end, &self.contexts, &end_key, |ctx| ctx.accepts_terminal(message)) {
            trace!(%end_key, session = %session, "END matched through END key");
            return Some(session);
        }

        let from_dst = BeginKey::new(info.dst_tid, frame.endpoints.dst_hash());
        let from_src = BeginKey::new(info.src_tid, frame.endpoints.src_hash());
        let session = find_matching(&self.begin, &self.contexts, &from_dst, |ctx| ctx.spans(message))
            .or_else(|| find_matching(&self.begin, &self.contexts, &from_src, |ctx| ctx.spans(message)));

        match session {
            Some(session) => trace!(%end_key, session = %session, "END matched through BEGIN"),
            None => trace!(%end_key, kind = %info.kind, "END without a matching dialogue"),
        }
        session
    }
}
