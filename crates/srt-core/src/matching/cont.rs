//! CONTINUE matching.
//!
//! A CONTINUE already bound to a dialogue is found through the symmetric
//! CONTINUE key. Otherwise it is the first answer to a BEGIN: the BEGIN is
//! looked up by (dst tid, dst address), then by (src tid, src address) for a
//! CONTINUE seen from the originator's side. Binding registers a CONTINUE
//! key and the END key under which either peer closes the dialogue.

use tracing::{debug, trace};

use super::find_matching;
use crate::context::{Context, SessionId};
use crate::engine::CorrelationEngine;
use crate::key::{BeginKey, ContKey, EndKey};
use crate::message::{Frame, MessageInfo};

impl CorrelationEngine {
    pub(crate) fn match_continue(&mut self, frame: &Frame, info: &MessageInfo) -> Option<SessionId> {
        let message = frame.message;
        let cont_key = ContKey::from_message(info.src_tid, info.dst_tid, &frame.endpoints);

        if let Some(session) = find_matching(&self.cont, &self.contexts, &cont_key, |ctx| ctx.spans(message)) {
            trace!(%cont_key, session = %session, "CONTINUE matched bound exchange");
            return Some(session);
        }

        let unbound = |ctx: &Context| !ctx.closed && !ctx.has_continue() && ctx.spans(message);
        let from_dst = BeginKey::new(info.dst_tid, frame.endpoints.dst_hash());
        let from_src = BeginKey::new(info.src_tid, frame.endpoints.src_hash());
        let Some(session) = find_matching(&self.begin, &self.contexts, &from_dst, unbound)
            .or_else(|| find_matching(&self.begin, &self.contexts, &from_src, unbound))
        else {
            trace!(%cont_key, "CONTINUE without a matching BEGIN");
            return None;
        };

        let cont_id = self.cont.push(cont_key, session);
        let end_key = EndKey::new(info.src_tid, frame.endpoints.src_hash(), frame.endpoints.dst_hash());
        let end_id = self.end.push(end_key, session);

        let ctx = self.contexts.get_mut(&session)?;
        ctx.responded = true;
        ctx.cont_link = Some(cont_id);
        ctx.end_link = Some(end_id);
        debug!(%cont_key, %end_key, session = %session, "CONTINUE bound to session");
        Some(session)
    }
}
