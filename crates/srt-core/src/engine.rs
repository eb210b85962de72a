//! The correlation engine: state for one analysis run and its entry point.
//!
//! ```text
//!        Frame + MessageInfo
//!               │
//!               ▼
//!         correlate() ── message 0 ──▶ None
//!               │
//!   ┌───────────┼─────────────┬──────────────┐
//!   ▼           ▼             ▼              ▼
//! BEGIN     CONTINUE      END/ABORT        ANSI
//!   │           │             │              │
//!   └── begin ◀─┤   end ◀─────┤  ansi ◀──────┘
//!       table   ├─▶ cont      │  table
//!               └─▶ end       └─▶ close_session ─▶ evict (unless persistent)
//! ```
//!
//! One engine is created per analysis run; [`CorrelationEngine::reset`]
//! starts a new run with empty tables and session ids from 1.
//!
//! Every correlated message is remembered with the session and outcome it
//! got, so a message correlated again in the same run gets the same answer
//! even after its dialogue was evicted from the tables.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace, warn};

use crate::chain::{ChainTable, Unlinked};
use crate::config::SrtConfig;
use crate::context::{Context, DecoderHandle, SessionId};
use crate::error::{Error, Result};
use crate::key::{AnsiKey, BeginKey, ContKey, EndKey};
use crate::message::{ContextCloseHook, Frame, MessageInfo, MessageKind, MessageRef};

/// How a message related to the dialogue it was correlated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The message opened a new dialogue.
    Created,
    /// The message was already correlated earlier in this run.
    Revisited,
    /// The message repeats the opening request of a dialogue still in
    /// progress.
    Duplicate {
        session_id: SessionId,
        first_message: MessageRef,
    },
    /// The message joined an existing dialogue.
    Matched,
    /// The message closed the dialogue.
    Closed,
}

/// Result of correlating one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    /// Snapshot of the dialogue taken after the message was applied.
    pub context: Context,
    pub outcome: Outcome,
}

impl Correlation {
    pub fn session_id(&self) -> SessionId {
        self.context.session_id
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self.outcome, Outcome::Duplicate { .. })
    }
}

/// Occupancy of one chain table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableCount {
    pub heads: usize,
    pub records: usize,
}

/// Occupancy of all engine tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub contexts: usize,
    pub begin: TableCount,
    pub cont: TableCount,
    pub end: TableCount,
    pub ansi: TableCount,
    pub next_session_id: SessionId,
}

/// Correlates TCAP messages into dialogues.
pub struct CorrelationEngine {
    pub(crate) config: SrtConfig,
    next_session: u32,
    pub(crate) contexts: BTreeMap<SessionId, Context>,
    pub(crate) begin: ChainTable<BeginKey>,
    pub(crate) cont: ChainTable<ContKey>,
    pub(crate) end: ChainTable<EndKey>,
    pub(crate) ansi: ChainTable<AnsiKey>,
    hooks: HashMap<SessionId, ContextCloseHook>,
    /// First answer given for each correlated message.
    seen: HashMap<MessageRef, (SessionId, Outcome)>,
    /// Final state of sessions evicted on close.
    retired: HashMap<SessionId, Context>,
}

impl CorrelationEngine {
    /// Creates an engine with an already validated configuration.
    pub fn new(config: SrtConfig) -> Self {
        Self {
            config,
            next_session: 1,
            contexts: BTreeMap::new(),
            begin: ChainTable::new("begin"),
            cont: ChainTable::new("cont"),
            end: ChainTable::new("end"),
            ansi: ChainTable::new("ansi"),
            hooks: HashMap::new(),
            seen: HashMap::new(),
            retired: HashMap::new(),
        }
    }

    /// Validates `config` and creates an engine with it.
    pub fn with_config(config: SrtConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &SrtConfig {
        &self.config
    }

    /// Drops every dialogue and restarts session ids at 1.
    pub fn reset(&mut self) {
        debug!(contexts = self.contexts.len(), "resetting correlation tables");
        *self = Self::new(self.config.clone());
    }

    /// Correlates one message and returns the dialogue it belongs to.
    ///
    /// `None` means no dialogue could be found for a CONTINUE, END or ABORT
    /// (or `frame.message` is the reserved reference 0); the caller should
    /// simply not annotate the message.
    pub fn correlate(&mut self, frame: &Frame, info: &MessageInfo) -> Option<Correlation> {
        if !frame.message.is_valid() {
            trace!(kind = %info.kind, "ignoring message 0");
            return None;
        }

        if let Some(&(session, first)) = self.seen.get(&frame.message) {
            let outcome = match first {
                Outcome::Duplicate { .. } => first,
                _ => Outcome::Revisited,
            };
            trace!(message = %frame.message, session = %session, "message already correlated");
            return self.snapshot(session, outcome);
        }

        let correlation = self.dispatch(frame, info)?;
        self.seen
            .insert(frame.message, (correlation.session_id(), correlation.outcome));
        Some(correlation)
    }

    /// Routes a message seen for the first time to its matching procedure.
    fn dispatch(&mut self, frame: &Frame, info: &MessageInfo) -> Option<Correlation> {
        match info.kind {
            MessageKind::Begin => {
                let (session, outcome) = self.match_begin(frame, info)?;
                self.bind_hook(session, info, false);
                self.snapshot(session, outcome)
            }
            MessageKind::Continue => {
                let session = self.match_continue(frame, info)?;
                self.bind_hook(session, info, false);
                self.snapshot(session, Outcome::Matched)
            }
            MessageKind::End | MessageKind::Abort => {
                let session = self.match_end(frame, info)?;
                self.bind_hook(session, info, false);
                let already_closed = self
                    .contexts
                    .get(&session)
                    .is_some_and(|ctx| ctx.closed && ctx.last_message == Some(frame.message));
                if already_closed {
                    return self.snapshot(session, Outcome::Revisited);
                }
                let context = self.close_session(session, frame)?;
                Some(Correlation {
                    context,
                    outcome: Outcome::Closed,
                })
            }
            MessageKind::AnsiUnified => {
                let (session, outcome) = self.match_ansi(frame, info)?;
                self.bind_hook(session, info, outcome == Outcome::Closed);
                if outcome == Outcome::Closed {
                    self.fire_close_hook(session);
                }
                self.snapshot(session, outcome)
            }
        }
    }

    /// Records the negotiated application context of a dialogue and the
    /// decoder chosen for it.
    ///
    /// Rebinding to the same application context is a no-op that may update
    /// the decoder; rebinding to a different one is refused.
    pub fn set_app_context(
        &mut self,
        session_id: SessionId,
        app_context_id: impl Into<String>,
        decoder: Option<DecoderHandle>,
    ) -> Result<()> {
        let requested = app_context_id.into();
        let ctx = self
            .contexts
            .get_mut(&session_id)
            .ok_or(Error::UnknownSession(session_id))?;

        match &ctx.app_context_id {
            Some(bound) if *bound != requested => {
                return Err(Error::AppContextConflict {
                    session_id,
                    bound: bound.clone(),
                    requested,
                });
            }
            _ => {}
        }

        debug!(session = %session_id, app_context = %requested, "application context bound");
        ctx.app_context_id = Some(requested);
        if decoder.is_some() {
            ctx.decoder = decoder;
        }
        Ok(())
    }

    /// Closes a live dialogue on behalf of an upper layer (pre-arranged end).
    pub fn force_close(&mut self, session_id: SessionId, frame: &Frame) -> Result<Context> {
        self.close_session(session_id, frame)
            .ok_or(Error::UnknownSession(session_id))
    }

    /// Live dialogue with this id.
    pub fn context(&self, session_id: SessionId) -> Option<&Context> {
        self.contexts.get(&session_id)
    }

    /// All live dialogues, ordered by session id.
    pub fn contexts(&self) -> impl Iterator<Item = &Context> {
        self.contexts.values()
    }

    pub fn stats(&self) -> TableStats {
        fn count<K>(table: &ChainTable<K>) -> TableCount
        where
            K: Eq + std::hash::Hash + Clone + std::fmt::Display,
        {
            TableCount {
                heads: table.head_count(),
                records: table.record_count(),
            }
        }

        TableStats {
            contexts: self.contexts.len(),
            begin: count(&self.begin),
            cont: count(&self.cont),
            end: count(&self.end),
            ansi: count(&self.ansi),
            next_session_id: SessionId(self.next_session),
        }
    }

    /// Creates a fresh dialogue opened by `frame`.
    ///
    /// Returns `None` once the run has used up the session id space; the
    /// last id handed out is `u32::MAX - 1`.
    pub(crate) fn open_session(&mut self, frame: &Frame) -> Option<SessionId> {
        let Some(next) = self.next_session.checked_add(1) else {
            warn!(message = %frame.message, "session ids exhausted, message left uncorrelated");
            return None;
        };
        let session_id = SessionId(self.next_session);
        self.next_session = next;
        self.contexts
            .insert(session_id, Context::new(session_id, frame.message, frame.time));
        debug!(session = %session_id, message = %frame.message, "new session");
        Some(session_id)
    }

    fn snapshot(&self, session: SessionId, outcome: Outcome) -> Option<Correlation> {
        let ctx = self.contexts.get(&session).or_else(|| self.retired.get(&session));
        ctx.map(|ctx| Correlation {
            context: ctx.clone(),
            outcome,
        })
    }

    /// Binds the message's hook unless one is bound already. `closing` is set
    /// when this very message closed the session.
    fn bind_hook(&mut self, session: SessionId, info: &MessageInfo, closing: bool) {
        if let Some(hook) = &info.close_hook {
            if closing || self.contexts.get(&session).is_some_and(|ctx| !ctx.closed) {
                self.hooks.entry(session).or_insert_with(|| hook.clone());
            }
        }
    }

    fn fire_close_hook(&mut self, session: SessionId) {
        if let Some(hook) = self.hooks.remove(&session) {
            if let Some(ctx) = self.contexts.get(&session) {
                hook(ctx);
            }
        }
    }

    /// Marks the dialogue closed at `frame` and, unless the engine is
    /// persistent, evicts it from every table.
    pub(crate) fn close_session(&mut self, session: SessionId, frame: &Frame) -> Option<Context> {
        let ctx = self.contexts.get_mut(&session)?;
        ctx.responded = true;
        ctx.last_message = Some(frame.message);
        ctx.end_time = Some(frame.time);
        ctx.closed = true;
        let snapshot = ctx.clone();

        debug!(
            session = %session,
            first = %snapshot.first_message,
            last = %frame.message,
            duration_ms = snapshot.duration().map(|d| d.as_millis() as u64).unwrap_or(0),
            "session closed"
        );

        if let Some(hook) = self.hooks.remove(&session) {
            hook(&snapshot);
        }
        if !self.config.persistent {
            self.evict(&snapshot);
        }
        Some(snapshot)
    }

    fn evict(&mut self, ctx: &Context) {
        let session = ctx.session_id;
        let mut results = Vec::with_capacity(4);
        if let Some(id) = ctx.begin_link {
            results.push((self.begin.name(), self.begin.unlink(id)));
        }
        if let Some(id) = ctx.cont_link {
            results.push((self.cont.name(), self.cont.unlink(id)));
        }
        if let Some(id) = ctx.end_link {
            results.push((self.end.name(), self.end.unlink(id)));
        }
        if let Some(id) = ctx.ansi_link {
            results.push((self.ansi.name(), self.ansi.unlink(id)));
        }
        for (table, unlinked) in results {
            match unlinked {
                Unlinked::Promoted(_) => debug!(session = %session, table, "successor promoted to chain head"),
                Unlinked::Missing => debug!(session = %session, table, "chain record already gone"),
                _ => trace!(session = %session, table, ?unlinked, "chain record unlinked"),
            }
        }
        if let Some(ctx) = self.contexts.remove(&session) {
            self.retired.insert(session, ctx);
        }
        self.hooks.remove(&session);
    }
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self::new(SrtConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{EndpointPair, PointCode};
    use crate::message::{MessageRef, Timestamp};
    use std::cell::Cell;
    use std::rc::Rc;

    fn a_to_b(n: u32, secs: u64) -> Frame {
        Frame::new(n, Timestamp::from_secs(secs), EndpointPair::new(PointCode::itu(1), PointCode::itu(2)))
    }

    fn b_to_a(n: u32, secs: u64) -> Frame {
        Frame::new(n, Timestamp::from_secs(secs), EndpointPair::new(PointCode::itu(2), PointCode::itu(1)))
    }

    #[test]
    fn test_message_zero_is_ignored() {
        let mut engine = CorrelationEngine::default();
        assert!(engine.correlate(&a_to_b(0, 0), &MessageInfo::begin(1)).is_none());
        assert_eq!(engine.stats().contexts, 0);
        assert_eq!(engine.stats().next_session_id, SessionId(1));
    }

    #[test]
    fn test_reset_restarts_session_ids() {
        let mut engine = CorrelationEngine::default();
        engine.correlate(&a_to_b(1, 0), &MessageInfo::begin(1)).unwrap();
        engine.correlate(&a_to_b(2, 0), &MessageInfo::begin(2)).unwrap();
        assert_eq!(engine.stats().next_session_id, SessionId(3));

        engine.reset();
        assert_eq!(engine.stats().contexts, 0);
        let again = engine.correlate(&a_to_b(1, 0), &MessageInfo::begin(1)).unwrap();
        assert_eq!(again.session_id(), SessionId(1));
    }

    #[test]
    fn test_close_evicts_every_link() {
        let mut engine = CorrelationEngine::default();
        engine.correlate(&a_to_b(1, 0), &MessageInfo::begin(1)).unwrap();
        engine.correlate(&b_to_a(2, 1), &MessageInfo::cont(7, 1)).unwrap();
        let stats = engine.stats();
        assert_eq!((stats.begin.records, stats.cont.records, stats.end.records), (1, 1, 1));

        let closed = engine.correlate(&b_to_a(3, 2), &MessageInfo::end(7)).unwrap();
        assert_eq!(closed.outcome, Outcome::Closed);

        let stats = engine.stats();
        assert_eq!(stats.contexts, 0);
        assert_eq!(stats.begin, TableCount::default());
        assert_eq!(stats.cont, TableCount::default());
        assert_eq!(stats.end, TableCount::default());
    }

    #[test]
    fn test_set_app_context_binding_rules() {
        let mut engine = CorrelationEngine::default();
        let s = engine.correlate(&a_to_b(1, 0), &MessageInfo::begin(1)).unwrap().session_id();

        engine.set_app_context(s, "0.4.0.0.1.0.2.3", Some(DecoderHandle(7))).unwrap();
        engine.set_app_context(s, "0.4.0.0.1.0.2.3", None).unwrap();
        let ctx = engine.context(s).unwrap();
        assert_eq!(ctx.app_context_id.as_deref(), Some("0.4.0.0.1.0.2.3"));
        assert_eq!(ctx.decoder, Some(DecoderHandle(7)));

        let err = engine.set_app_context(s, "0.4.0.0.1.0.14.3", None).unwrap_err();
        assert!(matches!(err, Error::AppContextConflict { .. }));

        let missing = engine.set_app_context(SessionId(99), "x", None).unwrap_err();
        assert!(matches!(missing, Error::UnknownSession(SessionId(99))));
    }

    #[test]
    fn test_close_hook_fires_once() {
        let fired = Rc::new(Cell::new(0u32));
        let seen = fired.clone();
        let hook: ContextCloseHook = Rc::new(move |ctx: &Context| {
            assert!(ctx.closed);
            seen.set(seen.get() + 1);
        });

        let mut engine = CorrelationEngine::new(SrtConfig::default().with_persistent(true));
        engine
            .correlate(&a_to_b(1, 0), &MessageInfo::begin(5).with_close_hook(hook))
            .unwrap();
        assert_eq!(fired.get(), 0);

        engine.correlate(&b_to_a(2, 1), &MessageInfo::end(5)).unwrap();
        assert_eq!(fired.get(), 1);

        // Replaying the END neither re-closes nor re-fires
        let replay = engine.correlate(&b_to_a(2, 1), &MessageInfo::end(5)).unwrap();
        assert_eq!(replay.outcome, Outcome::Revisited);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_evicted_session_answers_revisits() {
        let mut engine = CorrelationEngine::default();
        let begin = engine.correlate(&a_to_b(1, 0), &MessageInfo::begin(1)).unwrap();
        engine.correlate(&b_to_a(2, 3), &MessageInfo::end(1)).unwrap();
        let stats = engine.stats();
        assert_eq!(stats.contexts, 0);

        for (frame, info) in [(a_to_b(1, 0), MessageInfo::begin(1)), (b_to_a(2, 3), MessageInfo::end(1))] {
            let again = engine.correlate(&frame, &info).unwrap();
            assert_eq!(again.session_id(), begin.session_id());
            assert_eq!(again.outcome, Outcome::Revisited);
            assert!(again.context.closed);
            assert_eq!(again.context.last_message, Some(MessageRef(2)));
        }
        assert_eq!(engine.stats(), stats);
        assert!(engine.context(begin.session_id()).is_none());
    }

    #[test]
    fn test_session_id_exhaustion_leaves_message_uncorrelated() {
        let mut engine = CorrelationEngine::default();
        engine.next_session = u32::MAX - 1;
        let last = engine.correlate(&a_to_b(1, 0), &MessageInfo::begin(1)).unwrap();
        assert_eq!(last.session_id(), SessionId(u32::MAX - 1));

        let stats = engine.stats();
        assert!(engine.correlate(&a_to_b(2, 0), &MessageInfo::begin(2)).is_none());
        assert!(engine.correlate(&a_to_b(3, 0), &MessageInfo::ansi(3)).is_none());
        assert_eq!(engine.stats(), stats);

        // Existing sessions still correlate
        let end = engine.correlate(&b_to_a(4, 1), &MessageInfo::end(1)).unwrap();
        assert_eq!(end.session_id(), last.session_id());
    }

    #[test]
    fn test_force_close() {
        let mut engine = CorrelationEngine::default();
        let s = engine.correlate(&a_to_b(1, 10), &MessageInfo::begin(1)).unwrap().session_id();

        let ctx = engine.force_close(s, &a_to_b(4, 13)).unwrap();
        assert!(ctx.closed);
        assert_eq!(ctx.last_message, Some(MessageRef(4)));
        assert_eq!(ctx.duration(), Some(std::time::Duration::from_secs(3)));
        assert!(engine.context(s).is_none());

        assert!(matches!(engine.force_close(s, &a_to_b(5, 14)), Err(Error::UnknownSession(_))));
    }
}
