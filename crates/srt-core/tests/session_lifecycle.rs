//! Session lifecycle tests
//!
//! Closure, eviction versus persistence, chain head promotion, close hooks,
//! and the collaborator-facing surface (application context, config, JSON).

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use common::{engine, frame, persistent_engine, A, B};
use tcap_srt_core::{
    Context, ContextCloseHook, CorrelationEngine, DecoderHandle, Error, InfoRing, MessageInfo, MessageKind,
    MessageRef, Outcome, SessionId, SrtConfig, TableCount, Timestamp,
};

fn recording_hook() -> (ContextCloseHook, Rc<RefCell<Vec<SessionId>>>) {
    let closed = Rc::new(RefCell::new(Vec::new()));
    let sink = closed.clone();
    let hook: ContextCloseHook = Rc::new(move |ctx: &Context| sink.borrow_mut().push(ctx.session_id));
    (hook, closed)
}

#[test]
fn test_closing_head_promotes_successor() {
    let mut engine = engine();
    let s1 = engine.correlate(&frame(1, 0, A, B), &MessageInfo::begin(5)).unwrap().session_id();
    let s2 = engine.correlate(&frame(10, 31, A, B), &MessageInfo::begin(5)).unwrap().session_id();
    assert_eq!(engine.stats().begin, TableCount { heads: 1, records: 2 });

    engine.force_close(s1, &frame(11, 32, A, B)).unwrap();
    assert_eq!(engine.stats().begin, TableCount { heads: 1, records: 1 });
    assert!(engine.context(s1).is_none());

    // The successor still answers under the shared key
    let again = engine.correlate(&frame(10, 31, A, B), &MessageInfo::begin(5)).unwrap();
    assert_eq!(again.outcome, Outcome::Revisited);
    assert_eq!(again.session_id(), s2);

    let end = engine.correlate(&frame(12, 33, B, A), &MessageInfo::end(5)).unwrap();
    assert_eq!(end.session_id(), s2);
    assert_eq!(engine.stats().begin, TableCount::default());
    assert_eq!(engine.stats().contexts, 0);
}

#[test]
fn test_closing_tail_keeps_head() {
    let mut engine = engine();
    let s1 = engine.correlate(&frame(1, 0, A, B), &MessageInfo::begin(5)).unwrap().session_id();
    let s2 = engine.correlate(&frame(10, 31, A, B), &MessageInfo::begin(5)).unwrap().session_id();

    // The superseded dialogue ended at frame 9, so this answer binds to s2
    let cont = engine.correlate(&frame(11, 32, B, A), &MessageInfo::cont(9, 5)).unwrap();
    assert_eq!(cont.session_id(), s2);

    let end = engine.correlate(&frame(12, 33, B, A), &MessageInfo::end(9)).unwrap();
    assert_eq!(end.session_id(), s2);

    let stats = engine.stats();
    assert_eq!(stats.contexts, 1);
    assert_eq!(stats.begin, TableCount { heads: 1, records: 1 });
    assert_eq!(engine.context(s1).unwrap().last_message, Some(MessageRef(9)));
}

#[test]
fn test_persistent_mode_keeps_closed_sessions() {
    let mut engine = persistent_engine();
    engine.correlate(&frame(1, 0, A, B), &MessageInfo::begin(1)).unwrap();
    engine.correlate(&frame(2, 1, B, A), &MessageInfo::cont(7, 1)).unwrap();
    engine.correlate(&frame(3, 2, B, A), &MessageInfo::end(7)).unwrap();
    engine.correlate(&frame(4, 3, A, B), &MessageInfo::begin(1)).unwrap();

    let sessions: Vec<_> = engine.contexts().map(|c| (c.session_id, c.closed)).collect();
    assert_eq!(sessions, vec![(SessionId(1), true), (SessionId(2), false)]);

    let stats = engine.stats();
    assert_eq!(stats.begin, TableCount { heads: 1, records: 2 });
    assert_eq!(stats.cont.records, 1);
    assert_eq!(stats.end.records, 1);
    assert_eq!(stats.next_session_id, SessionId(3));
}

#[test]
fn test_end_revisit_after_eviction_is_recognised() {
    let mut engine = engine();
    let begin = engine.correlate(&frame(1, 0, A, B), &MessageInfo::begin(1)).unwrap();
    engine.correlate(&frame(2, 1, B, A), &MessageInfo::end(1)).unwrap();

    let again = engine.correlate(&frame(2, 1, B, A), &MessageInfo::end(1)).unwrap();
    assert_eq!(again.session_id(), begin.session_id());
    assert_eq!(again.outcome, Outcome::Revisited);
    assert_eq!(engine.stats().contexts, 0);
}

#[test]
fn test_answered_ansi_dialogue_is_kept() {
    let mut engine = engine();
    let (hook, closed) = recording_hook();
    let req = engine
        .correlate(
            &frame(1, 0, A, B),
            &MessageInfo::ansi(0x10).with_close_hook(hook),
        )
        .unwrap();
    let resp = engine.correlate(&frame(2, 2, B, A), &MessageInfo::ansi(0x10)).unwrap();

    assert_eq!(resp.outcome, Outcome::Closed);
    assert_eq!(resp.context.duration(), Some(Duration::from_secs(2)));
    assert_eq!(closed.borrow().as_slice(), &[req.session_id()]);

    let kept = engine.context(req.session_id()).unwrap();
    assert!(kept.closed);
    assert_eq!(engine.stats().ansi.records, 1);
}

#[test]
fn test_hook_offered_with_ansi_response_fires() {
    let mut engine = engine();
    let (hook, closed) = recording_hook();
    let req = engine.correlate(&frame(1, 0, A, B), &MessageInfo::ansi(0x11)).unwrap();
    engine
        .correlate(&frame(2, 1, B, A), &MessageInfo::ansi(0x11).with_close_hook(hook.clone()))
        .unwrap();
    assert_eq!(closed.borrow().as_slice(), &[req.session_id()]);

    // Replaying the response does not fire again
    engine
        .correlate(&frame(2, 1, B, A), &MessageInfo::ansi(0x11).with_close_hook(hook))
        .unwrap();
    assert_eq!(closed.borrow().len(), 1);
}

#[test]
fn test_close_hook_bound_on_continue() {
    let mut engine = engine();
    let (hook, closed) = recording_hook();
    let s = engine.correlate(&frame(1, 0, A, B), &MessageInfo::begin(1)).unwrap().session_id();
    engine
        .correlate(&frame(2, 1, B, A), &MessageInfo::cont(7, 1).with_close_hook(hook))
        .unwrap();
    assert!(closed.borrow().is_empty());

    engine.correlate(&frame(3, 2, B, A), &MessageInfo::abort(7)).unwrap();
    assert_eq!(closed.borrow().as_slice(), &[s]);
}

#[test]
fn test_first_hook_wins() {
    let mut engine = engine();
    let (first, first_closed) = recording_hook();
    let (second, second_closed) = recording_hook();
    engine
        .correlate(&frame(1, 0, A, B), &MessageInfo::begin(1).with_close_hook(first))
        .unwrap();
    engine
        .correlate(&frame(2, 1, B, A), &MessageInfo::cont(7, 1).with_close_hook(second))
        .unwrap();
    engine.correlate(&frame(3, 2, B, A), &MessageInfo::end(7)).unwrap();

    assert_eq!(first_closed.borrow().len(), 1);
    assert!(second_closed.borrow().is_empty());
}

#[test]
fn test_force_close_fires_hook() {
    let mut engine = engine();
    let (hook, closed) = recording_hook();
    let s = engine
        .correlate(&frame(1, 0, A, B), &MessageInfo::begin(1).with_close_hook(hook))
        .unwrap()
        .session_id();

    let ctx = engine.force_close(s, &frame(2, 5, A, B)).unwrap();
    assert_eq!(ctx.duration(), Some(Duration::from_secs(5)));
    assert_eq!(closed.borrow().as_slice(), &[s]);
}

#[test]
fn test_info_ring_slots_are_recycled() {
    let mut engine = engine();
    let mut ring = InfoRing::new();

    let slot = ring.next_slot();
    *slot = MessageInfo::begin(3);
    let s = engine.correlate(&frame(1, 0, A, B), slot).unwrap();
    assert_eq!(s.outcome, Outcome::Created);

    for _ in 0..9 {
        ring.next_slot().src_tid = 99;
    }
    let recycled = ring.next_slot();
    assert_eq!(recycled.kind, MessageKind::Begin);
    assert_eq!((recycled.src_tid, recycled.dst_tid), (0, 0));
    assert!(recycled.close_hook.is_none());
}

#[test]
fn test_app_context_survives_correlation() {
    let mut engine = engine();
    let s = engine.correlate(&frame(1, 0, A, B), &MessageInfo::begin(1)).unwrap().session_id();
    engine.set_app_context(s, "0.4.0.0.1.0.19.3", Some(DecoderHandle(2))).unwrap();

    let cont = engine.correlate(&frame(2, 1, B, A), &MessageInfo::cont(7, 1)).unwrap();
    assert_eq!(cont.context.app_context_id.as_deref(), Some("0.4.0.0.1.0.19.3"));
    assert_eq!(cont.context.decoder, Some(DecoderHandle(2)));

    let err = engine.set_app_context(s, "0.4.0.0.1.0.20.3", None).unwrap_err();
    assert!(err.to_string().contains("refusing 0.4.0.0.1.0.20.3"));
}

#[test]
fn test_engine_from_toml_config() {
    let config = SrtConfig::from_toml_str(
        r#"
            repetition_timeout_secs = 2
            lost_timeout_secs = 5
            persistent = true
        "#,
    )
    .unwrap();
    let mut engine = CorrelationEngine::with_config(config).unwrap();

    let first = engine.correlate(&frame(1, 0, A, B), &MessageInfo::begin(4)).unwrap();
    assert!(engine.correlate(&frame(2, 5, A, B), &MessageInfo::begin(4)).unwrap().is_duplicate());
    let fresh = engine.correlate(&frame(3, 6, A, B), &MessageInfo::begin(4)).unwrap();
    assert_ne!(fresh.session_id(), first.session_id());

    let invalid = SrtConfig::default().with_lost_timeout(Duration::from_secs(1));
    assert!(matches!(CorrelationEngine::with_config(invalid), Err(Error::InvalidConfig(_))));
    assert!(matches!(SrtConfig::from_toml_str("persistent = ["), Err(Error::ConfigParse(_))));
}

#[test]
fn test_context_serializes_public_fields() {
    let mut engine = persistent_engine();
    engine.correlate(&frame(1, 0, A, B), &MessageInfo::begin(1)).unwrap();
    let end = engine.correlate(&frame(3, 2, B, A), &MessageInfo::end(1)).unwrap();

    let json = serde_json::to_value(&end.context).unwrap();
    assert_eq!(json["session_id"], 1);
    assert_eq!(json["first_message"], 1);
    assert_eq!(json["last_message"], 3);
    assert_eq!(json["closed"], true);
    assert!(json.get("begin_link").is_none());
    assert!(json["app_context_id"].is_null());
}

#[test]
fn test_capture_clock_conversions() {
    let from_system = Timestamp::from(UNIX_EPOCH + Duration::from_millis(1_500));
    assert_eq!(from_system, Timestamp::from_millis(1_500));

    let from_chrono = Timestamp::from(DateTime::<Utc>::from_timestamp(1_700_000_000, 250_000_000).unwrap());
    assert_eq!(from_chrono.since_epoch(), Duration::new(1_700_000_000, 250_000_000));
    assert_eq!(from_chrono.to_string(), "1700000000.250000000");

    let before_epoch = Timestamp::from(UNIX_EPOCH - Duration::from_secs(1));
    assert_eq!(before_epoch, Timestamp::default());
    assert!(Timestamp::from(SystemTime::now()) > before_epoch);
}
