// Shared helpers for the correlation integration tests.
//
// Peers are ITU point codes; frames carry whole-second capture times so the
// timeout arithmetic in the tests reads directly.

#![allow(dead_code)]

use tcap_srt_core::{CorrelationEngine, EndpointPair, Frame, PointCode, SrtConfig, Timestamp};

pub const A: u32 = 1001;
pub const B: u32 = 2002;
pub const C: u32 = 3003;

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A frame from point code `src` to point code `dst`.
pub fn frame(message: u32, secs: u64, src: u32, dst: u32) -> Frame {
    Frame::new(
        message,
        Timestamp::from_secs(secs),
        EndpointPair::new(PointCode::itu(src), PointCode::itu(dst)),
    )
}

pub fn engine() -> CorrelationEngine {
    init_tracing();
    CorrelationEngine::default()
}

pub fn persistent_engine() -> CorrelationEngine {
    init_tracing();
    CorrelationEngine::new(SrtConfig::default().with_persistent(true))
}
