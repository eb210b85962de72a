//! TCAP transaction correlation and service response time (SRT) engine.
//!
//! Captured TCAP messages carry only a local transaction id and a message
//! kind. This crate associates the BEGIN, CONTINUE and END/ABORT messages (or
//! the ANSI packages) of one end-to-end dialogue, gives each dialogue a
//! session id, and derives the facts a decoder wants to show next to each
//! message: which session it belongs to, where that session began and ended,
//! how long the peer took to answer, and whether a request is a duplicate.
//!
//! The engine tolerates transaction-id reuse, lost and duplicated messages,
//! swapped source/destination between the two peers' views, and messages
//! being correlated again later in the same run.
//!
//! ## Usage
//!
//! ```rust
//! use tcap_srt_core::{
//!     CorrelationEngine, EndpointPair, Frame, MessageInfo, Outcome, PointCode, Timestamp,
//! };
//!
//! let mut engine = CorrelationEngine::default();
//! let a = PointCode::itu(1001);
//! let b = PointCode::itu(2002);
//!
//! let begin = Frame::new(1, Timestamp::from_secs(0), EndpointPair::new(a, b));
//! let s1 = engine.correlate(&begin, &MessageInfo::begin(1)).unwrap();
//! assert_eq!(s1.outcome, Outcome::Created);
//!
//! let cont = Frame::new(2, Timestamp::from_secs(1), EndpointPair::new(b, a));
//! let c = engine.correlate(&cont, &MessageInfo::cont(7, 1)).unwrap();
//! assert_eq!(c.session_id(), s1.session_id());
//!
//! let end = Frame::new(3, Timestamp::from_secs(2), EndpointPair::new(b, a));
//! let closed = engine.correlate(&end, &MessageInfo::end(7)).unwrap();
//! assert!(closed.context.closed);
//! assert_eq!(closed.context.duration().unwrap().as_secs(), 2);
//! ```
//!
//! ## Modules
//!
//! - [`address`]: endpoints and the address hasher
//! - [`key`]: per-kind correlation keys
//! - [`message`]: per-message inputs
//! - [`context`]: dialogue contexts
//! - [`chain`]: collision chains over an index arena
//! - [`matching`]: the four matching procedures
//! - [`engine`]: the engine, dispatch and closure
//! - [`config`]: timeouts and the persistence flag

pub mod address;
pub mod chain;
pub mod config;
pub mod context;
pub mod engine;
mod error;
pub mod key;
pub mod matching;
pub mod message;

pub use address::{Endpoint, EndpointPair, PointCode, PointCodeVariant, hash_endpoint};
pub use config::SrtConfig;
pub use context::{Context, DecoderHandle, SessionId};
pub use engine::{Correlation, CorrelationEngine, Outcome, TableCount, TableStats};
pub use error::{Error, Result};
pub use key::{AnsiKey, BeginKey, ContKey, EndKey};
pub use message::{ContextCloseHook, Frame, InfoRing, MessageInfo, MessageKind, MessageRef, Timestamp};
