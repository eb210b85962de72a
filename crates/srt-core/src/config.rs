//! Engine configuration.
//!
//! ```rust
//! use std::time::Duration;
//! use tcap_srt_core::SrtConfig;
//!
//! let config = SrtConfig::default()
//!     .with_repetition_timeout(Duration::from_secs(5))
//!     .with_persistent(true);
//! assert!(config.validate().is_ok());
//!
//! let from_file = SrtConfig::from_toml_str("lost_timeout_secs = 60").unwrap();
//! assert_eq!(from_file.lost_timeout, Duration::from_secs(60));
//! ```

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Default window inside which a repeated BEGIN for an answered dialogue is a
/// retransmission.
pub const DEFAULT_REPETITION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default window after which an unanswered BEGIN is considered lost.
pub const DEFAULT_LOST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables of the correlation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrtConfig {
    /// A BEGIN reusing the key of an answered dialogue opens a new dialogue
    /// only once this much time has passed since that dialogue began.
    #[serde(rename = "repetition_timeout_secs", with = "duration_secs")]
    pub repetition_timeout: Duration,

    /// Same as `repetition_timeout`, for dialogues that were never answered.
    #[serde(rename = "lost_timeout_secs", with = "duration_secs")]
    pub lost_timeout: Duration,

    /// Keep closed dialogues in the tables instead of evicting them.
    pub persistent: bool,
}

impl Default for SrtConfig {
    fn default() -> Self {
        Self {
            repetition_timeout: DEFAULT_REPETITION_TIMEOUT,
            lost_timeout: DEFAULT_LOST_TIMEOUT,
            persistent: false,
        }
    }
}

impl SrtConfig {
    pub fn with_repetition_timeout(mut self, timeout: Duration) -> Self {
        self.repetition_timeout = timeout;
        self
    }

    pub fn with_lost_timeout(mut self, timeout: Duration) -> Self {
        self.lost_timeout = timeout;
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Checks the timeouts are usable.
    pub fn validate(&self) -> Result<()> {
        if self.repetition_timeout.is_zero() {
            return Err(Error::invalid_config("repetition timeout must be non-zero"));
        }
        if self.lost_timeout.is_zero() {
            return Err(Error::invalid_config("lost timeout must be non-zero"));
        }
        if self.lost_timeout < self.repetition_timeout {
            return Err(Error::invalid_config(format!(
                "lost timeout ({}s) shorter than repetition timeout ({}s)",
                self.lost_timeout.as_secs(),
                self.repetition_timeout.as_secs()
            )));
        }
        Ok(())
    }

    /// Parses and validates a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SrtConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

mod duration_secs {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
