//! Stream settings: parsing, defaults, and validation.

use std::time::Duration;

use serde::Deserialize;

use crate::{Result, StreamError};

/// Tunable knobs for throttling, buffering, and cancellation.
///
/// All fields carry serde defaults so a partial (or empty) TOML document
/// produces a fully usable configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StreamSettings {
    /// Throttle time window: minimum interval between coalesced progress
    /// emissions for one output channel.
    #[serde(default = "default_throttle_window_ms")]
    pub throttle_window_ms: u64,
    /// Throttle size window: pending bytes that force an emission before
    /// the time window elapses.
    #[serde(default = "default_throttle_bytes")]
    pub throttle_bytes: usize,
    /// Live-view tail cap: maximum bytes of accumulated output the registry
    /// retains per channel while a call is running.
    #[serde(default = "default_streaming_cap_bytes")]
    pub streaming_cap_bytes: usize,
    /// Hard ceiling on the stdout/stderr stored in a final result.
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,
    /// Grace period between a graceful termination request and a forced kill.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// Capacity of the multiplexer's event channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_throttle_window_ms() -> u64 {
    100
}

fn default_throttle_bytes() -> usize {
    4096
}

fn default_streaming_cap_bytes() -> usize {
    50 * 1024
}

fn default_max_buffer_bytes() -> usize {
    1024 * 1024
}

fn default_grace_period_ms() -> u64 {
    5000
}

fn default_event_channel_capacity() -> usize {
    256
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            throttle_window_ms: default_throttle_window_ms(),
            throttle_bytes: default_throttle_bytes(),
            streaming_cap_bytes: default_streaming_cap_bytes(),
            max_buffer_bytes: default_max_buffer_bytes(),
            grace_period_ms: default_grace_period_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl StreamSettings {
    /// Parse settings from a TOML document and validate them.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Config` if the TOML is malformed or a value
    /// fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Config` when a limit is zero or the streaming
    /// cap exceeds the result buffer cap.
    pub fn validate(&self) -> Result<()> {
        if self.throttle_bytes == 0 {
            return Err(StreamError::Config(
                "throttle_bytes must be greater than zero".into(),
            ));
        }
        if self.max_buffer_bytes == 0 {
            return Err(StreamError::Config(
                "max_buffer_bytes must be greater than zero".into(),
            ));
        }
        if self.streaming_cap_bytes == 0 {
            return Err(StreamError::Config(
                "streaming_cap_bytes must be greater than zero".into(),
            ));
        }
        if self.streaming_cap_bytes > self.max_buffer_bytes {
            return Err(StreamError::Config(format!(
                "streaming_cap_bytes ({}) must not exceed max_buffer_bytes ({})",
                self.streaming_cap_bytes, self.max_buffer_bytes
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(StreamError::Config(
                "event_channel_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Throttle time window as a [`Duration`].
    #[must_use]
    pub fn throttle_window(&self) -> Duration {
        Duration::from_millis(self.throttle_window_ms)
    }

    /// Cancellation grace period as a [`Duration`].
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}
