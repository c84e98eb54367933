//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared result type for all protocol operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Error enumeration covering all internal failure modes.
///
/// Process-level failures (spawn errors, timeouts, cancellation) are never
/// surfaced through this type across the protocol boundary — they resolve
/// to terminal results with the matching outcome. `StreamError` covers the
/// plumbing around them: configuration, channels, and invariant breaches.
#[derive(Debug)]
pub enum StreamError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Child process could not be started.
    Spawn(String),
    /// File-system or pipe I/O failure while observing a child.
    Io(String),
    /// An internal mpsc channel was closed before the protocol finished.
    Channel(String),
    /// Internal protocol invariant breach (ordering or lifecycle).
    Protocol(String),
}

impl Display for StreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Channel(msg) => write!(f, "channel: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<toml::de::Error> for StreamError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
