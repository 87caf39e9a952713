//! Crate-level error taxonomy.
//!
//! Each component owns a small error enum; [`Error`] aggregates them with `#[from]`, mirroring
//! the teacher's per-module `Error` enums composed at the transport boundary.

use thiserror::Error;

/// Failures from [`crate::field`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FieldError {
    /// `gcd(a, p) != 1`; surfaces from [`crate::field::FieldElement::inverse`].
    #[error("element is not invertible modulo p")]
    NotInvertible,
}

/// Failures from [`crate::sharing`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SharingError {
    #[error("share size must be at least 2, got {0}")]
    ShareSizeTooSmall(usize),
}

/// Failures from [`crate::committee`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CommitteeError {
    #[error("party count {0} out of range [{1}, {2}]")]
    PartyCountOutOfRange(usize, usize, usize),
}

/// Failures from [`crate::net::port_pool`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PoolError {
    #[error("port pool exhausted")]
    Exhausted,
}

/// Failures from [`crate::net::peer`].
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("failed to connect to {0}")]
    Connect(String),
    #[error("failed to send to {0}: {1}")]
    Send(String, String),
    #[error("io error: {0}")]
    Io(String),
}

/// Failures from [`crate::config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Parse(#[from] config::ConfigError),
    #[error("party_count {0} out of range [{1}, {2}]")]
    InvalidPartyCount(usize, usize, usize),
}

/// A sub-protocol's receive returned fewer values than required before its deadline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("protocol incomplete: expected {expected} values, got {got}")]
pub struct ProtocolIncomplete {
    pub expected: usize,
    pub got: usize,
}

/// Top-level error type returned by the orchestrator and its argument validation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Domain(#[from] FieldError),

    #[error(transparent)]
    Sharing(#[from] SharingError),

    #[error(transparent)]
    Committee(#[from] CommitteeError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Protocol(#[from] ProtocolIncomplete),
}
