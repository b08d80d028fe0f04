//! Error types for the session core.
//!
//! Every operation returns a closed enum so callers can match
//! exhaustively. All errors are reported synchronously and nothing is
//! retried internally; a failed operation leaves prior state untouched.

use thiserror::Error;

/// A peer-supplied public key failed validation.
///
/// Raised when a Diffie-Hellman exchange is non-contributory, i.e. the
/// peer sent the identity element or another low-order point. Fatal to the
/// handshake attempt; never retry with the same input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid peer public key")]
pub struct InvalidPeerKey;

/// An identity handle failed validation.
///
/// Handles participate in the chain-key derivation labels, so they must
/// be non-empty ASCII.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid identity handle")]
pub struct InvalidIdentity;

/// Errors from turning a single key-derivation ratchet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RatchetError {
    /// The chain key is absent: the ratchet was discarded or never
    /// initialized. Fatal to the session; only the last-known counter
    /// remains inspectable.
    #[error("chain key is missing or was discarded")]
    Exhausted,

    /// The requested target counter is behind the current one. Ratchets
    /// never rewind; this indicates replay or reordering beyond tolerance.
    #[error("target counter {target} is behind current counter {current}")]
    Regression {
        /// Counter the ratchet is currently at.
        current: u64,
        /// Counter the caller asked to reach.
        target: u64,
    },

    /// The requested target counter is too far ahead. The caller may
    /// reject the offending message and keep the session.
    #[error("target counter {target} exceeds the skip ceiling ({max}) from counter {current}")]
    SkipTooLarge {
        /// Counter the ratchet is currently at.
        current: u64,
        /// Counter the caller asked to reach.
        target: u64,
        /// Maximum permitted skip.
        max: u64,
    },
}

/// Errors from session construction and handshake completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The peer's public key is malformed or a low-order element.
    #[error("invalid peer public key")]
    InvalidPeerKey,

    /// The peer's identity handle equals this party's own. The
    /// directional derivation labels would collapse into one chain, so
    /// such sessions are refused.
    #[error("peer identity equals own identity")]
    InvalidPeerIdentity,

    /// The re-supplied peer long-term key disagrees with the one bound at
    /// session creation. Signals an integrity problem upstream.
    #[error("peer long-term key does not match this session")]
    IdentityMismatch,

    /// The 4DH chains already exist. A duplicate accept must never
    /// silently re-derive them; the caller may ignore this error.
    #[error("4DH chains are already established")]
    AlreadyEstablished,

    /// A ratchet operation addressed through the session failed.
    #[error(transparent)]
    Ratchet(#[from] RatchetError),
}

impl From<InvalidPeerKey> for SessionError {
    fn from(_: InvalidPeerKey) -> Self {
        SessionError::InvalidPeerKey
    }
}
