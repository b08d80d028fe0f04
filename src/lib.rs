//! # fourdh
//!
//! A pairwise forward-secrecy session core. Two parties establish a shared
//! secret via an ephemeral Diffie-Hellman exchange and derive two
//! independent hash-ratchet key chains:
//!
//! - a short-lived **2DH** chain, usable by the initiator before the peer's
//!   ephemeral key is known, and
//! - a durable **4DH** chain, usable once both ephemeral keys are known,
//!   binding both long-term identities via a triple-DH construction.
//!
//! Each chain is turned forward on every message, so per-message keys
//! rotate and compromise of current state never exposes past traffic keys.
//! Once the 4DH secret is derived, the ephemeral private key is erased
//! synchronously; compromise of long-term keys after that point cannot
//! recover past 4DH traffic keys.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        messaging / transport layer      │   (external)
//! ├─────────────────────────────────────────┤
//! │     session (handshake orchestration)   │
//! ├─────────────────────────────────────────┤
//! │  crypto::ratchet (hash-chain turning)   │
//! ├─────────────────────────────────────────┤
//! │  crypto::{keys, kdf}  │    identity     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Out of scope, consumed as collaborators: message persistence, wire
//! encoding, transport, AEAD payload encryption, and long-term identity
//! key storage.
//!
//! ## Ownership model
//!
//! All mutating operations take `&mut self`; the borrow checker enforces
//! the one-logical-owner-at-a-time discipline the protocol requires.
//! Callers sharing a [`session::DhSession`] across threads must wrap it in
//! a mutex — unserialized concurrent turns would desynchronize the chains
//! from the peer.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod crypto;
pub mod error;
pub mod identity;
pub mod logging;
pub mod session;

pub use error::{InvalidIdentity, InvalidPeerKey, RatchetError, SessionError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version of the key-derivation schema.
///
/// The `v1` tag carried by every domain-separation label in
/// [`crypto`] corresponds to this version; bumping it means minting a
/// new label set.
pub const PROTOCOL_VERSION: u8 = 1;

/// Size of a chain key and of a derived encryption key, in bytes.
pub const CHAIN_KEY_SIZE: usize = 32;

/// Size of a session identifier, in bytes.
pub const SESSION_ID_SIZE: usize = 16;

/// Counter value assigned to the initial chain key of a ratchet.
///
/// Both peers must use the same convention; this crate numbers the initial
/// chain key 1.
pub const INITIAL_RATCHET_COUNTER: u64 = 1;

/// Maximum number of turns a single catch-up may perform.
///
/// A peer claiming a counter further ahead than this is rejected with
/// [`RatchetError::SkipTooLarge`] instead of burning unbounded CPU.
pub const MAX_COUNTER_SKIP: u64 = 25_000;
