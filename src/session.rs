//! Pairwise forward-secrecy session orchestration.
//!
//! A [`DhSession`] owns the ephemeral key-exchange lifecycle and the four
//! key-derivation ratchets of one peer relationship. The initiator derives
//! the 2DH chains immediately (they need only its own ephemeral key plus
//! both long-term keys) and completes the 4DH chains when the responder's
//! ephemeral key arrives; the responder derives both generations in one
//! step. Ephemeral private keys are erased the moment the 4DH secret
//! exists.
//!
//! In the 2DH window only the initiator can send: the responder has no key
//! to address until its own ephemeral key has reached the initiator.

use crate::crypto::{
    derive_2dh_chain_keys, derive_4dh_chain_keys, random_bytes, EncryptionKey, EphemeralKeypair,
    KdfRatchet, X25519PublicKey,
};
use crate::error::SessionError;
use crate::identity::{Identity, IdentityStore};
use crate::logging::KeyPrefix;
use crate::{RatchetError, SESSION_ID_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Random session identifier, generated by the initiator and transported
/// to the responder.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId([u8; SESSION_ID_SIZE]);

impl SessionId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    /// Create from bytes received from the wire.
    pub fn from_bytes(bytes: [u8; SESSION_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get as bytes.
    pub fn as_bytes(&self) -> &[u8; SESSION_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", hex::encode(&self.0[..4]))
    }
}

/// Which end of the handshake this session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// This party sent the first handshake message.
    Initiator,
    /// This party answered an incoming handshake message.
    Responder,
}

/// Protocol state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initiator waiting for the responder's ephemeral key; only the 2DH
    /// chains are usable.
    InitiatorPending,
    /// Both ephemeral keys known, 4DH chains derived.
    Established,
}

/// Message direction, from this party's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Keys for messages this party sends.
    Outgoing,
    /// Keys for messages this party receives.
    Incoming,
}

/// Which key-chain generation to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// The short-lived pre-accept chains.
    TwoDh,
    /// The durable triple-DH chains.
    FourDh,
}

/// One pairwise forward-secrecy session.
///
/// Mutated only by the two DH-derivation steps and by ratchet turns; all
/// mutating operations take `&mut self`, so concurrent use requires an
/// external mutex.
pub struct DhSession {
    id: SessionId,
    role: Role,
    peer_identity: Identity,
    peer_public_key: X25519PublicKey,
    my_ephemeral_public: X25519PublicKey,
    /// Present only until the 4DH secret has been derived.
    my_ephemeral: Option<EphemeralKeypair>,
    peer_ephemeral_public: Option<X25519PublicKey>,
    my_ratchet_2dh: Option<KdfRatchet>,
    peer_ratchet_2dh: Option<KdfRatchet>,
    my_ratchet_4dh: Option<KdfRatchet>,
    peer_ratchet_4dh: Option<KdfRatchet>,
}

impl DhSession {
    /// Create a session as the initiator.
    ///
    /// Generates a fresh ephemeral key pair and session id and derives the
    /// 2DH chains from `DH(my ephemeral, peer long-term)`. The 4DH chains
    /// stay absent until [`process_accept`](Self::process_accept); the
    /// ephemeral private key is retained until then.
    ///
    /// Fails with [`SessionError::InvalidPeerIdentity`] if the peer's
    /// handle equals this party's own: the two directional chains would
    /// carry the same derivation info and collapse into one key.
    pub fn initiate(
        store: &IdentityStore,
        peer_identity: Identity,
        peer_public_key: X25519PublicKey,
    ) -> Result<Self, SessionError> {
        if &peer_identity == store.identity() {
            return Err(SessionError::InvalidPeerIdentity);
        }
        let my_ephemeral = EphemeralKeypair::generate();
        let dh_ephemeral_static = my_ephemeral.diffie_hellman(&peer_public_key)?;

        let chains = derive_2dh_chain_keys(
            &dh_ephemeral_static,
            store.public_key(),
            &peer_public_key,
            store.identity(),
            &peer_identity,
        );

        let id = SessionId::generate();
        debug!(
            session = %id,
            peer = %peer_identity,
            ephemeral = %KeyPrefix(my_ephemeral.public_key().as_bytes()),
            "initiator session created, 2DH chains derived"
        );

        Ok(Self {
            id,
            role: Role::Initiator,
            peer_identity,
            peer_public_key,
            my_ephemeral_public: my_ephemeral.public_key().clone(),
            my_ephemeral: Some(my_ephemeral),
            peer_ephemeral_public: None,
            my_ratchet_2dh: Some(KdfRatchet::new(*chains.initiator)),
            peer_ratchet_2dh: Some(KdfRatchet::new(*chains.responder)),
            my_ratchet_4dh: None,
            peer_ratchet_4dh: None,
        })
    }

    /// Create a session as the responder, from the initiator's handshake
    /// message.
    ///
    /// Reproduces the initiator's 2DH derivation with the my/peer mapping
    /// mirrored, then generates an own ephemeral key pair, derives the
    /// triple-DH 4DH chains and erases the ephemeral private key. Fails
    /// with [`SessionError::InvalidPeerKey`] before creating any state if
    /// the supplied ephemeral key is not a valid contributory point.
    pub fn respond(
        id: SessionId,
        peer_ephemeral_public_key: &X25519PublicKey,
        store: &IdentityStore,
        peer_identity: Identity,
        peer_public_key: X25519PublicKey,
    ) -> Result<Self, SessionError> {
        if &peer_identity == store.identity() {
            return Err(SessionError::InvalidPeerIdentity);
        }
        // Peer is the initiator here; this term doubles as the 2DH secret
        // and the first 4DH term.
        let dh_ephemeral_static = store.keypair().diffie_hellman(peer_ephemeral_public_key)?;

        let chains_2dh = derive_2dh_chain_keys(
            &dh_ephemeral_static,
            &peer_public_key,
            store.public_key(),
            &peer_identity,
            store.identity(),
        );

        let my_ephemeral = EphemeralKeypair::generate();
        let dh_static_ephemeral = my_ephemeral.diffie_hellman(&peer_public_key)?;
        let dh_ephemeral_ephemeral = my_ephemeral.diffie_hellman(peer_ephemeral_public_key)?;

        let chains_4dh = derive_4dh_chain_keys(
            &dh_ephemeral_static,
            &dh_static_ephemeral,
            &dh_ephemeral_ephemeral,
            &peer_identity,
            store.identity(),
        );

        debug!(
            session = %id,
            peer = %peer_identity,
            "responder session established, 2DH and 4DH chains derived"
        );

        let my_ephemeral_public = my_ephemeral.public_key().clone();
        // The ephemeral secret is consumed here: dropping the keypair
        // zeroizes it.
        drop(my_ephemeral);

        Ok(Self {
            id,
            role: Role::Responder,
            peer_identity,
            peer_public_key,
            my_ephemeral_public,
            my_ephemeral: None,
            peer_ephemeral_public: Some(peer_ephemeral_public_key.clone()),
            my_ratchet_2dh: Some(KdfRatchet::new(*chains_2dh.responder)),
            peer_ratchet_2dh: Some(KdfRatchet::new(*chains_2dh.initiator)),
            my_ratchet_4dh: Some(KdfRatchet::new(*chains_4dh.responder)),
            peer_ratchet_4dh: Some(KdfRatchet::new(*chains_4dh.initiator)),
        })
    }

    /// Complete the handshake on the initiator side with the responder's
    /// ephemeral public key.
    ///
    /// The peer's long-term key is re-supplied as a consistency check; it
    /// must match the one bound at construction. A second accept fails
    /// with [`SessionError::AlreadyEstablished`] and never re-derives the
    /// chains. No state is mutated on any failure path.
    pub fn process_accept(
        &mut self,
        store: &IdentityStore,
        peer_ephemeral_public_key: &X25519PublicKey,
        peer_public_key: &X25519PublicKey,
    ) -> Result<(), SessionError> {
        if self.my_ratchet_4dh.is_some() || self.peer_ratchet_4dh.is_some() {
            return Err(SessionError::AlreadyEstablished);
        }
        if peer_public_key != &self.peer_public_key {
            return Err(SessionError::IdentityMismatch);
        }
        let my_ephemeral = self
            .my_ephemeral
            .as_ref()
            .ok_or(SessionError::AlreadyEstablished)?;

        let dh_ephemeral_static = my_ephemeral.diffie_hellman(&self.peer_public_key)?;
        let dh_static_ephemeral = store.keypair().diffie_hellman(peer_ephemeral_public_key)?;
        let dh_ephemeral_ephemeral = my_ephemeral.diffie_hellman(peer_ephemeral_public_key)?;

        let chains = derive_4dh_chain_keys(
            &dh_ephemeral_static,
            &dh_static_ephemeral,
            &dh_ephemeral_ephemeral,
            store.identity(),
            &self.peer_identity,
        );

        // All fallible work is done; mutate in one go.
        self.my_ratchet_4dh = Some(KdfRatchet::new(*chains.initiator));
        self.peer_ratchet_4dh = Some(KdfRatchet::new(*chains.responder));
        self.peer_ephemeral_public = Some(peer_ephemeral_public_key.clone());
        // Erase the ephemeral secret now that the 4DH secret exists.
        self.my_ephemeral = None;

        debug!(session = %self.id, peer = %self.peer_identity, "accept processed, 4DH chains derived");
        Ok(())
    }

    /// Zeroize and clear both 2DH ratchets.
    ///
    /// Call once 4DH is established and no in-flight 2DH traffic remains;
    /// the responder in particular may still have 2DH messages to decrypt
    /// right after establishment, so this is not done automatically.
    pub fn discard_2dh_ratchets(&mut self) {
        if let Some(ref mut ratchet) = self.my_ratchet_2dh {
            ratchet.discard();
        }
        if let Some(ref mut ratchet) = self.peer_ratchet_2dh {
            ratchet.discard();
        }
        debug!(session = %self.id, "2DH ratchets discarded");
    }

    fn ratchet(&self, direction: Direction, generation: Generation) -> Option<&KdfRatchet> {
        match (direction, generation) {
            (Direction::Outgoing, Generation::TwoDh) => self.my_ratchet_2dh.as_ref(),
            (Direction::Incoming, Generation::TwoDh) => self.peer_ratchet_2dh.as_ref(),
            (Direction::Outgoing, Generation::FourDh) => self.my_ratchet_4dh.as_ref(),
            (Direction::Incoming, Generation::FourDh) => self.peer_ratchet_4dh.as_ref(),
        }
    }

    fn ratchet_mut(
        &mut self,
        direction: Direction,
        generation: Generation,
    ) -> Option<&mut KdfRatchet> {
        match (direction, generation) {
            (Direction::Outgoing, Generation::TwoDh) => self.my_ratchet_2dh.as_mut(),
            (Direction::Incoming, Generation::TwoDh) => self.peer_ratchet_2dh.as_mut(),
            (Direction::Outgoing, Generation::FourDh) => self.my_ratchet_4dh.as_mut(),
            (Direction::Incoming, Generation::FourDh) => self.peer_ratchet_4dh.as_mut(),
        }
    }

    /// Derive the current encryption key for the addressed chain.
    pub fn encryption_key(
        &self,
        direction: Direction,
        generation: Generation,
    ) -> Result<EncryptionKey, SessionError> {
        let ratchet = self
            .ratchet(direction, generation)
            .ok_or(RatchetError::Exhausted)?;
        Ok(ratchet.encryption_key()?)
    }

    /// Turn the addressed chain forward by one.
    pub fn turn(&mut self, direction: Direction, generation: Generation) -> Result<(), SessionError> {
        let ratchet = self
            .ratchet_mut(direction, generation)
            .ok_or(RatchetError::Exhausted)?;
        Ok(ratchet.turn()?)
    }

    /// Catch the addressed chain up to `target`, returning the number of
    /// turns performed.
    pub fn turn_until(
        &mut self,
        direction: Direction,
        generation: Generation,
        target: u64,
    ) -> Result<u64, SessionError> {
        let ratchet = self
            .ratchet_mut(direction, generation)
            .ok_or(RatchetError::Exhausted)?;
        Ok(ratchet.turn_until(target)?)
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Which end of the handshake this session is.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current protocol state.
    pub fn state(&self) -> SessionState {
        if self.my_ratchet_4dh.is_some() {
            SessionState::Established
        } else {
            SessionState::InitiatorPending
        }
    }

    /// The peer's stable identity handle.
    pub fn peer_identity(&self) -> &Identity {
        &self.peer_identity
    }

    /// The peer's long-term public key bound at construction.
    pub fn peer_public_key(&self) -> &X25519PublicKey {
        &self.peer_public_key
    }

    /// This party's ephemeral public key, for the handshake message.
    pub fn my_ephemeral_public_key(&self) -> &X25519PublicKey {
        &self.my_ephemeral_public
    }

    /// The peer's ephemeral public key, once received.
    pub fn peer_ephemeral_public_key(&self) -> Option<&X25519PublicKey> {
        self.peer_ephemeral_public.as_ref()
    }

    /// Whether the ephemeral private key is still held.
    ///
    /// `false` once the 4DH secret has been derived and the key erased.
    pub fn has_ephemeral_private_key(&self) -> bool {
        self.my_ephemeral.is_some()
    }

    /// This party's 2DH sending ratchet.
    pub fn my_ratchet_2dh(&self) -> Option<&KdfRatchet> {
        self.my_ratchet_2dh.as_ref()
    }

    /// The peer's 2DH sending ratchet.
    pub fn peer_ratchet_2dh(&self) -> Option<&KdfRatchet> {
        self.peer_ratchet_2dh.as_ref()
    }

    /// This party's 4DH sending ratchet.
    pub fn my_ratchet_4dh(&self) -> Option<&KdfRatchet> {
        self.my_ratchet_4dh.as_ref()
    }

    /// The peer's 4DH sending ratchet.
    pub fn peer_ratchet_4dh(&self) -> Option<&KdfRatchet> {
        self.peer_ratchet_4dh.as_ref()
    }

    /// Mutable access to this party's 2DH sending ratchet.
    pub fn my_ratchet_2dh_mut(&mut self) -> Option<&mut KdfRatchet> {
        self.my_ratchet_2dh.as_mut()
    }

    /// Mutable access to the peer's 2DH sending ratchet.
    pub fn peer_ratchet_2dh_mut(&mut self) -> Option<&mut KdfRatchet> {
        self.peer_ratchet_2dh.as_mut()
    }

    /// Mutable access to this party's 4DH sending ratchet.
    pub fn my_ratchet_4dh_mut(&mut self) -> Option<&mut KdfRatchet> {
        self.my_ratchet_4dh.as_mut()
    }

    /// Mutable access to the peer's 4DH sending ratchet.
    pub fn peer_ratchet_4dh_mut(&mut self) -> Option<&mut KdfRatchet> {
        self.peer_ratchet_4dh.as_mut()
    }
}

impl fmt::Display for DhSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            Role::Initiator => "initiator",
            Role::Responder => "responder",
        };
        let state = match self.state() {
            SessionState::InitiatorPending => "2dh-pending",
            SessionState::Established => "established",
        };
        write!(f, "session {} ({role}, {state})", self.id)
    }
}

impl fmt::Debug for DhSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhSession")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("state", &self.state())
            .field("peer", &self.peer_identity)
            .field("ephemeral_private_held", &self.my_ephemeral.is_some())
            .finish()
    }
}
