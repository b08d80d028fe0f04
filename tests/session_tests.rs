//! End-to-end handshake tests for the forward-secrecy session core.
//!
//! Alice is always the initiator and Bob the responder. The fixed secret
//! keys below are the reference vectors exercised against the original
//! protocol implementation.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use fourdh::crypto::StaticKeypair;
use fourdh::identity::{Identity, IdentityStore};
use fourdh::session::{DhSession, Direction, Generation, SessionState};
use fourdh::{RatchetError, SessionError};

const ALICE_SECRET_B64: &str = "2Hi7lA4boz9eLl0ozdeb2uKj2+i/wD2PUTRczwshp1Y=";
const BOB_SECRET_B64: &str = "WE2g/Mu8jeGHMUX0pqyCP+ypW6gCu2xEBKESOyqgbn0=";

fn store_from_b64(handle: &str, secret_b64: &str) -> IdentityStore {
    let bytes: [u8; 32] = BASE64
        .decode(secret_b64)
        .expect("valid base64")
        .try_into()
        .expect("32 bytes");
    IdentityStore::new(
        Identity::new(handle).expect("identity"),
        StaticKeypair::from_secret_bytes(bytes),
    )
}

fn alice_store() -> IdentityStore {
    store_from_b64("AAAAAAAA", ALICE_SECRET_B64)
}

fn bob_store() -> IdentityStore {
    store_from_b64("BBBBBBBB", BOB_SECRET_B64)
}

fn create_sessions(alice: &IdentityStore, bob: &IdentityStore) -> (DhSession, DhSession) {
    // Alice is the initiator.
    let initiator = DhSession::initiate(
        alice,
        bob.identity().clone(),
        bob.public_key().clone(),
    )
    .expect("initiate");

    // Bob gets an init message from Alice with her ephemeral public key.
    let responder = DhSession::respond(
        initiator.id(),
        initiator.my_ephemeral_public_key(),
        bob,
        alice.identity().clone(),
        alice.public_key().clone(),
    )
    .expect("respond");

    assert_eq!(initiator.id(), responder.id());
    (initiator, responder)
}

/// Both parties hold the same 2DH chain keys right after responder
/// construction, before any 4DH exchange.
#[test]
fn test_2dh_key_exchange() {
    let (alice, bob) = (alice_store(), bob_store());
    let (initiator, responder) = create_sessions(&alice, &bob);

    let initiator_my = initiator.my_ratchet_2dh().expect("initiator 2DH ratchet");
    let responder_peer = responder.peer_ratchet_2dh().expect("responder 2DH ratchet");

    assert_eq!(
        initiator_my.encryption_key().expect("key"),
        responder_peer.encryption_key().expect("key")
    );
}

/// After the accept, the 4DH chains match per direction and the two
/// directions differ; both ephemeral private keys have been erased.
#[test]
fn test_4dh_key_exchange() {
    let (alice, bob) = (alice_store(), bob_store());
    let (mut initiator, responder) = create_sessions(&alice, &bob);

    // Bob sends his ephemeral public key back to Alice.
    initiator
        .process_accept(&alice, responder.my_ephemeral_public_key(), bob.public_key())
        .expect("accept");

    assert_eq!(initiator.state(), SessionState::Established);

    let initiator_my = initiator.my_ratchet_4dh().expect("4DH ratchet");
    let initiator_peer = initiator.peer_ratchet_4dh().expect("4DH ratchet");
    let responder_my = responder.my_ratchet_4dh().expect("4DH ratchet");
    let responder_peer = responder.peer_ratchet_4dh().expect("4DH ratchet");

    assert_eq!(
        initiator_my.encryption_key().expect("key"),
        responder_peer.encryption_key().expect("key")
    );
    assert_eq!(
        initiator_peer.encryption_key().expect("key"),
        responder_my.encryption_key().expect("key")
    );

    // The keys differ between the two directions.
    assert_ne!(
        initiator_my.encryption_key().expect("key"),
        responder_my.encryption_key().expect("key")
    );

    // The ephemeral private keys have been discarded.
    assert!(!initiator.has_ephemeral_private_key());
    assert!(!responder.has_ephemeral_private_key());
}

/// Turning both sides of a direction keeps the derived keys in lockstep,
/// and one side can catch up with `turn_until`.
#[test]
fn test_kdf_rotation() {
    let (alice, bob) = (alice_store(), bob_store());
    let (mut initiator, mut responder) = create_sessions(&alice, &bob);
    initiator
        .process_accept(&alice, responder.my_ephemeral_public_key(), bob.public_key())
        .expect("accept");

    // Turn the 4DH ratchets a couple of times on both sides and check the
    // keys keep matching, in both directions.
    for _ in 0..3 {
        initiator.turn(Direction::Outgoing, Generation::FourDh).expect("turn");
        responder.turn(Direction::Incoming, Generation::FourDh).expect("turn");
        assert_eq!(
            initiator
                .encryption_key(Direction::Outgoing, Generation::FourDh)
                .expect("key"),
            responder
                .encryption_key(Direction::Incoming, Generation::FourDh)
                .expect("key")
        );

        initiator.turn(Direction::Incoming, Generation::FourDh).expect("turn");
        responder.turn(Direction::Outgoing, Generation::FourDh).expect("turn");
        assert_eq!(
            initiator
                .encryption_key(Direction::Incoming, Generation::FourDh)
                .expect("key"),
            responder
                .encryption_key(Direction::Outgoing, Generation::FourDh)
                .expect("key")
        );
    }

    // Turn several times on one side and let the other catch up.
    let my_turns = 3;
    for _ in 0..my_turns {
        initiator.turn(Direction::Outgoing, Generation::FourDh).expect("turn");
    }
    let target = initiator.my_ratchet_4dh().expect("ratchet").counter();
    let responder_turns = responder
        .turn_until(Direction::Incoming, Generation::FourDh, target)
        .expect("catch up");

    assert_eq!(my_turns, responder_turns);
    assert_eq!(
        initiator
            .encryption_key(Direction::Outgoing, Generation::FourDh)
            .expect("key"),
        responder
            .encryption_key(Direction::Incoming, Generation::FourDh)
            .expect("key")
    );
}

/// A receiver must reject counters that went backwards and counters too
/// far ahead, without losing the session.
#[test]
fn test_catch_up_bounds() {
    let (alice, bob) = (alice_store(), bob_store());
    let (mut initiator, mut responder) = create_sessions(&alice, &bob);
    initiator
        .process_accept(&alice, responder.my_ephemeral_public_key(), bob.public_key())
        .expect("accept");

    for _ in 0..4 {
        responder.turn(Direction::Incoming, Generation::FourDh).expect("turn");
    }
    let current = responder.peer_ratchet_4dh().expect("ratchet").counter();

    let regression = responder
        .turn_until(Direction::Incoming, Generation::FourDh, current - 1)
        .expect_err("regression");
    assert!(matches!(
        regression,
        SessionError::Ratchet(RatchetError::Regression { .. })
    ));

    let too_far = responder
        .turn_until(
            Direction::Incoming,
            Generation::FourDh,
            current + fourdh::MAX_COUNTER_SKIP + 100,
        )
        .expect_err("skip too large");
    assert!(matches!(
        too_far,
        SessionError::Ratchet(RatchetError::SkipTooLarge { .. })
    ));

    // Both failures left the ratchet untouched; the sender can still line
    // up with it.
    assert_eq!(responder.peer_ratchet_4dh().expect("ratchet").counter(), current);
    initiator
        .turn_until(Direction::Outgoing, Generation::FourDh, current)
        .expect("advance");
    assert_eq!(
        initiator
            .encryption_key(Direction::Outgoing, Generation::FourDh)
            .expect("key"),
        responder
            .encryption_key(Direction::Incoming, Generation::FourDh)
            .expect("key")
    );
}

/// Distinct handshakes never share chain keys, even between the same two
/// parties.
#[test]
fn test_sessions_are_independent() {
    let (alice, bob) = (alice_store(), bob_store());
    let (first, _) = create_sessions(&alice, &bob);
    let (second, _) = create_sessions(&alice, &bob);

    assert_ne!(first.id(), second.id());
    assert_ne!(
        first
            .encryption_key(Direction::Outgoing, Generation::TwoDh)
            .expect("key"),
        second
            .encryption_key(Direction::Outgoing, Generation::TwoDh)
            .expect("key")
    );
}

/// A responder receiving an identity-element ephemeral key refuses to
/// create any session state.
#[test]
fn test_responder_rejects_identity_element() {
    let (alice, bob) = (alice_store(), bob_store());
    let (initiator, _) = create_sessions(&alice, &bob);

    let result = DhSession::respond(
        initiator.id(),
        &fourdh::crypto::X25519PublicKey::from_bytes([0u8; 32]),
        &bob,
        alice.identity().clone(),
        alice.public_key().clone(),
    );

    assert!(matches!(result, Err(SessionError::InvalidPeerKey)));
}

/// Direction separation rests on the identity handles in the derivation
/// info, so the inputs that would collapse the two chains into one are
/// refused: empty handles never construct, and a peer whose handle
/// equals one's own is rejected at session creation.
#[test]
fn test_direction_separation_inputs_enforced() {
    assert!(Identity::new("").is_err());

    let alice = alice_store();
    let twin = store_from_b64("AAAAAAAA", BOB_SECRET_B64);

    let result = DhSession::initiate(&alice, twin.identity().clone(), twin.public_key().clone());
    assert!(matches!(result, Err(SessionError::InvalidPeerIdentity)));
}

/// 2DH chains stay usable through the accept until explicitly discarded,
/// covering in-flight 2DH traffic.
#[test]
fn test_2dh_survives_until_discarded() {
    let (alice, bob) = (alice_store(), bob_store());
    let (mut initiator, mut responder) = create_sessions(&alice, &bob);

    // Alice sends two 2DH messages; the accept crosses them in flight.
    initiator.turn(Direction::Outgoing, Generation::TwoDh).expect("turn");
    initiator.turn(Direction::Outgoing, Generation::TwoDh).expect("turn");

    initiator
        .process_accept(&alice, responder.my_ephemeral_public_key(), bob.public_key())
        .expect("accept");

    // Bob can still catch up on the 2DH chain after 4DH is established.
    let target = initiator.my_ratchet_2dh().expect("ratchet").counter();
    responder
        .turn_until(Direction::Incoming, Generation::TwoDh, target)
        .expect("catch up");
    assert_eq!(
        initiator
            .encryption_key(Direction::Outgoing, Generation::TwoDh)
            .expect("key"),
        responder
            .encryption_key(Direction::Incoming, Generation::TwoDh)
            .expect("key")
    );

    // Once drained, both sides drop the 2DH generation.
    responder.discard_2dh_ratchets();
    assert!(matches!(
        responder.encryption_key(Direction::Incoming, Generation::TwoDh),
        Err(SessionError::Ratchet(RatchetError::Exhausted))
    ));
}
