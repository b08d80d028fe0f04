//! The hash-chain key-derivation ratchet.
//!
//! A [`KdfRatchet`] owns one 32-byte chain key and a monotonically
//! increasing turn counter. Each turn replaces the chain key with a
//! one-way derivation of itself, so earlier per-turn encryption keys
//! cannot be recomputed from later state. A session holds four of these
//! (my/peer × 2DH/4DH); the initial chain keys are derived under
//! direction- and generation-separated labels, so the four chains never
//! collide in derived key space.

use super::kdf::{ENCRYPTION_KEY_INFO, RATCHET_TURN_INFO};
use super::{constant_time_eq, hkdf_derive_32};
use crate::error::RatchetError;
use crate::{CHAIN_KEY_SIZE, INITIAL_RATCHET_COUNTER, MAX_COUNTER_SKIP};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A symmetric encryption key derived from the current chain key.
///
/// Handed to the external AEAD collaborator; never reused after the
/// ratchet turns. Zeroized on drop; equality is constant-time.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; CHAIN_KEY_SIZE]);

impl EncryptionKey {
    /// Get the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; CHAIN_KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for EncryptionKey {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.0, &other.0)
    }
}

impl Eq for EncryptionKey {}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey([REDACTED])")
    }
}

/// One-way hash-chain ratchet: chain key plus turn counter.
///
/// Two states: *initialized* (chain key present) and *discarded* (chain
/// key cleared). On a discarded ratchet only [`counter`](Self::counter)
/// remains meaningful; every other operation fails with
/// [`RatchetError::Exhausted`].
#[derive(Clone)]
pub struct KdfRatchet {
    chain_key: Option<[u8; CHAIN_KEY_SIZE]>,
    counter: u64,
}

impl Drop for KdfRatchet {
    fn drop(&mut self) {
        if let Some(ref mut key) = self.chain_key {
            key.zeroize();
        }
    }
}

impl KdfRatchet {
    /// Create a ratchet from an initial chain key.
    ///
    /// The initial chain key is numbered [`INITIAL_RATCHET_COUNTER`].
    pub fn new(chain_key: [u8; CHAIN_KEY_SIZE]) -> Self {
        Self {
            chain_key: Some(chain_key),
            counter: INITIAL_RATCHET_COUNTER,
        }
    }

    /// Restore a ratchet from externally persisted state.
    pub fn restore(chain_key: [u8; CHAIN_KEY_SIZE], counter: u64) -> Self {
        Self {
            chain_key: Some(chain_key),
            counter,
        }
    }

    /// Current turn count. Inspectable even after discard.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Whether the chain key has been cleared.
    pub fn is_discarded(&self) -> bool {
        self.chain_key.is_none()
    }

    /// The current chain key, for external persistence.
    ///
    /// # Security
    /// These bytes must be encrypted before storage.
    pub fn chain_key(&self) -> Option<&[u8; CHAIN_KEY_SIZE]> {
        self.chain_key.as_ref()
    }

    /// Derive the encryption key for the current counter value.
    ///
    /// Pure: repeated calls at the same counter return the same key.
    pub fn encryption_key(&self) -> Result<EncryptionKey, RatchetError> {
        let chain_key = self.chain_key.as_ref().ok_or(RatchetError::Exhausted)?;
        let derived = hkdf_derive_32(None, chain_key, ENCRYPTION_KEY_INFO);
        Ok(EncryptionKey(*derived))
    }

    /// Advance the chain by one: chain key := KDF(chain key), counter += 1.
    ///
    /// The previous chain key is zeroized immediately; it cannot be
    /// recovered from the new state.
    pub fn turn(&mut self) -> Result<(), RatchetError> {
        let chain_key = self.chain_key.as_mut().ok_or(RatchetError::Exhausted)?;
        let next = hkdf_derive_32(None, chain_key, RATCHET_TURN_INFO);
        chain_key.zeroize();
        *chain_key = *next;
        self.counter += 1;
        Ok(())
    }

    /// Advance the chain until `counter == target`, returning the number
    /// of turns performed.
    ///
    /// Fails with [`RatchetError::Regression`] if the target is behind the
    /// current counter and with [`RatchetError::SkipTooLarge`] if reaching
    /// it would exceed [`MAX_COUNTER_SKIP`] turns; the ratchet is left
    /// unchanged in both cases.
    pub fn turn_until(&mut self, target: u64) -> Result<u64, RatchetError> {
        if self.chain_key.is_none() {
            return Err(RatchetError::Exhausted);
        }
        if target < self.counter {
            return Err(RatchetError::Regression {
                current: self.counter,
                target,
            });
        }
        let turns = target - self.counter;
        if turns > MAX_COUNTER_SKIP {
            return Err(RatchetError::SkipTooLarge {
                current: self.counter,
                target,
                max: MAX_COUNTER_SKIP,
            });
        }
        for _ in 0..turns {
            self.turn()?;
        }
        Ok(turns)
    }

    /// Zeroize and clear the chain key.
    ///
    /// Used when a generation becomes obsolete (2DH chains after 4DH is
    /// established). Afterwards only the counter is inspectable.
    pub fn discard(&mut self) {
        if let Some(ref mut key) = self.chain_key {
            key.zeroize();
        }
        self.chain_key = None;
    }
}

impl fmt::Debug for KdfRatchet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KdfRatchet")
            .field("counter", &self.counter)
            .field("chain_key", &self.chain_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::random_bytes;

    #[test]
    fn test_encryption_key_is_pure() {
        let ratchet = KdfRatchet::new(random_bytes());
        let k1 = ratchet.encryption_key().expect("key");
        let k2 = ratchet.encryption_key().expect("key");
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_turn_produces_distinct_keys() {
        let mut ratchet = KdfRatchet::new(random_bytes());
        let mut keys = Vec::new();

        for _ in 0..16 {
            keys.push(ratchet.encryption_key().expect("key"));
            ratchet.turn().expect("turn");
        }
        keys.push(ratchet.encryption_key().expect("key"));

        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                assert_ne!(keys[i], keys[j]);
            }
        }
    }

    #[test]
    fn test_turn_increments_counter() {
        let mut ratchet = KdfRatchet::new(random_bytes());
        assert_eq!(ratchet.counter(), INITIAL_RATCHET_COUNTER);
        ratchet.turn().expect("turn");
        assert_eq!(ratchet.counter(), INITIAL_RATCHET_COUNTER + 1);
    }

    #[test]
    fn test_turn_until_matches_single_turns() {
        let chain_key: [u8; CHAIN_KEY_SIZE] = random_bytes();
        let mut stepped = KdfRatchet::new(chain_key);
        let mut skipped = KdfRatchet::new(chain_key);

        for _ in 0..7 {
            stepped.turn().expect("turn");
        }
        let turns = skipped.turn_until(stepped.counter()).expect("turn_until");

        assert_eq!(turns, 7);
        assert_eq!(skipped.counter(), stepped.counter());
        assert_eq!(
            skipped.encryption_key().expect("key"),
            stepped.encryption_key().expect("key")
        );
    }

    #[test]
    fn test_turn_until_current_counter_is_noop() {
        let mut ratchet = KdfRatchet::new(random_bytes());
        let before = ratchet.encryption_key().expect("key");
        let turns = ratchet.turn_until(ratchet.counter()).expect("turn_until");
        assert_eq!(turns, 0);
        assert_eq!(ratchet.encryption_key().expect("key"), before);
    }

    #[test]
    fn test_turn_until_rejects_regression() {
        let mut ratchet = KdfRatchet::new(random_bytes());
        ratchet.turn().expect("turn");
        ratchet.turn().expect("turn");
        let current = ratchet.counter();

        let err = ratchet.turn_until(current - 1).expect_err("regression");
        assert_eq!(
            err,
            RatchetError::Regression {
                current,
                target: current - 1
            }
        );
        // Unchanged on failure.
        assert_eq!(ratchet.counter(), current);
    }

    #[test]
    fn test_turn_until_rejects_large_skip() {
        let mut ratchet = KdfRatchet::new(random_bytes());
        let current = ratchet.counter();
        let target = current + MAX_COUNTER_SKIP + 1;

        let err = ratchet.turn_until(target).expect_err("skip too large");
        assert_eq!(
            err,
            RatchetError::SkipTooLarge {
                current,
                target,
                max: MAX_COUNTER_SKIP
            }
        );
        assert_eq!(ratchet.counter(), current);
    }

    #[test]
    fn test_discard_leaves_only_counter() {
        let mut ratchet = KdfRatchet::new(random_bytes());
        ratchet.turn().expect("turn");
        let counter = ratchet.counter();

        ratchet.discard();

        assert!(ratchet.is_discarded());
        assert_eq!(ratchet.counter(), counter);
        assert_eq!(ratchet.encryption_key(), Err(RatchetError::Exhausted));
        assert_eq!(ratchet.turn(), Err(RatchetError::Exhausted));
        assert_eq!(ratchet.turn_until(counter + 1), Err(RatchetError::Exhausted));
    }

    #[test]
    fn test_restore_resumes_chain() {
        let mut ratchet = KdfRatchet::new(random_bytes());
        ratchet.turn().expect("turn");

        let chain_key = *ratchet.chain_key().expect("present");
        let restored = KdfRatchet::restore(chain_key, ratchet.counter());

        assert_eq!(restored.counter(), ratchet.counter());
        assert_eq!(
            restored.encryption_key().expect("key"),
            ratchet.encryption_key().expect("key")
        );
    }
}
