//! Logging helpers that keep key material out of log output.
//!
//! Session and ratchet code logs lifecycle events via `tracing`; these
//! wrappers make it impossible to accidentally interpolate a secret.

use std::fmt;

/// A wrapper that redacts its contents when displayed.
pub struct Redacted<T>(pub T);

impl<T: fmt::Display> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: fmt::Debug> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Redact a byte slice, showing only its length.
pub struct RedactedBytes<'a>(pub &'a [u8]);

impl<'a> fmt::Display for RedactedBytes<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} bytes]", self.0.len())
    }
}

impl<'a> fmt::Debug for RedactedBytes<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Abbreviate a public key for logging: first four bytes as hex.
///
/// Public keys are not secret, but full keys make logs unreadable and
/// invite copy-paste mistakes.
pub struct KeyPrefix<'a>(pub &'a [u8]);

impl<'a> fmt::Display for KeyPrefix<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() >= 4 {
            write!(f, "{}...", hex::encode(&self.0[..4]))
        } else {
            write!(f, "[{} bytes]", self.0.len())
        }
    }
}

impl<'a> fmt::Debug for KeyPrefix<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_display() {
        let secret = Redacted("chain key material");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
    }

    #[test]
    fn test_redacted_bytes() {
        let bytes = RedactedBytes(&[1, 2, 3, 4, 5]);
        assert_eq!(format!("{}", bytes), "[5 bytes]");
    }

    #[test]
    fn test_key_prefix() {
        let key = [0xab; 32];
        assert_eq!(format!("{}", KeyPrefix(&key)), "abababab...");
        assert_eq!(format!("{}", KeyPrefix(&key[..2])), "[2 bytes]");
    }
}
