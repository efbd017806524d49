//! Presenter access gate
//!
//! A room may carry a shared presenter password. Only a salted SHA-256
//! digest is kept, it never leaves the server, and checks happen here rather
//! than in the client. This is a low-assurance gate for a classroom, not an
//! identity system.

use rand::Rng;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Stored form of a presenter password
#[derive(Clone)]
pub struct PresenterSecret {
    salt: [u8; SALT_LEN],
    digest: [u8; 32],
}

impl std::fmt::Debug for PresenterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenterSecret")
            .field("salt", &hex::encode(self.salt))
            .finish_non_exhaustive()
    }
}

impl PresenterSecret {
    /// Hash a password. Blank input means "no gate" and yields `None`.
    pub fn from_password(password: &str) -> Option<Self> {
        if password.trim().is_empty() {
            return None;
        }
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill(&mut salt);
        Some(Self {
            salt,
            digest: digest(&salt, password),
        })
    }

    pub fn verify(&self, candidate: &str) -> bool {
        constant_time_eq(&digest(&self.salt, candidate), &self.digest)
    }

    /// Hex fingerprint for logs, never the digest itself
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.salt[..4])
    }
}

fn digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Locked,
    Unlocked,
}

/// Per-connection presenter gate; lasts as long as the connection
#[derive(Debug, Clone)]
pub struct PresenterGate {
    state: GateState,
}

impl PresenterGate {
    /// Rooms without a password start unlocked
    pub fn for_room(password_protected: bool) -> Self {
        let state = if password_protected {
            GateState::Locked
        } else {
            GateState::Unlocked
        };
        Self { state }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == GateState::Unlocked
    }

    /// Record the outcome of a server-side check. A failed attempt never
    /// re-locks an unlocked gate.
    pub fn record_attempt(&mut self, accepted: bool) -> GateState {
        if accepted {
            self.state = GateState::Unlocked;
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_password_means_no_gate() {
        assert!(PresenterSecret::from_password("").is_none());
        assert!(PresenterSecret::from_password("   ").is_none());
    }

    #[test]
    fn test_secret_verification() {
        let secret = PresenterSecret::from_password("hunter2").unwrap();
        assert!(secret.verify("hunter2"));
        assert!(!secret.verify("hunter3"));
        assert!(!secret.verify(""));
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let a = PresenterSecret::from_password("same").unwrap();
        let b = PresenterSecret::from_password("same").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn test_debug_does_not_leak_digest() {
        let secret = PresenterSecret::from_password("hunter2").unwrap();
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains(&hex::encode(secret.digest)));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_gate_transitions() {
        let mut open = PresenterGate::for_room(false);
        assert!(open.is_unlocked());
        assert_eq!(open.record_attempt(false), GateState::Unlocked);

        let mut gate = PresenterGate::for_room(true);
        assert_eq!(gate.state(), GateState::Locked);
        assert_eq!(gate.record_attempt(false), GateState::Locked);
        assert_eq!(gate.record_attempt(true), GateState::Unlocked);
        assert!(gate.is_unlocked());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
        assert!(constant_time_eq(b"", b""));
    }
}
