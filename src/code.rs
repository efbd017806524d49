//! Room code allocation
//!
//! Codes are 4 characters from a 32-symbol alphabet without look-alikes
//! (no I/O, no 0/1), giving ~1M possible rooms. Allocation only finds a code
//! that looks free; the store's create-if-absent write is what actually
//! claims it.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;

use crate::error::{PollError, PollResult};
use crate::types::RoomCode;

/// Safe character set for room codes
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 4;
pub const MAX_ALLOCATION_ATTEMPTS: usize = 10;

/// Source of candidate room codes
pub trait CodeSource: Send + Sync {
    fn generate(&self) -> RoomCode;
}

/// Uniformly random codes from the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn generate(&self) -> RoomCode {
        generate_code()
    }
}

/// Generate a random 4-character room code
pub fn generate_code() -> RoomCode {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalize a user-typed code (trim + uppercase). Returns `None` if the
/// result cannot be a room code.
pub fn normalize_code(input: &str) -> Option<RoomCode> {
    let code = input.trim().to_uppercase();
    if code.len() == CODE_LENGTH && code.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
        Some(code)
    } else {
        None
    }
}

/// Existence check the allocator consults before proposing a code
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn room_exists(&self, code: &str) -> bool;
}

#[derive(Clone)]
pub struct CodeAllocator {
    source: Arc<dyn CodeSource>,
    max_attempts: usize,
}

impl Default for CodeAllocator {
    fn default() -> Self {
        Self::new(Arc::new(RandomCodes))
    }
}

impl CodeAllocator {
    pub fn new(source: Arc<dyn CodeSource>) -> Self {
        Self {
            source,
            max_attempts: MAX_ALLOCATION_ATTEMPTS,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn generate(&self) -> RoomCode {
        self.source.generate()
    }

    /// Draw codes until one is not in use, up to `max_attempts` draws.
    /// Exhaustion fails instead of handing out a code that is known taken.
    pub async fn allocate(&self, directory: &dyn RoomDirectory) -> PollResult<RoomCode> {
        for attempt in 1..=self.max_attempts {
            let code = self.source.generate();
            if !directory.room_exists(&code).await {
                if attempt > 1 {
                    tracing::debug!("Allocated room code {} after {} draws", code, attempt);
                }
                return Ok(code);
            }
            tracing::debug!("Room code {} already taken (draw {})", code, attempt);
        }

        tracing::warn!(
            "Room code allocation exhausted after {} attempts",
            self.max_attempts
        );
        Err(PollError::CapacityExhausted {
            attempts: self.max_attempts,
        })
    }
}
