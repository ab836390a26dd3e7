//! Request identifier allocation
//!
//! RADIUS correlates replies and detects retransmits through the 8-bit
//! Identifier field. Every request built by one client context must draw
//! from the same allocator, otherwise two in-flight requests can end up
//! with the same identifier.

use rand::Rng;
use std::sync::atomic::{AtomicU8, Ordering};

/// Thread-safe request identifier counter, wrapping modulo 256
///
/// Share one allocator per process (or per client context) by reference or
/// through an `Arc`. Up to 256 consecutive allocations are distinct.
#[derive(Debug)]
pub struct IdAllocator {
    current: AtomicU8,
}

impl IdAllocator {
    /// Create an allocator whose first issued id is `start + 1`
    pub fn new(start: u8) -> Self {
        IdAllocator {
            current: AtomicU8::new(start),
        }
    }

    /// Create an allocator starting at a random point in the id space
    pub fn random() -> Self {
        Self::new(rand::rng().random_range(1..255))
    }

    /// Issue the next identifier
    pub fn allocate(&self) -> u8 {
        // fetch_add wraps on overflow
        self.current.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// The most recently issued identifier
    pub fn current(&self) -> u8 {
        self.current.load(Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::random()
    }
}
