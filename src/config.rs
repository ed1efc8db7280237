//! Configuration constants for the runtime and cancellation primitives
//!
//! This module contains tunable parameters that affect runtime behavior,
//! particularly around idle parking and listener bookkeeping.

/// Park timeout used when the runtime has nothing scheduled (in milliseconds)
///
/// `block_on` parks the thread while its root future is pending. When no
/// timer is pending there is no natural wake-up deadline, so the thread
/// re-checks its queues after this long. Wakers unpark the thread directly,
/// so this only bounds the cost of a missed unpark.
pub const IDLE_PARK_TIMEOUT_MS: u64 = 10;

/// Initial capacity of a cancellation token's listener list
///
/// Most tokens carry one or two listeners (a parent link, a policy race,
/// a waiting future). Sizing the list up front avoids reallocations on the
/// registration path.
pub const EXPECTED_LISTENER_COUNT: usize = 4;
