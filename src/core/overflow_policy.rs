//! Overflow policies for buffered outputs
//!
//! When a buffered output's queue is full, the policy decides whether
//! the producer waits or the incoming record is dropped and counted.
//! Records already queued are never evicted, so delivery order is
//! unaffected by either choice.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// # Example
///
/// ```
/// use named_logger_system::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default behavior: wait for the worker
/// let policy = OverflowPolicy::default();
/// assert_eq!(policy, OverflowPolicy::Block);
///
/// // Wait a little, then drop
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Block the producer until the worker frees a slot.
    ///
    /// Nothing is lost, at the cost of the caller absorbing sink latency.
    #[default]
    Block,

    /// Block up to the timeout, then drop the incoming record
    BlockWithTimeout(Duration),

    /// Drop the incoming record immediately and count it
    DropNewest,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
        }
    }
}

/// Callback for overflow notifications
///
/// Called when records are dropped because the queue was full. The
/// parameter is the total count of dropped records so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;
