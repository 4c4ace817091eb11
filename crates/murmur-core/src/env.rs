//! Environment abstraction for deterministic testing.
//!
//! Session logic never reads the system clock itself. Production code passes
//! a real clock; tests pass a fixed or stepped one.

/// Source of wall-clock time for message timestamps.
///
/// # Invariants
///
/// - `wall_clock_millis()` returns milliseconds since the Unix epoch.
/// - Production implementations never return 0; zero is reserved on the wire
///   for "not stamped".
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time in Unix milliseconds.
    fn wall_clock_millis(&self) -> u64;
}
