//! Production environment backed by the system clock.

use murmur_core::Environment;

/// Environment reading the real wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn wall_clock_millis(&self) -> u64 {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)");
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}
