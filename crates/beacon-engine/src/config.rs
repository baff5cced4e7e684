use std::time::Duration;

/// Tunables for the round clock (§4.6). Defaults favor a multi-second
/// period chain; a fast local test chain should shrink both.
#[derive(Clone, Debug)]
pub struct Config {
    /// How far before the round's deadline (`genesis + R*period`) the
    /// engine gives up waiting on `Recover` and moves to `Timeout`.
    pub timeout_margin: Duration,
    /// Bound on the incoming-partial queue; overflow drops the oldest
    /// entry and counts it (§5, "Shared resources").
    pub partial_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_margin: Duration::from_millis(200),
            partial_queue_capacity: 256,
        }
    }
}
