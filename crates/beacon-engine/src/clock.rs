//! Wall-clock scheduling for the round driver. The engine reasons in
//! Unix seconds (as the group document does); this translates that
//! into `tokio::time::sleep` durations.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the Unix epoch")
        .as_secs()
}

/// How long to sleep to reach `target_unix`, zero if it has already
/// passed.
pub fn duration_until(target_unix: u64) -> Duration {
    let now = now_unix();
    if target_unix <= now {
        Duration::ZERO
    } else {
        Duration::from_secs(target_unix - now)
    }
}
