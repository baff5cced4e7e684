/// Round arithmetic shared by the beacon engine, sync manager, and
/// client API. Mirrors the role `node/clock`'s `ChainEpochClock` plays
/// for Filecoin epochs, specialized to round numbers instead of a
/// fixed-width `ChainEpoch`.
///
/// Round 0 never appears in a stored chain; it is reserved by the
/// public API to mean "the latest round".
pub fn round_at_time(genesis_time: u64, period_secs: u64, time: u64) -> u64 {
    if time < genesis_time {
        return 0;
    }
    (time - genesis_time) / period_secs + 1
}

/// The wall-clock time (unix seconds) at which `round` begins. Round 1
/// begins exactly at genesis.
pub fn time_for_round(genesis_time: u64, period_secs: u64, round: u64) -> u64 {
    genesis_time + round.saturating_sub(1) * period_secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_one_starts_at_genesis() {
        assert_eq!(round_at_time(1_000, 30, 1_000), 1);
        assert_eq!(time_for_round(1_000, 30, 1), 1_000);
    }

    #[test]
    fn before_genesis_is_round_zero() {
        assert_eq!(round_at_time(1_000, 30, 999), 0);
    }

    #[quickcheck_macros::quickcheck]
    fn round_and_time_are_inverse_at_boundaries(genesis: u32, period: u8, round: u32) -> bool {
        let genesis = genesis as u64;
        let period = (period as u64).max(1);
        let round = (round as u64 % 100_000) + 1;
        let t = time_for_round(genesis, period, round);
        round_at_time(genesis, period, t) == round
    }
}
