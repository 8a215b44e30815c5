//! Conversions between wall-clock time and round numbers.
//!
//! Round 1 is published at genesis and every `period` seconds after that a new round
//! becomes available.

use crate::chain_info::ChainInfo;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// the round available at `time` (unix seconds); anything up to genesis is round 1
pub fn round_at(time: u64, genesis_time: u64, period_seconds: u64) -> u64 {
    if time <= genesis_time || period_seconds == 0 {
        return 1;
    }
    // at genesis, the round == 1, so we add 1
    (time - genesis_time) / period_seconds + 1
}

/// the unix time (seconds) at which `round` becomes available; round 0 is treated as round 1
pub fn time_of_round(round: u64, genesis_time: u64, period_seconds: u64) -> u64 {
    round
        .saturating_sub(1)
        .saturating_mul(period_seconds)
        .saturating_add(genesis_time)
}

/// the round of `chain_info` available at `time`
pub fn round_for_time(chain_info: &ChainInfo, time: SystemTime) -> u64 {
    // times before the unix epoch are before any genesis too
    let epoch_seconds = time
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    round_at(
        epoch_seconds,
        chain_info.genesis_time,
        chain_info.period_seconds,
    )
}

/// the moment `round` of `chain_info` becomes available, or `None` if that lies beyond
/// what `SystemTime` can represent
pub fn time_for_round(chain_info: &ChainInfo, round: u64) -> Option<SystemTime> {
    let seconds = time_of_round(round, chain_info.genesis_time, chain_info.period_seconds);
    if seconds == u64::MAX {
        // saturated
        return None;
    }
    UNIX_EPOCH.checked_add(Duration::from_secs(seconds))
}

#[cfg(test)]
mod test {
    use super::{round_at, round_for_time, time_for_round, time_of_round};
    use crate::mock;
    use crate::verify::SchemeID;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    const GENESIS: u64 = 1595431050;
    const PERIOD: u64 = 30;

    #[test]
    fn genesis_and_earlier_are_round_one() {
        assert_eq!(round_at(0, GENESIS, PERIOD), 1);
        assert_eq!(round_at(GENESIS - 1, GENESIS, PERIOD), 1);
        assert_eq!(round_at(GENESIS, GENESIS, PERIOD), 1);
    }

    #[test]
    fn rounds_advance_every_period() {
        assert_eq!(round_at(GENESIS + 1, GENESIS, PERIOD), 1);
        assert_eq!(round_at(GENESIS + 29, GENESIS, PERIOD), 1);
        assert_eq!(round_at(GENESIS + 30, GENESIS, PERIOD), 2);
        assert_eq!(round_at(GENESIS + 60, GENESIS, PERIOD), 3);
        assert_eq!(round_at(GENESIS + 89, GENESIS, PERIOD), 3);
    }

    #[test]
    fn round_times() {
        assert_eq!(time_of_round(1, GENESIS, PERIOD), GENESIS);
        assert_eq!(time_of_round(2, GENESIS, PERIOD), GENESIS + 30);
        assert_eq!(time_of_round(0, GENESIS, PERIOD), GENESIS);
    }

    #[test]
    fn round_of_round_time_is_the_round() {
        for period in [1, 3, 25, 30] {
            for round in (1..2000).step_by(37) {
                let time = time_of_round(round, GENESIS, period);
                assert_eq!(round_at(time, GENESIS, period), round);
            }
        }
    }

    #[test]
    fn chain_info_helpers_use_wall_clock_time() {
        let info = mock::chain_info(SchemeID::PedersenBlsChained, GENESIS);
        let round_two = time_for_round(&info, 2).unwrap();

        assert_eq!(round_two, UNIX_EPOCH + Duration::from_secs(GENESIS + 30));
        assert_eq!(round_for_time(&info, round_two), 2);
        assert_eq!(round_for_time(&info, UNIX_EPOCH), 1);
    }

    #[test]
    fn unrepresentable_round_times_are_none() {
        let mut info = mock::chain_info(SchemeID::PedersenBlsChained, u64::MAX);
        assert_eq!(time_for_round(&info, 1), None);
        assert_eq!(round_for_time(&info, SystemTime::now()), 1);

        info.genesis_time = GENESIS;
        info.period_seconds = u64::MAX;
        assert!(time_for_round(&info, 1).is_some());
        assert_eq!(time_for_round(&info, 2), None);
        assert_eq!(time_for_round(&info, u64::MAX), None);
    }
}
