//! Property tests for the circular time-of-day distance.

use chrono::NaiveTime;
use proptest::prelude::*;
use tide_alerts_lib::correlator::{time_distance, MINUTES_PER_DAY};

fn clock_time() -> impl Strategy<Value = NaiveTime> {
    (0..MINUTES_PER_DAY)
        .prop_map(|m| NaiveTime::from_hms_opt(m / 60, m % 60, 0).unwrap())
}

proptest! {
    #[test]
    fn distance_is_symmetric(a in clock_time(), b in clock_time()) {
        prop_assert_eq!(time_distance(a, b), time_distance(b, a));
    }

    #[test]
    fn distance_is_at_most_half_a_day(a in clock_time(), b in clock_time()) {
        prop_assert!(time_distance(a, b) <= MINUTES_PER_DAY / 2);
    }

    #[test]
    fn distance_to_self_is_zero(a in clock_time()) {
        prop_assert_eq!(time_distance(a, a), 0);
    }
}
