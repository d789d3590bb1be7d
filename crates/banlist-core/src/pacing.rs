//! Jitter sampling shared by every `Pacer` implementation.

use rand::Rng;
use std::time::Duration;

/// Sample a uniform delay in `[0, upper)` at millisecond resolution.
pub fn sample_jitter<R: Rng + ?Sized>(rng: &mut R, upper: Duration) -> Duration {
    let upper_ms = u64::try_from(upper.as_millis()).unwrap_or(u64::MAX);
    if upper_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rng.gen_range(0..upper_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn zero_upper_bound_yields_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sample_jitter(&mut rng, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn sub_millisecond_upper_bound_yields_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sample_jitter(&mut rng, Duration::from_micros(900)), Duration::ZERO);
    }

    proptest! {
        #[test]
        fn guild_jitter_stays_below_three_seconds(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..64 {
                let upper = Duration::from_secs(3);
                prop_assert!(sample_jitter(&mut rng, upper) < upper);
            }
        }

        #[test]
        fn periodic_jitter_stays_below_five_minutes(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..64 {
                let upper = Duration::from_secs(300);
                prop_assert!(sample_jitter(&mut rng, upper) < upper);
            }
        }
    }
}
