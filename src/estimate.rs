use rand::Rng;

pub const EMPTY_SERVER_ESTIMATE: u64 = 100;
pub const MAX_JITTER_PERCENT: i64 = 10;

/// Supplies the percentage jitter applied to a membership estimate.
pub trait JitterSource {
    fn jitter_percent(&mut self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn jitter_percent(&mut self) -> i64 {
        rand::thread_rng().gen_range(-MAX_JITTER_PERCENT..=MAX_JITTER_PERCENT)
    }
}

/// Constant jitter; `FixedJitter(0)` disables it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedJitter(pub i64);

impl JitterSource for FixedJitter {
    fn jitter_percent(&mut self) -> i64 {
        self.0
    }
}

/// Extrapolates total membership assuming roughly a quarter of members show
/// as online, never returning less than `online_count + 10`.
pub fn estimate_total_members(online_count: u64, jitter: &mut dyn JitterSource) -> u64 {
    if online_count == 0 {
        return EMPTY_SERVER_ESTIMATE;
    }

    let base = online_count.saturating_mul(4);
    let percent = jitter
        .jitter_percent()
        .clamp(-MAX_JITTER_PERCENT, MAX_JITTER_PERCENT);
    let factor = (100 + percent) as u64;
    let estimate = base.saturating_mul(factor) / 100;

    estimate.max(online_count + 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_server_uses_fixed_estimate() {
        assert_eq!(estimate_total_members(0, &mut FixedJitter(10)), 100);
        assert_eq!(estimate_total_members(0, &mut RandomJitter), 100);
    }

    #[test]
    fn estimate_is_four_times_online_without_jitter() {
        assert_eq!(estimate_total_members(50, &mut FixedJitter(0)), 200);
    }

    #[test]
    fn jitter_scales_the_base_and_truncates() {
        assert_eq!(estimate_total_members(25, &mut FixedJitter(-10)), 90);
        assert_eq!(estimate_total_members(33, &mut FixedJitter(7)), 141);
    }

    #[test]
    fn small_counts_are_clamped_to_floor() {
        assert_eq!(estimate_total_members(1, &mut FixedJitter(0)), 11);
        assert_eq!(estimate_total_members(3, &mut FixedJitter(-10)), 13);
    }

    #[test]
    fn floor_holds_for_every_jitter_value() {
        for online in 1..=200 {
            for percent in -MAX_JITTER_PERCENT..=MAX_JITTER_PERCENT {
                let estimate = estimate_total_members(online, &mut FixedJitter(percent));
                assert!(estimate >= online + 10, "online {online} jitter {percent}");
            }
        }
    }

    struct WildJitter(i64);

    impl JitterSource for WildJitter {
        fn jitter_percent(&mut self) -> i64 {
            self.0
        }
    }

    #[test]
    fn out_of_range_jitter_is_clamped() {
        assert_eq!(estimate_total_members(50, &mut WildJitter(-500)), 180);
        assert_eq!(estimate_total_members(50, &mut WildJitter(500)), 220);
        assert_eq!(estimate_total_members(50, &mut WildJitter(i64::MIN)), 180);
    }

    #[test]
    fn random_jitter_stays_in_range() {
        let mut jitter = RandomJitter;
        for _ in 0..500 {
            let percent = jitter.jitter_percent();
            assert!((-MAX_JITTER_PERCENT..=MAX_JITTER_PERCENT).contains(&percent));
        }
    }
}
