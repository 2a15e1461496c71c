//! # Randomized reconnect waits.
//!
//! Several dispatcher processes behind one gateway would otherwise all reconnect on
//! the same beat after the gateway restarts. Off by default. Jitter only ever adds to
//! the wait, so a reconnect never happens before the configured backoff.
//!
//! | policy         | wait for base `d`                        |
//! |----------------|------------------------------------------|
//! | `None`         | `d`                                      |
//! | `Full`         | `d` plus uniform in `[0, d]`             |
//! | `Equal`        | `d` plus uniform in `[0, d/2]`           |
//! | `Decorrelated` | uniform in `[d, 3 * d]`, capped at `max` |

use rand::Rng;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    #[default]
    None,
    Full,
    Equal,
    /// Only meaningful through [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl FromStr for JitterPolicy {
    type Err = String;

    /// Parses `none`, `full`, `equal` or `decorrelated` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(JitterPolicy::None),
            "full" => Ok(JitterPolicy::Full),
            "equal" => Ok(JitterPolicy::Equal),
            "decorrelated" => Ok(JitterPolicy::Decorrelated),
            other => Err(format!(
                "unknown jitter {other:?} (expected none|full|equal|decorrelated)"
            )),
        }
    }
}

impl JitterPolicy {
    /// `Decorrelated` passes `delay` through unchanged here.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = millis(delay);
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => uniform(ms, ms.saturating_mul(2)),
            JitterPolicy::Equal => uniform(ms, ms.saturating_add(ms / 2)),
        }
    }

    /// Draws from `[base, 3 * base]` capped at `max`, never below `base`.
    /// Other policies apply to `base`.
    pub fn apply_decorrelated(&self, base: Duration, max: Duration) -> Duration {
        if *self != JitterPolicy::Decorrelated {
            return self.apply(base);
        }
        let lo = millis(base);
        let hi = lo.saturating_mul(3).min(millis(max)).max(lo);
        uniform(lo, hi)
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn uniform(lo: u64, hi: u64) -> Duration {
    if lo >= hi {
        return Duration::from_millis(lo);
    }
    Duration::from_millis(rand::rng().random_range(lo..=hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("EQUAL".parse::<JitterPolicy>(), Ok(JitterPolicy::Equal));
        assert_eq!(" none ".parse::<JitterPolicy>(), Ok(JitterPolicy::None));
        assert!("wobbly".parse::<JitterPolicy>().is_err());
    }

    #[test]
    fn test_decorrelated_respects_bounds() {
        let base = Duration::from_millis(500);
        let max = Duration::from_secs(1);
        for _ in 0..100 {
            let d = JitterPolicy::Decorrelated.apply_decorrelated(base, max);
            assert!(d >= base && d <= max, "{d:?}");
        }
        let past_cap = JitterPolicy::Decorrelated.apply_decorrelated(Duration::from_secs(3), max);
        assert_eq!(past_cap, Duration::from_secs(3));
    }

    #[test]
    fn test_jitter_never_shortens_the_wait() {
        let base = Duration::from_secs(5);
        for policy in [JitterPolicy::Full, JitterPolicy::Equal] {
            for _ in 0..200 {
                let d = policy.apply(base);
                assert!(d >= base, "{policy:?} gave {d:?}");
            }
        }
        assert!((0..200).all(|_| JitterPolicy::Full.apply(base) <= base * 2));
        assert!((0..200).all(|_| JitterPolicy::Equal.apply(base) <= base * 3 / 2));
    }

    #[test]
    fn test_zero_delay_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }
}
