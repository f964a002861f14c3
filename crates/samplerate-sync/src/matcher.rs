//! Nearest supported sample rate selection.

use crate::error::{Result, SyncError};

/// Pick the supported rate closest to `target_hz`.
///
/// When two candidates are equally close the lower rate wins, so the answer does not
/// depend on the order the device listed its rates in. Candidates that are not positive
/// finite numbers are ignored.
///
/// Returns [`SyncError::EmptySupportedRateSet`] when no usable candidate remains and
/// [`SyncError::InvalidRate`] when the target itself is unusable.
pub fn nearest_rate(target_hz: f64, supported: &[f64]) -> Result<f64> {
    if !is_valid_rate(target_hz) {
        return Err(SyncError::InvalidRate(target_hz));
    }

    let mut best: Option<(f64, f64)> = None;
    for &rate in supported.iter().filter(|r| is_valid_rate(**r)) {
        let distance = (rate - target_hz).abs();
        let replace = match best {
            None => true,
            Some((b_rate, b_distance)) => is_better_candidate(rate, distance, b_rate, b_distance),
        };
        if replace {
            best = Some((rate, distance));
        }
    }

    best.map(|(rate, _)| rate)
        .ok_or(SyncError::EmptySupportedRateSet)
}

pub(crate) fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

fn is_better_candidate(rate: f64, distance: f64, best_rate: f64, best_distance: f64) -> bool {
    if distance != best_distance {
        distance < best_distance
    } else {
        rate < best_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_optimal(target: f64, supported: &[f64]) {
        let picked = nearest_rate(target, supported).unwrap();
        assert!(supported.contains(&picked));
        for &s in supported {
            assert!(
                (picked - target).abs() <= (s - target).abs(),
                "{picked} is farther from {target} than {s}"
            );
        }
    }

    #[test]
    fn nearest_rate_exact_match() {
        let rate = nearest_rate(48_000.0, &[44_100.0, 48_000.0, 96_000.0]).unwrap();
        assert_eq!(rate, 48_000.0);
    }

    #[test]
    fn nearest_rate_picks_closest_below() {
        let rate = nearest_rate(45_000.0, &[44_100.0, 48_000.0]).unwrap();
        assert_eq!(rate, 44_100.0);
    }

    #[test]
    fn nearest_rate_clamps_to_extremes() {
        let supported = [44_100.0, 48_000.0, 96_000.0];
        assert_eq!(nearest_rate(8_000.0, &supported).unwrap(), 44_100.0);
        assert_eq!(nearest_rate(384_000.0, &supported).unwrap(), 96_000.0);
    }

    #[test]
    fn nearest_rate_handles_unsorted_input() {
        let rate = nearest_rate(176_400.0, &[96_000.0, 44_100.0, 192_000.0, 48_000.0]).unwrap();
        assert_eq!(rate, 192_000.0);
    }

    #[test]
    fn nearest_rate_tie_prefers_lower_rate() {
        assert_eq!(nearest_rate(46_000.0, &[48_000.0, 44_000.0]).unwrap(), 44_000.0);
        assert_eq!(nearest_rate(46_000.0, &[44_000.0, 48_000.0]).unwrap(), 44_000.0);
    }

    #[test]
    fn nearest_rate_is_deterministic() {
        let supported = [96_000.0, 44_100.0, 88_200.0, 48_000.0];
        let first = nearest_rate(66_150.0, &supported).unwrap();
        for _ in 0..10 {
            assert_eq!(nearest_rate(66_150.0, &supported).unwrap(), first);
        }
    }

    #[test]
    fn nearest_rate_is_optimal_for_common_rates() {
        let supported = [44_100.0, 48_000.0, 88_200.0, 96_000.0, 176_400.0, 192_000.0];
        for target in [
            8_000.0, 11_025.0, 22_050.0, 32_000.0, 44_100.0, 47_999.5, 64_000.0, 88_200.0,
            100_000.0, 352_800.0,
        ] {
            assert_optimal(target, &supported);
        }
        assert_optimal(44_100.0, &[48_000.0]);
    }

    #[test]
    fn nearest_rate_rejects_empty_set() {
        assert_eq!(
            nearest_rate(44_100.0, &[]),
            Err(SyncError::EmptySupportedRateSet)
        );
    }

    #[test]
    fn nearest_rate_ignores_unusable_candidates() {
        assert_eq!(
            nearest_rate(44_100.0, &[0.0, f64::NAN, -48_000.0]),
            Err(SyncError::EmptySupportedRateSet)
        );
        assert_eq!(
            nearest_rate(44_100.0, &[f64::NAN, 48_000.0, f64::INFINITY]).unwrap(),
            48_000.0
        );
    }

    #[test]
    fn nearest_rate_rejects_invalid_target() {
        assert!(matches!(
            nearest_rate(0.0, &[44_100.0]),
            Err(SyncError::InvalidRate(_))
        ));
        assert!(matches!(
            nearest_rate(f64::NAN, &[44_100.0]),
            Err(SyncError::InvalidRate(_))
        ));
    }
}
