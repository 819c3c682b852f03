//! Derived production indicators.
//!
//! Pure functions over raw counts: how far an order has progressed and how a
//! timer's efficiency ratio should be displayed. Nothing here touches the row
//! store or the change feed.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Lower bound (inclusive) of the `good` efficiency tier.
pub const GOOD_THRESHOLD: f64 = 0.95;

/// Lower bound (inclusive) of the `warning` efficiency tier.
pub const WARNING_THRESHOLD: f64 = 0.80;

/// Fraction of the ordered quantity produced so far.
///
/// Returns 0 when nothing was ordered. Over-production is reported as is
/// (120 of 100 is 1.2).
pub fn progress_ratio(produced: u64, ordered: u64) -> f64 {
    if ordered == 0 {
        return 0.0;
    }
    produced as f64 / ordered as f64
}

/// Progress ratio rounded to a whole percentage.
pub fn progress_percent(ratio: f64) -> u32 {
    if !ratio.is_finite() || ratio <= 0.0 {
        return 0;
    }
    (ratio * 100.0).round() as u32
}

/// Units still to produce; zero once the order is met or exceeded.
pub fn remaining_units(produced: u64, ordered: u64) -> u64 {
    ordered.saturating_sub(produced)
}

/// Produced units per hour of elapsed timer time.
pub fn throughput_per_hour(produced: u64, elapsed: Duration) -> Option<f64> {
    let seconds = elapsed.num_seconds();
    if seconds <= 0 {
        return None;
    }
    Some(produced as f64 * 3600.0 / seconds as f64)
}

/// Display severity of an efficiency ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyTier {
    Good,
    Warning,
    Critical,
    Unknown,
}

impl EfficiencyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EfficiencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn known(ratio: Option<f64>) -> Option<f64> {
    ratio.filter(|r| r.is_finite())
}

/// Buckets an efficiency ratio into a severity tier.
///
/// Missing, NaN and infinite ratios are `Unknown`.
pub fn efficiency_tier(ratio: Option<f64>) -> EfficiencyTier {
    match known(ratio) {
        None => EfficiencyTier::Unknown,
        Some(r) if r >= GOOD_THRESHOLD => EfficiencyTier::Good,
        Some(r) if r >= WARNING_THRESHOLD => EfficiencyTier::Warning,
        Some(_) => EfficiencyTier::Critical,
    }
}

/// Efficiency rounded to a whole percentage, `None` when the tier is unknown.
pub fn efficiency_percent(ratio: Option<f64>) -> Option<i64> {
    known(ratio).map(|r| (r * 100.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_zero_without_ordered_quantity() {
        assert_eq!(progress_ratio(0, 0), 0.0);
        assert_eq!(progress_ratio(50, 0), 0.0);
    }

    #[test]
    fn progress_is_not_clamped() {
        assert_eq!(progress_ratio(120, 100), 1.2);
        assert_eq!(progress_ratio(50, 200), 0.25);
        assert_eq!(progress_percent(1.2), 120);
    }

    #[test]
    fn progress_percent_rounds() {
        assert_eq!(progress_percent(0.524), 52);
        assert_eq!(progress_percent(0.526), 53);
        assert_eq!(progress_percent(f64::NAN), 0);
        assert_eq!(progress_percent(0.0), 0);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(efficiency_tier(Some(0.95)), EfficiencyTier::Good);
        assert_eq!(efficiency_tier(Some(1.3)), EfficiencyTier::Good);
        assert_eq!(efficiency_tier(Some(0.94999)), EfficiencyTier::Warning);
        assert_eq!(efficiency_tier(Some(0.80)), EfficiencyTier::Warning);
        assert_eq!(efficiency_tier(Some(0.79999)), EfficiencyTier::Critical);
        assert_eq!(efficiency_tier(Some(0.0)), EfficiencyTier::Critical);
    }

    #[test]
    fn tier_unknown_for_missing_or_nan() {
        assert_eq!(efficiency_tier(None), EfficiencyTier::Unknown);
        assert_eq!(efficiency_tier(Some(f64::NAN)), EfficiencyTier::Unknown);
        assert_eq!(efficiency_tier(Some(f64::INFINITY)), EfficiencyTier::Unknown);
        assert_eq!(EfficiencyTier::Unknown.to_string(), "unknown");
    }

    #[test]
    fn efficiency_percent_rounds_to_whole() {
        assert_eq!(efficiency_percent(Some(0.9749)), Some(97));
        assert_eq!(efficiency_percent(Some(0.976)), Some(98));
        assert_eq!(efficiency_percent(None), None);
        assert_eq!(efficiency_percent(Some(f64::NAN)), None);
    }

    #[test]
    fn remaining_saturates() {
        assert_eq!(remaining_units(30, 100), 70);
        assert_eq!(remaining_units(130, 100), 0);
    }

    #[test]
    fn throughput_needs_elapsed_time() {
        assert_eq!(throughput_per_hour(10, Duration::zero()), None);
        assert_eq!(throughput_per_hour(60, Duration::minutes(30)), Some(120.0));
    }
}
