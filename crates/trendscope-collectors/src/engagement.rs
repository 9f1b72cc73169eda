//! Engagement formulas and per-platform performance thresholds.
//!
//! View-based platforms divide interactions by views (or impressions).
//! Follower-based platforms divide by the author's follower count. Each
//! threshold table only applies to its own platform's formula.

use trendscope_core::{PerformanceLevel, Platform};

/// Cut-offs in percent, checked from the top down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub excellent: f64,
    pub good: f64,
    pub average: f64,
}

#[must_use]
pub fn thresholds(platform: Platform) -> Thresholds {
    match platform {
        Platform::YouTube => Thresholds {
            excellent: 10.0,
            good: 5.0,
            average: 2.0,
        },
        Platform::TikTok => Thresholds {
            excellent: 15.0,
            good: 10.0,
            average: 5.0,
        },
        Platform::Instagram => Thresholds {
            excellent: 6.0,
            good: 3.0,
            average: 1.0,
        },
        Platform::Twitter => Thresholds {
            excellent: 5.0,
            good: 3.0,
            average: 1.0,
        },
        Platform::LinkedIn => Thresholds {
            excellent: 6.0,
            good: 4.0,
            average: 2.0,
        },
    }
}

#[must_use]
pub fn performance_level(platform: Platform, engagement_rate: f64) -> PerformanceLevel {
    let t = thresholds(platform);
    if engagement_rate >= t.excellent {
        PerformanceLevel::Excellent
    } else if engagement_rate >= t.good {
        PerformanceLevel::Good
    } else if engagement_rate >= t.average {
        PerformanceLevel::Average
    } else {
        PerformanceLevel::Poor
    }
}

/// `interactions / denominator × 100`, exactly `0.0` when the denominator is zero.
#[allow(clippy::cast_precision_loss)]
fn percent_of(interactions: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let rate = interactions as f64 / denominator as f64 * 100.0;
    if rate.is_finite() {
        rate
    } else {
        0.0
    }
}

/// View-denominated rate (YouTube, TikTok, LinkedIn impressions).
#[must_use]
pub fn view_rate(interactions: u64, views: u64) -> f64 {
    percent_of(interactions, views)
}

/// Follower-denominated rate (Instagram, Twitter).
#[must_use]
pub fn follower_rate(interactions: u64, followers: u64) -> f64 {
    percent_of(interactions, followers)
}

/// Percent change from `previous` to `current`; `0.0` without a baseline.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn growth_rate(current: u64, previous: u64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    (current as f64 - previous as f64) / previous as f64 * 100.0
}

/// Sum of the named counters, saturating instead of overflowing.
#[must_use]
pub fn sum_interactions(values: &[u64]) -> u64 {
    values.iter().fold(0_u64, |acc, v| acc.saturating_add(*v))
}
