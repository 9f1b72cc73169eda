//! Cross-platform analysis over a window of stored trends.
//!
//! The report is plain serde data so it can be stored as a JSONB snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trendscope_core::{Platform, TrendItem};

use crate::insights::mean;
use crate::segmentation::{segment_trends, Segment};

const TOP_TRENDS: usize = 5;
/// Absolute Pearson coefficient above which a metric pair is reported.
const SIGNIFICANT_CORRELATION: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementDistribution {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub p25: f64,
    pub p75: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTrend {
    pub external_id: String,
    pub keyword: String,
    pub engagement_rate: f64,
    pub growth_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub count: usize,
    pub avg_growth_rate: f64,
    pub avg_sentiment: f64,
    pub engagement: EngagementDistribution,
    pub top_trends: Vec<TopTrend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub left: String,
    pub right: String,
    pub coefficient: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outlook {
    StrongGrowth,
    ModerateGrowth,
    Stable,
    Decline,
}

impl Outlook {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            Outlook::StrongGrowth
        } else if score > 0.5 {
            Outlook::ModerateGrowth
        } else if score > 0.3 {
            Outlook::Stable
        } else {
            Outlook::Decline
        }
    }

    #[must_use]
    pub fn expected_growth(self) -> &'static str {
        match self {
            Outlook::StrongGrowth => ">100%",
            Outlook::ModerateGrowth => "50-100%",
            Outlook::Stable => "0-50%",
            Outlook::Decline => "<0%",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub platform: Platform,
    pub external_id: String,
    pub keyword: String,
    pub outlook: Outlook,
    pub expected_growth: String,
    pub score: f64,
    pub momentum: f64,
    pub sentiment_factor: f64,
    pub volume_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub trends_analyzed: usize,
    pub platforms: BTreeMap<Platform, PlatformStats>,
    pub correlations: Vec<Correlation>,
    pub segments: Vec<Segment>,
    pub predictions: Vec<Prediction>,
}

/// Build the full report for `items` detected within the given window.
#[must_use]
pub fn analyze_trends(
    items: &[TrendItem],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> AnalysisReport {
    AnalysisReport {
        window_start,
        window_end,
        trends_analyzed: items.len(),
        platforms: platform_performance(items),
        correlations: significant_correlations(items),
        segments: segment_trends(items),
        predictions: predict_evolution(items),
    }
}

#[must_use]
pub fn platform_performance(items: &[TrendItem]) -> BTreeMap<Platform, PlatformStats> {
    let mut grouped: BTreeMap<Platform, Vec<&TrendItem>> = BTreeMap::new();
    for item in items {
        grouped.entry(item.platform).or_default().push(item);
    }

    grouped
        .into_iter()
        .map(|(platform, group)| {
            let rates: Vec<f64> = group.iter().map(|i| i.engagement_rate).collect();
            let growth: Vec<f64> = group.iter().map(|i| i.growth_rate).collect();
            let sentiment: Vec<f64> = group.iter().map(|i| i.sentiment_score).collect();

            let mut ranked = group.clone();
            ranked.sort_by(|a, b| b.engagement_rate.total_cmp(&a.engagement_rate));
            let top_trends = ranked
                .into_iter()
                .take(TOP_TRENDS)
                .map(|i| TopTrend {
                    external_id: i.external_id.clone(),
                    keyword: i.keyword_or_title.clone(),
                    engagement_rate: i.engagement_rate,
                    growth_rate: i.growth_rate,
                })
                .collect();

            let stats = PlatformStats {
                count: group.len(),
                avg_growth_rate: mean(&growth),
                avg_sentiment: mean(&sentiment),
                engagement: EngagementDistribution {
                    mean: mean(&rates),
                    median: quantile(&rates, 0.5),
                    std_dev: sample_std_dev(&rates),
                    p25: quantile(&rates, 0.25),
                    p75: quantile(&rates, 0.75),
                },
                top_trends,
            };
            (platform, stats)
        })
        .collect()
}

/// Score each item's likely evolution from growth, sentiment and relative
/// volume.
///
/// Growth is stored in percent; it is scaled to a fraction and clamped to
/// `[-1, 1]` before weighting.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn predict_evolution(items: &[TrendItem]) -> Vec<Prediction> {
    let max_volume = items.iter().map(|i| i.volume).max().unwrap_or(0);
    let volume_scale = (max_volume as f64).ln_1p();

    items
        .iter()
        .map(|item| {
            let momentum = (item.growth_rate / 100.0).clamp(-1.0, 1.0);
            let sentiment_factor = (item.sentiment_score + 1.0) / 2.0;
            let volume_factor = if volume_scale > 0.0 {
                (item.volume as f64).ln_1p() / volume_scale
            } else {
                0.0
            };
            let score = 0.4 * momentum + 0.3 * sentiment_factor + 0.3 * volume_factor;
            let outlook = Outlook::from_score(score);
            Prediction {
                platform: item.platform,
                external_id: item.external_id.clone(),
                keyword: item.keyword_or_title.clone(),
                outlook,
                expected_growth: outlook.expected_growth().to_string(),
                score,
                momentum,
                sentiment_factor,
                volume_factor,
            }
        })
        .collect()
}

/// Metric pairs whose Pearson coefficient exceeds 0.5 in magnitude.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn significant_correlations(items: &[TrendItem]) -> Vec<Correlation> {
    let columns: [(&str, Vec<f64>); 4] = [
        ("volume", items.iter().map(|i| i.volume as f64).collect()),
        (
            "engagement_rate",
            items.iter().map(|i| i.engagement_rate).collect(),
        ),
        ("growth_rate", items.iter().map(|i| i.growth_rate).collect()),
        (
            "sentiment_score",
            items.iter().map(|i| i.sentiment_score).collect(),
        ),
    ];

    let mut out = Vec::new();
    for (i, (left, xs)) in columns.iter().enumerate() {
        for (right, ys) in &columns[i + 1..] {
            if let Some(coefficient) = pearson(xs, ys) {
                if coefficient.abs() > SIGNIFICANT_CORRELATION {
                    out.push(Correlation {
                        left: (*left).to_string(),
                        right: (*right).to_string(),
                        coefficient,
                    });
                }
            }
        }
    }
    out
}

/// `None` for fewer than two points or a constant column.
fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() < 2 || xs.len() != ys.len() {
        return None;
    }
    let (mx, my) = (mean(xs), mean(ys));
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    let denom = (vx * vy).sqrt();
    (denom > 0.0).then(|| cov / denom)
}

/// Linearly interpolated quantile; `0.0` for an empty slice.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

#[allow(clippy::cast_precision_loss)]
fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trend(
        platform: Platform,
        id: &str,
        rate: f64,
        growth: f64,
        sentiment: f64,
        volume: u64,
    ) -> TrendItem {
        let mut item = TrendItem::new(platform, id, format!("kw {id}"), Utc::now());
        item.engagement_rate = rate;
        item.growth_rate = growth;
        item.sentiment_score = sentiment;
        item.volume = volume;
        item
    }

    #[test]
    fn stats_are_grouped_per_platform() {
        let items = vec![
            trend(Platform::YouTube, "a", 2.0, 10.0, 0.0, 100),
            trend(Platform::YouTube, "b", 4.0, 20.0, 0.5, 200),
            trend(Platform::YouTube, "c", 9.0, 30.0, 1.0, 300),
            trend(Platform::Twitter, "t", 1.0, 0.0, -1.0, 5),
        ];
        let stats = platform_performance(&items);

        let yt = &stats[&Platform::YouTube];
        assert_eq!(yt.count, 3);
        assert!((yt.engagement.mean - 5.0).abs() < 1e-9);
        assert!((yt.engagement.median - 4.0).abs() < 1e-9);
        assert!((yt.engagement.p25 - 3.0).abs() < 1e-9);
        assert!((yt.engagement.p75 - 6.5).abs() < 1e-9);
        assert!((yt.avg_growth_rate - 20.0).abs() < 1e-9);
        assert!((yt.avg_sentiment - 0.5).abs() < 1e-9);
        assert_eq!(yt.top_trends[0].external_id, "c");

        let tw = &stats[&Platform::Twitter];
        assert_eq!(tw.count, 1);
        assert!(tw.engagement.std_dev.abs() < f64::EPSILON);
    }

    #[test]
    fn top_trends_capped_at_five() {
        let items: Vec<TrendItem> = (0..8)
            .map(|i| trend(Platform::TikTok, &i.to_string(), f64::from(i), 0.0, 0.0, 1))
            .collect();
        let stats = platform_performance(&items);
        let top = &stats[&Platform::TikTok].top_trends;
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].external_id, "7");
    }

    #[test]
    fn prediction_combines_weighted_factors() {
        // momentum 0.5, sentiment factor 1.0, volume factor 1.0
        let items = vec![trend(Platform::YouTube, "a", 5.0, 50.0, 1.0, 1000)];
        let p = &predict_evolution(&items)[0];
        assert!((p.score - 0.8).abs() < 1e-9);
        assert_eq!(p.outlook, Outlook::StrongGrowth);
        assert_eq!(p.expected_growth, ">100%");
    }

    #[test]
    fn growth_outlier_is_clamped() {
        let items = vec![trend(Platform::TikTok, "viral", 5.0, 5000.0, -1.0, 0)];
        let p = &predict_evolution(&items)[0];
        assert!((p.momentum - 1.0).abs() < f64::EPSILON);
        assert!(p.volume_factor.abs() < f64::EPSILON);
        assert!((p.score - 0.4).abs() < 1e-9);
        assert_eq!(p.outlook, Outlook::Stable);
    }

    #[test]
    fn outlook_boundaries_are_exclusive() {
        assert_eq!(Outlook::from_score(0.71), Outlook::StrongGrowth);
        assert_eq!(Outlook::from_score(0.7), Outlook::ModerateGrowth);
        assert_eq!(Outlook::from_score(0.5), Outlook::Stable);
        assert_eq!(Outlook::from_score(0.3), Outlook::Decline);
    }

    #[test]
    fn perfectly_correlated_columns_are_reported() {
        let items = vec![
            trend(Platform::YouTube, "a", 1.0, 0.0, 0.0, 10),
            trend(Platform::YouTube, "b", 2.0, 0.0, 0.0, 20),
            trend(Platform::YouTube, "c", 3.0, 0.0, 0.0, 30),
        ];
        let correlations = significant_correlations(&items);
        assert_eq!(correlations.len(), 1);
        assert_eq!(correlations[0].left, "volume");
        assert_eq!(correlations[0].right, "engagement_rate");
        assert!((correlations[0].coefficient - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_window_produces_empty_report() {
        let now = Utc::now();
        let report = analyze_trends(&[], now, now);
        assert_eq!(report.trends_analyzed, 0);
        assert!(report.platforms.is_empty());
        assert!(report.correlations.is_empty());
        assert!(report.segments.is_empty());
        assert!(report.predictions.is_empty());
    }

    #[test]
    fn report_serializes_outlook_in_snake_case() {
        let now = Utc::now();
        let items = vec![trend(Platform::LinkedIn, "l", 1.0, -80.0, -1.0, 0)];
        let json = serde_json::to_value(analyze_trends(&items, now, now)).unwrap();
        assert_eq!(json["predictions"][0]["outlook"], "decline");
        assert_eq!(json["platforms"]["linkedin"]["count"], 1);
        assert_eq!(json["segments"][0]["name"], "Segment 1");
        assert_eq!(json["segments"][0]["trend_ids"][0], "l");
    }
}
