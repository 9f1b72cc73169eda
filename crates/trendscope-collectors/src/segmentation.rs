//! K-means segmentation of a window of trends.
//!
//! Each trend becomes a point of four standardized features (volume,
//! engagement rate, growth rate, sentiment). Seeding is farthest-first from
//! the most engaging trend, so the same input always yields the same
//! segments.

use serde::{Deserialize, Serialize};
use trendscope_core::{Platform, TrendItem};

use crate::insights::mean;

const MAX_SEGMENTS: usize = 5;
const MAX_ITERATIONS: usize = 100;
const REPRESENTATIVES: usize = 3;
const FEATURES: usize = 4;

type Point = [f64; FEATURES];

/// Mean raw feature values of a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentProfile {
    pub volume: f64,
    pub engagement_rate: f64,
    pub growth_rate: f64,
    pub sentiment_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMember {
    pub platform: Platform,
    pub external_id: String,
    pub keyword: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub size: usize,
    pub characteristics: SegmentProfile,
    /// Most engaging members, best first.
    pub representative_trends: Vec<SegmentMember>,
    pub trend_ids: Vec<String>,
}

/// Cluster `items` into at most five segments, most engaging segment first.
///
/// Empty input gives no segments. Clusters that end up empty (identical
/// points) are dropped.
#[must_use]
pub fn segment_trends(items: &[TrendItem]) -> Vec<Segment> {
    if items.is_empty() {
        return Vec::new();
    }
    let points = standardize(&features(items));
    let k = MAX_SEGMENTS.min(items.len());
    let assignments = kmeans(&points, seed_centroids(items, &points, k));

    let mut groups: Vec<Vec<&TrendItem>> = vec![Vec::new(); k];
    for (item, cluster) in items.iter().zip(assignments) {
        groups[cluster].push(item);
    }

    let mut segments: Vec<(SegmentProfile, Vec<&TrendItem>)> = groups
        .into_iter()
        .filter(|g| !g.is_empty())
        .map(|g| (profile(&g), g))
        .collect();
    segments.sort_by(|a, b| b.0.engagement_rate.total_cmp(&a.0.engagement_rate));

    segments
        .into_iter()
        .enumerate()
        .map(|(i, (characteristics, mut members))| {
            let trend_ids = members.iter().map(|m| m.external_id.clone()).collect();
            members.sort_by(|a, b| b.engagement_rate.total_cmp(&a.engagement_rate));
            Segment {
                name: format!("Segment {}", i + 1),
                size: members.len(),
                characteristics,
                representative_trends: members
                    .iter()
                    .take(REPRESENTATIVES)
                    .map(|m| SegmentMember {
                        platform: m.platform,
                        external_id: m.external_id.clone(),
                        keyword: m.keyword_or_title.clone(),
                    })
                    .collect(),
                trend_ids,
            }
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn features(items: &[TrendItem]) -> Vec<Point> {
    items
        .iter()
        .map(|i| {
            [
                i.volume as f64,
                i.engagement_rate,
                i.growth_rate,
                i.sentiment_score,
            ]
        })
        .collect()
}

/// Z-score every column with the population standard deviation. A constant
/// column becomes all zeros.
#[allow(clippy::cast_precision_loss)]
fn standardize(points: &[Point]) -> Vec<Point> {
    let mut out = points.to_vec();
    for f in 0..FEATURES {
        let column: Vec<f64> = points.iter().map(|p| p[f]).collect();
        let m = mean(&column);
        let var = column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / column.len() as f64;
        let sd = var.sqrt();
        for p in &mut out {
            p[f] = if sd > 0.0 { (p[f] - m) / sd } else { 0.0 };
        }
    }
    out
}

fn distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// First centroid is the most engaging trend; each next one is the point
/// farthest from every centroid chosen so far.
fn seed_centroids(items: &[TrendItem], points: &[Point], k: usize) -> Vec<Point> {
    let first = items
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| {
            a.engagement_rate
                .total_cmp(&b.engagement_rate)
                .then(ib.cmp(ia))
        })
        .map_or(0, |(i, _)| i);

    let mut centroids = vec![points[first]];
    while centroids.len() < k {
        let next = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let nearest = centroids
                    .iter()
                    .map(|c| distance(p, c))
                    .fold(f64::INFINITY, f64::min);
                (i, nearest)
            })
            .max_by(|(ia, a), (ib, b)| a.total_cmp(b).then(ib.cmp(ia)))
            .map_or(0, |(i, _)| i);
        centroids.push(points[next]);
    }
    centroids
}

fn nearest(point: &Point, centroids: &[Point]) -> usize {
    centroids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| distance(point, a).total_cmp(&distance(point, b)))
        .map_or(0, |(i, _)| i)
}

/// Lloyd iterations until assignments stop changing.
#[allow(clippy::cast_precision_loss)]
fn kmeans(points: &[Point], mut centroids: Vec<Point>) -> Vec<usize> {
    let mut assignments: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();

    for _ in 0..MAX_ITERATIONS {
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Point> = points
                .iter()
                .zip(&assignments)
                .filter(|(_, a)| **a == c)
                .map(|(p, _)| p)
                .collect();
            if members.is_empty() {
                continue;
            }
            for f in 0..FEATURES {
                centroid[f] = members.iter().map(|p| p[f]).sum::<f64>() / members.len() as f64;
            }
        }

        let next: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
        if next == assignments {
            break;
        }
        assignments = next;
    }
    assignments
}

#[allow(clippy::cast_precision_loss)]
fn profile(members: &[&TrendItem]) -> SegmentProfile {
    let column = |f: fn(&TrendItem) -> f64| {
        let values: Vec<f64> = members.iter().map(|m| f(m)).collect();
        mean(&values)
    };
    SegmentProfile {
        volume: column(|m| m.volume as f64),
        engagement_rate: column(|m| m.engagement_rate),
        growth_rate: column(|m| m.growth_rate),
        sentiment_score: column(|m| m.sentiment_score),
    }
}
