//! Posting-time, audience-bucket and recommendation helpers.

use std::collections::BTreeMap;

use chrono::{DateTime, Timelike, Utc};
use trendscope_core::{PerformanceLevel, Platform, TrendItem};

use crate::keywords;
use crate::types::{
    AudienceInsights, BucketGroups, CompetitorProfile, ContentHighlight, ContentSuggestion,
    HourEngagement, SuggestionKind,
};

const TITLE_MIN_CHARS: usize = 30;
const TITLE_MAX_CHARS: usize = 70;
const RECOMMENDED_MAX_HASHTAGS: usize = 5;
const BEST_HOURS: usize = 3;
const TOP_KEYWORDS: usize = 10;
const HIGHLIGHTS: usize = 3;

/// One item of a competitor or audience window after scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredContent {
    pub id: String,
    pub title: String,
    pub text: String,
    pub published_at: Option<DateTime<Utc>>,
    pub volume: u64,
    pub engagement_rate: f64,
}

impl ScoredContent {
    fn text_for_keywords(&self) -> String {
        if self.text.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.text)
        }
    }
}

fn dated_rates(items: &[ScoredContent]) -> Vec<(DateTime<Utc>, f64)> {
    items
        .iter()
        .filter_map(|item| item.published_at.map(|ts| (ts, item.engagement_rate)))
        .collect()
}

/// Aggregate a recent-content window into a competitor profile.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn competitor_profile(
    platform: Platform,
    account_id: &str,
    display_name: Option<String>,
    followers: Option<u64>,
    items: &[ScoredContent],
) -> CompetitorProfile {
    let rates: Vec<f64> = items.iter().map(|item| item.engagement_rate).collect();
    let views: Vec<f64> = items.iter().map(|item| item.volume as f64).collect();
    let texts: Vec<String> = items.iter().map(ScoredContent::text_for_keywords).collect();

    let mut ranked: Vec<&ScoredContent> = items.iter().collect();
    ranked.sort_by(|a, b| b.engagement_rate.total_cmp(&a.engagement_rate));
    let highlights = ranked
        .into_iter()
        .take(HIGHLIGHTS)
        .map(|item| ContentHighlight {
            id: item.id.clone(),
            title: item.title.clone(),
            engagement_rate: item.engagement_rate,
            volume: item.volume,
        })
        .collect();

    CompetitorProfile {
        platform,
        account_id: account_id.to_string(),
        display_name,
        followers,
        items_analyzed: items.len(),
        average_engagement_rate: mean(&rates),
        average_views: mean(&views),
        best_hours: best_hours(&dated_rates(items), BEST_HOURS),
        top_keywords: keywords::top_keywords(texts.iter().map(String::as_str), TOP_KEYWORDS),
        highlights,
    }
}

/// Merge per-item data and platform-provided buckets into audience
/// insights. Every bucket group is normalized to percentages.
#[must_use]
pub fn audience_insights(
    platform: Platform,
    items: &[ScoredContent],
    mut buckets: BucketGroups,
) -> AudienceInsights {
    let active = hour_counts(items.iter().filter_map(|item| item.published_at.as_ref()));
    for (label, count) in active {
        add_to_bucket(&mut buckets, "active_hours", &label, count);
    }
    let texts: Vec<String> = items.iter().map(ScoredContent::text_for_keywords).collect();

    AudienceInsights {
        platform,
        items_analyzed: items.len(),
        buckets: normalize_buckets(buckets),
        best_hours: best_hours(&dated_rates(items), BEST_HOURS),
        top_keywords: keywords::top_keywords(texts.iter().map(String::as_str), TOP_KEYWORDS),
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Hours (UTC) at which each platform's audience is usually most active.
#[must_use]
pub fn peak_hours(platform: Platform) -> &'static [u32] {
    match platform {
        Platform::YouTube => &[12, 17, 18, 19, 20],
        Platform::TikTok => &[6, 7, 8, 9, 10, 14, 15, 16, 17, 19, 20, 21, 22, 23],
        Platform::Instagram => &[12, 13, 17, 18, 19, 20],
        Platform::Twitter => &[8, 9, 12, 17, 18],
        Platform::LinkedIn => &[7, 8, 12, 17],
    }
}

/// Rank publication hours by mean engagement, best first, keeping `limit`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn best_hours(samples: &[(DateTime<Utc>, f64)], limit: usize) -> Vec<HourEngagement> {
    let mut by_hour: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for (published_at, rate) in samples {
        let slot = by_hour.entry(published_at.hour()).or_insert((0.0, 0));
        slot.0 += rate;
        slot.1 += 1;
    }

    let mut hours: Vec<HourEngagement> = by_hour
        .into_iter()
        .map(|(hour, (sum, items))| HourEngagement {
            hour,
            mean_engagement_rate: sum / items as f64,
            items,
        })
        .collect();
    hours.sort_by(|a, b| {
        b.mean_engagement_rate
            .total_cmp(&a.mean_engagement_rate)
            .then_with(|| a.hour.cmp(&b.hour))
    });
    hours.truncate(limit);
    hours
}

/// Count publications per hour label (`"00"` .. `"23"`).
#[must_use]
pub fn hour_counts<'a, I>(timestamps: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a DateTime<Utc>>,
{
    let mut counts = BTreeMap::new();
    for ts in timestamps {
        *counts.entry(format!("{:02}", ts.hour())).or_insert(0.0) += 1.0;
    }
    counts
}

/// Rescale every bucket group to percentages of its own total.
///
/// A group whose total is zero is returned unchanged.
#[must_use]
pub fn normalize_buckets(groups: BucketGroups) -> BucketGroups {
    groups
        .into_iter()
        .map(|(name, buckets)| {
            let total: f64 = buckets.values().sum();
            if total <= 0.0 {
                return (name, buckets);
            }
            let scaled = buckets
                .into_iter()
                .map(|(label, value)| (label, value / total * 100.0))
                .collect();
            (name, scaled)
        })
        .collect()
}

/// Add `value` to `group/label`, creating either level on first use.
pub fn add_to_bucket(groups: &mut BucketGroups, group: &str, label: &str, value: f64) {
    *groups
        .entry(group.to_string())
        .or_default()
        .entry(label.to_string())
        .or_insert(0.0) += value;
}

/// Title formats that tend to perform, detected from wording.
#[must_use]
pub fn detect_formats(title: &str) -> Vec<&'static str> {
    let lower = title.to_lowercase();
    let mut formats = Vec::new();
    if ["how to", "tutorial", "guide", "comment faire", "tuto"]
        .iter()
        .any(|w| lower.contains(w))
    {
        formats.push("tutorial");
    }
    if ["top ", "best", "worst", "meilleur", "pire"]
        .iter()
        .any(|w| lower.contains(w))
    {
        formats.push("list");
    }
    if lower.contains('?') {
        formats.push("question");
    }
    if [" vs ", " vs.", "versus"].iter().any(|w| lower.contains(w)) {
        formats.push("comparison");
    }
    if ["review", "test", "avis"].iter().any(|w| lower.contains(w)) {
        formats.push("review");
    }
    formats
}

fn has_emoji(text: &str) -> bool {
    text.chars().any(|c| u32::from(c) >= 0x1F300)
}

/// Human-readable advice for one piece of content.
#[must_use]
pub fn content_recommendations(
    title: &str,
    level: PerformanceLevel,
    hashtag_count: usize,
    published_hour: Option<u32>,
    platform: Platform,
) -> Vec<String> {
    let mut out = Vec::new();

    let len = title.chars().count();
    if len < TITLE_MIN_CHARS {
        out.push(format!(
            "Title is short ({len} chars); aim for {TITLE_MIN_CHARS}-{TITLE_MAX_CHARS}"
        ));
    } else if len > TITLE_MAX_CHARS {
        out.push(format!(
            "Title is long ({len} chars); aim for {TITLE_MIN_CHARS}-{TITLE_MAX_CHARS}"
        ));
    }

    if matches!(level, PerformanceLevel::Poor | PerformanceLevel::Average) {
        out.push("Engagement is low; add a clear call to action".to_string());
    }
    if !has_emoji(title) {
        out.push("Consider an emoji in the title to stand out".to_string());
    }
    if !title.chars().any(|c| c.is_ascii_digit()) {
        out.push("Numbers in titles (lists, years) tend to attract clicks".to_string());
    }
    if hashtag_count > RECOMMENDED_MAX_HASHTAGS {
        out.push(format!(
            "Too many hashtags ({hashtag_count}); keep at most {RECOMMENDED_MAX_HASHTAGS}"
        ));
    }
    if let Some(hour) = published_hour {
        if !peak_hours(platform).contains(&hour) {
            out.push(format!(
                "Published at {hour:02}h UTC, outside the usual peak hours"
            ));
        }
    }
    out
}

/// Build up to five suggestions from currently trending items.
///
/// `category` filters items by their category; an empty value or
/// `general` keeps everything.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn suggestions_from_trends(
    platform: Platform,
    items: &[TrendItem],
    category: &str,
) -> Vec<ContentSuggestion> {
    let category = category.trim();
    let selected: Vec<&TrendItem> = items
        .iter()
        .filter(|item| {
            category.is_empty()
                || category.eq_ignore_ascii_case(TrendItem::DEFAULT_CATEGORY)
                || item.category.eq_ignore_ascii_case(category)
        })
        .collect();

    let mut out = Vec::new();
    if selected.is_empty() {
        return out;
    }

    let mut format_counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for item in &selected {
        for format in detect_formats(&item.keyword_or_title) {
            *format_counts.entry(format).or_insert(0) += 1;
        }
    }
    if let Some((format, count)) = format_counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
    {
        out.push(ContentSuggestion {
            kind: SuggestionKind::Format,
            message: format!("'{format}' titles dominate trending content ({count} items)"),
            examples: selected
                .iter()
                .filter(|item| detect_formats(&item.keyword_or_title).contains(format))
                .take(3)
                .map(|item| item.keyword_or_title.clone())
                .collect(),
        });
    }

    let top_words = keywords::top_keywords(
        selected.iter().map(|item| item.keyword_or_title.as_str()),
        5,
    );
    if !top_words.is_empty() {
        out.push(ContentSuggestion {
            kind: SuggestionKind::Keywords,
            message: "Work trending keywords into titles".to_string(),
            examples: top_words,
        });
    }

    let mut tag_counts: BTreeMap<String, usize> = BTreeMap::new();
    for tag in selected.iter().flat_map(|item| item.hashtags.iter()) {
        *tag_counts.entry(tag.to_lowercase()).or_insert(0) += 1;
    }
    let mut tags: Vec<(String, usize)> = tag_counts.into_iter().collect();
    tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if !tags.is_empty() {
        out.push(ContentSuggestion {
            kind: SuggestionKind::Hashtags,
            message: "Reuse hashtags that are trending right now".to_string(),
            examples: tags.into_iter().take(5).map(|(tag, _)| tag).collect(),
        });
    }

    out.push(ContentSuggestion {
        kind: SuggestionKind::Timing,
        message: format!("Publish during {platform} peak hours (UTC)"),
        examples: peak_hours(platform)
            .iter()
            .take(3)
            .map(|h| format!("{h:02}:00"))
            .collect(),
    });

    let mean_rate =
        selected.iter().map(|item| item.engagement_rate).sum::<f64>() / selected.len() as f64;
    out.push(ContentSuggestion {
        kind: SuggestionKind::Engagement,
        message: format!(
            "Trending {platform} content averages {mean_rate:.2}% engagement; ask a question to invite replies"
        ),
        examples: Vec::new(),
    });

    out.truncate(ContentSuggestion::MAX_PER_REQUEST);
    out
}
