// =============================================================================
// News documents — hygiene and recency bucketing
// =============================================================================
//
// Documents arrive from a search collaborator in relevance order, often
// without a publication time. Before classification they are:
//
//   1. de-duplicated by (normalised title, canonical URL)
//   2. stripped of price-ticker pages and generic headlines
//   3. capped to the configured maximum
//   4. split into a "recent" and a "slow" bucket
//
// Bucketing uses publication times when any document carries one. When none
// does, the list is split in half by rank (first half = recent); the policy
// used is reported alongside the buckets.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsDocument {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published_time: Option<DateTime<Utc>>,
}

impl NewsDocument {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            url: String::new(),
            published_time: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn published_at(mut self, at: DateTime<Utc>) -> Self {
        self.published_time = Some(at);
        self
    }

    /// Title and body joined and truncated to `max_chars` characters.
    pub fn classification_text(&self, max_chars: usize) -> String {
        let joined = format!("{} {}", self.title, self.body);
        let trimmed = joined.trim();
        let text = if trimmed.is_empty() {
            self.title.as_str()
        } else {
            trimmed
        };
        text.chars().take(max_chars).collect()
    }
}

const PRICE_DATA_KEYWORDS: &[&str] = &[
    "price",
    "chart",
    "trading",
    "live",
    "real-time",
    "quote",
    "ticker",
    "market data",
    "financial data",
    "price today",
    "current price",
];

const PRICE_DATA_DOMAINS: &[&str] = &[
    "yahoo.com",
    "google.com/finance",
    "tradingview.com",
    "coinmarketcap.com",
    "coingecko.com",
    "mexc.com",
    "binance.com",
    "coinbase.com",
];

const GENERIC_TITLES: &[&str] = &["bitcoin", "btc", "crypto", "cryptocurrency"];

const MIN_TITLE_CHARS: usize = 20;

/// `scheme://host/path`, dropping query string and fragment.
pub fn canonical_url(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_string()
}

/// Keep the first occurrence of each (lower-cased title, canonical URL) pair.
pub fn dedup_documents(docs: Vec<NewsDocument>) -> Vec<NewsDocument> {
    let mut seen = HashSet::new();
    docs.into_iter()
        .filter(|d| seen.insert((d.title.trim().to_lowercase(), canonical_url(&d.url))))
        .collect()
}

/// Drop price-ticker pages and headlines too short or generic to carry sentiment.
pub fn filter_low_signal(docs: Vec<NewsDocument>) -> Vec<NewsDocument> {
    docs.into_iter()
        .filter(|d| {
            let title = d.title.to_lowercase();
            let url = d.url.to_lowercase();
            let is_price_page = PRICE_DATA_KEYWORDS.iter().any(|k| title.contains(k))
                && PRICE_DATA_DOMAINS.iter().any(|dom| url.contains(dom));
            let is_generic = title.chars().count() < MIN_TITLE_CHARS
                || GENERIC_TITLES.contains(&title.trim());
            !is_price_page && !is_generic
        })
        .collect()
}

/// Recency windows, in hours before the run time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecencyWindows {
    pub recent_hours: u32,
    pub slow_min_hours: u32,
    pub slow_max_hours: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketPolicy {
    /// Split by publication time against the recency windows.
    TimeWindow,
    /// No publication times available; first half by rank is "recent".
    RankOrder,
}

#[derive(Debug, Clone)]
pub struct RecencyBuckets {
    pub recent: Vec<NewsDocument>,
    pub slow: Vec<NewsDocument>,
    pub policy: BucketPolicy,
}

pub fn bucket_by_recency(
    docs: Vec<NewsDocument>,
    as_of: DateTime<Utc>,
    windows: RecencyWindows,
) -> RecencyBuckets {
    if !docs.iter().any(|d| d.published_time.is_some()) {
        let mut recent = docs;
        let slow = recent.split_off(recent.len() / 2);
        return RecencyBuckets {
            recent,
            slow,
            policy: BucketPolicy::RankOrder,
        };
    }

    let recent_start = as_of - Duration::hours(i64::from(windows.recent_hours));
    let slow_start = as_of - Duration::hours(i64::from(windows.slow_max_hours));
    let slow_end = as_of - Duration::hours(i64::from(windows.slow_min_hours));

    let mut recent = Vec::new();
    let mut slow = Vec::new();
    for doc in docs {
        match doc.published_time {
            Some(t) if t >= recent_start && t <= as_of => recent.push(doc),
            Some(t) if t >= slow_start && t <= slow_end => slow.push(doc),
            _ => {}
        }
    }
    RecencyBuckets {
        recent,
        slow,
        policy: BucketPolicy::TimeWindow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn windows() -> RecencyWindows {
        RecencyWindows {
            recent_hours: 2,
            slow_min_hours: 6,
            slow_max_hours: 12,
        }
    }

    fn doc(title: &str) -> NewsDocument {
        NewsDocument::new(title, "body text")
    }

    #[test]
    fn canonical_url_strips_query_and_fragment() {
        assert_eq!(
            canonical_url("https://news.example.com/a/b?utm=1#top"),
            "https://news.example.com/a/b"
        );
        assert_eq!(canonical_url("https://x.io/p"), "https://x.io/p");
    }

    #[test]
    fn dedup_ignores_case_and_tracking_params() {
        let docs = vec![
            doc("ETF inflows hit a record this week").with_url("https://a.com/x?ref=1"),
            doc("etf inflows hit a record this week ").with_url("https://a.com/x?ref=2"),
            doc("ETF inflows hit a record this week").with_url("https://b.com/x"),
        ];
        assert_eq!(dedup_documents(docs).len(), 2);
    }

    #[test]
    fn filter_drops_price_pages_and_generic_titles() {
        let docs = vec![
            doc("Bitcoin price today and live chart").with_url("https://coinmarketcap.com/btc"),
            doc("Bitcoin"),
            doc("short title"),
            doc("Regulators approve new spot bitcoin ETF applications"),
        ];
        let kept = filter_low_signal(docs);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].title.starts_with("Regulators"));
    }

    #[test]
    fn rank_order_fallback_splits_in_half() {
        let docs: Vec<NewsDocument> = (0..5).map(|i| doc(&format!("headline number {i}"))).collect();
        let as_of = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let buckets = bucket_by_recency(docs, as_of, windows());
        assert_eq!(buckets.policy, BucketPolicy::RankOrder);
        assert_eq!(buckets.recent.len(), 2);
        assert_eq!(buckets.slow.len(), 3);
        assert_eq!(buckets.recent[0].title, "headline number 0");
    }

    #[test]
    fn time_windows_assign_and_drop() {
        let as_of = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let docs = vec![
            doc("one hour old").published_at(as_of - Duration::hours(1)),
            doc("four hours old").published_at(as_of - Duration::hours(4)),
            doc("eight hours old").published_at(as_of - Duration::hours(8)),
            doc("two days old").published_at(as_of - Duration::hours(48)),
            doc("undated"),
        ];
        let buckets = bucket_by_recency(docs, as_of, windows());
        assert_eq!(buckets.policy, BucketPolicy::TimeWindow);
        assert_eq!(buckets.recent.len(), 1);
        assert_eq!(buckets.slow.len(), 1);
        assert_eq!(buckets.slow[0].title, "eight hours old");
    }

    #[test]
    fn classification_text_truncates_on_char_boundary() {
        let d = NewsDocument::new("ünïcödé", "x".repeat(50));
        let text = d.classification_text(10);
        assert_eq!(text.chars().count(), 10);
        assert!(text.starts_with("ünïcödé"));
    }
}
