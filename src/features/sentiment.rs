// =============================================================================
// Sentiment feature engine
// =============================================================================
//
// documents -> hygiene -> recency buckets -> per-document classification
//           -> bucket scores (|score|-weighted) -> recent/slow composite
//
// The classifier is a collaborator and may fail per document; a failure is
// scored neutral, its reason recorded, and the run goes on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{FeatureEngine, FeatureSet, FeatureSpec, WindowSpec};
use crate::aggregator::{aggregate, CompositeScore, RecencyWeights, WeightedValue};
use crate::error::FeatureResult;
use crate::market_data::news::{bucket_by_recency, dedup_documents, filter_low_signal};
use crate::market_data::{BucketPolicy, NewsDocument, RecencyWindows};
use crate::sentiment::{Classification, SentimentClassifier, DOCUMENT_SCORE};
use crate::types::{Label, Modality};

/// Characters of title + body handed to the classifier.
pub const MAX_TEXT_CHARS: usize = 2000;

pub const SCHEMA: &[FeatureSpec] = &[
    FeatureSpec::number("sentiment_recent"),
    FeatureSpec::number("sentiment_slow"),
    FeatureSpec::number("sentiment_composite"),
    FeatureSpec::number("docs_recent"),
    FeatureSpec::number("docs_slow"),
    FeatureSpec::number("docs_positive"),
    FeatureSpec::number("docs_negative"),
    FeatureSpec::number("docs_neutral"),
    FeatureSpec::number("classifier_errors"),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentSettings {
    pub windows: RecencyWindows,
    pub weights: RecencyWeights,
    pub max_items: usize,
}

impl Default for SentimentSettings {
    fn default() -> Self {
        Self {
            windows: RecencyWindows {
                recent_hours: 2,
                slow_min_hours: 6,
                slow_max_hours: 12,
            },
            weights: RecencyWeights::default(),
            max_items: 16,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SentimentInput<'a> {
    pub documents: &'a [NewsDocument],
    /// Reference time for the recency windows.
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published_time: Option<DateTime<Utc>>,
    pub label: Label,
    pub score: f64,
    pub reason: String,
}

/// Everything a report needs to explain the sentiment score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub policy: BucketPolicy,
    pub recent: Vec<ScoredDocument>,
    pub slow: Vec<ScoredDocument>,
    pub scores: CompositeScore,
    pub classifier_errors: usize,
    /// Documents removed by de-duplication, hygiene filters or the cap.
    pub dropped_documents: usize,
}

impl Default for SentimentBreakdown {
    fn default() -> Self {
        Self {
            policy: BucketPolicy::RankOrder,
            recent: Vec::new(),
            slow: Vec::new(),
            scores: CompositeScore::default(),
            classifier_errors: 0,
            dropped_documents: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentimentAnalysis {
    pub features: FeatureSet,
    pub breakdown: SentimentBreakdown,
}

pub struct SentimentEngine {
    classifier: Arc<dyn SentimentClassifier>,
    settings: SentimentSettings,
}

impl SentimentEngine {
    pub fn new(classifier: Arc<dyn SentimentClassifier>, settings: SentimentSettings) -> Self {
        Self { classifier, settings }
    }

    pub fn settings(&self) -> &SentimentSettings {
        &self.settings
    }

    /// Full analysis: the feature set plus the per-document breakdown.
    pub fn analyze(&self, input: SentimentInput<'_>) -> SentimentAnalysis {
        let mut features = FeatureSet::from_schema(SCHEMA);
        if input.documents.is_empty() {
            debug!("sentiment: no documents, all features defaulted");
            return SentimentAnalysis {
                features,
                breakdown: SentimentBreakdown::default(),
            };
        }

        let received = input.documents.len();
        let mut docs = filter_low_signal(dedup_documents(input.documents.to_vec()));
        docs.truncate(self.settings.max_items);

        let buckets = bucket_by_recency(docs, input.as_of, self.settings.windows);
        let kept = buckets.recent.len() + buckets.slow.len();

        let mut errors = 0usize;
        let recent = self.score_bucket(&buckets.recent, &mut errors);
        let slow = self.score_bucket(&buckets.slow, &mut errors);

        let recent_score = bucket_score(&recent);
        let slow_score = bucket_score(&slow);
        let scores = CompositeScore::from_buckets(recent_score, slow_score, self.settings.weights);

        let count = |label: Label| recent.iter().chain(slow.iter()).filter(|d| d.label == label).count() as f64;

        features.set_number("sentiment_recent", (!recent.is_empty()).then_some(scores.recent));
        features.set_number("sentiment_slow", (!slow.is_empty()).then_some(scores.slow));
        features.set_number("sentiment_composite", (kept > 0).then_some(scores.composite));
        features.set_number("docs_recent", Some(recent.len() as f64));
        features.set_number("docs_slow", Some(slow.len() as f64));
        features.set_number("docs_positive", Some(count(Label::Positive)));
        features.set_number("docs_negative", Some(count(Label::Negative)));
        features.set_number("docs_neutral", Some(count(Label::Neutral)));
        features.set_number("classifier_errors", Some(errors as f64));

        if errors > 0 {
            warn!(errors, documents = kept, "sentiment classifier failures scored neutral");
        }
        debug!(
            policy = ?buckets.policy,
            recent = recent.len(),
            slow = slow.len(),
            composite = scores.composite,
            "sentiment features built"
        );

        SentimentAnalysis {
            features,
            breakdown: SentimentBreakdown {
                policy: buckets.policy,
                recent,
                slow,
                scores,
                classifier_errors: errors,
                dropped_documents: received.saturating_sub(kept),
            },
        }
    }

    fn score_bucket(&self, docs: &[NewsDocument], errors: &mut usize) -> Vec<ScoredDocument> {
        docs.iter()
            .map(|doc| {
                let text = doc.classification_text(MAX_TEXT_CHARS);
                let classification = match self.classifier.classify(&text) {
                    Ok(c) => sanitize(c),
                    Err(e) => {
                        *errors += 1;
                        Classification::neutral(format!("error: {e}"))
                    }
                };
                ScoredDocument {
                    title: doc.title.clone(),
                    url: doc.url.clone(),
                    published_time: doc.published_time,
                    label: classification.label,
                    score: classification.score,
                    reason: classification.reason,
                }
            })
            .collect()
    }
}

impl FeatureEngine for SentimentEngine {
    type Input<'a> = SentimentInput<'a>;

    fn modality(&self) -> Modality {
        Modality::Sentiment
    }

    fn schema(&self) -> &'static [FeatureSpec] {
        SCHEMA
    }

    fn build_features(&self, input: SentimentInput<'_>, _window: &WindowSpec) -> FeatureResult<FeatureSet> {
        Ok(self.analyze(input).features)
    }
}

/// Keep classifier output inside the documented contract: a text label and a
/// finite score in [-0.5, 0.5] whose sign matches the label.
fn sanitize(c: Classification) -> Classification {
    let label = match c.label {
        Label::Bullish => Label::Positive,
        Label::Bearish => Label::Negative,
        other => other,
    };
    let score = if c.score.is_finite() {
        c.score.clamp(-DOCUMENT_SCORE, DOCUMENT_SCORE)
    } else {
        label.sign() * DOCUMENT_SCORE
    };
    if score * label.sign() < 0.0 || (label == Label::Neutral && score != 0.0) {
        return Classification {
            label,
            score: label.sign() * DOCUMENT_SCORE,
            reason: c.reason,
        };
    }
    Classification {
        label,
        score,
        reason: c.reason,
    }
}

fn bucket_score(docs: &[ScoredDocument]) -> f64 {
    let values: Vec<WeightedValue> = docs
        .iter()
        .map(|d| WeightedValue::new(d.score, d.score.abs()))
        .collect();
    aggregate(&values)
}
