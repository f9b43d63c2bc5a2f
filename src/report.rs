// =============================================================================
// Markdown report for a FinalSignal
// =============================================================================

use crate::features::ScoredDocument;
use crate::signal_record::{FinalSignal, ModalityReport};
use crate::types::FeatureValue;

/// Features listed per modality, in name order.
const TOP_FEATURES: usize = 8;

pub fn render_markdown(signal: &FinalSignal) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "# {} signal, {}h horizon\n\n",
        signal.symbol, signal.horizon_hours
    ));
    out.push_str(&format!("- **Decision:** {}\n", signal.direction_final));
    out.push_str(&format!("- **Confidence:** {:.3}\n", signal.conf_final));
    out.push_str(&format!(
        "- **Raw decision:** {} (guardrail {:?}, threshold {:.2})\n",
        signal.direction_raw(),
        signal.guardrail,
        signal.abstain_threshold
    ));
    out.push_str(&format!("- **Fused score:** {:+.4}", signal.fused.fused_score));
    if signal.fused.disagreement {
        out.push_str(&format!(
            " (damped from {:+.4}, modalities disagree)",
            signal.fused.undamped_score
        ));
    }
    out.push('\n');
    out.push_str(&format!("- **Spot:** {:.2}\n", signal.spot));
    out.push_str(&format!("- **Time:** {}\n", signal.timestamp.to_rfc3339()));
    out.push_str(&format!("- **Run:** `{}`\n\n", signal.run_id));

    out.push_str("## Modalities\n\n");
    out.push_str("| Modality | Status | Weight | Label | Confidence | Raw | Contribution |\n");
    out.push_str("|---|---|---|---|---|---|---|\n");
    for report in &signal.modalities {
        let contribution = signal
            .fused
            .component_scores
            .get(&report.modality)
            .map(|c| format!("{:+.4}", c.contribution))
            .unwrap_or_else(|| "-".to_string());
        let (label, confidence, raw) = match &report.score {
            Some(s) => (s.label.to_string(), format!("{:.3}", s.confidence), format!("{:+.4}", s.raw_score)),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        out.push_str(&format!(
            "| {} | {} | {:.2} | {} | {} | {} | {} |\n",
            report.modality, report.status, report.weight, label, confidence, raw, contribution
        ));
    }
    out.push('\n');

    for report in signal.modalities.iter().filter(|r| r.status.is_ok()) {
        render_features(&mut out, report);
    }

    if let Some(sentiment) = &signal.sentiment {
        out.push_str("## Sentiment\n\n");
        out.push_str(&format!(
            "Bucketing: {:?}. Recent {:+.3}, slow {:+.3}, composite {:+.3}. \
             Classifier errors: {}. Dropped documents: {}.\n\n",
            sentiment.policy,
            sentiment.scores.recent,
            sentiment.scores.slow,
            sentiment.scores.composite,
            sentiment.classifier_errors,
            sentiment.dropped_documents
        ));
        render_documents(&mut out, "Recent", &sentiment.recent);
        render_documents(&mut out, "Slow", &sentiment.slow);
    }

    out
}

fn render_features(out: &mut String, report: &ModalityReport) {
    let observed: Vec<(&str, &FeatureValue)> = report
        .features
        .iter()
        .filter(|(name, _)| !report.features.is_defaulted(name))
        .take(TOP_FEATURES)
        .collect();
    if observed.is_empty() {
        return;
    }

    out.push_str(&format!("### {} features\n\n", report.modality));
    for (name, value) in observed {
        match value {
            FeatureValue::Number(v) => out.push_str(&format!("- `{name}` = {v:.6}\n")),
            FeatureValue::Tag(t) => out.push_str(&format!("- `{name}` = {t}\n")),
        }
    }
    if let Some(score) = &report.score {
        for reason in &score.reasons {
            out.push_str(&format!("  - {reason}\n"));
        }
    }
    out.push('\n');
}

fn render_documents(out: &mut String, heading: &str, docs: &[ScoredDocument]) {
    if docs.is_empty() {
        return;
    }
    out.push_str(&format!("### {heading}\n\n"));
    for doc in docs {
        let when = doc
            .published_time
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "undated".to_string());
        out.push_str(&format!("- [{}] {:+.1} {} ({})\n", doc.label, doc.score, doc.title, when));
    }
    out.push('\n');
}
