//! Text projections of an [`EvaluationRecord`].
//!
//! Rendering is a pure function of its inputs: the same record always yields
//! the same text, and surfaces replace their content with it wholesale.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::models::{EvaluationRecord, RecordStatus};

const BRAND: &str = "MindSafe";
const DIMENSIONS_KEY: &str = "dimension_scores";
const INTERPRETATIONS_KEY: &str = "interpretations";
const INTERPRETATION_ORDER: &[&str] = &["developmental", "brainrot", "overall"];
const RECOMMENDATIONS_KEY: &str = "recommendations";
const RECOMMENDATION_SECTIONS: &[(&str, &str)] =
    &[("strengths", "Strengths"), ("concerns", "Concerns")];

/// In-page panel shown next to the unit being watched.
pub fn render_overlay(record: &EvaluationRecord, notice: Option<&str>) -> String {
    let mut lines = vec![format!("[{BRAND}] {}", record.display_title())];
    lines.extend(render_body(record));
    push_notice(&mut lines, notice);
    lines.join("\n")
}

/// One-shot status view of the latest record, or an explicit empty state.
pub fn render_status(record: Option<&EvaluationRecord>, notice: Option<&str>) -> String {
    let mut lines = vec![format!("{BRAND} - latest evaluation")];
    match record {
        Some(record) => {
            lines.push(format!("Video: {}", record.display_title()));
            if record.title.is_some() {
                lines.push(format!("Link: {}", record.unit_url));
            }
            lines.extend(render_body(record));
        }
        None => {
            lines.push("No evaluation recorded yet.".to_string());
            lines.push("Open a video to start one.".to_string());
        }
    }
    push_notice(&mut lines, notice);
    lines.join("\n")
}

fn render_body(record: &EvaluationRecord) -> Vec<String> {
    let mut lines = Vec::new();
    match record.status {
        RecordStatus::Pending => {
            lines.push(format!(
                "Analysis in progress for age {}...",
                format_number(record.context_param)
            ));
            push_reasons(&mut lines, record);
        }
        RecordStatus::Error => {
            lines.push(format!(
                "Evaluation failed: {}",
                record.error.as_deref().unwrap_or("unknown error")
            ));
        }
        RecordStatus::Done => {
            let rating = record
                .normalized_score
                .map(|score| format!("{score}/10"))
                .unwrap_or_else(|| "-".to_string());
            lines.push(format!(
                "Rating: {rating} ({})",
                record.label.as_deref().unwrap_or("unlabelled")
            ));
            lines.push(format!("Age: {}", format_number(record.context_param)));
            if let Some(score) = record.primary_score {
                lines.push(format!("Development score: {}/100", format_number(score)));
            }
            if let Some(score) = record.risk_score {
                lines.push(format!("Brainrot index: {}/100", format_number(score)));
            }
            push_reasons(&mut lines, record);

            if let Some(raw) = &record.raw_result {
                let dimensions = dimension_rows(raw);
                if !dimensions.is_empty() {
                    lines.push("Dimensions:".to_string());
                    for (name, score) in dimensions {
                        lines.push(format!("  {name}: {}/100", format_number(score)));
                    }
                }

                let interpretations = interpretation_rows(raw);
                if !interpretations.is_empty() {
                    lines.push("Interpretation:".to_string());
                    for (name, text) in interpretations {
                        lines.push(format!("  {name}: {text}"));
                    }
                }

                for (heading, items) in recommendation_rows(raw) {
                    lines.push(format!("{heading}:"));
                    lines.extend(items.iter().map(|item| format!("  - {item}")));
                }
            }
        }
    }
    lines
}

fn push_reasons(lines: &mut Vec<String>, record: &EvaluationRecord) {
    if record.reasons.is_empty() {
        return;
    }
    if record.status == RecordStatus::Done {
        lines.push("Why:".to_string());
    }
    lines.extend(record.reasons.iter().map(|reason| format!("  - {reason}")));
}

fn push_notice(lines: &mut Vec<String>, notice: Option<&str>) {
    if let Some(notice) = notice {
        lines.push(format!("! {notice}"));
    }
}

/// Per-dimension scores; keys differing only in case or separators collapse.
fn dimension_rows(raw: &Value) -> Vec<(String, f64)> {
    let Some(dimensions) = raw.get(DIMENSIONS_KEY).and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut rows: BTreeMap<String, f64> = BTreeMap::new();
    for (key, value) in dimensions {
        if let Some(score) = value.as_f64().filter(|score| score.is_finite()) {
            rows.entry(display_key(key)).or_insert(score);
        }
    }
    rows.into_iter().collect()
}

fn interpretation_rows(raw: &Value) -> Vec<(String, String)> {
    let Some(interpretations) = raw.get(INTERPRETATIONS_KEY).and_then(Value::as_object) else {
        return Vec::new();
    };

    INTERPRETATION_ORDER
        .iter()
        .filter_map(|wanted| {
            interpretations
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
                .and_then(|(_, value)| value.as_str())
                .map(|text| (display_key(wanted), text.to_string()))
        })
        .collect()
}

/// Non-empty `strengths` and `concerns` lists, in that order.
fn recommendation_rows(raw: &Value) -> Vec<(&'static str, Vec<&str>)> {
    let Some(recommendations) = raw.get(RECOMMENDATIONS_KEY).and_then(Value::as_object) else {
        return Vec::new();
    };

    RECOMMENDATION_SECTIONS
        .iter()
        .filter_map(|(key, heading)| {
            let items: Vec<&str> = recommendations
                .get(*key)?
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .filter(|item| !item.trim().is_empty())
                .collect();
            (!items.is_empty()).then_some((*heading, items))
        })
        .collect()
}

fn display_key(key: &str) -> String {
    let words = key
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => key.to_string(),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}
