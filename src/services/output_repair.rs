use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{AnalysisReport, Payload, NOT_AVAILABLE};

/// Result of turning generated text into a report.
///
/// Both variants carry a complete report; `Fallback` also says why the
/// generated text was discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum RepairOutcome {
    Parsed(AnalysisReport),
    Fallback { report: AnalysisReport, reason: String },
}

impl RepairOutcome {
    pub fn report(&self) -> &AnalysisReport {
        match self {
            RepairOutcome::Parsed(report) => report,
            RepairOutcome::Fallback { report, .. } => report,
        }
    }

    pub fn into_report(self) -> AnalysisReport {
        match self {
            RepairOutcome::Parsed(report) => report,
            RepairOutcome::Fallback { report, .. } => report,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, RepairOutcome::Fallback { .. })
    }

    /// Build the fallback for a failure that happened before any text existed.
    pub fn fallback(ticker: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        RepairOutcome::Fallback {
            report: AnalysisReport::fallback(ticker, &reason),
            reason,
        }
    }
}

/// Remove markdown code fences, keeping whatever was inside them.
pub fn strip_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "")
}

/// The first complete top-level `{...}` object in `text`.
///
/// Braces inside string literals are ignored. If the first object never
/// closes, falls back to the span from the first `{` to the last `}`.
pub fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    outer_span(text)
}

/// First `{` through last `}`, inclusive.
fn outer_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

// `"[1][2]` → `[1][2]"`: citation markers the model put after the closing quote
static CITATION_AFTER_QUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""\s*((?:\[[0-9, ]+\])+)"#).expect("valid citation regex"));

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(ch, '\u{00C0}'..='\u{00D6}' | '\u{00D8}'..='\u{00F6}' | '\u{00F8}'..='\u{024F}' | '\u{1E00}'..='\u{1EFF}')
}

/// Heuristic fixes for the two quoting mistakes generated JSON usually has:
/// 1. Citation markers like `[1]` stuck between a string and its closing quote
/// 2. Unescaped `"` inside narrative text, detected as a quote with a
///    letter or digit (diacritics included) directly on both sides
pub fn repair_quotes(text: &str) -> String {
    let moved = CITATION_AFTER_QUOTE.replace_all(text, "$1\"");

    let chars: Vec<char> = moved.chars().collect();
    let mut out = String::with_capacity(moved.len());
    for (i, &ch) in chars.iter().enumerate() {
        if ch == '"' && i > 0 && i + 1 < chars.len() {
            let (before, after) = (chars[i - 1], chars[i + 1]);
            if is_word_char(before) && is_word_char(after) {
                out.push('\\');
            }
        }
        out.push(ch);
    }
    out
}

fn parse_report(candidate: &str) -> Result<AnalysisReport, String> {
    let value: Value = serde_json::from_str(candidate).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("generated JSON is not an object".to_string());
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Reduce generated text to a single `AnalysisReport`. Never fails: any
/// problem yields `RepairOutcome::Fallback` with every field populated.
pub fn repair(raw: &str, ticker: &str) -> RepairOutcome {
    let text = strip_fences(raw);

    let Some(object) = extract_object(&text) else {
        warn!("No JSON object in generated text for {}", ticker);
        return RepairOutcome::fallback(ticker, "no JSON object found in generated text");
    };

    let mut candidates = vec![repair_quotes(object), object.to_string()];
    if let Some(outer) = outer_span(&text).filter(|outer| *outer != object) {
        candidates.push(repair_quotes(outer));
    }

    let mut first_error = None;
    for candidate in &candidates {
        match parse_report(candidate) {
            Ok(mut report) => {
                if report.ticker == NOT_AVAILABLE || report.ticker.is_empty() {
                    report.ticker = ticker.to_string();
                }
                return RepairOutcome::Parsed(report);
            }
            Err(e) => {
                debug!("Generated text candidate rejected: {}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    let reason = first_error.unwrap_or_else(|| "unparsable generated text".to_string());
    warn!("Falling back to placeholder report for {}: {}", ticker, reason);
    RepairOutcome::fallback(ticker, reason)
}

/// Replace every NaN or infinite number with `Null`, recursively.
///
/// Last step before a payload is serialized for a client; JSON has no
/// literal for non-finite numbers.
pub fn sanitize(value: Payload) -> Payload {
    match value {
        Payload::Number(n) if !n.is_finite() => Payload::Null,
        Payload::List(items) => Payload::List(items.into_iter().map(sanitize).collect()),
        Payload::Map(entries) => Payload::Map(entries.into_iter().map(|(k, v)| (k, sanitize(v))).collect()),
        other => other,
    }
}
