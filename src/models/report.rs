use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::models::NOT_AVAILABLE;

// The fixed schema the generation step is asked to fill. Every field has a
// placeholder default so a report is always complete, whatever the model
// actually returned.

fn placeholder() -> String {
    NOT_AVAILABLE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeginnerReport {
    #[serde(deserialize_with = "text")]
    pub summary: String,
    #[serde(deserialize_with = "text")]
    pub action_plan: String,
    #[serde(deserialize_with = "text")]
    pub risk_level: String,
}

impl Default for BeginnerReport {
    fn default() -> Self {
        Self {
            summary: placeholder(),
            action_plan: placeholder(),
            risk_level: placeholder(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Strategy {
    #[serde(deserialize_with = "text")]
    pub decision: String,
    #[serde(deserialize_with = "text")]
    pub timing: String,
    #[serde(deserialize_with = "text")]
    pub entry: String,
    #[serde(deserialize_with = "text")]
    pub stop_loss: String,
    #[serde(deserialize_with = "text")]
    pub target: String,
    #[serde(deserialize_with = "text")]
    pub rr_ratio: String,
    #[serde(deserialize_with = "text")]
    pub rationale: String,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            decision: placeholder(),
            timing: placeholder(),
            entry: placeholder(),
            stop_loss: placeholder(),
            target: placeholder(),
            rr_ratio: placeholder(),
            rationale: placeholder(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisLayer {
    #[serde(deserialize_with = "text")]
    pub layer: String,
    #[serde(deserialize_with = "text")]
    pub analysis: String,
}

impl Default for AnalysisLayer {
    fn default() -> Self {
        Self {
            layer: placeholder(),
            analysis: placeholder(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepAnalysis {
    #[serde(deserialize_with = "text")]
    pub enterprise: String,
    #[serde(deserialize_with = "text")]
    pub smart_money: String,
    #[serde(deserialize_with = "text")]
    pub sentiment: String,
}

impl Default for DeepAnalysis {
    fn default() -> Self {
        Self {
            enterprise: placeholder(),
            smart_money: placeholder(),
            sentiment: placeholder(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandleBehavior {
    #[serde(rename = "type", deserialize_with = "text")]
    pub kind: String,
    #[serde(deserialize_with = "text")]
    pub logic: String,
    #[serde(deserialize_with = "text")]
    pub observation: String,
}

impl Default for CandleBehavior {
    fn default() -> Self {
        Self {
            kind: placeholder(),
            logic: placeholder(),
            observation: placeholder(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaCritic {
    #[serde(deserialize_with = "text")]
    pub status: String,
    #[serde(deserialize_with = "text")]
    pub confidence: String,
    #[serde(deserialize_with = "text")]
    pub confirmation: String,
    #[serde(deserialize_with = "text")]
    pub denial: String,
}

impl Default for MetaCritic {
    fn default() -> Self {
        Self {
            status: placeholder(),
            confidence: placeholder(),
            confirmation: placeholder(),
            denial: placeholder(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalLayers {
    #[serde(deserialize_with = "text")]
    pub structure: String,
    #[serde(deserialize_with = "text")]
    pub momentum: String,
    #[serde(deserialize_with = "text")]
    pub volume_analysis: String,
    #[serde(deserialize_with = "text")]
    pub key_levels: String,
    #[serde(deserialize_with = "or_default")]
    pub candle_behavior: CandleBehavior,
    #[serde(deserialize_with = "or_default")]
    pub meta_critic: MetaCritic,
}

impl Default for TechnicalLayers {
    fn default() -> Self {
        Self {
            structure: placeholder(),
            momentum: placeholder(),
            volume_analysis: placeholder(),
            key_levels: placeholder(),
            candle_behavior: CandleBehavior::default(),
            meta_critic: MetaCritic::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsAnalysis {
    #[serde(deserialize_with = "or_default")]
    pub corporate: Vec<Value>,
    #[serde(deserialize_with = "text")]
    pub synthesis: String,
}

impl Default for NewsAnalysis {
    fn default() -> Self {
        Self {
            corporate: Vec::new(),
            synthesis: placeholder(),
        }
    }
}

/// Structured analysis produced from the generation step's text.
///
/// Fields the model left out take their placeholder; fields the model
/// invented are kept in `extra` and passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisReport {
    #[serde(deserialize_with = "text")]
    pub ticker: String,
    #[serde(deserialize_with = "text")]
    pub friendly_advice: String,
    #[serde(deserialize_with = "or_default")]
    pub beginner_report: BeginnerReport,
    #[serde(deserialize_with = "text_list")]
    pub process_steps: Vec<String>,
    #[serde(deserialize_with = "or_default")]
    pub strategy: Strategy,
    #[serde(deserialize_with = "or_default")]
    pub layers: Vec<AnalysisLayer>,
    #[serde(deserialize_with = "or_default")]
    pub deep_analysis: DeepAnalysis,
    #[serde(deserialize_with = "or_default")]
    pub tech_analysis_7_layers: TechnicalLayers,
    #[serde(deserialize_with = "text_list")]
    pub tech_summary: Vec<String>,
    #[serde(deserialize_with = "or_default")]
    pub news_analysis: NewsAnalysis,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AnalysisReport {
    fn default() -> Self {
        Self {
            ticker: placeholder(),
            friendly_advice: placeholder(),
            beginner_report: BeginnerReport::default(),
            process_steps: Vec::new(),
            strategy: Strategy::default(),
            layers: Vec::new(),
            deep_analysis: DeepAnalysis::default(),
            tech_analysis_7_layers: TechnicalLayers::default(),
            tech_summary: Vec::new(),
            news_analysis: NewsAnalysis::default(),
            extra: Map::new(),
        }
    }
}

impl AnalysisReport {
    /// Deterministic stand-in used whenever the generated text cannot be
    /// turned into a report.
    pub fn fallback(ticker: &str, reason: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            friendly_advice: "Analysis unavailable.".to_string(),
            beginner_report: BeginnerReport {
                summary: "System error.".to_string(),
                action_plan: "Please try again.".to_string(),
                risk_level: placeholder(),
            },
            process_steps: vec!["Could not reach the analysis engine.".to_string()],
            strategy: Strategy {
                decision: "ERROR".to_string(),
                rationale: format!("Error: {reason}"),
                ..Strategy::default()
            },
            ..Self::default()
        }
    }
}

/// Accept any JSON scalar where the schema wants text; models routinely
/// answer `"risk_level": 3` instead of `"3"`.
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_to_text(Value::deserialize(deserializer)?))
}

/// An explicit `null` section is treated like a missing one.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn text_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().map(value_to_text).collect(),
        Value::Null => Vec::new(),
        other => vec![value_to_text(other)],
    })
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => placeholder(),
        other => other.to_string(),
    }
}
