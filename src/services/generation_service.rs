use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::external::generation_provider::{GenerationError, GenerationProvider, Prompt};
use crate::models::{MarketSnapshot, Technicals, NOT_AVAILABLE};

/// Configuration for the generation step
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Server-side key; a key sent with the request takes precedence.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "sonar-pro".to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(60),
            max_attempts: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

const SYSTEM_PROMPT: &str = r#"You are a market analyst covering the Vietnamese stock market.
Read the hard data you are given, research recent news, and explain the setup
plainly enough for a beginner while keeping the depth an expert expects.

Answer with ONE JSON object and nothing else, using exactly this schema:
{
  "ticker": "<TICKER>",
  "friendly_advice": "one short piece of advice",
  "beginner_report": {"summary": "...", "action_plan": "buy, sell or hold, and why", "risk_level": "Low/Medium/High/Very High"},
  "process_steps": ["Step 1: ...", "Step 2: ..."],
  "strategy": {"decision": "BUY NOW / WATCH TO BUY / SELL NOW / WATCH TO SELL / STAY OUT",
               "timing": "...", "entry": "...", "stop_loss": "...", "target": "...", "rr_ratio": "...", "rationale": "..."},
  "layers": [{"layer": "Layer 1: Market structure", "analysis": "..."}],
  "deep_analysis": {"enterprise": "...", "smart_money": "...", "sentiment": "..."},
  "tech_analysis_7_layers": {
    "structure": "...", "momentum": "...", "volume_analysis": "...", "key_levels": "...",
    "candle_behavior": {"type": "...", "logic": "...", "observation": "..."},
    "meta_critic": {"status": "Confirm/Deny", "confidence": "High/Med/Low", "confirmation": "...", "denial": "..."}
  },
  "tech_summary": ["..."],
  "news_analysis": {"corporate": [], "synthesis": "..."}
}
Use the 7 layers: market structure, momentum and trend, volume logic, key price zones,
candle behaviour, cycles and waves, synthesis and critique."#;

fn financial(snapshot: &MarketSnapshot, label: &str) -> String {
    snapshot
        .financials
        .get(label)
        .cloned()
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Prompt carrying the hard data for `ticker`.
pub fn build_prompt(ticker: &str, snapshot: &MarketSnapshot) -> Prompt {
    let mut data = String::new();
    let _ = writeln!(data, "- Price: {} (Source: {})", snapshot.price, snapshot.source);
    let _ = writeln!(data, "- Volume: {}", snapshot.volume);
    let _ = writeln!(
        data,
        "- Financials: EPS={}, P/E={}, Market Cap={}",
        financial(snapshot, "EPS"),
        financial(snapshot, "PE"),
        financial(snapshot, "MarketCap")
    );

    match &snapshot.technicals {
        Technicals::Computed(set) => {
            let _ = writeln!(data, "- Technicals (computed):");
            let _ = writeln!(data, "  + RSI(14)={}", set.rsi_14);
            let _ = writeln!(data, "  + Trend={}", set.trend);
            let _ = writeln!(data, "  + EMA(20)={}, EMA(50)={}", set.ema20, set.ema50);
            let _ = writeln!(data, "  + Bollinger Bands=[{} - {}]", set.bb_lower, set.bb_upper);
            let _ = writeln!(data, "  + MACD Line={}", set.macd_line);
            let _ = writeln!(data, "  + Signal={}", set.signal);
        }
        Technicals::Unavailable { status } => {
            let _ = writeln!(data, "- Technicals: {}", status);
        }
    }

    Prompt {
        system: SYSTEM_PROMPT.replace("<TICKER>", ticker),
        user: format!(
            "Analyse {ticker} in depth.\nDATA:\n{data}\nReturn valid JSON only. Keep 'beginner_report' in everyday language and list the 5-7 steps you took in 'process_steps'."
        ),
    }
}

/// Generation step with key resolution and retry
pub struct GenerationService {
    config: GenerationConfig,
    provider: Arc<dyn GenerationProvider>,
}

impl GenerationService {
    pub fn new(config: GenerationConfig, provider: Arc<dyn GenerationProvider>) -> Self {
        if config.api_key.is_none() {
            info!("No server-side generation key; requests must supply their own");
        }
        Self { config, provider }
    }

    fn resolve_key<'a>(&'a self, api_key: Option<&'a str>) -> Result<&'a str, GenerationError> {
        api_key
            .filter(|key| !key.trim().is_empty())
            .or(self.config.api_key.as_deref())
            .filter(|key| !key.trim().is_empty())
            .ok_or(GenerationError::Disabled)
    }

    /// Raw generated text for `snapshot`; `api_key` overrides the configured key.
    pub async fn generate(
        &self,
        ticker: &str,
        snapshot: &MarketSnapshot,
        api_key: Option<&str>,
    ) -> Result<String, GenerationError> {
        let key = self.resolve_key(api_key)?;
        let prompt = build_prompt(ticker, snapshot);

        let max_attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.retry_delay;
        let mut attempt = 1;

        loop {
            match self.provider.complete(key, &prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < max_attempts && is_retryable(&e) => {
                    warn!(
                        "{} call failed (attempt {}/{}): {}. Retrying in {:?}...",
                        self.provider.name(),
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    error!("{} call failed for {}: {}", self.provider.name(), ticker, e);
                    return Err(e);
                }
            }
        }
    }
}

fn is_retryable(err: &GenerationError) -> bool {
    matches!(
        err,
        GenerationError::RateLimited | GenerationError::Timeout | GenerationError::Network(_)
    )
}
