use crate::domain::insight::{Confidence, Insight, InsightValue, SignalType, SourceTag};
use crate::error::AdapterError;
use crate::insights::InsightSource;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::OnceLock;

pub const DEFAULT_BASE_URL: &str = "https://api.search.brave.com/res/v1/web/search";

const RESULTS_PER_QUERY: u8 = 5;
const RESULTS_CONSIDERED: usize = 3;

const TRUSTED_DOMAINS: [&str; 8] = [
    "reuters.com",
    "bloomberg.com",
    "ft.com",
    "wsj.com",
    "status.",
    ".gov",
    "pcisecuritystandards.org",
    "paymentsdive.com",
];

/// Live insights from the Brave web search API.
pub struct BraveSearchSource {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

impl BraveSearchSource {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_ms,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    web: Option<WebResults>,
}

#[derive(Debug, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<WebResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct WebResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: String,
}

#[async_trait::async_trait]
impl InsightSource for BraveSearchSource {
    fn name(&self) -> &'static str {
        "brave_search"
    }

    async fn fetch(
        &self,
        processor_id: &str,
        region: &str,
        signal_type: SignalType,
        since: DateTime<Utc>,
    ) -> Result<Insight, AdapterError> {
        let query = search_query(processor_id, region, signal_type);
        let freshness = freshness(since, Utc::now());
        let count = RESULTS_PER_QUERY.to_string();

        let resp = self
            .client
            .get(&self.base_url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[
                ("q", query.as_str()),
                ("count", count.as_str()),
                ("search_lang", "en"),
                ("country", country_code(region)),
                ("freshness", freshness),
            ])
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await;

        let body: SearchResponse = match resp {
            Ok(r) if r.status().is_success() => r
                .json()
                .await
                .map_err(|e| AdapterError::Malformed(e.to_string()))?,
            Ok(r) if r.status() == StatusCode::TOO_MANY_REQUESTS => {
                return Err(AdapterError::RateLimited)
            }
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                return Err(AdapterError::Unreachable(format!(
                    "HTTP_{}: {}",
                    status.as_u16(),
                    body.chars().take(200).collect::<String>()
                )));
            }
            Err(e) if e.is_timeout() => {
                return Err(AdapterError::Unreachable("search timeout".to_string()))
            }
            Err(e) => return Err(AdapterError::Unreachable(e.to_string())),
        };

        let results: Vec<WebResult> = body
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .take(RESULTS_CONSIDERED)
            .collect();
        let Some(top) = results.first().cloned() else {
            return Err(AdapterError::Malformed(format!("no results for {:?}", query)));
        };

        let texts: Vec<String> = results
            .iter()
            .map(|r| format!("{} {}", r.title, r.description).to_lowercase())
            .collect();
        let value = interpret(signal_type, &texts)
            .ok_or_else(|| AdapterError::Malformed(format!("no {} signal in results", signal_type.as_str())))?;

        let confidence = results
            .iter()
            .zip(&texts)
            .map(|(r, text)| result_confidence(&r.url, text, signal_type, processor_id))
            .fold(0.0_f64, f64::max);

        let now = Utc::now();
        Ok(Insight {
            processor_id: processor_id.to_string(),
            region: region.to_string(),
            signal_type,
            value,
            source: SourceTag::Live,
            confidence: Confidence::from_score(confidence),
            detail: format!("{} ({})", top.title, top.url),
            fetched_at: now,
            expires_at: now,
        })
    }
}

pub fn search_query(processor_id: &str, region: &str, signal_type: SignalType) -> String {
    match signal_type {
        SignalType::Promotion => format!("{} merchant fees promotion current offers", processor_id),
        SignalType::Regulation => format!("{} payment processing regulations {} compliance", processor_id, region),
        SignalType::Fee => format!("current {} transaction fees", processor_id),
        SignalType::FraudTrend => format!("{} fraud alerts {} chargeback", processor_id, region),
        SignalType::ServiceStatus => format!("{} service status outage uptime", processor_id),
        SignalType::SocialSentiment => format!("{} merchant reviews reliability", processor_id),
    }
}

/// Brave freshness bucket covering everything newer than `since`.
pub fn freshness(since: DateTime<Utc>, now: DateTime<Utc>) -> &'static str {
    let age = now - since;
    if age <= chrono::Duration::days(1) {
        "pd"
    } else if age <= chrono::Duration::weeks(1) {
        "pw"
    } else if age <= chrono::Duration::days(31) {
        "pm"
    } else {
        "py"
    }
}

fn country_code(region: &str) -> &str {
    if region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()) {
        region
    } else {
        "US"
    }
}

fn interpret(signal_type: SignalType, texts: &[String]) -> Option<InsightValue> {
    match signal_type {
        SignalType::Promotion => {
            let discount = texts.iter().find_map(|t| capture_percent(discount_re(), t)).unwrap_or(0.0);
            Some(InsightValue::Numeric(discount))
        }
        SignalType::Fee => texts
            .iter()
            .find_map(|t| capture_percent(percent_re(), t).filter(|p| (0.1..=15.0).contains(p)))
            .map(InsightValue::Numeric),
        SignalType::Regulation => {
            let level = texts.iter().map(|t| regulation_level(t)).max_by_key(|l| severity_rank(l))?;
            Some(InsightValue::Category(level.to_string()))
        }
        SignalType::FraudTrend => {
            let level = texts.iter().map(|t| fraud_level(t)).max_by_key(|l| severity_rank(l))?;
            Some(InsightValue::Category(level.to_string()))
        }
        SignalType::ServiceStatus => {
            if let Some(uptime) = texts
                .iter()
                .find_map(|t| capture_percent(uptime_re(), t).filter(|p| (0.0..=100.0).contains(p)))
            {
                return Some(InsightValue::Numeric(uptime));
            }
            let status = texts.iter().map(|t| service_status(t)).max_by_key(|s| status_rank(s))?;
            Some(InsightValue::Category(status.to_string()))
        }
        SignalType::SocialSentiment => {
            if texts.is_empty() {
                return None;
            }
            let total: f64 = texts.iter().map(|t| sentiment(t)).sum();
            Some(InsightValue::Numeric(total / texts.len() as f64))
        }
    }
}

fn discount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)%[^.]*?(?:off|discount)").expect("valid discount pattern"))
}

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s?%").expect("valid percent pattern"))
}

fn uptime_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{2,3}(?:\.\d+)?)%[^.]*?uptime").expect("valid uptime pattern"))
}

fn capture_percent(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

pub fn fraud_level(text: &str) -> &'static str {
    if contains_any(text, &["critical", "severe"]) {
        "critical"
    } else if contains_any(text, &["high", "major", "breach"]) {
        "high"
    } else if contains_any(text, &["low", "minor"]) {
        "low"
    } else {
        "medium"
    }
}

pub fn regulation_level(text: &str) -> &'static str {
    if contains_any(text, &["ban", "prohibit", "sanction", "penalty", "fined"]) {
        "high"
    } else if contains_any(text, &["new requirement", "mandate", "deadline", "enforcement"]) {
        "medium"
    } else if contains_any(text, &["regulation", "compliance", "pci", "gdpr", "aml", "kyc"]) {
        "low"
    } else {
        "none"
    }
}

pub fn service_status(text: &str) -> &'static str {
    if contains_any(text, &["outage", " down "]) {
        "outage"
    } else if contains_any(text, &["degraded", "slow", "latency"]) {
        "degraded"
    } else if text.contains("maintenance") {
        "maintenance"
    } else {
        "operational"
    }
}

fn severity_rank(level: &&str) -> u8 {
    match *level {
        "critical" => 4,
        "high" => 3,
        "medium" => 2,
        "low" => 1,
        _ => 0,
    }
}

fn status_rank(status: &&str) -> u8 {
    match *status {
        "outage" => 3,
        "degraded" => 2,
        "maintenance" => 1,
        _ => 0,
    }
}

const POSITIVE_WORDS: [&str; 13] = [
    "excellent", "great", "good", "reliable", "fast", "efficient", "secure", "trusted",
    "recommended", "satisfied", "happy", "success", "stable",
];
const NEGATIVE_WORDS: [&str; 13] = [
    "terrible", "bad", "slow", "unreliable", "down", "outage", "problem", "issue", "failed",
    "disappointed", "frustrated", "buggy", "broken",
];

/// Keyword sentiment in [-1, 1], normalised per 20 words.
pub fn sentiment(text: &str) -> f64 {
    let words = text.split_whitespace().count();
    if words == 0 {
        return 0.0;
    }
    let positive = POSITIVE_WORDS.iter().filter(|w| text.contains(*w)).count() as f64;
    let negative = NEGATIVE_WORDS.iter().filter(|w| text.contains(*w)).count() as f64;
    let scale = (words as f64 / 20.0).max(1.0);
    ((positive - negative) / scale).clamp(-1.0, 1.0)
}

/// Quality of a single search hit: source reliability plus signal-specific keyword boosts.
pub fn result_confidence(url: &str, text: &str, signal_type: SignalType, processor_id: &str) -> f64 {
    let mut score = 0.5;

    let host = url.to_lowercase();
    if host.contains(&processor_id.to_lowercase()) || TRUSTED_DOMAINS.iter().any(|d| host.contains(d)) {
        score += 0.2;
    }

    let boosts: &[&str] = match signal_type {
        SignalType::Promotion => &["official", "limited time", "new customer", "merchant"],
        SignalType::Regulation => &["official", "government", "federal", "regulator"],
        SignalType::SocialSentiment => &["review", "merchant", "business", "experience"],
        SignalType::ServiceStatus => &["status page", "incident", "uptime"],
        SignalType::FraudTrend => &["report", "alert", "security"],
        SignalType::Fee => &["pricing", "per transaction", "rate"],
    };
    score += 0.1 * boosts.iter().filter(|k| text.contains(*k)).count() as f64;

    if text.split_whitespace().count() < 10 {
        score -= 0.2;
    }
    score.clamp(0.1, 1.0)
}
