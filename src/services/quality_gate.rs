// ============================================
// Quality Gate (candidate admission)
// ============================================
//
// Every raw article passes through here before it can be scored. Hard
// filters are cheap lexical checks that short-circuit with a specific
// rejection reason; soft filters apply fixed thresholds to the analyzer's
// quality dimensions. High bias alone never rejects, it is annotated so
// downstream ranking can balance the feed.

use crate::config::GateConfig;
use crate::error::Result;
use crate::models::{Article, QualityDimensions};
use crate::services::analysis::AnalysisProvider;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

static CLICKBAIT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)you won'?t believe").expect("clickbait regex pattern is valid"),
        Regex::new(r"(?i)what happened next").expect("clickbait regex pattern is valid"),
        Regex::new(r"(?i)doctors hate (him|her|them)").expect("clickbait regex pattern is valid"),
        Regex::new(r"(?i)one weird trick").expect("clickbait regex pattern is valid"),
        Regex::new(r"(?i)number \d+ will (shock|amaze)").expect("clickbait regex pattern is valid"),
        Regex::new(r"(?i)this one (thing|secret)").expect("clickbait regex pattern is valid"),
        Regex::new(r"(?i)click here").expect("clickbait regex pattern is valid"),
        Regex::new(r"[!?]{4,}").expect("clickbait regex pattern is valid"),
    ]
});

static ADULT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\bporn").expect("adult regex pattern is valid"),
        Regex::new(r"(?i)\bxxx\b").expect("adult regex pattern is valid"),
        Regex::new(r"(?i)\bnsfw\b").expect("adult regex pattern is valid"),
        Regex::new(r"(?i)\bnude").expect("adult regex pattern is valid"),
        Regex::new(r"(?i)\bexplicit content\b").expect("adult regex pattern is valid"),
        Regex::new(r"(?i)\bonlyfans\b").expect("adult regex pattern is valid"),
    ]
});

/// Outcome of gating one candidate.
#[derive(Debug, Clone)]
pub struct GateDecision {
    pub passes: bool,
    pub rejection_reason: Option<String>,
    /// Set when `dimensions.bias` exceeds the high-bias threshold. Annotation
    /// only, never a rejection on its own.
    pub high_bias: bool,
    pub dimensions: QualityDimensions,
}

impl GateDecision {
    fn admitted(dimensions: QualityDimensions, high_bias: bool) -> Self {
        Self {
            passes: true,
            rejection_reason: None,
            high_bias,
            dimensions,
        }
    }

    fn rejected(reason: impl Into<String>, dimensions: QualityDimensions) -> Self {
        Self {
            passes: false,
            rejection_reason: Some(reason.into()),
            high_bias: false,
            dimensions,
        }
    }
}

pub struct QualityGate {
    config: GateConfig,
    analysis: Arc<dyn AnalysisProvider>,
}

impl QualityGate {
    pub fn new(config: GateConfig, analysis: Arc<dyn AnalysisProvider>) -> Self {
        Self { config, analysis }
    }

    /// Evaluate one candidate. Hard filters run without touching the
    /// analyzer; quota exhaustion from the analyzer propagates as an error
    /// while any other analyzer failure degrades to the default dimensions.
    pub async fn evaluate(&self, article: &Article) -> Result<GateDecision> {
        if let Some(reason) = self.hard_reject_reason(article) {
            debug!(article_id = %article.id, reason = %reason, "Candidate rejected by hard filter");
            return Ok(GateDecision::rejected(reason, QualityDimensions::default()));
        }

        let dimensions = match self
            .analysis
            .analyze_quality(&article.title, &article.body, &article.source)
            .await
        {
            Ok(dimensions) => dimensions.clamped(),
            Err(err) if err.is_quota() => return Err(err),
            Err(err) => {
                warn!(article_id = %article.id, error = %err, "Analyzer unavailable, using default dimensions");
                QualityDimensions::default()
            }
        };

        if dimensions.toxicity > self.config.toxicity_limit {
            return Ok(GateDecision::rejected(
                format!("toxicity {:.2} above threshold", dimensions.toxicity),
                dimensions,
            ));
        }

        if dimensions.sensationalism > self.config.sensationalism_limit
            && dimensions.factuality < self.config.factuality_floor
        {
            return Ok(GateDecision::rejected(
                "sensationalized content with weak sourcing",
                dimensions,
            ));
        }

        let high_bias = dimensions.bias > self.config.high_bias_threshold;
        if high_bias {
            debug!(article_id = %article.id, bias = dimensions.bias, "High-bias candidate annotated");
        }

        Ok(GateDecision::admitted(dimensions, high_bias))
    }

    /// Evaluate a batch and keep only the admitted articles.
    pub async fn admit(&self, articles: Vec<Article>) -> Result<Vec<Article>> {
        let mut admitted = Vec::with_capacity(articles.len());
        for article in articles {
            let decision = self.evaluate(&article).await?;
            if decision.passes {
                admitted.push(article);
            }
        }
        Ok(admitted)
    }

    /// Apply only the lexical hard filters, without consulting the
    /// analyzer. Feed page assembly runs on this screen so fetches never
    /// depend on analysis quota.
    pub fn screen(&self, articles: Vec<Article>) -> Vec<Article> {
        articles
            .into_iter()
            .filter(|article| match self.hard_reject_reason(article) {
                Some(reason) => {
                    debug!(article_id = %article.id, reason = %reason, "Article screened out of feed");
                    false
                }
                None => true,
            })
            .collect()
    }

    fn hard_reject_reason(&self, article: &Article) -> Option<String> {
        // Check 1: minimum body length
        if article.body.chars().count() < self.config.min_body_chars {
            return Some(format!(
                "body shorter than {} characters",
                self.config.min_body_chars
            ));
        }

        // Check 2: minimum title length
        let title_len = article.title.chars().count();
        if title_len < self.config.min_title_chars {
            return Some(format!(
                "title shorter than {} characters",
                self.config.min_title_chars
            ));
        }

        // Check 3: well-formed source URL
        if !is_well_formed_url(&article.source_url) {
            return Some("malformed source URL".to_string());
        }

        // Check 4: clickbait patterns in the title
        if let Some(pattern) = CLICKBAIT_PATTERNS.iter().find(|p| p.is_match(&article.title)) {
            return Some(format!("clickbait pattern: {}", pattern.as_str()));
        }

        // Check 5: adult content patterns in title or body
        if ADULT_PATTERNS
            .iter()
            .any(|p| p.is_match(&article.title) || p.is_match(&article.body))
        {
            return Some("adult content pattern".to_string());
        }

        // Check 6: shouting titles
        if title_len > self.config.min_title_chars
            && caps_ratio(&article.title) > self.config.caps_ratio_limit
        {
            return Some("excessive capitalization in title".to_string());
        }

        // Check 7: emoji-stuffed titles
        let emoji = emoji_count(&article.title);
        if emoji > self.config.max_title_emoji {
            return Some(format!("{} emoji in title", emoji));
        }

        None
    }
}

/// Accepts only absolute http/https URLs with a host.
fn is_well_formed_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}

/// Ratio of uppercase letters among the alphabetic characters.
fn caps_ratio(text: &str) -> f64 {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return 0.0;
    }
    let caps = letters.iter().filter(|c| c.is_uppercase()).count();
    caps as f64 / letters.len() as f64
}

fn emoji_count(text: &str) -> usize {
    text.chars().filter(|c| is_emoji(*c)).count()
}

fn is_emoji(c: char) -> bool {
    matches!(
        u32::from(c),
        0x1F300..=0x1F5FF // symbols & pictographs
            | 0x1F600..=0x1F64F // emoticons
            | 0x1F680..=0x1F6FF // transport
            | 0x1F900..=0x1FAFF // supplemental pictographs
            | 0x2600..=0x26FF // miscellaneous symbols
            | 0x2700..=0x27BF // dingbats
    )
}
