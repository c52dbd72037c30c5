use crate::utils::retry::RetryPolicy;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub gate: GateConfig,
    pub scoring: ScoringConfig,
    pub feed: FeedConfig,
}

/// Hard and soft filter thresholds for the quality gate
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    pub min_body_chars: usize,
    pub min_title_chars: usize,
    pub max_title_emoji: usize,
    /// Uppercase ratio among letters above which a title is rejected
    pub caps_ratio_limit: f64,
    pub toxicity_limit: f64,
    pub sensationalism_limit: f64,
    pub factuality_floor: f64,
    /// Bias above this is annotated for downstream balancing, never rejected
    pub high_bias_threshold: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_body_chars: 800,
            min_title_chars: 10,
            max_title_emoji: 3,
            caps_ratio_limit: 0.5,
            toxicity_limit: 0.4,
            sensationalism_limit: 0.65,
            factuality_floor: 0.45,
            high_bias_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Content-based share of the hybrid blend
    pub content_weight: f64,
    /// Collaborative share of the hybrid blend
    pub collaborative_weight: f64,
    /// Ranked lists from content and hybrid passes are capped to this length
    pub max_recommendations: usize,
    /// Mood-ranked lists are capped to this length
    pub mood_max_results: usize,
    /// Mood scores at or below this are dropped (0.30 internal = 30/100 display)
    pub mood_score_floor: f64,
    /// Bound of the random discovery bonus added by the mood scorer
    pub mood_jitter: f64,
    /// Engagement-score distance that still counts as a similar reader
    pub similarity_band: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            content_weight: 0.7,
            collaborative_weight: 0.3,
            max_recommendations: 20,
            mood_max_results: 30,
            mood_score_floor: 0.30,
            mood_jitter: 0.1,
            similarity_band: 0.2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Interval between automatic background refreshes
    pub auto_refresh_secs: u64,
    /// Articles requested per fetch
    pub page_size: usize,
    /// Attempt budget for the initial feed load
    pub initial_load_attempts: u32,
    pub initial_backoff_ms: u64,
    /// Broadcast capacity of the breaking-news event bus
    pub event_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            auto_refresh_secs: 300,
            page_size: 20,
            initial_load_attempts: 3,
            initial_backoff_ms: 500,
            event_capacity: 256,
        }
    }
}

impl FeedConfig {
    pub fn auto_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.auto_refresh_secs.max(1))
    }

    pub fn initial_load_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.initial_load_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            ..RetryPolicy::default()
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            gate: GateConfig {
                min_body_chars: env::var("GATE_MIN_BODY_CHARS")
                    .unwrap_or_else(|_| "800".to_string())
                    .parse()
                    .expect("GATE_MIN_BODY_CHARS must be a valid usize"),
                min_title_chars: env::var("GATE_MIN_TITLE_CHARS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("GATE_MIN_TITLE_CHARS must be a valid usize"),
                max_title_emoji: env::var("GATE_MAX_TITLE_EMOJI")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .expect("GATE_MAX_TITLE_EMOJI must be a valid usize"),
                caps_ratio_limit: env::var("GATE_CAPS_RATIO_LIMIT")
                    .unwrap_or_else(|_| "0.5".to_string())
                    .parse()
                    .expect("GATE_CAPS_RATIO_LIMIT must be a valid f64"),
                toxicity_limit: env::var("GATE_TOXICITY_LIMIT")
                    .unwrap_or_else(|_| "0.4".to_string())
                    .parse()
                    .expect("GATE_TOXICITY_LIMIT must be a valid f64"),
                sensationalism_limit: env::var("GATE_SENSATIONALISM_LIMIT")
                    .unwrap_or_else(|_| "0.65".to_string())
                    .parse()
                    .expect("GATE_SENSATIONALISM_LIMIT must be a valid f64"),
                factuality_floor: env::var("GATE_FACTUALITY_FLOOR")
                    .unwrap_or_else(|_| "0.45".to_string())
                    .parse()
                    .expect("GATE_FACTUALITY_FLOOR must be a valid f64"),
                high_bias_threshold: env::var("GATE_HIGH_BIAS_THRESHOLD")
                    .unwrap_or_else(|_| "0.7".to_string())
                    .parse()
                    .expect("GATE_HIGH_BIAS_THRESHOLD must be a valid f64"),
            },
            scoring: ScoringConfig {
                content_weight: env::var("SCORING_CONTENT_WEIGHT")
                    .unwrap_or_else(|_| "0.7".to_string())
                    .parse()
                    .expect("SCORING_CONTENT_WEIGHT must be a valid f64"),
                collaborative_weight: env::var("SCORING_COLLABORATIVE_WEIGHT")
                    .unwrap_or_else(|_| "0.3".to_string())
                    .parse()
                    .expect("SCORING_COLLABORATIVE_WEIGHT must be a valid f64"),
                max_recommendations: env::var("SCORING_MAX_RECOMMENDATIONS")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("SCORING_MAX_RECOMMENDATIONS must be a valid usize"),
                mood_max_results: env::var("SCORING_MOOD_MAX_RESULTS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("SCORING_MOOD_MAX_RESULTS must be a valid usize"),
                mood_score_floor: env::var("SCORING_MOOD_SCORE_FLOOR")
                    .unwrap_or_else(|_| "0.30".to_string())
                    .parse()
                    .expect("SCORING_MOOD_SCORE_FLOOR must be a valid f64"),
                mood_jitter: env::var("SCORING_MOOD_JITTER")
                    .unwrap_or_else(|_| "0.1".to_string())
                    .parse()
                    .expect("SCORING_MOOD_JITTER must be a valid f64"),
                similarity_band: env::var("SCORING_SIMILARITY_BAND")
                    .unwrap_or_else(|_| "0.2".to_string())
                    .parse()
                    .expect("SCORING_SIMILARITY_BAND must be a valid f64"),
            },
            feed: FeedConfig {
                auto_refresh_secs: env::var("FEED_AUTO_REFRESH_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .expect("FEED_AUTO_REFRESH_SECS must be a valid u64"),
                page_size: env::var("FEED_PAGE_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("FEED_PAGE_SIZE must be a valid usize"),
                initial_load_attempts: env::var("FEED_INITIAL_LOAD_ATTEMPTS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .expect("FEED_INITIAL_LOAD_ATTEMPTS must be a valid u32"),
                initial_backoff_ms: env::var("FEED_INITIAL_BACKOFF_MS")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()
                    .expect("FEED_INITIAL_BACKOFF_MS must be a valid u64"),
                event_capacity: env::var("FEED_EVENT_CAPACITY")
                    .unwrap_or_else(|_| "256".to_string())
                    .parse()
                    .expect("FEED_EVENT_CAPACITY must be a valid usize"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_thresholds() {
        let config = Config::default();

        assert_eq!(config.gate.min_body_chars, 800);
        assert_eq!(config.gate.min_title_chars, 10);
        assert_eq!(config.gate.toxicity_limit, 0.4);
        assert_eq!(config.scoring.content_weight, 0.7);
        assert_eq!(config.scoring.collaborative_weight, 0.3);
        assert_eq!(config.feed.auto_refresh_secs, 300);
    }

    #[test]
    fn test_initial_load_policy_uses_feed_settings() {
        let feed = FeedConfig {
            initial_load_attempts: 5,
            initial_backoff_ms: 50,
            ..FeedConfig::default()
        };

        let policy = feed.initial_load_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(50));
    }
}
