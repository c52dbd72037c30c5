// ============================================
// Content-Based Scorer
// ============================================
//
// Scores gated candidates against a reader's long-term pattern. Starts from
// a neutral base and accumulates weighted term adjustments; the sum is
// clamped to [0, 1] once at the end, never per term.

use super::{sort_ranked, MAX_REASONS};
use crate::config::ScoringConfig;
use crate::models::{Algorithm, Article, ReadingPattern, RecommendationScore};
use crate::utils::{clamp01, dedup_capped};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Neutral starting score before term adjustments.
const BASE_SCORE: f64 = 0.5;
/// Baseline quality bar; candidates below it are not scored at all.
const MIN_CONTENT_QUALITY: f64 = 0.6;
const MIN_CREDIBILITY: f64 = 0.6;
const MAX_POLARIZATION: f64 = 0.7;
/// Per-unit scale and cap for the derived topic-interest term.
const TOPIC_WEIGHT_SCALE: f64 = 0.03;
const MAX_TOPIC_TERM: f64 = 0.15;
/// Articles younger than this get the freshness bump.
const FRESH_HOURS: i64 = 24;

pub struct ContentScorer {
    config: ScoringConfig,
}

impl ContentScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score one candidate, or `None` when it is excluded or under the
    /// baseline quality bar.
    pub fn score_one(
        &self,
        article: &Article,
        pattern: &ReadingPattern,
        topic_weights: &HashMap<String, f64>,
        exclude_ids: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> Option<RecommendationScore> {
        if exclude_ids.contains(&article.id) {
            return None;
        }
        if article.content_quality < MIN_CONTENT_QUALITY
            || article.credibility < MIN_CREDIBILITY
            || article.polarization > MAX_POLARIZATION
        {
            return None;
        }

        let mut score = BASE_SCORE;
        let mut reasons = Vec::new();

        // Term 1: editorial quality, (q - 0.5) * 0.2
        score += (article.content_quality - 0.5) * 0.2;
        if article.content_quality >= 0.8 {
            reasons.push("high quality content".to_string());
        }

        // Term 2: bias tolerance, +0.15 inside the tolerance band, -0.1 outside
        if (article.bias - 0.5).abs() <= pattern.bias_tolerance {
            score += 0.15;
            reasons.push("matches bias preference".to_string());
        } else {
            score -= 0.1;
        }

        // Term 3: sentiment proximity, (1 - distance) * 0.1
        let sentiment_fit = 1.0 - (article.sentiment - pattern.sentiment_preference).abs();
        score += sentiment_fit * 0.1;

        // Term 4: strongest matching topic weight, scaled so it never dominates
        if let Some((topic, weight)) = strongest_topic(article, topic_weights) {
            let term = (weight * TOPIC_WEIGHT_SCALE).clamp(0.0, MAX_TOPIC_TERM);
            if term > 0.0 {
                score += term;
                reasons.push(format!("matches your interest in {}", topic));
            }
        }

        // Term 5: preferred source
        if pattern.prefers_source(&article.source) {
            score += 0.1;
            reasons.push(format!("from {}", article.source));
        }

        // Term 6: reading-time fit
        if article.estimated_read_minutes <= pattern.reading_time_preference {
            score += 0.05;
            reasons.push("fits your reading time".to_string());
        }

        // Term 7: credibility, (c - 0.5) * 0.15
        score += (article.credibility - 0.5) * 0.15;
        if article.credibility >= 0.8 {
            reasons.push("highly credible source".to_string());
        }

        // Term 8: freshness
        if article.age_hours(now) < FRESH_HOURS {
            score += 0.05;
            reasons.push("recent news".to_string());
        }

        Some(RecommendationScore {
            article_id: article.id.clone(),
            score: clamp01(score),
            reasons: dedup_capped(reasons, MAX_REASONS),
            algorithm: Algorithm::ContentBased,
        })
    }

    /// Score a candidate batch and return the ranked top slice.
    pub fn score(
        &self,
        candidates: &[Article],
        pattern: &ReadingPattern,
        topic_weights: &HashMap<String, f64>,
        exclude_ids: &HashSet<String>,
    ) -> Vec<RecommendationScore> {
        let now = Utc::now();
        let mut ranked: Vec<(RecommendationScore, DateTime<Utc>)> = candidates
            .iter()
            .filter_map(|article| {
                self.score_one(article, pattern, topic_weights, exclude_ids, now)
                    .map(|score| (score, article.published_at))
            })
            .collect();

        sort_ranked(&mut ranked);
        ranked.truncate(self.config.max_recommendations);
        ranked.into_iter().map(|(score, _)| score).collect()
    }
}

/// Strongest positive interaction weight among the article's topics.
fn strongest_topic<'a>(
    article: &'a Article,
    topic_weights: &HashMap<String, f64>,
) -> Option<(&'a str, f64)> {
    article
        .topics
        .iter()
        .filter_map(|topic| {
            topic_weights
                .get(&topic.trim().to_lowercase())
                .map(|weight| (topic.as_str(), *weight))
        })
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}
