// ============================================
// Mood Scorer
// ============================================
//
// Ranks candidates against the user's current mood profile, independent of
// their long-term reading pattern. Includes a small bounded random
// perturbation so repeated passes over the same candidates rotate
// near-equal articles; inject `Jitter::None` to pin rankings in tests.
// Scores are kept in [0, 1]; the display layer multiplies by 100.

use super::{sort_ranked, Jitter, MAX_REASONS};
use crate::config::ScoringConfig;
use crate::models::{Algorithm, Article, MoodProfile, RecommendationScore};
use crate::utils::{clamp01, dedup_capped};
use chrono::{DateTime, Utc};

/// A matched topic bias at or above this adds a reason.
const MOOD_REASON_THRESHOLD: f64 = 0.7;
/// Length tolerance maps onto minutes via this scale.
const LENGTH_SCALE_MINUTES: f64 = 20.0;
/// Engagement normalizes against this ceiling for the small boost term.
const ENGAGEMENT_CEILING: f64 = 100.0;

pub struct MoodScorer {
    config: ScoringConfig,
    jitter: Jitter,
}

impl MoodScorer {
    pub fn new(config: ScoringConfig) -> Self {
        let jitter = Jitter::Uniform(config.mood_jitter);
        Self { config, jitter }
    }

    pub fn with_jitter(config: ScoringConfig, jitter: Jitter) -> Self {
        Self { config, jitter }
    }

    pub fn score_one(&self, article: &Article, mood: &MoodProfile) -> RecommendationScore {
        let mut score = 0.0;
        let mut reasons = Vec::new();

        // Term 1: depth match, weight 0.25
        let depth_fit = 1.0 - (mood.want_depth - article.depth_score).abs();
        score += depth_fit * 0.25;
        if mood.want_depth >= 0.7 && article.depth_score >= 0.7 {
            reasons.push("in-depth read".to_string());
        } else if mood.want_depth <= 0.3 && article.depth_score <= 0.3 {
            reasons.push("light read".to_string());
        }

        // Term 2: positivity match, weight 0.20
        let positivity_fit = 1.0 - (mood.positivity_pref - article.sentiment).abs();
        score += positivity_fit * 0.20;
        if mood.positivity_pref >= 0.7 && article.sentiment >= 0.7 {
            reasons.push("upbeat story".to_string());
        }

        // Term 3: length match against tolerance * 20 minutes, weight 0.15
        let target_minutes = mood.length_tolerance * LENGTH_SCALE_MINUTES;
        let length_distance =
            (f64::from(article.estimated_read_minutes) - target_minutes).abs();
        let length_fit = (1.0 - length_distance / LENGTH_SCALE_MINUTES).max(0.0);
        score += length_fit * 0.15;

        // Term 4: topic bias match, weight 0.30 averaged over matching tags
        let matched = matching_biases(article, mood);
        if !matched.is_empty() {
            let avg: f64 = matched.iter().map(|(_, bias)| *bias).sum::<f64>()
                / matched.len() as f64;
            score += avg * 0.30;
            for (topic, bias) in &matched {
                if *bias >= MOOD_REASON_THRESHOLD {
                    reasons.push(format!("in the mood for {}", topic));
                }
            }
        }

        // Term 5: small quality and engagement boost, at most 0.2 combined
        score += article.content_quality * 0.12;
        score += (article.engagement_score / ENGAGEMENT_CEILING).min(1.0) * 0.08;

        // Term 6: bounded discovery perturbation
        score += self.jitter.sample();

        RecommendationScore {
            article_id: article.id.clone(),
            score: clamp01(score),
            reasons: dedup_capped(reasons, MAX_REASONS),
            algorithm: Algorithm::MoodBased,
        }
    }

    /// Score a batch, drop everything at or below the display floor, and
    /// return the ranked top slice.
    pub fn score(&self, candidates: &[Article], mood: &MoodProfile) -> Vec<RecommendationScore> {
        let mut ranked: Vec<(RecommendationScore, DateTime<Utc>)> = candidates
            .iter()
            .map(|article| (self.score_one(article, mood), article.published_at))
            .filter(|(score, _)| score.score > self.config.mood_score_floor)
            .collect();

        sort_ranked(&mut ranked);
        ranked.truncate(self.config.mood_max_results);
        ranked.into_iter().map(|(score, _)| score).collect()
    }
}

/// Case-insensitive substring match in either direction between article
/// topic tags and mood topic biases.
fn matching_biases<'a>(article: &Article, mood: &'a MoodProfile) -> Vec<(&'a str, f64)> {
    let mut matched = Vec::new();
    for tag in &article.topics {
        let tag_lower = tag.to_lowercase();
        for (mood_topic, bias) in &mood.topic_biases {
            let mood_lower = mood_topic.to_lowercase();
            if tag_lower.contains(&mood_lower) || mood_lower.contains(&tag_lower) {
                matched.push((mood_topic.as_str(), *bias));
            }
        }
    }
    matched
}
