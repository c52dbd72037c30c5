// ============================================
// Hybrid Blender
// ============================================
//
// Merges the content-based and collaborative passes into one ranked list.
// Weights are applied per input, never renormalized: an article present in
// only one list keeps that list's weighted score, which caps
// collaborative-only hits near 0.24 and damps the noisier signal.

use super::MAX_REASONS;
use crate::config::ScoringConfig;
use crate::models::{Algorithm, RecommendationScore};
use crate::utils::dedup_capped;
use std::cmp::Ordering;
use std::collections::HashMap;

pub struct HybridBlender {
    config: ScoringConfig,
}

struct PartialBlend {
    score: f64,
    content_reasons: Vec<String>,
    collaborative_reasons: Vec<String>,
}

impl PartialBlend {
    /// Cap the combined reason list without letting the larger content set
    /// crowd out the collaborative signal: when both inputs contributed, a
    /// slot is held back for the collaborative reasons before capping.
    fn reasons(self) -> Vec<String> {
        if self.collaborative_reasons.is_empty() {
            return dedup_capped(self.content_reasons, MAX_REASONS);
        }
        let mut reasons = dedup_capped(self.content_reasons, MAX_REASONS - 1);
        reasons.extend(self.collaborative_reasons);
        dedup_capped(reasons, MAX_REASONS)
    }
}

impl HybridBlender {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Blend the two pass outputs. Order within either input does not affect
    /// the result; ties rank by article id for a total order.
    pub fn blend(
        &self,
        content: &[RecommendationScore],
        collaborative: &[RecommendationScore],
    ) -> Vec<RecommendationScore> {
        let mut merged: HashMap<String, PartialBlend> = HashMap::new();

        for score in content {
            let entry = merged
                .entry(score.article_id.clone())
                .or_insert_with(|| PartialBlend {
                    score: 0.0,
                    content_reasons: Vec::new(),
                    collaborative_reasons: Vec::new(),
                });
            entry.score += score.score * self.config.content_weight;
            entry.content_reasons.extend(score.reasons.iter().cloned());
        }

        for score in collaborative {
            let entry = merged
                .entry(score.article_id.clone())
                .or_insert_with(|| PartialBlend {
                    score: 0.0,
                    content_reasons: Vec::new(),
                    collaborative_reasons: Vec::new(),
                });
            entry.score += score.score * self.config.collaborative_weight;
            entry
                .collaborative_reasons
                .extend(score.reasons.iter().cloned());
        }

        let mut blended: Vec<RecommendationScore> = merged
            .into_iter()
            .map(|(article_id, partial)| RecommendationScore {
                article_id,
                score: partial.score,
                reasons: partial.reasons(),
                algorithm: Algorithm::Hybrid,
            })
            .collect();

        blended.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.article_id.cmp(&b.article_id))
        });
        blended.truncate(self.config.max_recommendations);
        blended
    }
}
