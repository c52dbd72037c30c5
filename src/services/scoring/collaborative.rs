// ============================================
// Collaborative Scorer
// ============================================
//
// Recommends articles that readers with a similar engagement level reacted
// positively to. The score is bounded below the content-based ceiling so a
// noisy neighborhood signal never dominates the blend.

use crate::db::ArticleStore;
use crate::error::Result;
use crate::models::{Algorithm, ReadingPattern, RecommendationScore};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Positive-interaction count translates to `0.4 + count * 0.05`, capped.
const COUNT_BASE: f64 = 0.4;
const COUNT_STEP: f64 = 0.05;
const SCORE_CAP: f64 = 0.8;
/// Recent interactions scanned per similar reader.
const INTERACTIONS_PER_PEER: usize = 50;
/// Recent own interactions scanned to exclude already-seen articles.
const OWN_HISTORY_LIMIT: usize = 200;

pub struct CollaborativeScorer {
    store: Arc<dyn ArticleStore>,
    /// Engagement distance that still counts as "similar".
    similarity_band: f64,
}

impl CollaborativeScorer {
    pub fn new(store: Arc<dyn ArticleStore>, similarity_band: f64) -> Self {
        Self {
            store,
            similarity_band,
        }
    }

    /// Score articles by positive-interaction counts among similar readers,
    /// excluding articles the requesting user already interacted with.
    /// An empty neighborhood yields an empty list, not an error.
    pub async fn score(
        &self,
        user_id: Uuid,
        pattern: &ReadingPattern,
    ) -> Result<Vec<RecommendationScore>> {
        let peers = self.similar_readers(user_id, pattern.engagement_score).await?;
        if peers.is_empty() {
            debug!(user_id = %user_id, "No similar readers, collaborative pass empty");
            return Ok(Vec::new());
        }

        let own_history: std::collections::HashSet<String> = self
            .store
            .query_interactions(user_id, OWN_HISTORY_LIMIT)
            .await?
            .into_iter()
            .map(|interaction| interaction.article_id)
            .collect();

        let mut counts: HashMap<String, u32> = HashMap::new();
        for peer in &peers {
            let interactions = self
                .store
                .query_interactions(*peer, INTERACTIONS_PER_PEER)
                .await?;
            for interaction in interactions {
                if interaction.feedback.is_positive()
                    && !own_history.contains(&interaction.article_id)
                {
                    *counts.entry(interaction.article_id).or_insert(0) += 1;
                }
            }
        }

        let mut scores: Vec<RecommendationScore> = counts
            .into_iter()
            .map(|(article_id, count)| RecommendationScore {
                article_id,
                score: (COUNT_BASE + f64::from(count) * COUNT_STEP).min(SCORE_CAP),
                reasons: vec![format!("liked by {} similar readers", count)],
                algorithm: Algorithm::Collaborative,
            })
            .collect();

        scores.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.article_id.cmp(&b.article_id))
        });

        debug!(
            user_id = %user_id,
            peers = peers.len(),
            scored = scores.len(),
            "Collaborative pass complete"
        );
        Ok(scores)
    }

    async fn similar_readers(&self, user_id: Uuid, engagement: f64) -> Result<Vec<Uuid>> {
        let all = self.store.list_engagement_scores().await?;
        Ok(all
            .into_iter()
            .filter(|(other, other_engagement)| {
                *other != user_id && (other_engagement - engagement).abs() <= self.similarity_band
            })
            .map(|(other, _)| other)
            .collect())
    }
}
