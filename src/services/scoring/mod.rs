// ============================================
// Scoring Passes
// ============================================
//
// Each pass is a pure function over its inputs: candidates in, ranked
// `RecommendationScore` list out. Passes never write state, so they can run
// concurrently for different users and algorithms.
//
// Data flow:
//   gated candidates → ContentScorer  ┐
//   peer interactions → CollaborativeScorer ┴→ HybridBlender → top list
//   gated candidates × MoodProfile → MoodScorer → mood list

pub mod collaborative;
pub mod content;
pub mod hybrid;
pub mod mood;

pub use collaborative::CollaborativeScorer;
pub use content::ContentScorer;
pub use hybrid::HybridBlender;
pub use mood::MoodScorer;

use crate::models::RecommendationScore;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::cmp::Ordering;

/// Reasons kept per recommendation after dedup.
pub(crate) const MAX_REASONS: usize = 5;

/// Bounded random perturbation applied by discovery-oriented passes.
///
/// This is the one intentionally non-deterministic scoring input: repeated
/// mood passes over identical inputs may rank near-equal articles
/// differently. Tests inject `Jitter::None` to pin rankings.
#[derive(Debug, Clone, Copy)]
pub enum Jitter {
    None,
    /// Uniform draw from [0, max).
    Uniform(f64),
}

impl Jitter {
    pub fn sample(&self) -> f64 {
        match self {
            Jitter::None => 0.0,
            Jitter::Uniform(max) if *max > 0.0 => rand::thread_rng().gen_range(0.0..*max),
            Jitter::Uniform(_) => 0.0,
        }
    }
}

/// Shared ranking order: score descending, then newer publication, then id
/// ascending so equal candidates rank the same on every pass.
pub(crate) fn sort_ranked(entries: &mut [(RecommendationScore, DateTime<Utc>)]) {
    entries.sort_by(|a, b| {
        b.0.score
            .partial_cmp(&a.0.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| a.0.article_id.cmp(&b.0.article_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Algorithm;
    use chrono::Duration;

    fn entry(
        base: DateTime<Utc>,
        id: &str,
        score: f64,
        hours_ago: i64,
    ) -> (RecommendationScore, DateTime<Utc>) {
        (
            RecommendationScore {
                article_id: id.to_string(),
                score,
                reasons: Vec::new(),
                algorithm: Algorithm::ContentBased,
            },
            base - Duration::hours(hours_ago),
        )
    }

    #[test]
    fn test_sort_ranked_breaks_ties_by_recency_then_id() {
        // One shared base time so equal offsets are exact timestamp ties.
        let base = Utc::now();
        let mut entries = vec![
            entry(base, "c", 0.8, 5),
            entry(base, "a", 0.9, 10),
            entry(base, "b", 0.8, 1),
            entry(base, "d", 0.8, 5),
        ];
        sort_ranked(&mut entries);

        let order: Vec<&str> = entries.iter().map(|(s, _)| s.article_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_jitter_none_is_zero() {
        assert_eq!(Jitter::None.sample(), 0.0);
        assert_eq!(Jitter::Uniform(0.0).sample(), 0.0);
    }

    #[test]
    fn test_jitter_uniform_stays_bounded() {
        let jitter = Jitter::Uniform(0.1);
        for _ in 0..100 {
            let sample = jitter.sample();
            assert!((0.0..0.1).contains(&sample));
        }
    }
}
