//! Non-personalized trending ranking.
//!
//! Serves anonymous sessions and cold starts where no reading pattern
//! exists yet. Recency decays exponentially (heat halves every 24 hours)
//! and engagement is log-damped so one viral story cannot pin the list.

use crate::db::{ArticleFilter, ArticleStore};
use crate::error::Result;
use crate::models::Article;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

/// Articles older than this never trend.
const TRENDING_WINDOW_HOURS: i64 = 72;
/// Heat half-life in hours.
const HALF_LIFE_HOURS: f64 = 24.0;

pub struct TrendingService {
    store: Arc<dyn ArticleStore>,
}

impl TrendingService {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    /// Top trending articles within the window, hottest first.
    pub async fn top(&self, limit: usize) -> Result<Vec<Article>> {
        let since = Utc::now() - Duration::hours(TRENDING_WINDOW_HOURS);
        let articles = self
            .store
            .query_articles(&ArticleFilter::since(Some(since)))
            .await?;
        Ok(rank_by_heat(articles, limit))
    }
}

/// Rank a batch by engagement-weighted recency heat.
pub fn rank_by_heat(articles: Vec<Article>, limit: usize) -> Vec<Article> {
    let now = Utc::now();

    let mut scored: Vec<(Article, f64)> = articles
        .into_iter()
        .map(|article| {
            let score = heat_score(&article, now);
            (article, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);

    debug!(count = scored.len(), "Trending ranking applied");

    scored.into_iter().map(|(article, _)| article).collect()
}

fn heat_score(article: &Article, now: DateTime<Utc>) -> f64 {
    let age_hours = article.age_hours(now).max(0) as f64;
    let decay = 0.5_f64.powf(age_hours / HALF_LIFE_HOURS);
    let engagement = 1.0 + (1.0 + article.engagement_score.max(0.0)).ln();
    decay * engagement
}
