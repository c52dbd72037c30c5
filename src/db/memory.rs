use super::{ArticleFilter, ArticleStore};
use crate::error::Result;
use crate::models::{Article, Interaction, ReadingPattern};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory article store for tests and embedded use.
///
/// Clones share the same underlying maps, mirroring how a pooled database
/// handle behaves.
#[derive(Clone, Default)]
pub struct MemoryStore {
    articles: Arc<RwLock<HashMap<String, Article>>>,
    interactions: Arc<RwLock<Vec<Interaction>>>,
    patterns: Arc<RwLock<HashMap<Uuid, ReadingPattern>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an article. Replaces any existing article with the same id.
    pub async fn add_article(&self, article: Article) {
        let mut articles = self.articles.write().await;
        articles.insert(article.id.clone(), article);
    }

    pub async fn add_articles(&self, batch: Vec<Article>) {
        let mut articles = self.articles.write().await;
        for article in batch {
            articles.insert(article.id.clone(), article);
        }
    }

    pub async fn article_count(&self) -> usize {
        self.articles.read().await.len()
    }

    pub async fn interaction_count(&self) -> usize {
        self.interactions.read().await.len()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn query_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        let articles = self.articles.read().await;

        let mut matched: Vec<Article> = articles
            .values()
            .filter(|a| match filter.since {
                Some(since) => a.published_at > since,
                None => true,
            })
            .filter(|a| match &filter.topic {
                Some(topic) => a.topics.iter().any(|t| t.eq_ignore_ascii_case(topic)),
                None => true,
            })
            .filter(|a| match &filter.source {
                Some(source) => a.source.eq_ignore_ascii_case(source),
                None => true,
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(a.id.cmp(&b.id)));

        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }

        Ok(matched)
    }

    async fn fetch_article(&self, article_id: &str) -> Result<Option<Article>> {
        let articles = self.articles.read().await;
        Ok(articles.get(article_id).cloned())
    }

    async fn query_interactions(&self, user_id: Uuid, limit: usize) -> Result<Vec<Interaction>> {
        let interactions = self.interactions.read().await;

        let mut matched: Vec<Interaction> = interactions
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(limit);

        Ok(matched)
    }

    async fn record_interaction(&self, interaction: Interaction) -> Result<()> {
        let mut interactions = self.interactions.write().await;
        interactions.push(interaction);
        Ok(())
    }

    async fn load_reading_pattern(&self, user_id: Uuid) -> Result<Option<ReadingPattern>> {
        let patterns = self.patterns.read().await;
        Ok(patterns.get(&user_id).cloned())
    }

    async fn upsert_reading_pattern(&self, user_id: Uuid, pattern: &ReadingPattern) -> Result<()> {
        let mut patterns = self.patterns.write().await;
        patterns.insert(user_id, pattern.clone());
        Ok(())
    }

    async fn list_engagement_scores(&self) -> Result<Vec<(Uuid, f64)>> {
        let patterns = self.patterns.read().await;
        Ok(patterns
            .iter()
            .map(|(id, p)| (*id, p.engagement_score))
            .collect())
    }
}
