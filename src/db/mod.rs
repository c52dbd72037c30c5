// ============================================
// Article Storage Contract
// ============================================
//
// The engine reads articles and interaction history through this trait and
// writes nothing but interaction records and reading patterns. Filters stay
// at equality/range level so any relational or in-memory backend can satisfy
// them without a query planner.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{Article, Interaction, ReadingPattern};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Simple filter over stored articles. All fields are optional and combine
/// with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    /// Only articles published strictly after this instant
    pub since: Option<DateTime<Utc>>,
    pub topic: Option<String>,
    pub source: Option<String>,
    /// Newest-first truncation applied after filtering
    pub limit: Option<usize>,
}

impl ArticleFilter {
    pub fn since(ts: Option<DateTime<Utc>>) -> Self {
        Self {
            since: ts,
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Query articles newest-first.
    async fn query_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>>;

    /// Fetch a single article by id.
    async fn fetch_article(&self, article_id: &str) -> Result<Option<Article>>;

    /// A user's most recent interactions, newest-first.
    async fn query_interactions(&self, user_id: Uuid, limit: usize) -> Result<Vec<Interaction>>;

    /// Append one interaction record.
    async fn record_interaction(&self, interaction: Interaction) -> Result<()>;

    async fn load_reading_pattern(&self, user_id: Uuid) -> Result<Option<ReadingPattern>>;

    /// Replace the stored pattern for a user. Callers are expected to have
    /// serialized their read-modify-write; the store only persists.
    async fn upsert_reading_pattern(&self, user_id: Uuid, pattern: &ReadingPattern) -> Result<()>;

    /// Engagement scores of every user with a stored pattern, for similarity
    /// lookups.
    async fn list_engagement_scores(&self) -> Result<Vec<(Uuid, f64)>>;
}
