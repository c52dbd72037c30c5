// ============================================
// Reading Pattern Profiles
// ============================================
//
// Long-term preference state per user. Feedback writes are read-modify-write
// against the store, so concurrent events for the same user must serialize;
// a per-user async lock provides that without coupling unrelated users.

pub mod mood;

use crate::db::ArticleStore;
use crate::error::Result;
use crate::models::{Interaction, ReadingPattern};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// How many recent interactions feed the derived snapshot.
const INTERACTION_SCAN_LIMIT: usize = 200;

/// Per-user state derived from interaction history on demand. Topic weights
/// are intentionally not stored on `ReadingPattern` itself.
#[derive(Debug, Default)]
pub struct InteractionSnapshot {
    /// Accumulated signed weight per lowercased topic.
    pub topic_weights: HashMap<String, f64>,
    /// Ids the user has already interacted with, excluded from candidates.
    pub seen_article_ids: HashSet<String>,
}

pub struct ProfileService {
    store: Arc<dyn ArticleStore>,
    write_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self {
            store,
            write_locks: DashMap::new(),
        }
    }

    fn user_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Load a user's pattern, or a default one if nothing is stored yet.
    /// The default is not persisted; the first feedback write creates it.
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<ReadingPattern> {
        Ok(self
            .store
            .load_reading_pattern(user_id)
            .await?
            .unwrap_or_default())
    }

    /// Apply one interaction to the user's stored pattern.
    ///
    /// Holds the user's write lock across load, mutate, and upsert. A failed
    /// upsert surfaces to the caller and leaves the stored pattern as it was.
    pub async fn apply_feedback(&self, interaction: &Interaction) -> Result<ReadingPattern> {
        let lock = self.user_lock(interaction.user_id);
        let _guard = lock.lock().await;

        let mut pattern = self
            .store
            .load_reading_pattern(interaction.user_id)
            .await?
            .unwrap_or_default();
        pattern.apply_feedback(interaction);
        self.store
            .upsert_reading_pattern(interaction.user_id, &pattern)
            .await?;

        debug!(
            user_id = %interaction.user_id,
            feedback = interaction.feedback.as_str(),
            engagement = pattern.engagement_score,
            "Reading pattern updated"
        );
        Ok(pattern)
    }

    /// Derive topic weights and the seen-id set from recent interactions.
    pub async fn interaction_snapshot(&self, user_id: Uuid) -> Result<InteractionSnapshot> {
        let interactions = self
            .store
            .query_interactions(user_id, INTERACTION_SCAN_LIMIT)
            .await?;

        let mut snapshot = InteractionSnapshot::default();
        for interaction in &interactions {
            snapshot
                .seen_article_ids
                .insert(interaction.article_id.clone());

            let delta = interaction.feedback.category_delta();
            for topic in &interaction.topics {
                let topic = topic.trim().to_lowercase();
                if !topic.is_empty() {
                    *snapshot.topic_weights.entry(topic).or_insert(0.0) += delta;
                }
            }
        }
        Ok(snapshot)
    }
}
