// ============================================
// Mood Profiles & Presets
// ============================================

use crate::error::{AppError, Result};
use crate::models::{MoodPreset, MoodProfile};
use crate::services::analysis::AnalysisProvider;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Saved presets kept per user; the oldest is evicted past this.
const MAX_PRESETS_PER_USER: usize = 20;

/// Holds each user's current mood and their saved presets. A mood is
/// ephemeral session state, so it lives here rather than in the store.
pub struct MoodService {
    analysis: Arc<dyn AnalysisProvider>,
    current: DashMap<Uuid, MoodProfile>,
    presets: DashMap<Uuid, Vec<MoodPreset>>,
}

impl MoodService {
    pub fn new(analysis: Arc<dyn AnalysisProvider>) -> Self {
        Self {
            analysis,
            current: DashMap::new(),
            presets: DashMap::new(),
        }
    }

    /// Derive a profile from a mood submission and make it the user's
    /// current mood, replacing any previous one outright.
    ///
    /// Quota exhaustion surfaces to the caller; any other derivation failure
    /// falls back to the neutral profile.
    pub async fn submit(
        &self,
        user_id: Uuid,
        text: &str,
        emoji: Option<&str>,
        tags: &[String],
    ) -> Result<MoodProfile> {
        let profile = match self.analysis.derive_mood(text, emoji, tags).await {
            Ok(profile) => profile,
            Err(err) if err.is_quota() => return Err(err),
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "Mood derivation failed, using neutral profile");
                MoodProfile::neutral()
            }
        };

        self.current.insert(user_id, profile.clone());
        debug!(user_id = %user_id, tone_words = profile.tone_words.len(), "Mood profile replaced");
        Ok(profile)
    }

    pub fn current(&self, user_id: Uuid) -> Option<MoodProfile> {
        self.current.get(&user_id).map(|p| p.clone())
    }

    pub fn clear(&self, user_id: Uuid) {
        self.current.remove(&user_id);
    }

    /// Save the current mood under a name, overwriting a preset with the
    /// same name.
    pub fn save_preset(&self, user_id: Uuid, name: &str) -> Result<MoodPreset> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("preset name is required".into()));
        }
        let profile = self
            .current(user_id)
            .ok_or_else(|| AppError::Validation("no active mood to save".into()))?;

        let preset = MoodPreset {
            name: name.to_string(),
            profile,
            created_at: Utc::now(),
        };

        let mut entry = self.presets.entry(user_id).or_default();
        entry.retain(|p| !p.name.eq_ignore_ascii_case(name));
        entry.push(preset.clone());
        if entry.len() > MAX_PRESETS_PER_USER {
            entry.remove(0);
        }

        Ok(preset)
    }

    /// Re-apply a saved preset as the current mood.
    pub fn apply_preset(&self, user_id: Uuid, name: &str) -> Result<MoodProfile> {
        let profile = self
            .presets
            .get(&user_id)
            .and_then(|presets| {
                presets
                    .iter()
                    .find(|p| p.name.eq_ignore_ascii_case(name))
                    .map(|p| p.profile.clone())
            })
            .ok_or_else(|| AppError::Validation(format!("unknown mood preset: {}", name)))?;

        self.current.insert(user_id, profile.clone());
        Ok(profile)
    }

    pub fn list_presets(&self, user_id: Uuid) -> Vec<MoodPreset> {
        self.presets
            .get(&user_id)
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn delete_preset(&self, user_id: Uuid, name: &str) -> bool {
        match self.presets.get_mut(&user_id) {
            Some(mut presets) => {
                let before = presets.len();
                presets.retain(|p| !p.name.eq_ignore_ascii_case(name));
                presets.len() < before
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::{Article, DigestSummary, QualityDimensions};
    use async_trait::async_trait;

    /// Maps "deep" statements to a deep profile so replacement is visible.
    struct TextKeyedAnalysis;

    #[async_trait]
    impl AnalysisProvider for TextKeyedAnalysis {
        async fn analyze_quality(
            &self,
            _title: &str,
            _body: &str,
            _source: &str,
        ) -> Result<QualityDimensions> {
            Ok(QualityDimensions::default())
        }

        async fn derive_mood(
            &self,
            text: &str,
            _emoji: Option<&str>,
            _tags: &[String],
        ) -> Result<MoodProfile> {
            let mut profile = MoodProfile::neutral();
            profile.want_depth = if text.contains("deep") { 0.9 } else { 0.1 };
            Ok(profile)
        }

        async fn summarize(&self, _articles: &[Article]) -> Result<DigestSummary> {
            Ok(DigestSummary {
                summary: String::new(),
                highlights: Vec::new(),
                topics: Vec::new(),
            })
        }

        fn name(&self) -> &str {
            "text-keyed"
        }
    }

    struct BrokenAnalysis {
        quota: bool,
    }

    #[async_trait]
    impl AnalysisProvider for BrokenAnalysis {
        async fn analyze_quality(
            &self,
            _title: &str,
            _body: &str,
            _source: &str,
        ) -> Result<QualityDimensions> {
            Ok(QualityDimensions::default())
        }

        async fn derive_mood(
            &self,
            _text: &str,
            _emoji: Option<&str>,
            _tags: &[String],
        ) -> Result<MoodProfile> {
            if self.quota {
                Err(AppError::AnalysisQuota("credits exhausted".into()))
            } else {
                Err(AppError::AnalysisUnavailable("model offline".into()))
            }
        }

        async fn summarize(&self, _articles: &[Article]) -> Result<DigestSummary> {
            Ok(DigestSummary {
                summary: String::new(),
                highlights: Vec::new(),
                topics: Vec::new(),
            })
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_submit_replaces_previous_mood() {
        let moods = MoodService::new(Arc::new(TextKeyedAnalysis));
        let user = Uuid::new_v4();

        moods.submit(user, "deep evening read", None, &[]).await.unwrap();
        assert_eq!(moods.current(user).unwrap().want_depth, 0.9);

        moods.submit(user, "just headlines", None, &[]).await.unwrap();
        assert_eq!(moods.current(user).unwrap().want_depth, 0.1);
    }

    #[tokio::test]
    async fn test_derivation_failure_falls_back_to_neutral() {
        let moods = MoodService::new(Arc::new(BrokenAnalysis { quota: false }));
        let user = Uuid::new_v4();

        let profile = moods.submit(user, "anything", None, &[]).await.unwrap();
        assert_eq!(profile.want_depth, 0.5);
        assert!(moods.current(user).is_some());
    }

    #[tokio::test]
    async fn test_quota_surfaces_and_keeps_previous_mood() {
        let working = MoodService::new(Arc::new(TextKeyedAnalysis));
        let user = Uuid::new_v4();
        working.submit(user, "deep", None, &[]).await.unwrap();

        let broken = MoodService::new(Arc::new(BrokenAnalysis { quota: true }));
        let err = broken.submit(user, "deep", None, &[]).await.unwrap_err();
        assert!(err.is_quota());
        assert!(broken.current(user).is_none(), "failed submission stores nothing");

        assert_eq!(working.current(user).unwrap().want_depth, 0.9);
    }

    #[tokio::test]
    async fn test_preset_roundtrip() {
        let moods = MoodService::new(Arc::new(TextKeyedAnalysis));
        let user = Uuid::new_v4();

        moods.submit(user, "deep dive", None, &[]).await.unwrap();
        moods.save_preset(user, "evening").unwrap();

        moods.submit(user, "light", None, &[]).await.unwrap();
        assert_eq!(moods.current(user).unwrap().want_depth, 0.1);

        let restored = moods.apply_preset(user, "Evening").unwrap();
        assert_eq!(restored.want_depth, 0.9);
        assert_eq!(moods.current(user).unwrap().want_depth, 0.9);

        assert_eq!(moods.list_presets(user).len(), 1);
        assert!(moods.delete_preset(user, "evening"));
        assert!(moods.list_presets(user).is_empty());
        assert!(moods.apply_preset(user, "evening").is_err());
    }

    #[tokio::test]
    async fn test_save_preset_requires_active_mood_and_name() {
        let moods = MoodService::new(Arc::new(TextKeyedAnalysis));
        let user = Uuid::new_v4();

        assert!(matches!(
            moods.save_preset(user, "evening"),
            Err(AppError::Validation(_))
        ));

        moods.submit(user, "deep", None, &[]).await.unwrap();
        assert!(matches!(
            moods.save_preset(user, "   "),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_same_name_preset_overwrites() {
        let moods = MoodService::new(Arc::new(TextKeyedAnalysis));
        let user = Uuid::new_v4();

        moods.submit(user, "deep", None, &[]).await.unwrap();
        moods.save_preset(user, "daily").unwrap();

        moods.submit(user, "light", None, &[]).await.unwrap();
        moods.save_preset(user, "DAILY").unwrap();

        let presets = moods.list_presets(user);
        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].profile.want_depth, 0.1);
    }
}
