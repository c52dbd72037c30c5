use crate::utils::clamp01;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Bounded capacity for the most-recent topics a pattern retains
pub const MAX_TOPICS_OF_INTEREST: usize = 20;
/// Bounded capacity for preferred sources
pub const MAX_PREFERRED_SOURCES: usize = 10;
/// Bias tolerance never narrows below this floor
pub const MIN_BIAS_TOLERANCE: f64 = 0.3;
/// Content at or below this bias magnitude counts as low-bias for tolerance updates
pub const LOW_BIAS: f64 = 0.3;
/// Content at or above this bias magnitude counts as high-bias
pub const HIGH_BIAS: f64 = 0.7;

// ============================================
// Articles & Quality
// ============================================

/// A news article as read from storage. The engine never mutates articles;
/// all per-user state lives on profiles and feed sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub body: String,
    pub source: String,
    pub source_url: String,
    pub category: Option<String>,
    pub topics: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Overall editorial quality in [0, 1]
    pub content_quality: f64,
    /// Source credibility in [0, 1]
    pub credibility: f64,
    /// Distance-from-neutral magnitude in [0, 1]; 0 is neutral
    pub bias: f64,
    /// 0 negative, 0.5 neutral, 1 positive
    pub sentiment: f64,
    pub polarization: f64,
    /// Aggregate engagement signal, unbounded above 0
    pub engagement_score: f64,
    pub estimated_read_minutes: u32,
    /// How deep or analytical the piece is, in [0, 1]
    pub depth_score: f64,
}

impl Article {
    /// Age of the article relative to `now`, in whole hours.
    pub fn age_hours(&self, now: DateTime<Utc>) -> i64 {
        (now - self.published_at).num_hours()
    }
}

/// Normalized quality dimensions produced by the analysis collaborator.
///
/// `Default` carries the degraded-mode values substituted when the analyzer
/// is unavailable, so the gate keeps flowing instead of failing closed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityDimensions {
    pub toxicity: f64,
    pub bias: f64,
    pub sensationalism: f64,
    pub factuality: f64,
    pub quality: f64,
    pub credibility: f64,
}

impl Default for QualityDimensions {
    fn default() -> Self {
        Self {
            toxicity: 0.2,
            bias: 0.4,
            sensationalism: 0.3,
            factuality: 0.7,
            quality: 0.6,
            credibility: 0.7,
        }
    }
}

impl QualityDimensions {
    /// Clamp every dimension into [0, 1]. Analyzer output is clamped at this
    /// boundary before any filter evaluation or storage.
    pub fn clamped(self) -> Self {
        Self {
            toxicity: clamp01(self.toxicity),
            bias: clamp01(self.bias),
            sensationalism: clamp01(self.sensationalism),
            factuality: clamp01(self.factuality),
            quality: clamp01(self.quality),
            credibility: clamp01(self.credibility),
        }
    }
}

// ============================================
// Reader Profiles
// ============================================

/// Long-term model of a reader's demonstrated preferences.
///
/// One per user, created lazily on the first feedback event and updated by
/// bounded increments afterwards. Never reset by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingPattern {
    /// Additive per-category weight; unbounded and may go negative
    pub category_weights: HashMap<String, f64>,
    /// Most recently reinforced topics, newest first
    pub topics_of_interest: Vec<String>,
    pub preferred_sources: Vec<String>,
    /// Accepted distance from neutral bias, in [0.3, 1]
    pub bias_tolerance: f64,
    pub sentiment_preference: f64,
    /// Preferred article length in minutes
    pub reading_time_preference: u32,
    pub engagement_score: f64,
    pub total_articles_read: u64,
}

impl Default for ReadingPattern {
    fn default() -> Self {
        Self {
            category_weights: HashMap::new(),
            topics_of_interest: Vec::new(),
            preferred_sources: Vec::new(),
            bias_tolerance: 0.5,
            sentiment_preference: 0.5,
            reading_time_preference: 10,
            engagement_score: 0.5,
            total_articles_read: 0,
        }
    }
}

impl ReadingPattern {
    /// Apply one recorded interaction to this pattern.
    ///
    /// Category weights move by the feedback's signed increment, engagement
    /// stays clamped to [0, 1], and bias tolerance only ever narrows: positive
    /// feedback on low-bias content or negative feedback on high-bias content
    /// pulls it down by 0.05 toward the 0.3 floor.
    pub fn apply_feedback(&mut self, interaction: &Interaction) {
        let feedback = interaction.feedback;

        if let Some(category) = &interaction.category {
            if !category.is_empty() {
                *self.category_weights.entry(category.clone()).or_insert(0.0) +=
                    feedback.category_delta();
            }
        }

        self.engagement_score = clamp01(self.engagement_score + feedback.engagement_delta());

        if let Some(bias) = interaction.bias {
            let narrows = (feedback.is_positive() && bias <= LOW_BIAS)
                || (feedback.is_negative() && bias >= HIGH_BIAS);
            if narrows {
                self.bias_tolerance = (self.bias_tolerance - 0.05).max(MIN_BIAS_TOLERANCE);
            }
        }

        if feedback.is_positive() {
            for topic in &interaction.topics {
                self.reinforce_topic(topic);
            }
            if let Some(source) = &interaction.source {
                self.reinforce_source(source);
            }
            self.total_articles_read += 1;
        }
    }

    /// Move a topic to the front of the interest list, evicting the oldest
    /// entry once the capacity is reached.
    fn reinforce_topic(&mut self, topic: &str) {
        let topic = topic.trim();
        if topic.is_empty() {
            return;
        }

        if let Some(pos) = self
            .topics_of_interest
            .iter()
            .position(|t| t.eq_ignore_ascii_case(topic))
        {
            let existing = self.topics_of_interest.remove(pos);
            self.topics_of_interest.insert(0, existing);
        } else {
            self.topics_of_interest.insert(0, topic.to_string());
            self.topics_of_interest.truncate(MAX_TOPICS_OF_INTEREST);
        }
    }

    fn reinforce_source(&mut self, source: &str) {
        let source = source.trim();
        if source.is_empty() {
            return;
        }

        if let Some(pos) = self
            .preferred_sources
            .iter()
            .position(|s| s.eq_ignore_ascii_case(source))
        {
            let existing = self.preferred_sources.remove(pos);
            self.preferred_sources.insert(0, existing);
        } else {
            self.preferred_sources.insert(0, source.to_string());
            self.preferred_sources.truncate(MAX_PREFERRED_SOURCES);
        }
    }

    pub fn prefers_source(&self, source: &str) -> bool {
        self.preferred_sources
            .iter()
            .any(|s| s.eq_ignore_ascii_case(source))
    }
}

/// Transient model of what the reader wants right now.
///
/// Derived once per mood submission; a new submission replaces the previous
/// profile outright, it is never merged into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodProfile {
    pub want_depth: f64,
    pub positivity_pref: f64,
    pub length_tolerance: f64,
    pub energy_level: f64,
    pub curiosity_level: f64,
    /// Topic name to desired emphasis in [0, 1]
    pub topic_biases: HashMap<String, f64>,
    pub tone_words: Vec<String>,
}

impl Default for MoodProfile {
    fn default() -> Self {
        Self::neutral()
    }
}

impl MoodProfile {
    /// Neutral profile substituted when mood derivation fails.
    pub fn neutral() -> Self {
        Self {
            want_depth: 0.5,
            positivity_pref: 0.5,
            length_tolerance: 0.5,
            energy_level: 0.5,
            curiosity_level: 0.5,
            topic_biases: HashMap::new(),
            tone_words: Vec::new(),
        }
    }

    pub fn clamped(mut self) -> Self {
        self.want_depth = clamp01(self.want_depth);
        self.positivity_pref = clamp01(self.positivity_pref);
        self.length_tolerance = clamp01(self.length_tolerance);
        self.energy_level = clamp01(self.energy_level);
        self.curiosity_level = clamp01(self.curiosity_level);
        for value in self.topic_biases.values_mut() {
            *value = clamp01(*value);
        }
        self
    }
}

/// A saved mood the reader can re-apply by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodPreset {
    pub name: String,
    pub profile: MoodProfile,
    pub created_at: DateTime<Utc>,
}

// ============================================
// Recommendations
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    ContentBased,
    Collaborative,
    Hybrid,
    MoodBased,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::ContentBased => "content-based",
            Algorithm::Collaborative => "collaborative",
            Algorithm::Hybrid => "hybrid",
            Algorithm::MoodBased => "mood-based",
        }
    }
}

/// One scored candidate, produced fresh on every scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationScore {
    pub article_id: String,
    /// Final score in [0, 1] after clamping
    pub score: f64,
    /// Short human-readable explanations, deduplicated and capped
    pub reasons: Vec<String>,
    pub algorithm: Algorithm,
}

/// Presentational digest produced by the analysis collaborator. Never scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestSummary {
    pub summary: String,
    pub highlights: Vec<String>,
    pub topics: Vec<String>,
}

// ============================================
// Feedback
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Like,
    Dislike,
    Bookmark,
    Share,
    Hide,
    Report,
    Neutral,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Like => "like",
            FeedbackType::Dislike => "dislike",
            FeedbackType::Bookmark => "bookmark",
            FeedbackType::Share => "share",
            FeedbackType::Hide => "hide",
            FeedbackType::Report => "report",
            FeedbackType::Neutral => "neutral",
        }
    }

    /// Positive engagement feeds collaborative aggregation and topic
    /// reinforcement.
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            FeedbackType::Like | FeedbackType::Bookmark | FeedbackType::Share
        )
    }

    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            FeedbackType::Dislike | FeedbackType::Hide | FeedbackType::Report
        )
    }

    /// Signed increment applied to the article's category weight.
    pub fn category_delta(&self) -> f64 {
        match self {
            FeedbackType::Like => 1.0,
            FeedbackType::Bookmark => 1.0,
            FeedbackType::Share => 1.0,
            FeedbackType::Neutral => 0.2,
            FeedbackType::Dislike => -0.5,
            FeedbackType::Hide => -0.5,
            FeedbackType::Report => -1.0,
        }
    }

    /// Bounded increment applied to the pattern's engagement score.
    pub fn engagement_delta(&self) -> f64 {
        match self {
            FeedbackType::Like => 0.05,
            FeedbackType::Bookmark => 0.08,
            FeedbackType::Share => 0.10,
            FeedbackType::Dislike => -0.03,
            FeedbackType::Hide => -0.05,
            FeedbackType::Report => -0.10,
            FeedbackType::Neutral => 0.0,
        }
    }
}

/// Raw feedback as submitted by a client, validated before any write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEvent {
    pub user_id: Option<Uuid>,
    pub article_id: String,
    pub feedback: FeedbackType,
    #[serde(default)]
    pub value: Option<f64>,
}

/// A recorded interaction, denormalized with the article context the profile
/// update rule needs so replays never depend on article storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: Uuid,
    pub article_id: String,
    pub feedback: FeedbackType,
    pub value: f64,
    pub category: Option<String>,
    pub topics: Vec<String>,
    pub source: Option<String>,
    pub bias: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Interaction {
    /// Build a record for `article_id`, copying context from the article when
    /// it is still available in storage.
    pub fn from_article(
        user_id: Uuid,
        article_id: &str,
        article: Option<&Article>,
        feedback: FeedbackType,
        value: f64,
    ) -> Self {
        Self {
            user_id,
            article_id: article_id.to_string(),
            feedback,
            value,
            category: article.and_then(|a| a.category.clone()),
            topics: article.map(|a| a.topics.clone()).unwrap_or_default(),
            source: article.map(|a| a.source.clone()),
            bias: article.map(|a| a.bias),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interaction(feedback: FeedbackType, category: &str, bias: f64) -> Interaction {
        Interaction {
            user_id: Uuid::new_v4(),
            article_id: "a-1".to_string(),
            feedback,
            value: 1.0,
            category: Some(category.to_string()),
            topics: vec!["technology".to_string()],
            source: Some("The Daily Wire Report".to_string()),
            bias: Some(bias),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_quality_dimensions_clamped() {
        let dims = QualityDimensions {
            toxicity: -0.3,
            bias: 1.8,
            sensationalism: 0.5,
            factuality: f64::NAN,
            quality: 2.0,
            credibility: 0.9,
        }
        .clamped();

        assert_eq!(dims.toxicity, 0.0);
        assert_eq!(dims.bias, 1.0);
        assert_eq!(dims.sensationalism, 0.5);
        assert_eq!(dims.factuality, 0.0);
        assert_eq!(dims.quality, 1.0);
        assert_eq!(dims.credibility, 0.9);
    }

    #[test]
    fn test_category_weight_accumulates_signed() {
        let mut pattern = ReadingPattern::default();

        pattern.apply_feedback(&interaction(FeedbackType::Like, "politics", 0.5));
        pattern.apply_feedback(&interaction(FeedbackType::Like, "politics", 0.5));
        pattern.apply_feedback(&interaction(FeedbackType::Dislike, "politics", 0.5));

        assert!((pattern.category_weights["politics"] - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_engagement_score_stays_bounded() {
        let mut pattern = ReadingPattern::default();

        // Pile on positive feedback far past the cap
        for _ in 0..50 {
            pattern.apply_feedback(&interaction(FeedbackType::Share, "science", 0.5));
        }
        assert!(pattern.engagement_score <= 1.0);
        assert_eq!(pattern.engagement_score, 1.0);

        // Then hammer it with negative feedback past the floor
        for _ in 0..50 {
            pattern.apply_feedback(&interaction(FeedbackType::Report, "science", 0.5));
        }
        assert!(pattern.engagement_score >= 0.0);
        assert_eq!(pattern.engagement_score, 0.0);
    }

    #[test]
    fn test_bias_tolerance_narrows_and_floors() {
        let mut pattern = ReadingPattern::default();
        assert_eq!(pattern.bias_tolerance, 0.5);

        // Positive feedback on low-bias content narrows tolerance
        pattern.apply_feedback(&interaction(FeedbackType::Like, "world", 0.2));
        assert!((pattern.bias_tolerance - 0.45).abs() < 1e-9);

        // Negative feedback on high-bias content narrows it as well
        pattern.apply_feedback(&interaction(FeedbackType::Hide, "world", 0.9));
        assert!((pattern.bias_tolerance - 0.40).abs() < 1e-9);

        // It floors at 0.3 no matter how many updates arrive
        for _ in 0..10 {
            pattern.apply_feedback(&interaction(FeedbackType::Like, "world", 0.1));
        }
        assert_eq!(pattern.bias_tolerance, MIN_BIAS_TOLERANCE);
    }

    #[test]
    fn test_bias_tolerance_never_widens() {
        let mut pattern = ReadingPattern::default();

        // Positive feedback on high-bias content leaves tolerance alone
        pattern.apply_feedback(&interaction(FeedbackType::Like, "opinion", 0.9));
        assert_eq!(pattern.bias_tolerance, 0.5);

        // So does negative feedback on low-bias content
        pattern.apply_feedback(&interaction(FeedbackType::Dislike, "opinion", 0.1));
        assert_eq!(pattern.bias_tolerance, 0.5);
    }

    #[test]
    fn test_topics_capacity_keeps_most_recent() {
        let mut pattern = ReadingPattern::default();

        for i in 0..(MAX_TOPICS_OF_INTEREST + 5) {
            let mut event = interaction(FeedbackType::Like, "tech", 0.5);
            event.topics = vec![format!("topic-{}", i)];
            pattern.apply_feedback(&event);
        }

        assert_eq!(pattern.topics_of_interest.len(), MAX_TOPICS_OF_INTEREST);
        assert_eq!(pattern.topics_of_interest[0], "topic-24");
        assert!(!pattern
            .topics_of_interest
            .contains(&"topic-0".to_string()));
    }

    #[test]
    fn test_reinforced_topic_moves_to_front() {
        let mut pattern = ReadingPattern::default();

        let mut first = interaction(FeedbackType::Like, "tech", 0.5);
        first.topics = vec!["ai".to_string(), "chips".to_string()];
        pattern.apply_feedback(&first);

        let mut second = interaction(FeedbackType::Like, "tech", 0.5);
        second.topics = vec!["AI".to_string()];
        pattern.apply_feedback(&second);

        assert_eq!(pattern.topics_of_interest[0], "ai");
        assert_eq!(pattern.topics_of_interest.len(), 2);
    }

    #[test]
    fn test_negative_feedback_does_not_reinforce() {
        let mut pattern = ReadingPattern::default();

        pattern.apply_feedback(&interaction(FeedbackType::Dislike, "sports", 0.5));

        assert!(pattern.topics_of_interest.is_empty());
        assert!(pattern.preferred_sources.is_empty());
        assert_eq!(pattern.total_articles_read, 0);
    }

    #[test]
    fn test_mood_profile_clamped() {
        let mut profile = MoodProfile::neutral();
        profile.want_depth = 1.4;
        profile.positivity_pref = -0.2;
        profile.topic_biases.insert("technology".to_string(), 3.0);

        let clamped = profile.clamped();
        assert_eq!(clamped.want_depth, 1.0);
        assert_eq!(clamped.positivity_pref, 0.0);
        assert_eq!(clamped.topic_biases["technology"], 1.0);
    }

    #[test]
    fn test_feedback_type_roundtrip_labels() {
        assert_eq!(FeedbackType::Like.as_str(), "like");
        assert_eq!(FeedbackType::Report.as_str(), "report");
        assert!(FeedbackType::Bookmark.is_positive());
        assert!(FeedbackType::Hide.is_negative());
        assert!(!FeedbackType::Neutral.is_positive());
        assert!(!FeedbackType::Neutral.is_negative());
    }
}
