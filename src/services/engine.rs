// ============================================
// Personalization Engine (facade)
// ============================================
//
// Wires the pipeline together:
//
//   storage → QualityGate → ContentScorer        ┐
//             peer history → CollaborativeScorer ┴→ HybridBlender → ranked list
//             current mood → MoodScorer → mood list
//
// plus the feedback ingress that updates reading patterns and kicks off a
// background re-score, the anonymous trending fallback, and live feed
// session assembly over the same storage and gate.
//
// Degradation policy: storage read failures fall back to empty result
// sets, write failures and analyzer quota exhaustion surface to the
// caller.

use crate::config::Config;
use crate::db::{ArticleFilter, ArticleStore};
use crate::error::{AppError, Result};
use crate::models::{
    Algorithm, Article, DigestSummary, FeedbackEvent, Interaction, MoodProfile, ReadingPattern,
    RecommendationScore,
};
use crate::services::analysis::AnalysisProvider;
use crate::services::feed::{FeedArticle, FeedEvent, FeedEventBus, FeedSession, FeedSource};
use crate::services::profile::mood::MoodService;
use crate::services::profile::{InteractionSnapshot, ProfileService};
use crate::services::quality_gate::QualityGate;
use crate::services::scoring::{CollaborativeScorer, ContentScorer, HybridBlender, MoodScorer};
use crate::services::trending::TrendingService;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Articles pulled from storage per scoring pass, before gating.
const CANDIDATE_POOL_SIZE: usize = 100;
/// Trending fallback scores start here and step down per rank position,
/// keeping the list strictly ordered without inventing precision.
const TRENDING_TOP_SCORE: f64 = 0.8;
const TRENDING_SCORE_STEP: f64 = 0.015;
const TRENDING_SCORE_FLOOR: f64 = 0.3;

/// One in-flight flag per (user, algorithm). A second trigger while a pass
/// is running is suppressed, not queued; passes read a snapshot and write
/// nothing, so there is no shared state to lock.
struct InFlightRegistry {
    passes: Arc<DashMap<(Uuid, Algorithm), ()>>,
}

impl InFlightRegistry {
    fn new() -> Self {
        Self {
            passes: Arc::new(DashMap::new()),
        }
    }

    fn begin(&self, user_id: Uuid, algorithm: Algorithm) -> Option<InFlightPass> {
        match self.passes.entry((user_id, algorithm)) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(InFlightPass {
                    passes: self.passes.clone(),
                    key: (user_id, algorithm),
                })
            }
        }
    }
}

/// Clears the in-flight flag when the pass finishes, on every exit path.
struct InFlightPass {
    passes: Arc<DashMap<(Uuid, Algorithm), ()>>,
    key: (Uuid, Algorithm),
}

impl Drop for InFlightPass {
    fn drop(&mut self) {
        self.passes.remove(&self.key);
    }
}

pub struct PersonalizationEngine {
    config: Config,
    store: Arc<dyn ArticleStore>,
    analysis: Arc<dyn AnalysisProvider>,
    gate: QualityGate,
    profiles: ProfileService,
    moods: MoodService,
    content: ContentScorer,
    collaborative: CollaborativeScorer,
    mood_scorer: MoodScorer,
    blender: HybridBlender,
    trending: TrendingService,
    events: FeedEventBus,
    in_flight: InFlightRegistry,
}

impl PersonalizationEngine {
    pub fn new(
        config: Config,
        store: Arc<dyn ArticleStore>,
        analysis: Arc<dyn AnalysisProvider>,
    ) -> Arc<Self> {
        let gate = QualityGate::new(config.gate.clone(), analysis.clone());
        let profiles = ProfileService::new(store.clone());
        let moods = MoodService::new(analysis.clone());
        let content = ContentScorer::new(config.scoring.clone());
        let collaborative =
            CollaborativeScorer::new(store.clone(), config.scoring.similarity_band);
        let mood_scorer = MoodScorer::new(config.scoring.clone());
        let blender = HybridBlender::new(config.scoring.clone());
        let trending = TrendingService::new(store.clone());
        let events = FeedEventBus::new(config.feed.event_capacity);

        Arc::new(Self {
            config,
            store,
            analysis,
            gate,
            profiles,
            moods,
            content,
            collaborative,
            mood_scorer,
            blender,
            trending,
            events,
            in_flight: InFlightRegistry::new(),
        })
    }

    pub fn moods(&self) -> &MoodService {
        &self.moods
    }

    pub fn profiles(&self) -> &ProfileService {
        &self.profiles
    }

    pub fn events(&self) -> &FeedEventBus {
        &self.events
    }

    /// Ranked hybrid recommendations for a reader.
    ///
    /// Anonymous callers get the trending fallback, never an error. A hybrid
    /// pass already in flight for this user suppresses the trigger and
    /// returns an empty list.
    pub async fn recommendations(
        &self,
        user_id: Option<Uuid>,
    ) -> Result<Vec<RecommendationScore>> {
        let Some(user_id) = user_id else {
            return self.trending_fallback().await;
        };

        let Some(_pass) = self.in_flight.begin(user_id, Algorithm::Hybrid) else {
            debug!(user_id = %user_id, "Hybrid pass already in flight, trigger suppressed");
            return Ok(Vec::new());
        };

        let pattern = match self.profiles.get_or_create(user_id).await {
            Ok(pattern) => pattern,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "Pattern load failed, scoring with defaults");
                ReadingPattern::default()
            }
        };
        let snapshot = match self.profiles.interaction_snapshot(user_id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "Interaction history unavailable, scoring without it");
                InteractionSnapshot::default()
            }
        };

        let candidates = self.candidates().await?;

        let (content_scores, collaborative_scores) = tokio::join!(
            async {
                self.content.score(
                    &candidates,
                    &pattern,
                    &snapshot.topic_weights,
                    &snapshot.seen_article_ids,
                )
            },
            self.collaborative.score(user_id, &pattern)
        );
        let collaborative_scores = match collaborative_scores {
            Ok(scores) => scores,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "Collaborative pass failed, blending content only");
                Vec::new()
            }
        };

        let blended = self.blender.blend(&content_scores, &collaborative_scores);
        info!(
            user_id = %user_id,
            candidates = candidates.len(),
            results = blended.len(),
            "Hybrid recommendation pass complete"
        );
        Ok(blended)
    }

    /// Rank candidates against the reader's current mood; a session with no
    /// submitted mood scores against the neutral profile.
    pub async fn mood_recommendations(&self, user_id: Uuid) -> Result<Vec<RecommendationScore>> {
        let Some(_pass) = self.in_flight.begin(user_id, Algorithm::MoodBased) else {
            debug!(user_id = %user_id, "Mood pass already in flight, trigger suppressed");
            return Ok(Vec::new());
        };

        let mood = self
            .moods
            .current(user_id)
            .unwrap_or_else(MoodProfile::neutral);
        let candidates = self.candidates().await?;
        Ok(self.mood_scorer.score(&candidates, &mood))
    }

    /// Derive and activate a mood profile from a free-text submission.
    pub async fn submit_mood(
        &self,
        user_id: Uuid,
        text: &str,
        emoji: Option<&str>,
        tags: &[String],
    ) -> Result<MoodProfile> {
        self.moods.submit(user_id, text, emoji, tags).await
    }

    /// Feedback ingress. Validates ids, applies the pattern update rule and
    /// the interaction log (write failures surface, prior state untouched),
    /// then fires off a background hybrid re-score for the user.
    pub async fn submit_feedback(self: &Arc<Self>, event: FeedbackEvent) -> Result<()> {
        let user_id = event
            .user_id
            .ok_or_else(|| AppError::Validation("feedback requires a user id".to_string()))?;
        let article_id = event.article_id.trim().to_string();
        if article_id.is_empty() {
            return Err(AppError::Validation(
                "feedback requires an article id".to_string(),
            ));
        }

        let article = match self.store.fetch_article(&article_id).await {
            Ok(article) => article,
            Err(err) => {
                warn!(
                    article_id = %article_id,
                    error = %err,
                    "Article lookup failed, recording feedback without context"
                );
                None
            }
        };
        let interaction = Interaction::from_article(
            user_id,
            &article_id,
            article.as_ref(),
            event.feedback,
            event.value.unwrap_or(1.0),
        );

        self.profiles.apply_feedback(&interaction).await?;
        self.store.record_interaction(interaction).await?;
        info!(
            user_id = %user_id,
            article_id = %article_id,
            feedback = event.feedback.as_str(),
            "Feedback recorded"
        );

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = engine.recommendations(Some(user_id)).await {
                warn!(user_id = %user_id, error = %err, "Background re-score failed");
            }
        });

        Ok(())
    }

    /// Open a live feed session backed by the engine's storage and gate.
    pub async fn open_feed(self: &Arc<Self>, user_id: Option<Uuid>) -> Result<FeedSession> {
        let source = Arc::new(EngineFeedSource {
            engine: Arc::clone(self),
        });
        FeedSession::open(source, &self.events, self.config.feed.clone(), user_id).await
    }

    /// Gate an article and push it to every live feed session. Returns
    /// whether the article was published.
    pub async fn publish_breaking(&self, article: Article) -> Result<bool> {
        let decision = self.gate.evaluate(&article).await?;
        if !decision.passes {
            debug!(
                article_id = %article.id,
                reason = ?decision.rejection_reason,
                "Breaking article rejected by gate"
            );
            return Ok(false);
        }
        self.events.publish(FeedEvent::BreakingNews(article));
        Ok(true)
    }

    /// Presentational digest over the reader's current top recommendations.
    /// Never fed back into scoring.
    pub async fn digest(&self, user_id: Option<Uuid>) -> Result<DigestSummary> {
        let ranked = self.recommendations(user_id).await?;
        let mut articles = Vec::with_capacity(ranked.len());
        for score in &ranked {
            if let Ok(Some(article)) = self.store.fetch_article(&score.article_id).await {
                articles.push(article);
            }
        }
        self.analysis.summarize(&articles).await
    }

    /// Gated candidate pool for the scoring passes. Storage read failures
    /// degrade to an empty pool; analyzer quota exhaustion propagates.
    async fn candidates(&self) -> Result<Vec<Article>> {
        let filter = ArticleFilter::default().with_limit(CANDIDATE_POOL_SIZE);
        let raw = match self.store.query_articles(&filter).await {
            Ok(articles) => articles,
            Err(err) => {
                warn!(error = %err, "Candidate query failed, scoring an empty pool");
                Vec::new()
            }
        };
        self.gate.admit(raw).await
    }

    /// Non-personalized path for anonymous readers and cold starts.
    async fn trending_fallback(&self) -> Result<Vec<RecommendationScore>> {
        let ranked = match self
            .trending
            .top(self.config.scoring.max_recommendations)
            .await
        {
            Ok(articles) => articles,
            Err(err) => {
                warn!(error = %err, "Trending query failed, returning an empty list");
                Vec::new()
            }
        };

        let scores = self
            .gate
            .screen(ranked)
            .into_iter()
            .enumerate()
            .map(|(rank, article)| RecommendationScore {
                article_id: article.id,
                score: (TRENDING_TOP_SCORE - rank as f64 * TRENDING_SCORE_STEP)
                    .max(TRENDING_SCORE_FLOOR),
                reasons: vec!["trending now".to_string()],
                algorithm: Algorithm::Hybrid,
            })
            .collect();
        Ok(scores)
    }
}

/// Feed pages come from the same storage the scorers read, screened by the
/// gate's lexical filters only so page assembly never depends on analyzer
/// quota.
struct EngineFeedSource {
    engine: Arc<PersonalizationEngine>,
}

#[async_trait]
impl FeedSource for EngineFeedSource {
    async fn fetch_page(
        &self,
        user_id: Option<Uuid>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<FeedArticle>> {
        let filter = ArticleFilter::since(since).with_limit(limit);
        let articles = self.engine.store.query_articles(&filter).await?;
        let screened = self.engine.gate.screen(articles);
        debug!(user_id = ?user_id, page = screened.len(), "Feed page fetched");
        Ok(screened.into_iter().map(FeedArticle::new).collect())
    }
}
