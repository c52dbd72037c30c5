// ============================================
// Feed Merge State
// ============================================
//
// Insert-or-queue bookkeeping for one live feed:
// - new articles land at the top of the visible list only while the
//   reader sits at the top; otherwise they wait in a pending queue
//   until the reader asks for them
// - a published_at watermark keeps refreshes incremental
// - reader edits (like, bookmark, scroll) are applied to the article's
//   record wherever it lives, so a refresh can never revert them
//
// The machine is Idle -> Fetching -> (Inserted | Queued) -> Idle. It is
// synchronous and single-owner; the session wraps it in an async mutex.

use crate::models::{Article, RecommendationScore};
use crate::utils::clamp01;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// One feed entry: the immutable article plus the per-session reader
/// state layered on top of it.
#[derive(Debug, Clone)]
pub struct FeedArticle {
    pub article: Article,
    pub is_liked: bool,
    pub is_bookmarked: bool,
    /// Deepest scroll position the reader reached, in [0, 1]
    pub scroll_depth: f64,
    /// Score from the ranking pass that produced this entry, if any
    pub ranking_score: Option<f64>,
    pub reasons: Vec<String>,
}

impl FeedArticle {
    pub fn new(article: Article) -> Self {
        Self {
            article,
            is_liked: false,
            is_bookmarked: false,
            scroll_depth: 0.0,
            ranking_score: None,
            reasons: Vec::new(),
        }
    }

    pub fn ranked(article: Article, score: &RecommendationScore) -> Self {
        Self {
            ranking_score: Some(score.score),
            reasons: score.reasons.clone(),
            ..Self::new(article)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    /// Waiting for the next refresh trigger
    Idle,
    /// A fetch is in flight
    Fetching,
    /// The last fetch landed directly in the visible list
    Inserted,
    /// The last fetch queued behind the reader's position
    Queued,
}

/// What a completed merge did with the fetched articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Prepended to the visible list
    Inserted(usize),
    /// Queued for a later `apply_pending`
    Queued(usize),
    /// Nothing new after deduplication
    Empty,
}

/// Point-in-time copy of a session's feed for rendering.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub articles: Vec<FeedArticle>,
    pub pending_count: usize,
    pub watermark: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct FeedState {
    visible: Vec<FeedArticle>,
    pending: Vec<FeedArticle>,
    /// Newest published_at already incorporated; None forces a full fetch
    watermark: Option<DateTime<Utc>>,
    at_top: bool,
    phase: FeedPhase,
}

impl Default for FeedState {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedState {
    /// Sessions open with the reader at the top of an empty feed.
    pub fn new() -> Self {
        Self {
            visible: Vec::new(),
            pending: Vec::new(),
            watermark: None,
            at_top: true,
            phase: FeedPhase::Idle,
        }
    }

    pub fn visible(&self) -> &[FeedArticle] {
        &self.visible
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub fn is_at_top(&self) -> bool {
        self.at_top
    }

    pub fn set_at_top(&mut self, at_top: bool) {
        self.at_top = at_top;
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            articles: self.visible.clone(),
            pending_count: self.pending.len(),
            watermark: self.watermark,
        }
    }

    pub fn begin_fetch(&mut self) {
        self.phase = FeedPhase::Fetching;
    }

    /// Return to Idle after the session has observed the merge outcome.
    pub fn settle(&mut self) {
        self.phase = FeedPhase::Idle;
    }

    /// Manual refresh drops the incremental state before re-fetching:
    /// watermark back to None (full fetch) and the pending queue cleared.
    /// Runs after any in-flight automatic merge, so the manual fetch is
    /// the last writer of the watermark.
    pub fn reset_for_manual(&mut self) {
        self.watermark = None;
        self.pending.clear();
    }

    /// Merge a fetch result. Advances the watermark to the newest
    /// timestamp returned, then routes the unseen remainder through the
    /// insert-or-queue path.
    ///
    /// Fetches request strictly-newer-than-watermark articles, so plain
    /// assignment keeps the watermark monotonic outside manual resets.
    pub fn merge_fetched(&mut self, mut fetched: Vec<FeedArticle>) -> MergeOutcome {
        let now = Utc::now();
        let requested = fetched.len();
        fetched.retain(|entry| entry.article.published_at <= now);
        if fetched.len() < requested {
            debug!(
                dropped = requested - fetched.len(),
                "Dropped future-dated articles from fetch result"
            );
        }

        if let Some(newest) = fetched.iter().map(|entry| entry.article.published_at).max() {
            self.watermark = Some(newest);
        }

        let fresh = self.dedup_new(fetched);
        self.insert_or_queue(fresh)
    }

    /// Breaking-news entry point. Same insert-or-queue path as a fetch,
    /// but the watermark stays put: the event bus is at-least-once and
    /// skips nothing on purpose, so the next fetch must still cover the
    /// interval and duplicates are dropped here by id.
    pub fn push_breaking(&mut self, entry: FeedArticle) -> MergeOutcome {
        if entry.article.published_at > Utc::now() {
            return MergeOutcome::Empty;
        }
        let fresh = self.dedup_new(vec![entry]);
        self.insert_or_queue(fresh)
    }

    /// Move the entire pending queue to the front of the visible list.
    /// User-triggered only; nothing in the refresh path calls this.
    pub fn apply_pending(&mut self) -> usize {
        let count = self.pending.len();
        if count == 0 {
            return 0;
        }
        let mut merged: Vec<FeedArticle> = self.pending.drain(..).collect();
        merged.extend(self.visible.drain(..));
        self.visible = merged;
        count
    }

    pub fn set_liked(&mut self, article_id: &str, liked: bool) -> bool {
        self.edit(article_id, |entry| entry.is_liked = liked)
    }

    pub fn set_bookmarked(&mut self, article_id: &str, bookmarked: bool) -> bool {
        self.edit(article_id, |entry| entry.is_bookmarked = bookmarked)
    }

    /// Record how far the reader scrolled; the deepest position wins.
    pub fn record_scroll(&mut self, article_id: &str, depth: f64) -> bool {
        let depth = clamp01(depth);
        self.edit(article_id, |entry| {
            entry.scroll_depth = entry.scroll_depth.max(depth)
        })
    }

    /// Apply an edit to the article's record in both the visible list and
    /// the pending queue, so no later merge can surface a stale copy.
    fn edit(&mut self, article_id: &str, apply: impl Fn(&mut FeedArticle)) -> bool {
        let mut touched = false;
        for entry in self.visible.iter_mut().chain(self.pending.iter_mut()) {
            if entry.article.id == article_id {
                apply(entry);
                touched = true;
            }
        }
        touched
    }

    /// Drop entries whose id is already tracked, in the batch itself or in
    /// either list.
    fn dedup_new(&self, fetched: Vec<FeedArticle>) -> Vec<FeedArticle> {
        let mut seen: HashSet<String> = self
            .visible
            .iter()
            .chain(self.pending.iter())
            .map(|entry| entry.article.id.clone())
            .collect();

        fetched
            .into_iter()
            .filter(|entry| seen.insert(entry.article.id.clone()))
            .collect()
    }

    fn insert_or_queue(&mut self, fresh: Vec<FeedArticle>) -> MergeOutcome {
        if fresh.is_empty() {
            self.phase = FeedPhase::Idle;
            return MergeOutcome::Empty;
        }

        let count = fresh.len();
        if self.at_top {
            self.pending.clear();
            let mut merged = fresh;
            merged.extend(self.visible.drain(..));
            self.visible = merged;
            self.phase = FeedPhase::Inserted;
            MergeOutcome::Inserted(count)
        } else {
            let mut merged = fresh;
            merged.extend(self.pending.drain(..));
            self.pending = merged;
            self.phase = FeedPhase::Queued;
            MergeOutcome::Queued(count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn article(id: &str, minutes_ago: i64) -> Article {
        let published = Utc::now() - Duration::minutes(minutes_ago);
        Article {
            id: id.to_string(),
            title: format!("Headline for {id}"),
            body: "Body text long enough for a feed entry.".to_string(),
            source: "Wire Desk".to_string(),
            source_url: "https://example.com/a".to_string(),
            category: Some("world".to_string()),
            topics: vec!["world".to_string()],
            published_at: published,
            created_at: published,
            content_quality: 0.7,
            credibility: 0.7,
            bias: 0.3,
            sentiment: 0.5,
            polarization: 0.2,
            engagement_score: 5.0,
            estimated_read_minutes: 4,
            depth_score: 0.5,
        }
    }

    fn entries(specs: &[(&str, i64)]) -> Vec<FeedArticle> {
        specs
            .iter()
            .map(|(id, minutes_ago)| FeedArticle::new(article(id, *minutes_ago)))
            .collect()
    }

    #[test]
    fn test_at_top_insert_grows_visible_by_fetch_length() {
        let mut state = FeedState::new();
        state.merge_fetched(entries(&[("a-old", 120)]));

        let outcome = state.merge_fetched(entries(&[("a-1", 5), ("a-2", 10), ("a-3", 15)]));

        assert_eq!(outcome, MergeOutcome::Inserted(3));
        assert_eq!(state.visible().len(), 4);
        assert_eq!(state.pending_count(), 0);
        // Newest-first fetch order is preserved at the front.
        assert_eq!(state.visible()[0].article.id, "a-1");
        assert_eq!(state.visible()[3].article.id, "a-old");
    }

    #[test]
    fn test_scrolled_down_fetch_queues_without_touching_visible() {
        let mut state = FeedState::new();
        state.merge_fetched(entries(&[("a-old", 120)]));
        state.set_at_top(false);

        let outcome = state.merge_fetched(entries(&[("a-1", 5), ("a-2", 10)]));

        assert_eq!(outcome, MergeOutcome::Queued(2));
        assert_eq!(state.visible().len(), 1);
        assert_eq!(state.visible()[0].article.id, "a-old");
        assert_eq!(state.pending_count(), 2);
    }

    #[test]
    fn test_apply_pending_moves_queue_to_front() {
        let mut state = FeedState::new();
        state.merge_fetched(entries(&[("a-old", 120)]));
        state.set_at_top(false);
        state.merge_fetched(entries(&[("a-1", 5), ("a-2", 10)]));

        let applied = state.apply_pending();

        assert_eq!(applied, 2);
        assert_eq!(state.pending_count(), 0);
        let ids: Vec<&str> = state
            .visible()
            .iter()
            .map(|entry| entry.article.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a-1", "a-2", "a-old"]);
    }

    #[test]
    fn test_apply_pending_on_empty_queue_is_a_noop() {
        let mut state = FeedState::new();
        state.merge_fetched(entries(&[("a-old", 120)]));

        assert_eq!(state.apply_pending(), 0);
        assert_eq!(state.visible().len(), 1);
    }

    #[test]
    fn test_watermark_tracks_newest_returned_timestamp() {
        let mut state = FeedState::new();
        let batch = entries(&[("a-1", 5), ("a-2", 60)]);
        let newest = batch[0].article.published_at;

        state.merge_fetched(batch);

        assert_eq!(state.watermark(), Some(newest));
    }

    #[test]
    fn test_empty_fetch_leaves_watermark_untouched() {
        let mut state = FeedState::new();
        state.merge_fetched(entries(&[("a-1", 5)]));
        let watermark = state.watermark();

        let outcome = state.merge_fetched(Vec::new());

        assert_eq!(outcome, MergeOutcome::Empty);
        assert_eq!(state.watermark(), watermark);
    }

    #[test]
    fn test_manual_reset_clears_watermark_and_pending() {
        let mut state = FeedState::new();
        state.merge_fetched(entries(&[("a-1", 5)]));
        state.set_at_top(false);
        state.merge_fetched(entries(&[("a-2", 3)]));
        assert_eq!(state.pending_count(), 1);

        state.reset_for_manual();

        assert!(state.watermark().is_none());
        assert_eq!(state.pending_count(), 0);
        // Visible content survives the reset.
        assert_eq!(state.visible().len(), 1);
    }

    #[test]
    fn test_duplicate_ids_are_dropped_on_merge() {
        let mut state = FeedState::new();
        state.merge_fetched(entries(&[("a-1", 10)]));

        // One already visible, one repeated inside the batch, one new.
        let outcome =
            state.merge_fetched(entries(&[("a-1", 10), ("a-2", 5), ("a-2", 5), ("a-3", 2)]));

        assert_eq!(outcome, MergeOutcome::Inserted(2));
        assert_eq!(state.visible().len(), 3);
    }

    #[test]
    fn test_future_dated_articles_never_enter_the_feed() {
        let mut state = FeedState::new();
        let outcome = state.merge_fetched(entries(&[("a-future", -90)]));

        assert_eq!(outcome, MergeOutcome::Empty);
        assert!(state.visible().is_empty());
        assert!(state.watermark().is_none());
    }

    #[test]
    fn test_breaking_news_does_not_advance_watermark() {
        let mut state = FeedState::new();
        state.merge_fetched(entries(&[("a-1", 60)]));
        let watermark = state.watermark();

        let outcome = state.push_breaking(FeedArticle::new(article("a-breaking", 1)));

        assert_eq!(outcome, MergeOutcome::Inserted(1));
        assert_eq!(state.visible()[0].article.id, "a-breaking");
        assert_eq!(state.watermark(), watermark);
    }

    #[test]
    fn test_breaking_news_duplicate_id_is_dropped() {
        let mut state = FeedState::new();
        state.push_breaking(FeedArticle::new(article("a-1", 5)));

        let outcome = state.push_breaking(FeedArticle::new(article("a-1", 5)));

        assert_eq!(outcome, MergeOutcome::Empty);
        assert_eq!(state.visible().len(), 1);
    }

    #[test]
    fn test_local_edits_reach_both_visible_and_pending() {
        let mut state = FeedState::new();
        state.merge_fetched(entries(&[("a-visible", 60)]));
        state.set_at_top(false);
        state.merge_fetched(entries(&[("a-pending", 5)]));

        assert!(state.set_liked("a-visible", true));
        assert!(state.set_bookmarked("a-pending", true));
        assert!(!state.set_liked("a-unknown", true));

        assert!(state.visible()[0].is_liked);
        assert_eq!(state.apply_pending(), 1);
        assert!(state.visible()[0].is_bookmarked);
    }

    #[test]
    fn test_scroll_depth_keeps_deepest_position() {
        let mut state = FeedState::new();
        state.merge_fetched(entries(&[("a-1", 5)]));

        state.record_scroll("a-1", 0.6);
        state.record_scroll("a-1", 0.3);
        state.record_scroll("a-1", 1.7);

        assert_eq!(state.visible()[0].scroll_depth, 1.0);
    }

    #[test]
    fn test_phase_walks_idle_fetching_outcome_idle() {
        let mut state = FeedState::new();
        assert_eq!(state.phase(), FeedPhase::Idle);

        state.begin_fetch();
        assert_eq!(state.phase(), FeedPhase::Fetching);

        state.merge_fetched(entries(&[("a-1", 5)]));
        assert_eq!(state.phase(), FeedPhase::Inserted);

        state.settle();
        assert_eq!(state.phase(), FeedPhase::Idle);

        state.set_at_top(false);
        state.begin_fetch();
        state.merge_fetched(entries(&[("a-2", 3)]));
        assert_eq!(state.phase(), FeedPhase::Queued);
    }

    #[test]
    fn test_ranked_entry_carries_score_and_reasons() {
        let score = RecommendationScore {
            article_id: "a-1".to_string(),
            score: 0.82,
            reasons: vec!["recent news".to_string()],
            algorithm: crate::models::Algorithm::Hybrid,
        };

        let entry = FeedArticle::ranked(article("a-1", 5), &score);

        assert_eq!(entry.ranking_score, Some(0.82));
        assert_eq!(entry.reasons, vec!["recent news".to_string()]);
        assert!(!entry.is_liked);
    }
}
