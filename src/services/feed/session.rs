// ============================================
// Feed Session
// ============================================
//
// One live feed per reader. A single worker task owns the refresh
// schedule and drains every trigger in order:
// - the auto-refresh ticker (default 300s)
// - manual refresh requests from the session handle
// - breaking-news events from the bus
//
// Running them through one loop serializes automatic and manual
// refreshes for the session, so a manual refresh that arrives while an
// automatic one is in flight waits for it, then resets the watermark
// and the pending queue. The last completed fetch owns the watermark.
//
// Teardown sets a closed flag before signalling the worker; a fetch
// result that lands after close is discarded, never merged.

use crate::config::FeedConfig;
use crate::error::{AppError, Result};
use crate::models::Article;
use crate::utils::retry::with_retry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::{FeedEvent, FeedEventBus};
use super::merger::{FeedArticle, FeedSnapshot, FeedState, MergeOutcome};

/// Manual refreshes waiting on the worker; beyond this, callers see
/// backpressure on `refresh_now`.
const REFRESH_QUEUE_DEPTH: usize = 8;

/// Where a session gets its articles. The engine implements this over
/// the ranked recommendation pipeline; tests script it.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch up to `limit` feed entries strictly newer than `since`,
    /// newest first. `None` asks for a full page.
    async fn fetch_page(
        &self,
        user_id: Option<Uuid>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<FeedArticle>>;
}

struct RefreshRequest {
    done: oneshot::Sender<Result<MergeOutcome>>,
}

/// Handle to a live feed. Dropping it tears the session down; the
/// background worker is aborted and any in-flight fetch is discarded.
#[derive(Debug)]
pub struct FeedSession {
    user_id: Option<Uuid>,
    state: Arc<Mutex<FeedState>>,
    requests: mpsc::Sender<RefreshRequest>,
    closed: Arc<AtomicBool>,
    shutdown: watch::Sender<()>,
    worker: JoinHandle<()>,
}

impl FeedSession {
    /// Open a session: run the initial load (with bounded retry), then
    /// start the refresh worker.
    pub async fn open(
        source: Arc<dyn FeedSource>,
        events: &FeedEventBus,
        config: FeedConfig,
        user_id: Option<Uuid>,
    ) -> Result<Self> {
        let policy = config.initial_load_policy();
        let initial = with_retry(&policy, || source.fetch_page(user_id, None, config.page_size))
            .await
            .map_err(|err| AppError::FeedRefresh(err.to_string()))?;

        let mut state = FeedState::new();
        state.merge_fetched(initial);
        state.settle();
        info!(
            user_id = ?user_id,
            visible = state.visible().len(),
            "Feed session opened"
        );

        let state = Arc::new(Mutex::new(state));
        let closed = Arc::new(AtomicBool::new(false));
        let (request_tx, request_rx) = mpsc::channel(REFRESH_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let event_stream = events.subscribe_stream();

        let worker = SessionWorker {
            user_id,
            source,
            state: state.clone(),
            closed: closed.clone(),
            page_size: config.page_size,
        };
        let handle = tokio::spawn(worker.run(
            config.auto_refresh_interval(),
            request_rx,
            shutdown_rx,
            event_stream,
        ));

        Ok(Self {
            user_id,
            state,
            requests: request_tx,
            closed,
            shutdown: shutdown_tx,
            worker: handle,
        })
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending_count()
    }

    /// Report whether the reader is at the top of the feed; this decides
    /// whether the next refresh inserts or queues.
    pub async fn set_at_top(&self, at_top: bool) {
        self.state.lock().await.set_at_top(at_top);
    }

    /// Surface the queued articles at the top of the visible feed.
    pub async fn apply_pending(&self) -> usize {
        self.state.lock().await.apply_pending()
    }

    pub async fn set_liked(&self, article_id: &str, liked: bool) -> bool {
        self.state.lock().await.set_liked(article_id, liked)
    }

    pub async fn set_bookmarked(&self, article_id: &str, bookmarked: bool) -> bool {
        self.state.lock().await.set_bookmarked(article_id, bookmarked)
    }

    pub async fn record_scroll(&self, article_id: &str, depth: f64) -> bool {
        self.state.lock().await.record_scroll(article_id, depth)
    }

    /// Run a manual refresh and wait for its outcome. Resets the
    /// watermark and pending queue before fetching, after any automatic
    /// refresh already in flight has completed.
    pub async fn refresh_now(&self) -> Result<MergeOutcome> {
        let (done, outcome) = oneshot::channel();
        self.requests
            .send(RefreshRequest { done })
            .await
            .map_err(|_| AppError::FeedRefresh("feed session is closed".to_string()))?;

        match outcome.await {
            Ok(result) => result,
            Err(_) => Err(AppError::FeedRefresh(
                "feed session closed during refresh".to_string(),
            )),
        }
    }

    /// Stop the refresh worker. A fetch already in flight runs to
    /// completion but its result is discarded.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.shutdown.send(());
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.worker.abort();
    }
}

struct SessionWorker {
    user_id: Option<Uuid>,
    source: Arc<dyn FeedSource>,
    state: Arc<Mutex<FeedState>>,
    closed: Arc<AtomicBool>,
    page_size: usize,
}

impl SessionWorker {
    async fn run(
        self,
        refresh_every: Duration,
        mut requests: mpsc::Receiver<RefreshRequest>,
        mut shutdown: watch::Receiver<()>,
        mut events: BroadcastStream<FeedEvent>,
    ) {
        // First tick lands one full interval after open; the initial
        // load already populated the feed.
        let mut ticker = interval_at(Instant::now() + refresh_every, refresh_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut events_open = true;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!(user_id = ?self.user_id, "Feed session worker received shutdown");
                    break;
                }
                request = requests.recv() => {
                    match request {
                        Some(request) => self.handle_manual(request).await,
                        // Session handle dropped; nobody can observe this feed anymore.
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    match self.refresh(false).await {
                        Ok(outcome) => {
                            debug!(
                                user_id = ?self.user_id,
                                outcome = ?outcome,
                                "Automatic feed refresh"
                            );
                        }
                        Err(err) => {
                            warn!(
                                user_id = ?self.user_id,
                                error = %err,
                                "Automatic feed refresh failed, keeping current feed"
                            );
                        }
                    }
                }
                event = events.next(), if events_open => {
                    match event {
                        Some(Ok(FeedEvent::BreakingNews(article))) => {
                            self.merge_breaking(article).await;
                        }
                        Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                            warn!(
                                user_id = ?self.user_id,
                                skipped,
                                "Feed session lagged behind the event bus"
                            );
                        }
                        None => events_open = false,
                    }
                }
            }
        }

        debug!(user_id = ?self.user_id, "Feed session worker stopped");
    }

    async fn handle_manual(&self, request: RefreshRequest) {
        let result = self.refresh(true).await;
        if let Err(err) = &result {
            warn!(user_id = ?self.user_id, error = %err, "Manual feed refresh failed");
        }
        // The caller may have stopped waiting; that loses nothing.
        let _ = request.done.send(result);
    }

    /// One refresh cycle. Manual refreshes drop the watermark and the
    /// pending queue before fetching; automatic ones fetch from the
    /// current watermark.
    async fn refresh(&self, manual: bool) -> Result<MergeOutcome> {
        let since = {
            let mut state = self.state.lock().await;
            if manual {
                state.reset_for_manual();
            }
            state.begin_fetch();
            state.watermark()
        };

        let fetched = self
            .source
            .fetch_page(self.user_id, since, self.page_size)
            .await;

        let mut state = self.state.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            state.settle();
            debug!(
                user_id = ?self.user_id,
                "Session closed while a refresh was in flight, result discarded"
            );
            return Ok(MergeOutcome::Empty);
        }

        match fetched {
            Ok(fetched) => {
                let outcome = state.merge_fetched(fetched);
                state.settle();
                Ok(outcome)
            }
            Err(err) => {
                state.settle();
                Err(err)
            }
        }
    }

    async fn merge_breaking(&self, article: Article) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let mut state = self.state.lock().await;
        let outcome = state.push_breaking(FeedArticle::new(article));
        state.settle();
        debug!(
            user_id = ?self.user_id,
            outcome = ?outcome,
            "Breaking news merged into session"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex as StdMutex;

    fn article(id: &str, minutes_ago: i64) -> Article {
        let published = Utc::now() - ChronoDuration::minutes(minutes_ago);
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

    fn entry(id: &str, minutes_ago: i64) -> FeedArticle {
        FeedArticle::new(article(id, minutes_ago))
    }

    fn test_config(auto_refresh_secs: u64) -> FeedConfig {
        FeedConfig {
            auto_refresh_secs,
            page_size: 20,
            initial_load_attempts: 3,
            initial_backoff_ms: 1,
            event_capacity: 16,
        }
    }

    struct ScriptedResponse {
        delay: Duration,
        result: Result<Vec<FeedArticle>>,
    }

    /// Feed source that replays queued responses in call order and
    /// returns an empty page once the script runs out.
    #[derive(Default)]
    struct ScriptedSource {
        responses: StdMutex<VecDeque<ScriptedResponse>>,
        calls: AtomicU32,
        sinces: StdMutex<Vec<Option<DateTime<Utc>>>>,
    }

    impl ScriptedSource {
        fn push_ok(&self, entries: Vec<FeedArticle>) {
            self.push(Duration::ZERO, Ok(entries));
        }

        fn push_ok_after(&self, delay: Duration, entries: Vec<FeedArticle>) {
            self.push(delay, Ok(entries));
        }

        fn push_err(&self, message: &str) {
            self.push(Duration::ZERO, Err(AppError::Storage(message.to_string())));
        }

        fn push(&self, delay: Duration, result: Result<Vec<FeedArticle>>) {
            self.responses
                .lock()
                .unwrap()
                .push_back(ScriptedResponse { delay, result });
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn sinces(&self) -> Vec<Option<DateTime<Utc>>> {
            self.sinces.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FeedSource for ScriptedSource {
        async fn fetch_page(
            &self,
            _user_id: Option<Uuid>,
            since: Option<DateTime<Utc>>,
            _limit: usize,
        ) -> Result<Vec<FeedArticle>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sinces.lock().unwrap().push(since);

            let next = self.responses.lock().unwrap().pop_front();
            match next {
                Some(response) => {
                    if !response.delay.is_zero() {
                        tokio::time::sleep(response.delay).await;
                    }
                    response.result
                }
                None => Ok(Vec::new()),
            }
        }
    }

    /// Give the worker task scheduler slices to drain ready work.
    async fn drain_scheduler() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_load_retries_transient_failures() {
        let source = Arc::new(ScriptedSource::default());
        source.push_err("storage offline");
        source.push_err("storage offline");
        source.push_ok(vec![entry("a-1", 5)]);
        let bus = FeedEventBus::new(16);

        let session = FeedSession::open(source.clone(), &bus, test_config(300), None)
            .await
            .unwrap();

        assert_eq!(source.calls(), 3);
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.articles.len(), 1);
        assert_eq!(snapshot.articles[0].article.id, "a-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_load_exhaustion_surfaces_refresh_error() {
        let source = Arc::new(ScriptedSource::default());
        source.push_err("storage offline");
        source.push_err("storage offline");
        source.push_err("storage offline");
        let bus = FeedEventBus::new(16);

        let result = FeedSession::open(source.clone(), &bus, test_config(300), None).await;

        assert_eq!(source.calls(), 3);
        match result {
            Err(AppError::FeedRefresh(_)) => {}
            other => panic!("expected FeedRefresh error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_refresh_fetches_from_watermark() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok(vec![entry("a-1", 60)]);
        source.push_ok(vec![entry("a-2", 1)]);
        let bus = FeedEventBus::new(16);

        let session = FeedSession::open(source.clone(), &bus, test_config(300), None)
            .await
            .unwrap();
        let watermark = session.snapshot().await.watermark;
        assert!(watermark.is_some());

        tokio::time::sleep(Duration::from_secs(301)).await;
        drain_scheduler().await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.articles.len(), 2);
        assert_eq!(snapshot.articles[0].article.id, "a-2");
        // The tick requested only articles newer than the initial load.
        assert_eq!(source.sinces(), vec![None, watermark]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_resets_state_with_auto_in_flight() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok(vec![entry("a-1", 60)]);
        // The automatic tick will sit in this fetch while the manual
        // refresh arrives.
        source.push_ok_after(Duration::from_secs(5), vec![entry("a-2", 1)]);
        source.push_ok(Vec::new());
        let bus = FeedEventBus::new(16);

        let session = FeedSession::open(source.clone(), &bus, test_config(1), None)
            .await
            .unwrap();
        session.set_at_top(false).await;

        // Let the 1s tick fire and start its slow fetch.
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let outcome = session.refresh_now().await.unwrap();

        assert_eq!(outcome, MergeOutcome::Empty);
        let snapshot = session.snapshot().await;
        // The auto refresh queued a-2; the manual reset dropped it along
        // with the watermark, and the empty re-fetch left both alone.
        assert_eq!(snapshot.pending_count, 0);
        assert!(snapshot.watermark.is_none());
        assert_eq!(snapshot.articles.len(), 1);
        assert_eq!(snapshot.articles[0].article.id, "a-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaking_events_dedup_by_article_id() {
        let source = Arc::new(ScriptedSource::default());
        let bus = FeedEventBus::new(16);

        let session = FeedSession::open(source, &bus, test_config(300), None)
            .await
            .unwrap();
        drain_scheduler().await;

        bus.publish(FeedEvent::BreakingNews(article("a-1", 2)));
        bus.publish(FeedEvent::BreakingNews(article("a-1", 2)));
        bus.publish(FeedEvent::BreakingNews(article("a-2", 1)));
        drain_scheduler().await;

        let snapshot = session.snapshot().await;
        let ids: Vec<&str> = snapshot
            .articles
            .iter()
            .map(|e| e.article.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a-2", "a-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaking_events_queue_when_scrolled_down() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok(vec![entry("a-1", 60)]);
        let bus = FeedEventBus::new(16);

        let session = FeedSession::open(source, &bus, test_config(300), None)
            .await
            .unwrap();
        session.set_at_top(false).await;
        drain_scheduler().await;

        bus.publish(FeedEvent::BreakingNews(article("a-2", 1)));
        drain_scheduler().await;

        assert_eq!(session.pending_count().await, 1);
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.articles.len(), 1);

        assert_eq!(session.apply_pending().await, 1);
        assert_eq!(session.snapshot().await.articles[0].article.id, "a-2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_completing_after_close_is_discarded() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok(vec![entry("a-1", 60)]);
        source.push_ok_after(Duration::from_secs(5), vec![entry("a-2", 1)]);
        let bus = FeedEventBus::new(16);

        let session = FeedSession::open(source, &bus, test_config(1), None)
            .await
            .unwrap();
        let watermark = session.snapshot().await.watermark;

        // Tick fires, fetch goes in flight, then the session closes.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        session.close();
        tokio::time::sleep(Duration::from_secs(6)).await;
        drain_scheduler().await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.articles.len(), 1);
        assert_eq!(snapshot.articles[0].article.id, "a-1");
        assert_eq!(snapshot.watermark, watermark);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_now_after_close_errors() {
        let source = Arc::new(ScriptedSource::default());
        let bus = FeedEventBus::new(16);

        let session = FeedSession::open(source, &bus, test_config(300), None)
            .await
            .unwrap();
        session.close();
        drain_scheduler().await;

        match session.refresh_now().await {
            Err(AppError::FeedRefresh(_)) => {}
            other => panic!("expected FeedRefresh error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_edit_survives_refetch_of_same_article() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok(vec![entry("a-1", 60)]);
        // Manual refresh returns the same article, unliked.
        source.push_ok(vec![entry("a-1", 60)]);
        let bus = FeedEventBus::new(16);

        let session = FeedSession::open(source, &bus, test_config(300), None)
            .await
            .unwrap();
        assert!(session.set_liked("a-1", true).await);

        let outcome = session.refresh_now().await.unwrap();

        assert_eq!(outcome, MergeOutcome::Empty);
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.articles.len(), 1);
        assert!(snapshot.articles[0].is_liked);
    }
}
