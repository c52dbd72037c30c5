// ============================================
// Breaking News Event Bus
// ============================================
//
// Fan-out hub for articles that should reach live feed sessions without
// waiting for the next refresh tick. Delivery is at-least-once: a slow
// session can observe a replayed or lagged event, so consumers dedupe by
// article id when they merge.

use crate::models::Article;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

/// Events fanned out to live feed sessions.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// An article that cleared the quality gate and should surface
    /// immediately instead of on the next refresh.
    BreakingNews(Article),
}

impl FeedEvent {
    pub fn article_id(&self) -> &str {
        match self {
            FeedEvent::BreakingNews(article) => &article.id,
        }
    }
}

/// Broadcast channel shared by every session of one engine instance.
///
/// Publishing is lossy when nobody listens; sessions that fall more than
/// the channel capacity behind see a lag marker instead of the skipped
/// events and catch up through their regular watermark fetch.
pub struct FeedEventBus {
    channel: broadcast::Sender<FeedEvent>,
}

impl FeedEventBus {
    pub fn new(capacity: usize) -> Self {
        let (channel, _) = broadcast::channel(capacity.max(1));
        Self { channel }
    }

    /// Number of sessions currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.channel.receiver_count()
    }

    /// Publish an event to every live session.
    ///
    /// Returns how many subscribers received it; zero when no session is
    /// listening, which is not an error.
    pub fn publish(&self, event: FeedEvent) -> usize {
        match self.channel.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("No live feed sessions, event dropped");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.channel.subscribe()
    }

    /// Subscribe as a stream, the shape the session worker loop consumes.
    pub fn subscribe_stream(&self) -> BroadcastStream<FeedEvent> {
        BroadcastStream::new(self.channel.subscribe())
    }
}
