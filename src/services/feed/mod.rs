//! Live feed delivery: merge state, refresh sessions, and the breaking
//! news event bus.
//!
//! - merger: insert-or-queue state machine with watermark tracking
//! - session: per-reader worker that drives automatic, manual, and
//!   event-driven refreshes through one serialized loop
//! - events: broadcast hub pushing gated articles to open sessions

pub mod events;
pub mod merger;
pub mod session;

pub use events::{FeedEvent, FeedEventBus};
pub use merger::{FeedArticle, FeedPhase, FeedSnapshot, FeedState, MergeOutcome};
pub use session::{FeedSession, FeedSource};
