//! Service layer for the personalization engine.
//!
//! - quality_gate: candidate admission (hard lexical + soft dimension filters)
//! - profile: long-term reading patterns and ephemeral mood profiles
//! - scoring: content-based, collaborative, and mood passes plus the blender
//! - feed: live feed sessions, merge state, breaking-news event bus
//! - trending: non-personalized fallback ranking
//! - analysis: content analysis provider contract + in-process heuristics
//! - engine: facade wiring the pipeline together

pub mod analysis;
pub mod engine;
pub mod feed;
pub mod profile;
pub mod quality_gate;
pub mod scoring;
pub mod trending;

pub use analysis::{AnalysisProvider, HeuristicAnalysis};
pub use engine::PersonalizationEngine;
pub use feed::{FeedArticle, FeedEvent, FeedEventBus, FeedSession, FeedSnapshot, FeedSource};
pub use profile::mood::MoodService;
pub use profile::{InteractionSnapshot, ProfileService};
pub use quality_gate::{GateDecision, QualityGate};
pub use scoring::{CollaborativeScorer, ContentScorer, HybridBlender, Jitter, MoodScorer};
pub use trending::TrendingService;
