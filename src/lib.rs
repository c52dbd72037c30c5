//! News personalization and recommendation engine.
//!
//! Candidate articles flow from storage through the quality gate into the
//! scoring passes; a hybrid blend of the content-based and collaborative
//! scores produces the ranked list, with mood-based ranking and a trending
//! fallback alongside. Live feed sessions deliver refreshes and breaking
//! news on top of the same storage and gate.
//!
//! [`PersonalizationEngine`] is the facade that wires it all together:
//!
//! ```no_run
//! use std::sync::Arc;
//! use personalization_service::{
//!     Config, HeuristicAnalysis, MemoryStore, PersonalizationEngine,
//! };
//!
//! # async fn demo() -> personalization_service::Result<()> {
//! let engine = PersonalizationEngine::new(
//!     Config::from_env(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(HeuristicAnalysis::new()),
//! );
//! let ranked = engine.recommendations(None).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use db::{ArticleFilter, ArticleStore, MemoryStore};
pub use error::{AppError, Result};
pub use models::{
    Algorithm, Article, DigestSummary, FeedbackEvent, FeedbackType, Interaction, MoodPreset,
    MoodProfile, QualityDimensions, ReadingPattern, RecommendationScore,
};
pub use services::{
    AnalysisProvider, FeedEvent, FeedSession, FeedSnapshot, FeedSource, GateDecision,
    HeuristicAnalysis, PersonalizationEngine, QualityGate,
};
