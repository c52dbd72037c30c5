// ============================================
// Content Analysis Provider
// ============================================
//
// Quality scoring, mood derivation, and digest text generation sit behind
// one trait so a hosted model can replace the in-process heuristics without
// touching the engine. Callers must tolerate failure: the gate substitutes
// documented default dimensions and mood submission falls back to a neutral
// profile, except for quota exhaustion which is surfaced to the user.

use crate::error::Result;
use crate::models::{Article, DigestSummary, MoodProfile, QualityDimensions};
use crate::utils::{clamp01, dedup_capped};
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

/// Upper bound on topics listed in a digest.
const DIGEST_TOPIC_CAP: usize = 8;
/// Upper bound on highlighted titles in a digest.
const DIGEST_HIGHLIGHT_CAP: usize = 3;
/// Upper bound on tone words kept on a derived mood profile.
const TONE_WORD_CAP: usize = 12;

// ============================================
// Provider Trait
// ============================================

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Score an article across the quality dimensions.
    async fn analyze_quality(
        &self,
        title: &str,
        body: &str,
        source: &str,
    ) -> Result<QualityDimensions>;

    /// Build a mood profile from a free-text statement, an optional emoji,
    /// and context tags supplied by the client.
    async fn derive_mood(
        &self,
        text: &str,
        emoji: Option<&str>,
        tags: &[String],
    ) -> Result<MoodProfile>;

    /// Produce presentational digest text over an already-ranked article
    /// list. Output is never fed back into scoring.
    async fn summarize(&self, articles: &[Article]) -> Result<DigestSummary>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}

// ============================================
// Heuristic Provider
// ============================================

/// Lexical analysis over titles, bodies, and mood statements. No network
/// calls, so it never hits quota and only returns `Ok`.
pub struct HeuristicAnalysis {
    quoted_speech: Regex,
}

impl Default for HeuristicAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicAnalysis {
    pub fn new() -> Self {
        Self {
            quoted_speech: Regex::new(r#""[^"]{20,}""#)
                .expect("quoted speech pattern is valid"),
        }
    }

    fn toxicity_of(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let hostile_terms = [
            "idiot",
            "moron",
            "pathetic",
            "disgusting",
            "scum",
            "traitor",
            "shut up",
            "get rekt",
            "deserves to suffer",
        ];
        let hits = hostile_terms.iter().filter(|t| lower.contains(*t)).count();
        clamp01(0.05 + hits as f64 * 0.2)
    }

    fn sensationalism_of(&self, title: &str, body: &str) -> f64 {
        let lower = format!("{} {}", title, body).to_lowercase();
        let charged_terms = [
            "shocking",
            "unbelievable",
            "bombshell",
            "explosive claim",
            "slams",
            "destroys",
            "meltdown",
            "jaw-dropping",
            "outrage",
            "chaos erupts",
        ];
        let hits = charged_terms.iter().filter(|t| lower.contains(*t)).count();
        let exclamations = title.matches('!').count();
        let shouted_words = title
            .split_whitespace()
            .filter(|w| w.len() > 3 && w.chars().all(|c| !c.is_lowercase()))
            .count();
        clamp01(0.1 + hits as f64 * 0.15 + exclamations as f64 * 0.1 + shouted_words as f64 * 0.1)
    }

    fn factuality_of(&self, body: &str) -> f64 {
        let lower = body.to_lowercase();
        let attribution_terms = [
            "according to",
            "said in a statement",
            "the report",
            "data from",
            "the study",
            "survey of",
            "percent",
            "researchers",
            "officials said",
        ];
        let hedge_terms = [
            "allegedly",
            "rumored",
            "unconfirmed",
            "some say",
            "sources claim",
            "reportedly",
            "it is believed",
        ];
        let attributed = attribution_terms
            .iter()
            .filter(|t| lower.contains(*t))
            .count();
        let hedged = hedge_terms.iter().filter(|t| lower.contains(*t)).count();
        let quoted = usize::from(self.quoted_speech.is_match(body));
        clamp01(0.5 + (attributed + quoted) as f64 * 0.08 - hedged as f64 * 0.12)
    }

    fn bias_of(&self, title: &str, body: &str) -> f64 {
        let lower = format!("{} {}", title, body).to_lowercase();
        let loaded_terms = [
            "radical left",
            "far-right mob",
            "the regime",
            "corrupt elites",
            "mainstream media lies",
            "witch hunt",
            "deep state",
            "extremist agenda",
            "so-called experts",
        ];
        let hits = loaded_terms.iter().filter(|t| lower.contains(*t)).count();
        clamp01(0.2 + hits as f64 * 0.2)
    }

    fn quality_of(&self, body: &str, factuality: f64, sensationalism: f64) -> f64 {
        let length_factor = (body.chars().count() as f64 / 4000.0).min(0.25);
        let paragraphs = body.split("\n\n").filter(|p| !p.trim().is_empty()).count();
        let structure = if paragraphs >= 3 { 0.1 } else { 0.0 };
        let grounding = (factuality - 0.5).max(0.0) * 0.5;
        let hype_penalty = (sensationalism - 0.5).max(0.0) * 0.4;
        clamp01(0.35 + length_factor + structure + grounding - hype_penalty)
    }

    fn credibility_of(&self, source: &str, factuality: f64) -> f64 {
        let lower = source.to_lowercase();
        let wire_desks = [
            "reuters",
            "associated press",
            "ap news",
            "bbc",
            "bloomberg",
            "financial times",
            "npr",
            "the guardian",
        ];
        let churn_markers = ["buzz", "viral", "gossip", "clickz", "blogspot"];

        if wire_desks.iter().any(|s| lower.contains(s)) {
            return 0.85;
        }
        if churn_markers.iter().any(|s| lower.contains(s)) {
            return 0.3;
        }
        clamp01(0.5 + (factuality - 0.5) * 0.4)
    }
}

#[async_trait]
impl AnalysisProvider for HeuristicAnalysis {
    async fn analyze_quality(
        &self,
        title: &str,
        body: &str,
        source: &str,
    ) -> Result<QualityDimensions> {
        let toxicity = self.toxicity_of(body);
        let sensationalism = self.sensationalism_of(title, body);
        let factuality = self.factuality_of(body);
        let bias = self.bias_of(title, body);
        let quality = self.quality_of(body, factuality, sensationalism);
        let credibility = self.credibility_of(source, factuality);

        let dimensions = QualityDimensions {
            toxicity,
            bias,
            sensationalism,
            factuality,
            quality,
            credibility,
        }
        .clamped();

        debug!(
            source = %source,
            toxicity = dimensions.toxicity,
            sensationalism = dimensions.sensationalism,
            factuality = dimensions.factuality,
            "Analyzed article quality"
        );

        Ok(dimensions)
    }

    async fn derive_mood(
        &self,
        text: &str,
        emoji: Option<&str>,
        tags: &[String],
    ) -> Result<MoodProfile> {
        let lower = text.to_lowercase();
        let mut profile = MoodProfile::neutral();
        let mut tone_words: Vec<String> = Vec::new();

        let mut sweep = |terms: &[&str], tone: &mut Vec<String>| -> usize {
            let mut hits = 0;
            for term in terms {
                if lower.contains(term) {
                    hits += 1;
                    tone.push((*term).to_string());
                }
            }
            hits
        };

        // Signal 1: depth vs skim language
        let deep_terms = [
            "deep",
            "in-depth",
            "detailed",
            "analysis",
            "thorough",
            "long read",
            "substantive",
        ];
        let skim_terms = ["quick", "skim", "brief", "headlines only", "light read"];
        let deep_hits = sweep(&deep_terms, &mut tone_words);
        let skim_hits = sweep(&skim_terms, &mut tone_words);
        profile.want_depth += deep_hits as f64 * 0.15 - skim_hits as f64 * 0.15;
        profile.length_tolerance += deep_hits as f64 * 0.1 - skim_hits as f64 * 0.15;

        // Signal 2: emotional valence
        let upbeat_terms = [
            "happy",
            "upbeat",
            "uplifting",
            "good news",
            "hopeful",
            "cheerful",
            "fun",
        ];
        let downbeat_terms = [
            "sad",
            "angry",
            "stressed",
            "anxious",
            "doom",
            "gloomy",
            "tired of bad news",
        ];
        let upbeat_hits = sweep(&upbeat_terms, &mut tone_words);
        let downbeat_hits = sweep(&downbeat_terms, &mut tone_words);
        profile.positivity_pref += upbeat_hits as f64 * 0.15 - downbeat_hits as f64 * 0.15;

        // Signal 3: energy
        let wired_terms = ["excited", "energized", "pumped", "motivated"];
        let drained_terms = ["tired", "exhausted", "sleepy", "drained", "winding down"];
        let wired_hits = sweep(&wired_terms, &mut tone_words);
        let drained_hits = sweep(&drained_terms, &mut tone_words);
        profile.energy_level += wired_hits as f64 * 0.15 - drained_hits as f64 * 0.15
            + (text.matches('!').count() as f64 * 0.05).min(0.15);

        // Signal 4: curiosity
        let curious_terms = [
            "curious",
            "explore",
            "discover",
            "something new",
            "surprise me",
            "learn",
        ];
        let curious_hits = sweep(&curious_terms, &mut tone_words);
        profile.curiosity_level += curious_hits as f64 * 0.15;

        // Signal 5: time pressure shortens tolerated length
        let rushed_terms = ["busy", "commute", "only have a few", "in a hurry"];
        let rushed_hits = sweep(&rushed_terms, &mut tone_words);
        profile.length_tolerance -= rushed_hits as f64 * 0.2;

        // Signal 6: a single emoji carries a lot of mood
        if let Some(emoji) = emoji {
            match emoji {
                "😊" | "🙂" | "😄" | "🥳" => {
                    profile.positivity_pref += 0.2;
                    profile.energy_level += 0.1;
                }
                "😢" | "😞" | "😠" | "😤" => profile.positivity_pref -= 0.2,
                "🤓" | "🧠" | "📚" => {
                    profile.want_depth += 0.2;
                    profile.curiosity_level += 0.1;
                }
                "😴" | "🥱" => {
                    profile.energy_level -= 0.25;
                    profile.length_tolerance -= 0.1;
                }
                "⚡" | "🔥" | "🚀" => profile.energy_level += 0.25,
                "🤔" | "🔍" => profile.curiosity_level += 0.2,
                _ => {}
            }
        }

        // Signal 7: explicit tags become strong topic biases, topical words
        // in the statement become weaker ones
        for tag in tags {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() {
                profile.topic_biases.insert(tag, 0.8);
            }
        }
        let topic_hints = [
            ("tech", "technology"),
            ("science", "science"),
            ("politic", "politics"),
            ("sport", "sports"),
            ("business", "business"),
            ("finance", "business"),
            ("climate", "climate"),
            ("health", "health"),
            ("culture", "culture"),
        ];
        for (needle, topic) in topic_hints {
            if lower.contains(needle) {
                profile
                    .topic_biases
                    .entry(topic.to_string())
                    .or_insert(0.7);
            }
        }

        profile.tone_words = dedup_capped(tone_words, TONE_WORD_CAP);
        let profile = profile.clamped();

        debug!(
            want_depth = profile.want_depth,
            positivity = profile.positivity_pref,
            energy = profile.energy_level,
            topics = profile.topic_biases.len(),
            "Derived mood profile"
        );

        Ok(profile)
    }

    async fn summarize(&self, articles: &[Article]) -> Result<DigestSummary> {
        if articles.is_empty() {
            return Ok(DigestSummary {
                summary: "No fresh stories for this digest window.".to_string(),
                highlights: Vec::new(),
                topics: Vec::new(),
            });
        }

        // Digest topics are display tags in canonical lowercase form.
        let topics = dedup_capped(
            articles
                .iter()
                .flat_map(|a| a.topics.iter().map(|t| t.trim().to_lowercase()))
                .collect(),
            DIGEST_TOPIC_CAP,
        );
        let highlights: Vec<String> = articles
            .iter()
            .take(DIGEST_HIGHLIGHT_CAP)
            .map(|a| a.title.clone())
            .collect();
        let summary = format!(
            "{} stories across {} topics, leading with \"{}\".",
            articles.len(),
            topics.len().max(1),
            articles[0].title
        );

        Ok(DigestSummary {
            summary,
            highlights,
            topics,
        })
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
