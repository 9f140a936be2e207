//! # Analysis Module
//!
//! Fast, non-LLM analysis of the incoming message, run BEFORE prompt
//! construction to enrich the generation request.
//!
//! ## Components
//! - `sentiment`: lexicon + local-pattern sentiment scoring
//! - `intent`: communicative-intent classification (pattern rules + history)
//! - `entities`: people/places/events/objects/temporal extraction with a
//!   per-user accumulation cache
//! - `pronouns`: anaphora resolution against the active-memory state

pub mod entities;
pub mod intent;
pub mod pronouns;
pub mod sentiment;

pub use entities::{EntityRecognizer, EntitySet};
pub use intent::{Intent, IntentDetector, IntentResult};
pub use pronouns::{PronounResolution, PronounResolver};
pub use sentiment::{SentimentAnalyzer, SentimentClass, SentimentResult};
