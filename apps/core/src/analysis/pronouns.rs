//! Anaphora resolution against the active-memory state.
//!
//! Scans the text for a fixed set of personal and demonstrative pronoun
//! forms and maps each to the most salient entity of the matching kind.
//! The source text is never rewritten; resolutions are annotations for the
//! prompt renderer.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::models::ActiveMemory;

/// Third-person forms that refer to people.
const PERSON_PRONOUNS: &[&str] = &["ele", "ela", "eles", "elas", "dele", "dela"];

/// Demonstratives that refer to events, objects or the running topic.
const DEMONSTRATIVE_PRONOUNS: &[&str] = &[
    "isso", "isto", "aquilo", "esse", "essa", "aquele", "aquela", "disso",
];

static PRONOUN_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    PERSON_PRONOUNS
        .iter()
        .chain(DEMONSTRATIVE_PRONOUNS.iter())
        .map(|form| {
            let pattern = format!(r"(?i)\b{}\b", form);
            (
                *form,
                Regex::new(&pattern).expect("Invalid regex: pronoun form"),
            )
        })
        .collect()
});

/// What kind of referent a pronoun resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentKind {
    Person,
    Event,
    Object,
    Topic,
}

impl fmt::Display for ReferentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReferentKind::Person => "person",
            ReferentKind::Event => "event",
            ReferentKind::Object => "object",
            ReferentKind::Topic => "topic",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub pronoun: String,
    pub entity: String,
    pub kind: ReferentKind,
    pub confidence: f64,
}

/// All resolutions found for one message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PronounResolution {
    pub resolutions: Vec<Resolution>,
}

impl PronounResolution {
    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }

    /// Renders the resolutions as explanatory lines for prompt enrichment.
    pub fn explanations(&self) -> Vec<String> {
        self.resolutions
            .iter()
            .map(|r| {
                format!(
                    "\"{}\" provavelmente se refere a {} ({})",
                    r.pronoun, r.entity, r.kind
                )
            })
            .collect()
    }
}

/// Pronoun resolver. Stateless; salience comes entirely from the supplied
/// active memory.
#[derive(Default)]
pub struct PronounResolver;

impl PronounResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolves pronoun forms present in `text` against `memory`. Pronouns
    /// with no salient referent of the right kind are left unresolved.
    pub fn resolve(&self, text: &str, memory: &ActiveMemory) -> PronounResolution {
        let mut resolutions = Vec::new();

        for (form, pattern) in PRONOUN_PATTERNS.iter() {
            if !pattern.is_match(text) {
                continue;
            }

            if PERSON_PRONOUNS.contains(form) {
                if let Some(resolution) = resolve_person(form, memory) {
                    resolutions.push(resolution);
                }
            } else if let Some(resolution) = resolve_demonstrative(form, memory) {
                resolutions.push(resolution);
            }
        }

        PronounResolution { resolutions }
    }
}

fn resolve_person(form: &str, memory: &ActiveMemory) -> Option<Resolution> {
    match memory.people.len() {
        0 => None,
        1 => Some(Resolution {
            pronoun: form.to_string(),
            entity: memory.people[0].clone(),
            kind: ReferentKind::Person,
            confidence: 0.9,
        }),
        // Several candidates: the most recently added one wins, less surely.
        _ => memory.people.last().map(|person| Resolution {
            pronoun: form.to_string(),
            entity: person.clone(),
            kind: ReferentKind::Person,
            confidence: 0.7,
        }),
    }
}

fn resolve_demonstrative(form: &str, memory: &ActiveMemory) -> Option<Resolution> {
    if let Some(event) = memory.events.last() {
        return Some(Resolution {
            pronoun: form.to_string(),
            entity: event.clone(),
            kind: ReferentKind::Event,
            confidence: 0.8,
        });
    }
    if let Some(object) = memory.objects.last() {
        return Some(Resolution {
            pronoun: form.to_string(),
            entity: object.clone(),
            kind: ReferentKind::Object,
            confidence: 0.7,
        });
    }
    memory.topic.as_ref().map(|topic| Resolution {
        pronoun: form.to_string(),
        entity: topic.clone(),
        kind: ReferentKind::Topic,
        confidence: 0.6,
    })
}
