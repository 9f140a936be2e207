//! Entity extraction with a per-user time-boxed accumulation cache.
//!
//! People and places come from an optional external tagger plus fixed
//! patterns and a gazetteer of everyday locale place nouns. Events are
//! matched purely by six bilingual templates, objects by a static
//! product-token list plus a compound device-noun pattern, and temporal
//! expressions by five pattern classes. Repeated extractions for the same
//! user are merged into the cached set (sets union, events append) and the
//! entry's TTL restarts on every write.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::traits::NamedEntityTagger;

/// Everyday place nouns the persona's crowd talks about.
const PLACE_GAZETTEER: &[&str] = &[
    "casa",
    "escola",
    "trabalho",
    "faculdade",
    "praia",
    "shopping",
    "igreja",
    "academia",
    "cinema",
    "parque",
    "bar",
    "restaurante",
    "hospital",
    "mercado",
    "aeroporto",
];

/// Known product/brand tokens treated as objects.
const OBJECT_TOKENS: &[&str] = &[
    "celular",
    "telefone",
    "computador",
    "notebook",
    "pc",
    "playstation",
    "xbox",
    "nintendo",
    "iphone",
    "carro",
    "moto",
    "bicicleta",
    "tv",
    "televisão",
    "fone",
    "teclado",
    "mouse",
    "monitor",
    "tablet",
    "videogame",
];

/// Capitalized words that are never person names.
const NAME_STOPLIST: &[&str] = &[
    "eu", "oi", "ola", "olá", "sim", "não", "nao", "hoje", "amanhã", "amanha", "ontem", "segunda",
    "terça", "quarta", "quinta", "sexta", "sábado", "sabado", "domingo", "the", "i",
];

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-ZÀ-Ö][a-zà-öø-ÿç]{1,18})\b").expect("Invalid regex: capitalized name")
});

static PLACE_CUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:em|no|na|pro|pra)\s+([A-ZÀ-Ö][a-zà-öø-ÿç]{2,})")
        .expect("Invalid regex: place cue")
});

static DEVICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\w+(?:phone|pad|book|station|watch)\b").expect("Invalid regex: device noun")
});

// Six event templates, each capturing an optional "of/de" complement.
static EVENT_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        (
            "festa",
            Regex::new(r"(?i)\b(?:festa|party)(?:\s+(?:de|do|da|of|on)\s+(\w+))?")
                .expect("Invalid regex: party event"),
        ),
        (
            "prova",
            Regex::new(r"(?i)\b(?:prova|exame|exam|test)(?:\s+(?:de|do|da|of)\s+(\w+))?")
                .expect("Invalid regex: exam event"),
        ),
        (
            "jogo",
            Regex::new(r"(?i)\b(?:jogo|partida|game|match)(?:\s+(?:de|do|da|of)\s+(\w+))?")
                .expect("Invalid regex: game event"),
        ),
        (
            "show",
            Regex::new(r"(?i)\b(?:show|concerto|concert)(?:\s+(?:de|do|da|of)\s+(\w+))?")
                .expect("Invalid regex: show event"),
        ),
        (
            "reunião",
            Regex::new(r"(?i)\b(?:reuni[ãa]o|meeting)(?:\s+(?:de|do|da|com|with)\s+(\w+))?")
                .expect("Invalid regex: meeting event"),
        ),
        (
            "aniversário",
            Regex::new(r"(?i)\b(?:anivers[áa]rio|niver|birthday)(?:\s+(?:de|do|da|of)\s+(\w+))?")
                .expect("Invalid regex: birthday event"),
        ),
    ]
});

// Five temporal pattern classes.
static RELATIVE_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(hoje|amanhã|amanha|ontem|anteontem|today|tomorrow|yesterday)\b")
        .expect("Invalid regex: relative day")
});
static RELATIVE_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:semana|m[êe]s|ano)\s+(?:que\s+vem|passad[oa])|(?:next|last)\s+(?:week|month|year))\b",
    )
    .expect("Invalid regex: relative span")
});
static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:segunda|terça|terca|quarta|quinta|sexta|s[áa]bado|domingo|monday|tuesday|wednesday|thursday|friday|saturday|sunday)(?:-feira)?\b",
    )
    .expect("Invalid regex: weekday")
});
static DAY_PART_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:de\s+manhã|de\s+manha|à\s+tarde|de\s+tarde|à\s+noite|de\s+noite|hoje\s+cedo|morning|afternoon|tonight|evening)\b",
    )
    .expect("Invalid regex: day part")
});
static IN_N_UNITS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:em|daqui\s+a|in)\s+\d+\s+(?:minutos?|horas?|dias?|semanas?|minutes?|hours?|days?|weeks?)\b",
    )
    .expect("Invalid regex: in-N-units")
});

/// An event mention: template kind, optional complement, full match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMention {
    pub kind: String,
    pub of: Option<String>,
    pub mention: String,
}

/// Entities accumulated for one user (or extracted once, uncached).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySet {
    pub people: BTreeSet<String>,
    pub places: BTreeSet<String>,
    pub events: Vec<EventMention>,
    pub objects: BTreeSet<String>,
    pub temporal: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
}

impl EntitySet {
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            people: BTreeSet::new(),
            places: BTreeSet::new(),
            events: Vec::new(),
            objects: BTreeSet::new(),
            temporal: BTreeSet::new(),
            timestamp: at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
            && self.places.is_empty()
            && self.events.is_empty()
            && self.objects.is_empty()
            && self.temporal.is_empty()
    }
}

/// Merges two snapshots into a new value: sets are unioned, event
/// sequences concatenated (not deduplicated), timestamp taken from the
/// newer side. Neither input is mutated.
pub fn merge_entity_sets(older: &EntitySet, newer: &EntitySet) -> EntitySet {
    let mut merged = older.clone();
    merged.people.extend(newer.people.iter().cloned());
    merged.places.extend(newer.places.iter().cloned());
    merged.events.extend(newer.events.iter().cloned());
    merged.objects.extend(newer.objects.iter().cloned());
    merged.temporal.extend(newer.temporal.iter().cloned());
    merged.timestamp = newer.timestamp;
    merged
}

/// Entity recognizer with an optional external tagger and the per-user
/// accumulation cache (1 hour TTL, reset on every write).
pub struct EntityRecognizer {
    tagger: Option<Arc<dyn NamedEntityTagger>>,
    cache: TtlCache<String, EntitySet>,
    clock: Arc<dyn Clock>,
}

const CACHE_CAPACITY: usize = 512;

impl EntityRecognizer {
    pub fn new(tagger: Option<Arc<dyn NamedEntityTagger>>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(tagger, clock, Duration::hours(1))
    }

    pub fn with_ttl(
        tagger: Option<Arc<dyn NamedEntityTagger>>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        let cache = TtlCache::new(CACHE_CAPACITY, ttl, clock.clone());
        Self {
            tagger,
            cache,
            clock,
        }
    }

    /// Extracts entities from a text. With a `user_id` the result is merged
    /// into that user's cached set and the merged view is returned.
    pub fn extract(&self, text: &str, user_id: Option<&str>) -> EntitySet {
        let fresh = self.extract_once(text);

        match user_id {
            None => fresh,
            Some(uid) => {
                let merged = match self.cache.get(&uid.to_string()) {
                    Some(previous) => merge_entity_sets(&previous, &fresh),
                    None => fresh,
                };
                self.cache.set(uid.to_string(), merged.clone());
                merged
            }
        }
    }

    fn extract_once(&self, text: &str) -> EntitySet {
        let mut set = EntitySet::empty(self.clock.now());
        set.people = self.extract_people(text);
        set.places = self.extract_places(text);
        set.events = extract_events(text);
        set.objects = extract_objects(text);
        set.temporal = self.extract_temporal(text);
        set
    }

    fn extract_people(&self, text: &str) -> BTreeSet<String> {
        let mut people = BTreeSet::new();

        if let Some(tagger) = &self.tagger {
            for name in tagger.people(text) {
                insert_person(&mut people, &name);
            }
        }

        for caps in NAME_RE.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                // Sentence-initial capitals are usually just orthography.
                if is_sentence_start(text, m.start()) {
                    continue;
                }
                insert_person(&mut people, m.as_str());
            }
        }

        people
    }

    fn extract_places(&self, text: &str) -> BTreeSet<String> {
        let mut places = BTreeSet::new();

        if let Some(tagger) = &self.tagger {
            for place in tagger.places(text) {
                let normalized = place.trim().to_lowercase();
                if normalized.chars().count() > 2 {
                    places.insert(normalized);
                }
            }
        }

        let lower = text.to_lowercase();
        for token in lower.split(|c: char| !c.is_alphanumeric()) {
            if PLACE_GAZETTEER.contains(&token) {
                places.insert(token.to_string());
            }
        }

        for caps in PLACE_CUE_RE.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                let normalized = m.as_str().to_lowercase();
                if normalized.chars().count() > 2 {
                    places.insert(normalized);
                }
            }
        }

        places
    }

    fn extract_temporal(&self, text: &str) -> BTreeSet<String> {
        let mut temporal = BTreeSet::new();

        // The tagger's date extractor is optional sugar; its absence (or an
        // empty answer) must never fail the extraction.
        if let Some(tagger) = &self.tagger {
            for date in tagger.dates(text) {
                let normalized = normalize_expression(&date);
                if !normalized.is_empty() {
                    temporal.insert(normalized);
                }
            }
        }

        for pattern in [
            &*RELATIVE_DAY_RE,
            &*RELATIVE_SPAN_RE,
            &*WEEKDAY_RE,
            &*DAY_PART_RE,
            &*IN_N_UNITS_RE,
        ] {
            for m in pattern.find_iter(text) {
                temporal.insert(normalize_expression(m.as_str()));
            }
        }

        temporal
    }
}

fn insert_person(people: &mut BTreeSet<String>, raw: &str) {
    let normalized = raw.trim().to_lowercase();
    let len = normalized.chars().count();
    if (2..=19).contains(&len) && !NAME_STOPLIST.contains(&normalized.as_str()) {
        people.insert(normalized);
    }
}

fn is_sentence_start(text: &str, at: usize) -> bool {
    text[..at]
        .trim_end()
        .chars()
        .last()
        .map(|c| matches!(c, '.' | '!' | '?'))
        .unwrap_or(true)
}

fn extract_events(text: &str) -> Vec<EventMention> {
    let mut events = Vec::new();
    for (kind, pattern) in EVENT_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            let mention = caps
                .get(0)
                .map(|m| m.as_str().trim().to_lowercase())
                .unwrap_or_default();
            events.push(EventMention {
                kind: (*kind).to_string(),
                of: caps.get(1).map(|m| m.as_str().to_lowercase()),
                mention,
            });
        }
    }
    events
}

fn extract_objects(text: &str) -> BTreeSet<String> {
    let mut objects = BTreeSet::new();

    let lower = text.to_lowercase();
    for token in lower.split(|c: char| !c.is_alphanumeric()) {
        if OBJECT_TOKENS.contains(&token) {
            objects.insert(token.to_string());
        }
    }

    for m in DEVICE_RE.find_iter(text) {
        objects.insert(m.as_str().to_lowercase());
    }

    objects
}

fn normalize_expression(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn recognizer() -> (EntityRecognizer, Arc<ManualClock>) {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        (EntityRecognizer::new(None, clock.clone()), clock)
    }

    #[test]
    fn extraction_without_user_is_idempotent() {
        let (recognizer, _clock) = recognizer();
        let text = "fui na festa da Julia ontem com o Pedro, levei meu notebook";

        let a = recognizer.extract(text, None);
        let b = recognizer.extract(text, None);

        assert_eq!(a.people, b.people);
        assert_eq!(a.places, b.places);
        assert_eq!(a.objects, b.objects);
        assert_eq!(a.temporal, b.temporal);
        assert_eq!(a.events, b.events);
    }

    #[test]
    fn recognizes_people_mid_sentence() {
        let (recognizer, _clock) = recognizer();
        let set = recognizer.extract("falei com a Maria hoje", None);
        assert!(set.people.contains("maria"));
    }

    #[test]
    fn sentence_start_capital_is_not_a_person() {
        let (recognizer, _clock) = recognizer();
        let set = recognizer.extract("Fomos embora cedo", None);
        assert!(set.people.is_empty());
    }

    #[test]
    fn gazetteer_places_are_found() {
        let (recognizer, _clock) = recognizer();
        let set = recognizer.extract("saindo da academia e indo pro shopping", None);
        assert!(set.places.contains("academia"));
        assert!(set.places.contains("shopping"));
    }

    #[test]
    fn event_template_captures_complement() {
        let (recognizer, _clock) = recognizer();
        let set = recognizer.extract("vai ter festa de aniversário sexta", None);
        let kinds: Vec<&str> = set.events.iter().map(|e| e.kind.as_str()).collect();
        assert!(kinds.contains(&"festa"));
        let festa = set.events.iter().find(|e| e.kind == "festa").unwrap();
        assert_eq!(festa.of.as_deref(), Some("aniversário"));
    }

    #[test]
    fn temporal_classes_cover_relative_and_weekday() {
        let (recognizer, _clock) = recognizer();
        let set = recognizer.extract("amanhã à tarde, ou sábado, ou daqui a 2 dias", None);
        assert!(set.temporal.contains("amanhã"));
        assert!(set.temporal.contains("à tarde"));
        assert!(set.temporal.contains("sábado"));
        assert!(set.temporal.contains("daqui a 2 dias"));
    }

    #[test]
    fn objects_from_list_and_device_pattern() {
        let (recognizer, _clock) = recognizer();
        let set = recognizer.extract("comprei um iphone e ganhei um macbook", None);
        assert!(set.objects.contains("iphone"));
        assert!(set.objects.contains("macbook"));
    }

    #[test]
    fn per_user_cache_accumulates() {
        let (recognizer, _clock) = recognizer();

        let first = recognizer.extract("conversei com a Bianca", Some("u1"));
        assert!(first.people.contains("bianca"));

        let second = recognizer.extract("depois encontrei o Lucas", Some("u1"));
        assert!(second.people.contains("bianca"));
        assert!(second.people.contains("lucas"));
    }

    #[test]
    fn events_concatenate_without_dedup() {
        let (recognizer, _clock) = recognizer();
        recognizer.extract("tem festa hoje", Some("u2"));
        let merged = recognizer.extract("tem festa hoje", Some("u2"));
        assert_eq!(merged.events.len(), 2);
    }

    #[test]
    fn cache_expires_after_an_hour() {
        let (recognizer, clock) = recognizer();
        recognizer.extract("falei com a Carla", Some("u3"));

        clock.advance(Duration::minutes(61));
        let set = recognizer.extract("sem nomes aqui", Some("u3"));
        assert!(set.people.is_empty());
    }

    #[test]
    fn write_resets_cache_ttl() {
        let (recognizer, clock) = recognizer();
        recognizer.extract("falei com a Carla", Some("u4"));

        clock.advance(Duration::minutes(40));
        recognizer.extract("vi o Bruno também", Some("u4"));

        clock.advance(Duration::minutes(40));
        let set = recognizer.extract("nada novo", Some("u4"));
        assert!(set.people.contains("carla"));
        assert!(set.people.contains("bruno"));
    }

    #[test]
    fn merge_is_pure_and_unions() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap();
        let mut a = EntitySet::empty(at);
        a.people.insert("ana".to_string());
        let mut b = EntitySet::empty(at + Duration::minutes(5));
        b.people.insert("bia".to_string());

        let merged = merge_entity_sets(&a, &b);
        assert_eq!(merged.people.len(), 2);
        assert_eq!(merged.timestamp, b.timestamp);
        assert_eq!(a.people.len(), 1);
    }
}
