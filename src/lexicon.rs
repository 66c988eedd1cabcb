//! Word lists consulted by the labeling passes
//!
//! A `Lexicon` is built once, either from the built-in lists or from word
//! list files (one entry per line, optionally gzip-compressed), and is
//! read-only afterwards.

use flate2::read::MultiGzDecoder;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Error;
use crate::role::ComparisonSign;

const PLACE_TYPES: &[&str] = &[
    "airport", "bay", "beach", "bridge", "building", "canal", "capital", "castle", "cathedral",
    "church", "city", "coast", "continent", "country", "county", "desert", "district",
    "forest", "glacier", "gulf", "harbor", "highway", "hill", "hospital", "hotel", "island",
    "lake", "mall", "monument", "mountain", "mountain range", "museum", "national park",
    "neighborhood", "ocean", "park", "peninsula", "plain", "port", "province", "railway station",
    "region", "restaurant", "river", "road", "school", "sea", "state", "station", "stadium",
    "street", "town", "university", "valley", "village", "volcano", "waterfall",
    "cities", "countries", "lakes", "mountains", "rivers", "towns", "islands", "parks",
    "hospitals", "schools", "restaurants", "hotels", "villages", "beaches", "airports",
];

const EVENT_TYPES: &[&str] = &[
    "battle", "concert", "conference", "earthquake", "election", "eruption", "festival",
    "fire", "flood", "hurricane", "match", "olympics", "protest", "storm", "tournament", "war",
    "wildfire", "world cup",
];

const COUNTRIES: &[&str] = &[
    "austria", "belgium", "brazil", "canada", "china", "denmark", "egypt", "england",
    "france", "germany", "greece", "hungary", "india", "ireland", "italy", "japan", "mexico",
    "netherlands", "norway", "poland", "portugal", "romania", "russia", "scotland", "spain",
    "sweden", "switzerland", "turkey", "ukraine", "united kingdom", "united states", "wales",
];

const UNITS: &[&str] = &[
    "meter", "meters", "metre", "metres", "m", "kilometer", "kilometers", "kilometre",
    "kilometres", "km", "kms", "mile", "miles", "mi", "foot", "feet", "ft", "yard", "yards",
    "minute", "minutes", "min", "mins", "hour", "hours", "h", "hr", "hrs", "second", "seconds",
    "day", "days", "week", "weeks", "year", "years", "hectare", "hectares", "ha", "acre",
    "acres", "percent", "%",
];

const SPATIOTEMPORAL_PREPOSITIONS: &[&str] = &[
    "in", "on", "at", "near", "within", "inside", "outside", "around", "across", "along",
    "between", "beside", "behind", "through", "from", "to", "towards", "before", "after",
    "during", "since", "until", "above", "below", "under", "over", "beyond", "by", "into",
    "next to", "close to", "nearest to", "far from", "away from",
];

const AND_WORDS: &[&str] = &["and", "both"];
const OR_WORDS: &[&str] = &["or", "whether", "either"];
const NOT_WORDS: &[&str] = &["not", "neither", "nor", "but", "except"];

const QUESTION_WORDS: &[&str] = &[
    "where", "what", "which", "when", "why", "how", "who", "whom", "whose",
];

const CONDITIONALS: &[&str] = &["are", "is", "was", "were", "did", "do", "does"];

const STOP_WORDS: &[&str] = &[
    "i", "am", "we", "are", "he", "she", "is", "they", "was", "where", "do", "does", "did",
    "done", "has", "have", "had", "be", "been",
];

const GREATER: &[&str] = &[
    "more", "greater", "higher", "larger", "bigger", "taller", "longer", "wider",
];
const LESS: &[&str] = &["less", "fewer", "lower", "smaller", "shorter", "narrower"];

const ACTION_VERBS: &[&str] = &[
    "buy", "build", "climb", "cross", "drive", "eat", "fly", "go", "hike", "move", "play",
    "ride", "run", "sail", "see", "ski", "swim", "take", "travel", "visit", "walk", "watch",
];

const STATIVE_VERBS: &[&str] = &[
    "be", "belong", "border", "consist", "contain", "cover", "exist", "flow", "have", "include",
    "lie", "live", "locate", "located", "own", "remain", "situate", "situated", "stand",
];

/// Word list files overriding the built-in lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconPaths {
    pub place_types: Option<PathBuf>,
    pub event_types: Option<PathBuf>,
    pub countries: Option<PathBuf>,
    pub units: Option<PathBuf>,
    pub action_verbs: Option<PathBuf>,
    pub stative_verbs: Option<PathBuf>,
}

/// Read-only word lists
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    pub place_types: FxHashSet<String>,
    pub event_types: FxHashSet<String>,
    pub countries: FxHashSet<String>,
    pub units: FxHashSet<String>,
    pub spatiotemporal_prepositions: FxHashSet<String>,
    pub and_words: FxHashSet<String>,
    pub or_words: FxHashSet<String>,
    pub not_words: FxHashSet<String>,
    pub question_words: FxHashSet<String>,
    pub conditionals: FxHashSet<String>,
    pub stop_words: FxHashSet<String>,
    pub greater_comparatives: FxHashSet<String>,
    pub less_comparatives: FxHashSet<String>,
    pub action_verbs: FxHashSet<String>,
    pub stative_verbs: FxHashSet<String>,
}

fn to_set(words: &[&str]) -> FxHashSet<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Lexicon {
    /// Lexicon with the built-in word lists
    pub fn builtin() -> Self {
        Self {
            place_types: to_set(PLACE_TYPES),
            event_types: to_set(EVENT_TYPES),
            countries: to_set(COUNTRIES),
            units: to_set(UNITS),
            spatiotemporal_prepositions: to_set(SPATIOTEMPORAL_PREPOSITIONS),
            and_words: to_set(AND_WORDS),
            or_words: to_set(OR_WORDS),
            not_words: to_set(NOT_WORDS),
            question_words: to_set(QUESTION_WORDS),
            conditionals: to_set(CONDITIONALS),
            stop_words: to_set(STOP_WORDS),
            greater_comparatives: to_set(GREATER),
            less_comparatives: to_set(LESS),
            action_verbs: to_set(ACTION_VERBS),
            stative_verbs: to_set(STATIVE_VERBS),
        }
    }

    /// Built-in lists with the given files replacing their counterparts
    pub fn load(paths: &LexiconPaths) -> Result<Self, Error> {
        let mut lexicon = Self::builtin();
        let targets = [
            (&paths.place_types, &mut lexicon.place_types),
            (&paths.event_types, &mut lexicon.event_types),
            (&paths.countries, &mut lexicon.countries),
            (&paths.units, &mut lexicon.units),
            (&paths.action_verbs, &mut lexicon.action_verbs),
            (&paths.stative_verbs, &mut lexicon.stative_verbs),
        ];
        for (path, set) in targets {
            if let Some(path) = path {
                *set = read_word_list(path)?.into_iter().collect();
                debug!(path = %path.display(), entries = set.len(), "loaded word list");
            }
        }
        Ok(lexicon)
    }

    pub fn is_place_type(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.place_types.contains(strip_article(&lower))
    }

    pub fn is_country(&self, text: &str) -> bool {
        self.countries.contains(&crate::tree::normalize(text))
    }

    pub fn is_unit(&self, text: &str) -> bool {
        self.units.contains(&text.to_lowercase())
    }

    pub fn is_stop_word(&self, text: &str) -> bool {
        self.stop_words.contains(&text.to_lowercase())
    }

    pub fn is_spatiotemporal(&self, text: &str) -> bool {
        self.spatiotemporal_prepositions
            .contains(&crate::tree::normalize(text))
    }

    /// Direction of a comparative adjective
    pub fn comparison_sign(&self, word: &str) -> Option<ComparisonSign> {
        let word = word.to_lowercase();
        if self.greater_comparatives.contains(&word) {
            Some(ComparisonSign::Greater)
        } else if self.less_comparatives.contains(&word) {
            Some(ComparisonSign::Less)
        } else {
            None
        }
    }

    /// Type names occurring in a question
    ///
    /// Excluded strings (already recognized entities) are removed from the
    /// lowercased question first. Matches are returned longest first, and a
    /// match contained in an already kept one is dropped ("city" when "capital
    /// city" was found).
    pub fn find_types<'a>(
        question: &str,
        excluded: &[String],
        types: &'a FxHashSet<String>,
    ) -> Vec<&'a str> {
        let mut text = format!(" {} ", question.to_lowercase());
        for entity in excluded {
            text = text.replace(&entity.to_lowercase(), " ");
        }
        let text = tokenize_for_search(&text);

        let mut found: Vec<&str> = types
            .iter()
            .map(String::as_str)
            .filter(|t| text.contains(&format!(" {} ", t)))
            .collect();
        found.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut kept: Vec<&str> = Vec::new();
        for candidate in found {
            if !kept.iter().any(|k| k.contains(candidate)) {
                kept.push(candidate);
            }
        }
        kept
    }
}

/// Pad punctuation with spaces so word-boundary checks see it as separate
fn tokenize_for_search(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if c.is_ascii_punctuation() && c != '-' && c != '\'' {
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    format!(" {} ", out.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn strip_article(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed.strip_prefix("the ").unwrap_or(trimmed)
}

/// Open a text file, transparently decompressing `.gz` files
pub fn open_text(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Read one lowercased entry per non-empty line
pub fn read_word_list(path: &Path) -> io::Result<Vec<String>> {
    let mut words = Vec::new();
    for line in open_text(path)?.lines() {
        let line = line?;
        let word = line.trim();
        if !word.is_empty() && !word.starts_with('#') {
            words.push(word.to_lowercase());
        }
    }
    Ok(words)
}
