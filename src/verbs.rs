//! Verb classification into activities and situations
//!
//! Classification is an injected capability: the labeling pass only sees a
//! [`VerbClassifier`]. Two implementations are provided, one backed by word
//! embeddings supplied through an [`Embedder`], one by the lexicon's verb
//! lists.

use serde::{Deserialize, Serialize};

use crate::lexicon::Lexicon;

/// Outcome of classifying a verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerbClass {
    Activity,
    Situation,
    Unknown,
}

pub trait VerbClassifier {
    /// Classify `verb` as it occurs in `sentence`
    fn classify(&self, verb: &str, sentence: &str) -> VerbClass;
}

/// Source of contextual word embeddings
pub trait Embedder {
    fn embed(&self, word: &str, sentence: &str) -> Option<Vec<f32>>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn max_similarity(target: &[f32], references: &[Vec<f32>]) -> f32 {
    references
        .iter()
        .map(|r| cosine_similarity(target, r))
        .fold(f32::MIN, f32::max)
}

/// Classifier comparing a verb's embedding with reference embeddings
pub struct EmbeddingClassifier<E: Embedder> {
    embedder: E,
    activities: Vec<Vec<f32>>,
    situations: Vec<Vec<f32>>,
    threshold: f32,
}

impl<E: Embedder> EmbeddingClassifier<E> {
    pub fn new(
        embedder: E,
        activities: Vec<Vec<f32>>,
        situations: Vec<Vec<f32>>,
        threshold: f32,
    ) -> Self {
        Self {
            embedder,
            activities,
            situations,
            threshold,
        }
    }

    /// Embed the lexicon's action and stative verbs as references
    pub fn from_lexicon(embedder: E, lexicon: &Lexicon, threshold: f32) -> Self {
        let embed_all = |words: &rustc_hash::FxHashSet<String>| {
            let mut words: Vec<&String> = words.iter().collect();
            words.sort();
            words
                .into_iter()
                .filter_map(|w| embedder.embed(w, w))
                .collect::<Vec<_>>()
        };
        let activities = embed_all(&lexicon.action_verbs);
        let situations = embed_all(&lexicon.stative_verbs);
        Self::new(embedder, activities, situations, threshold)
    }
}

impl<E: Embedder> VerbClassifier for EmbeddingClassifier<E> {
    fn classify(&self, verb: &str, sentence: &str) -> VerbClass {
        let Some(embedding) = self.embedder.embed(verb, sentence) else {
            return VerbClass::Unknown;
        };
        let activity = max_similarity(&embedding, &self.activities);
        let situation = max_similarity(&embedding, &self.situations);

        if activity > situation.max(self.threshold) {
            VerbClass::Activity
        } else if situation > activity.max(self.threshold) {
            VerbClass::Situation
        } else {
            VerbClass::Unknown
        }
    }
}

/// Classifier looking verbs up in the lexicon's verb lists
#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    lexicon: Lexicon,
}

impl LexiconClassifier {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }
}

impl VerbClassifier for LexiconClassifier {
    fn classify(&self, verb: &str, _sentence: &str) -> VerbClass {
        let verb = verb.to_lowercase();
        let stem = base_form(&verb);
        let known = |set: &rustc_hash::FxHashSet<String>| {
            set.contains(&verb) || stem.iter().any(|s| set.contains(s))
        };
        if known(&self.lexicon.action_verbs) {
            VerbClass::Activity
        } else if known(&self.lexicon.stative_verbs) {
            VerbClass::Situation
        } else {
            VerbClass::Unknown
        }
    }
}

/// Candidate base forms of an inflected verb
fn base_form(verb: &str) -> Vec<String> {
    let mut forms = Vec::new();
    for suffix in ["ing", "ed", "es", "s"] {
        if let Some(stem) = verb.strip_suffix(suffix) {
            if stem.len() > 1 {
                forms.push(stem.to_string());
                forms.push(format!("{}e", stem));
            }
        }
    }
    forms
}
