//! Semantic roles assigned to parse-tree nodes
//!
//! Every role has a single-character code; the flattened role code of a
//! question is the concatenation of these codes in document order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a comparison ("more ... than" vs "less ... than")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonSign {
    Greater,
    Less,
}

/// Kind of question intent, keyed by the question word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentKind {
    Other,
    Where,
    What,
    Which,
    When,
    How,
    /// "how" followed by an adjective ("how big", "how far")
    HowAdjective,
    Why,
    /// Yes/no question opened by an auxiliary ("Is ...", "Does ...")
    Conditional,
}

impl IntentKind {
    pub fn code(self) -> char {
        match self {
            IntentKind::Other => '0',
            IntentKind::Where => '1',
            IntentKind::What => '2',
            IntentKind::Which => '3',
            IntentKind::When => '4',
            IntentKind::How => '5',
            IntentKind::HowAdjective => '6',
            IntentKind::Why => '7',
            IntentKind::Conditional => '8',
        }
    }

    /// Map a question word to its intent kind, if it is one of the
    /// pronoun-style question words
    pub fn from_question_word(word: &str) -> Option<Self> {
        match word {
            "where" => Some(IntentKind::Where),
            "what" => Some(IntentKind::What),
            "which" => Some(IntentKind::Which),
            "when" => Some(IntentKind::When),
            "why" => Some(IntentKind::Why),
            "how" => Some(IntentKind::How),
            _ => None,
        }
    }
}

/// Semantic role of a tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Toponym,
    PlaceType,
    Event,
    EventType,
    Date,
    SpatialRelation,
    /// Quality of a place ("largest city")
    Quality,
    /// Quality of a non-platial object ("average price")
    ObjectQuality,
    Activity,
    Situation,
    Object,
    Location,
    Measure,
    Number,
    And,
    Or,
    Not,
    Comparison(ComparisonSign),
    Intent(IntentKind),
}

impl Role {
    /// Single-character code used in flattened role sequences
    pub fn code(self) -> char {
        match self {
            Role::Toponym => 'P',
            Role::PlaceType => 'p',
            Role::Event => 'E',
            Role::EventType => 'e',
            Role::Date => 'd',
            Role::SpatialRelation => 'r',
            Role::Quality => 'Q',
            Role::ObjectQuality => 'q',
            Role::Activity => 'a',
            Role::Situation => 's',
            Role::Object => 'o',
            Role::Location => 'L',
            Role::Measure => 'm',
            Role::Number => 'n',
            Role::And => '&',
            Role::Or => '|',
            Role::Not => '!',
            Role::Comparison(ComparisonSign::Greater) => '>',
            Role::Comparison(ComparisonSign::Less) => '<',
            Role::Intent(kind) => kind.code(),
        }
    }

    /// Parse a role back from its code
    pub fn from_code(code: char) -> Option<Self> {
        let role = match code {
            'P' => Role::Toponym,
            'p' => Role::PlaceType,
            'E' => Role::Event,
            'e' => Role::EventType,
            'd' => Role::Date,
            'r' => Role::SpatialRelation,
            'Q' => Role::Quality,
            'q' => Role::ObjectQuality,
            'a' => Role::Activity,
            's' => Role::Situation,
            'o' => Role::Object,
            'L' => Role::Location,
            'm' => Role::Measure,
            'n' => Role::Number,
            '&' => Role::And,
            '|' => Role::Or,
            '!' => Role::Not,
            '>' => Role::Comparison(ComparisonSign::Greater),
            '<' => Role::Comparison(ComparisonSign::Less),
            '0' => Role::Intent(IntentKind::Other),
            '1' => Role::Intent(IntentKind::Where),
            '2' => Role::Intent(IntentKind::What),
            '3' => Role::Intent(IntentKind::Which),
            '4' => Role::Intent(IntentKind::When),
            '5' => Role::Intent(IntentKind::How),
            '6' => Role::Intent(IntentKind::HowAdjective),
            '7' => Role::Intent(IntentKind::Why),
            '8' => Role::Intent(IntentKind::Conditional),
            _ => return None,
        };
        Some(role)
    }

    /// Named entities supplied by the recognizer or the type gazetteers
    pub fn is_entity(self) -> bool {
        matches!(
            self,
            Role::Toponym | Role::PlaceType | Role::Event | Role::EventType | Role::Date
        )
    }

    pub fn is_conjunction(self) -> bool {
        matches!(self, Role::And | Role::Or | Role::Not)
    }

    pub fn is_quality(self) -> bool {
        matches!(self, Role::Quality | Role::ObjectQuality)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Concatenate role codes
pub fn role_code<I: IntoIterator<Item = Role>>(roles: I) -> String {
    roles.into_iter().map(Role::code).collect()
}
