//! Geoquestion: semantic role labeling of parse trees for geographic questions
//!
//! Takes the constituency (and optionally dependency) parse of a question,
//! labels its nodes with semantic roles, restructures location, conjunction
//! and comparison phrases, and extracts the relations a query generator
//! needs.

// Tree model and parser output readers
pub mod bracketed; // Penn Treebank bracketed trees
pub mod conllu; // CoNLL-U dependency parses
pub mod index; // Text index for node lookup
pub mod raw; // Nested parser output
pub mod tree; // Arena tree with spans and roles

// Labeling and rewriting passes
pub mod dependency;
pub mod labeling;
pub mod lexicon;
pub mod query_model;
pub mod resolve; // Conjunctions, qualities, comparisons
pub mod rewrite; // Structural rewrites
pub mod role;
pub mod verbs;

pub mod config;
pub mod error;
pub mod pipeline; // End-to-end analysis (labeling + rewriting + extraction)

// Re-exports for convenience
pub use bracketed::parse_bracketed;
pub use config::Config;
pub use conllu::CoNLLUReader;
pub use dependency::{Dependency, DependencyList, RelationKind};
pub use error::{Error, Issue};
pub use labeling::Entities;
pub use lexicon::Lexicon;
pub use pipeline::{Analysis, Analyzer, ParsedQuestion};
pub use query_model::QueryModel;
pub use raw::RawNode;
pub use role::Role;
pub use tree::{Node, NodeId, Span, Tree};
