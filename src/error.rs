//! Error types
//!
//! Two layers: `Issue` is a non-fatal finding recorded while a sentence is
//! processed (the sentence still produces a result), `Error` aborts the
//! sentence it occurred in.

use serde::Serialize;
use thiserror::Error;

use crate::bracketed::BracketedError;
use crate::conllu::ParseError;

/// Non-fatal problem found while labeling or rewriting a sentence
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum Issue {
    #[error("lookup miss: {0:?} not found in tree")]
    LookupMiss(String),

    #[error("ambiguous structure: {0}")]
    AmbiguousStructure(String),

    #[error("span of {child:?} could not be located in {parent:?}")]
    SpanResolution { child: String, parent: String },

    #[error("{0} location phrases found, only pairwise merging is supported")]
    UnsupportedLocationMerge(usize),
}

/// Error that aborts the analysis of one sentence
#[derive(Debug, Error)]
pub enum Error {
    #[error("bracketed tree error: {0}")]
    Bracketed(#[from] BracketedError),

    #[error("CoNLL-U error: {0}")]
    Conllu(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("empty parse tree for sentence {0:?}")]
    EmptyTree(String),
}
