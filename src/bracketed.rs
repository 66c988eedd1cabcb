//! Bracketed constituency trees
//!
//! Reads Penn Treebank style strings into [`RawNode`] trees using a pest
//! grammar. Trace leaves (`-NONE-`) are dropped, function tags are stripped
//! from phrase labels (`NP-SBJ-1` becomes `NP`) and the bracket tokens
//! `-LRB-`/`-RRB-` are restored to parentheses.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use thiserror::Error;

use crate::raw::RawNode;

#[derive(Parser)]
#[grammar = "bracketed.pest"]
struct BracketedParser;

/// Error type for parse failures
#[derive(Debug, Error)]
#[error("Parse error: {message}")]
pub struct BracketedError {
    pub message: String,
}

impl From<pest::error::Error<Rule>> for BracketedError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        BracketedError {
            message: err.to_string(),
        }
    }
}

/// Parse a bracketed tree
///
/// The root's word is the space-joined leaves, which is the sentence the
/// tree's spans index into.
pub fn parse_bracketed(input: &str) -> Result<RawNode, BracketedError> {
    let mut pairs = BracketedParser::parse(Rule::tree, input)?;

    let Some(tree_pair) = pairs.next() else {
        return Err(BracketedError {
            message: "No tree found".to_string(),
        });
    };
    let Some(node_pair) = tree_pair.into_inner().find(|p| p.as_rule() == Rule::node) else {
        return Err(BracketedError {
            message: "Empty tree".to_string(),
        });
    };

    match parse_node(node_pair)? {
        Some(root) => Ok(root),
        None => Err(BracketedError {
            message: "Tree holds only empty elements".to_string(),
        }),
    }
}

/// Parse one bracket; None for empty elements
fn parse_node(pair: Pair<Rule>) -> Result<Option<RawNode>, BracketedError> {
    let mut label = None;
    let mut word = None;
    let mut children = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::label => label = Some(inner.as_str()),
            Rule::word => word = Some(inner.as_str()),
            Rule::node => {
                if let Some(child) = parse_node(inner)? {
                    children.push(child);
                }
            }
            _ => {}
        }
    }

    match (label, word) {
        (Some("-NONE-"), _) => Ok(None),
        (Some(label), Some(word)) => Ok(Some(RawNode::leaf(&unescape(word), label))),
        (Some(label), None) if !children.is_empty() => {
            Ok(Some(RawNode::phrase(strip_function_tags(label), children)))
        }
        // every child was an empty element
        (Some(_), None) => Ok(None),
        // unlabeled wrapper: ( (S ...) )
        (None, None) => match children.len() {
            0 => Err(BracketedError {
                message: "Empty brackets".to_string(),
            }),
            1 => Ok(children.pop()),
            _ => Ok(Some(RawNode::phrase("ROOT", children))),
        },
        (None, Some(word)) => Err(BracketedError {
            message: format!("Word without a category: {}", word),
        }),
    }
}

fn strip_function_tags(label: &str) -> &str {
    if label.starts_with('-') {
        return label;
    }
    match label.find(['-', '=']) {
        Some(cut) => &label[..cut],
        None => label,
    }
}

fn unescape(word: &str) -> String {
    match word {
        "-LRB-" => "(".to_string(),
        "-RRB-" => ")".to_string(),
        "-LCB-" => "{".to_string(),
        "-RCB-" => "}".to_string(),
        _ => word.to_string(),
    }
}
