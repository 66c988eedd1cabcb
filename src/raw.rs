//! Raw parser output
//!
//! The nested dictionaries emitted by the upstream parsing service
//! (`{word, nodeType, attributes, link, spans, children}`), deserialized
//! as-is before they are wrapped into a [`crate::tree::Tree`].

use serde::{Deserialize, Serialize};

/// Character span reported by a dependency parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSpan {
    pub start: usize,
    pub end: usize,
}

/// One node of a parser's output tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawNode {
    pub word: String,
    #[serde(rename = "nodeType")]
    pub node_type: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub spans: Vec<RawSpan>,
    #[serde(default)]
    pub children: Vec<RawNode>,
}

impl RawNode {
    /// Leaf with a word and a category
    pub fn leaf(word: &str, node_type: &str) -> Self {
        Self {
            word: word.to_string(),
            node_type: node_type.to_string(),
            ..Self::default()
        }
    }

    /// Phrase node whose word is the space-joined words of its children
    pub fn phrase(node_type: &str, children: Vec<RawNode>) -> Self {
        let word = children
            .iter()
            .map(|c| c.word.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            word,
            node_type: node_type.to_string(),
            children,
            ..Self::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(RawNode::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.word.trim().is_empty() && self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_hierplane_node() {
        let json = r#"{
            "word": "in London",
            "nodeType": "PP",
            "children": [
                {"word": "in", "nodeType": "IN"},
                {"word": "London", "nodeType": "NNP"}
            ]
        }"#;
        let node: RawNode = serde_json::from_str(json).unwrap();

        assert_eq!(node.node_type, "PP");
        assert_eq!(node.children.len(), 2);
        assert!(node.children[1].is_leaf());
        assert_eq!(node.len(), 3);
    }

    #[test]
    fn test_deserialize_dependency_node() {
        let json = r#"{
            "word": "runs",
            "nodeType": "root",
            "attributes": ["VERB"],
            "link": "root",
            "spans": [{"start": 4, "end": 8}]
        }"#;
        let node: RawNode = serde_json::from_str(json).unwrap();

        assert_eq!(node.attributes, vec!["VERB".to_string()]);
        assert_eq!(node.spans[0], RawSpan { start: 4, end: 8 });
    }

    #[test]
    fn test_phrase_joins_words() {
        let node = RawNode::phrase(
            "NP",
            vec![RawNode::leaf("the", "DT"), RawNode::leaf("city", "NN")],
        );
        assert_eq!(node.word, "the city");
    }
}
