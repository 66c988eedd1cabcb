//! Normalized-text index for node lookup
//!
//! Maps the normalized label of every attached node to the nodes carrying
//! it, so entity strings can be matched against the tree without a full
//! traversal per lookup. An index remembers the tree generation it was built
//! from and must be rebuilt once the tree has changed.

use rustc_hash::FxHashMap;

use crate::tree::{NodeId, Tree, normalize};

/// Which fallback tier produced a lookup result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Prefix,
    WordSet,
}

/// Inverted index over attached nodes, keyed by normalized label
#[derive(Debug, Clone, Default)]
pub struct NodeIndex {
    by_text: FxHashMap<String, Vec<NodeId>>,
    /// (normalized label, node) in pre-order, for prefix scans
    ordered: Vec<(String, NodeId)>,
    generation: u64,
}

impl NodeIndex {
    /// Build an index from a tree
    pub fn build(tree: &Tree) -> Self {
        let mut index = Self {
            generation: tree.generation(),
            ..Self::default()
        };

        for id in tree.preorder() {
            let text = tree.node(id).normalized();
            index.by_text.entry(text.clone()).or_default().push(id);
            index.ordered.push((text, id));
        }

        index
    }

    /// True if the tree changed since the index was built
    pub fn is_stale(&self, tree: &Tree) -> bool {
        self.generation != tree.generation()
    }

    /// Nodes whose normalized label is exactly `text`
    pub fn get_by_text(&self, text: &str) -> &[NodeId] {
        self.by_text.get(text).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Nodes matching `target`, trying exact, prefix and word-set matches
    /// in that order and stopping at the first tier with results
    ///
    /// Results are in pre-order.
    pub fn lookup(&self, target: &str) -> Vec<NodeId> {
        self.lookup_tiered(target)
            .map(|(_, ids)| ids)
            .unwrap_or_default()
    }

    pub fn lookup_tiered(&self, target: &str) -> Option<(MatchTier, Vec<NodeId>)> {
        let target = normalize(target);
        if target.is_empty() {
            return None;
        }
        let with_article = format!("the {}", target);

        let exact: Vec<NodeId> = self
            .ordered
            .iter()
            .filter(|(text, _)| *text == target || *text == with_article)
            .map(|&(_, id)| id)
            .collect();
        if !exact.is_empty() {
            return Some((MatchTier::Exact, exact));
        }

        // a prefix match may not run past the target's last word, or the
        // labeled node would swallow the words that follow the entity
        let prefix: Vec<NodeId> = self
            .ordered
            .iter()
            .filter(|(text, _)| word_prefix(text, &target) || word_prefix(text, &with_article))
            .map(|&(_, id)| id)
            .collect();
        if !prefix.is_empty() {
            return Some((MatchTier::Prefix, prefix));
        }

        let words: Vec<&str> = target.split(' ').collect();
        if words.len() > 1 {
            let word_set: Vec<NodeId> = self
                .ordered
                .iter()
                .filter(|(text, _)| words.contains(&text.as_str()))
                .map(|&(_, id)| id)
                .collect();
            if !word_set.is_empty() {
                return Some((MatchTier::WordSet, word_set));
            }
        }

        None
    }
}

/// `text` starts with `target` and has no words beyond it
fn word_prefix(text: &str, target: &str) -> bool {
    text.starts_with(target) && text.split(' ').count() == target.split(' ').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawNode;

    fn river_tree() -> Tree {
        // "Where is the Danube river"
        Tree::from_raw(&RawNode::phrase(
            "SBARQ",
            vec![
                RawNode::phrase("WHADVP", vec![RawNode::leaf("Where", "WRB")]),
                RawNode::leaf("is", "VBZ"),
                RawNode::phrase(
                    "NP",
                    vec![
                        RawNode::leaf("the", "DT"),
                        RawNode::leaf("Danube", "NNP"),
                        RawNode::leaf("river", "NN"),
                    ],
                ),
            ],
        ))
    }

    #[test]
    fn test_index_building() {
        let tree = river_tree();
        let index = NodeIndex::build(&tree);

        assert_eq!(index.get_by_text("danube").len(), 1);
        assert!(index.get_by_text("Danube").is_empty());
        assert!(!index.is_stale(&tree));
    }

    #[test]
    fn test_exact_match_with_article() {
        let tree = river_tree();
        let index = NodeIndex::build(&tree);
        let (tier, ids) = index.lookup_tiered("Danube river").unwrap();

        assert_eq!(tier, MatchTier::Exact);
        assert_eq!(tree.node(ids[0]).category, "NP");
    }

    #[test]
    fn test_prefix_match() {
        let tree = river_tree();
        let index = NodeIndex::build(&tree);
        let (tier, ids) = index.lookup_tiered("Danube").unwrap();

        // the NP "the danube river" starts with "the danube"
        assert_eq!(tier, MatchTier::Exact);
        assert_eq!(ids.len(), 1);

        let (tier, ids) = index.lookup_tiered("Dan").unwrap();
        assert_eq!(tier, MatchTier::Prefix);
        assert_eq!(ids.len(), 1);
        assert_eq!(tree.node(ids[0]).label, "Danube");
    }

    #[test]
    fn test_prefix_match_stops_at_target_words() {
        // "Kuala Lumpur hotels are cheap"
        let tree = Tree::from_raw(&RawNode::phrase(
            "S",
            vec![
                RawNode::phrase(
                    "NP",
                    vec![
                        RawNode::leaf("Kuala", "NNP"),
                        RawNode::leaf("Lumpur", "NNP"),
                        RawNode::leaf("hotels", "NNS"),
                    ],
                ),
                RawNode::phrase(
                    "VP",
                    vec![RawNode::leaf("are", "VBP"), RawNode::leaf("cheap", "JJ")],
                ),
            ],
        ));
        let index = NodeIndex::build(&tree);
        let (tier, ids) = index.lookup_tiered("Kuala Lumpur").unwrap();

        assert_eq!(tier, MatchTier::WordSet);
        let labels: Vec<&str> = ids.iter().map(|&id| tree.node(id).label.as_str()).collect();
        assert_eq!(labels, vec!["Kuala", "Lumpur"]);
    }

    #[test]
    fn test_word_set_match_only_for_multiword_targets() {
        let tree = river_tree();
        let index = NodeIndex::build(&tree);

        let (tier, ids) = index.lookup_tiered("blue river").unwrap();
        assert_eq!(tier, MatchTier::WordSet);
        assert_eq!(tree.node(ids[0]).label, "river");

        assert!(index.lookup("lake").is_empty());
    }

    #[test]
    fn test_stale_after_edit() {
        let mut tree = river_tree();
        let index = NodeIndex::build(&tree);
        let det = index.get_by_text("the")[0];
        tree.detach(det);

        assert!(index.is_stale(&tree));
    }
}
