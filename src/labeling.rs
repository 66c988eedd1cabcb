//! Role labeling: matching entity strings, question words and verbs to nodes
//!
//! Entity labeling runs in a fixed priority order (toponyms, place types,
//! events, event types, dates); an earlier label claims a node and later
//! lookups only consider unlabeled nodes.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Issue;
use crate::index::{MatchTier, NodeIndex};
use crate::lexicon::Lexicon;
use crate::role::{IntentKind, Role};
use crate::tree::{NodeId, Tree};
use crate::verbs::{VerbClass, VerbClassifier};

/// Entity strings recognized in a sentence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entities {
    pub toponyms: Vec<String>,
    pub events: Vec<String>,
    pub dates: Vec<String>,
    pub place_types: Vec<String>,
    pub event_types: Vec<String>,
}

impl Entities {
    /// Fill in place and event types from the lexicon when none were given
    pub fn complete(&mut self, sentence: &str, lexicon: &Lexicon) {
        let mut excluded: Vec<String> = self
            .toponyms
            .iter()
            .chain(&self.events)
            .chain(&self.dates)
            .cloned()
            .collect();

        if self.place_types.is_empty() {
            self.place_types = Lexicon::find_types(sentence, &excluded, &lexicon.place_types)
                .into_iter()
                .map(str::to_string)
                .collect();
        }
        excluded.extend(self.place_types.iter().cloned());

        if self.event_types.is_empty() {
            self.event_types = Lexicon::find_types(sentence, &excluded, &lexicon.event_types)
                .into_iter()
                .map(str::to_string)
                .collect();
        }
    }

    /// (text, role) pairs in labeling priority order
    pub fn in_priority_order(&self) -> Vec<(&str, Role)> {
        let groups = [
            (&self.toponyms, Role::Toponym),
            (&self.place_types, Role::PlaceType),
            (&self.events, Role::Event),
            (&self.event_types, Role::EventType),
            (&self.dates, Role::Date),
        ];
        groups
            .into_iter()
            .flat_map(|(texts, role)| texts.iter().map(move |t| (t.as_str(), role)))
            .collect()
    }
}

/// Assigns roles to tree nodes, caching a text index between lookups
pub struct Labeler<'a> {
    lexicon: &'a Lexicon,
    index: Option<NodeIndex>,
}

impl<'a> Labeler<'a> {
    pub fn new(lexicon: &'a Lexicon) -> Self {
        Self {
            lexicon,
            index: None,
        }
    }

    fn index(&mut self, tree: &Tree) -> &NodeIndex {
        if self.index.as_ref().is_none_or(|index| index.is_stale(tree)) {
            self.index = None;
        }
        self.index.get_or_insert_with(|| NodeIndex::build(tree))
    }

    /// Label the node(s) matching `text` with `role`
    ///
    /// Only unlabeled nodes are candidates. When several nodes match, the
    /// shallowest one wins and takes `text` as its label; the other matches
    /// are detached. With `clean`, the labeled node drops its children.
    /// Returns false when nothing matched.
    pub fn label_role(
        &mut self,
        tree: &mut Tree,
        text: &str,
        role: Role,
        clean: bool,
        question_words: &[String],
        comparison: bool,
    ) -> bool {
        let Some((tier, found)) = self.index(tree).lookup_tiered(text) else {
            return false;
        };
        // only an exact match may claim the whole sentence
        let candidates: Vec<NodeId> = found
            .into_iter()
            .filter(|&id| tree.node(id).role.is_none())
            .filter(|&id| tier == MatchTier::Exact || id != tree.root_id)
            .collect();

        let selected = match candidates.as_slice() {
            [] => return false,
            [single] => *single,
            _ => {
                let filtered: Vec<NodeId> = candidates
                    .iter()
                    .copied()
                    .filter(|&id| tree.node(id).normalized() != "of")
                    .collect();
                let pool = if filtered.is_empty() { &candidates } else { &filtered };
                let Some(&selected) = pool.iter().min_by_key(|&&id| tree.depth(id)) else {
                    return false;
                };

                for &other in &candidates {
                    if other != selected {
                        tree.detach(other);
                    }
                }

                let first_word = text
                    .split_whitespace()
                    .next()
                    .map(str::to_lowercase)
                    .unwrap_or_default();
                let category = if question_words.contains(&first_word) {
                    "WHNP"
                } else if comparison {
                    "JJR"
                } else {
                    "NP"
                };
                tree.set_label(selected, text);
                tree.set_category(selected, category);
                debug!(
                    text,
                    matches = candidates.len(),
                    "several nodes matched, keeping the shallowest"
                );
                selected
            }
        };

        tree.set_role(selected, Some(role));
        if clean {
            tree.clear_children(selected);
        }
        true
    }

    /// Label recognized entities in priority order
    ///
    /// Strings that match no node are recorded as lookup misses.
    pub fn label_entities(&mut self, tree: &mut Tree, entities: &Entities) {
        let question_words = self.leading_question_words(tree);
        for (text, role) in entities.in_priority_order() {
            if !self.label_role(tree, text, role, true, &question_words, false) {
                warn!(text, role = %role, "entity not found in tree");
                tree.issues.push(Issue::LookupMiss(text.to_string()));
            }
        }
    }

    /// Question words opening the sentence or one of its top-most WH phrases
    fn leading_question_words(&self, tree: &Tree) -> Vec<String> {
        let mut openers: Vec<NodeId> = tree.leaves().into_iter().take(1).collect();
        for wh in top_wh_phrases(tree) {
            openers.extend(tree.leaves_of(wh).into_iter().take(1));
        }

        let mut words: Vec<String> = Vec::new();
        for id in openers {
            let word = tree.node(id).normalized();
            if self.lexicon.question_words.contains(&word) && !words.contains(&word) {
                words.push(word);
            }
        }
        words
    }

    /// Encode the question's intent on its question word
    ///
    /// The first word of every top-most WH phrase gets an intent role. A
    /// sentence without WH phrase that opens with an auxiliary is a yes/no
    /// question.
    pub fn label_intent(&mut self, tree: &mut Tree) {
        let wh_phrases = top_wh_phrases(tree);

        for &wh in &wh_phrases {
            let leaves = tree.leaves_of(wh);
            let Some(&first) = leaves.first() else {
                continue;
            };
            if tree.node(first).has_role() {
                continue;
            }
            let word = tree.node(first).normalized();
            let kind = match IntentKind::from_question_word(&word) {
                Some(IntentKind::How)
                    if leaves[1..].iter().any(|&l| {
                        let node = tree.node(l);
                        node.is_adjective() || node.category.starts_with("RB")
                    }) =>
                {
                    IntentKind::HowAdjective
                }
                Some(kind) => kind,
                None => IntentKind::Other,
            };
            debug!(word = %word, code = %Role::Intent(kind), "intent");
            tree.set_role(first, Some(Role::Intent(kind)));
        }

        if wh_phrases.is_empty() {
            if let Some(&first) = tree.leaves().first() {
                let node = tree.node(first);
                if node.role.is_none() && self.lexicon.conditionals.contains(&node.normalized()) {
                    tree.set_role(first, Some(Role::Intent(IntentKind::Conditional)));
                }
            }
        }
    }

    /// Classify unlabeled verbs as activities or situations
    pub fn label_verbs(&mut self, tree: &mut Tree, classifier: &dyn VerbClassifier) {
        let verbs = tree.find_all(|n| {
            n.is_leaf()
                && n.is_verb()
                && n.role.is_none()
                && !n.label.contains(' ')
                && !self.lexicon.is_stop_word(&n.label)
        });
        for id in verbs {
            let verb = tree.node(id).normalized();
            match classifier.classify(&verb, &tree.sentence) {
                VerbClass::Activity => tree.set_role(id, Some(Role::Activity)),
                VerbClass::Situation => tree.set_role(id, Some(Role::Situation)),
                VerbClass::Unknown => debug!(verb = %verb, "verb left unclassified"),
            }
        }
    }
}

/// WH phrases without a WH ancestor; relative "that" is skipped
fn top_wh_phrases(tree: &Tree) -> Vec<NodeId> {
    tree.find_all(|n| n.is_wh() && n.normalized() != "that")
        .into_iter()
        .filter(|&id| !tree.ancestors(id).iter().any(|&a| tree.node(a).is_wh()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawNode;
    use crate::role::ComparisonSign;
    use crate::verbs::LexiconClassifier;

    /// "Where is the Black Sea ?"
    fn black_sea() -> Tree {
        Tree::from_raw(&RawNode::phrase(
            "SBARQ",
            vec![
                RawNode::phrase("WHADVP", vec![RawNode::leaf("Where", "WRB")]),
                RawNode::phrase(
                    "SQ",
                    vec![
                        RawNode::leaf("is", "VBZ"),
                        RawNode::phrase(
                            "NP",
                            vec![
                                RawNode::leaf("the", "DT"),
                                RawNode::leaf("Black", "NNP"),
                                RawNode::leaf("Sea", "NNP"),
                            ],
                        ),
                    ],
                ),
                RawNode::leaf("?", "."),
            ],
        ))
    }

    #[test]
    fn test_label_single_match_and_clean() {
        let lexicon = Lexicon::builtin();
        let mut labeler = Labeler::new(&lexicon);
        let mut tree = black_sea();

        assert!(labeler.label_role(&mut tree, "Black Sea", Role::Toponym, true, &[], false));
        let np = tree.find_all(|n| n.role == Some(Role::Toponym))[0];
        assert!(tree.node(np).is_leaf());
        assert_eq!(tree.node(np).category, "NP");
    }

    #[test]
    fn test_label_prefers_shallowest() {
        // (NP (NP (NNP London)) (NNP London))
        let raw = RawNode::phrase(
            "NP",
            vec![
                RawNode::phrase("NP", vec![RawNode::leaf("London", "NNP")]),
                RawNode::leaf("London", "NNP"),
            ],
        );
        let lexicon = Lexicon::builtin();
        let mut labeler = Labeler::new(&lexicon);
        let mut tree = Tree::from_raw(&raw);

        assert!(labeler.label_role(&mut tree, "London", Role::Toponym, false, &[], false));
        let labeled = tree.find_all(|n| n.role == Some(Role::Toponym));
        assert_eq!(labeled.len(), 1);
        assert_eq!(tree.depth(labeled[0]), 1);
        assert_eq!(tree.children(tree.root_id).len(), 1);
    }

    #[test]
    fn test_modifier_toponym_keeps_following_words() {
        // "Kuala Lumpur hotels are cheap"
        let raw = RawNode::phrase(
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
                    vec![
                        RawNode::leaf("are", "VBP"),
                        RawNode::phrase("ADJP", vec![RawNode::leaf("cheap", "JJ")]),
                    ],
                ),
            ],
        );
        let lexicon = Lexicon::builtin();
        let mut labeler = Labeler::new(&lexicon);
        let mut tree = Tree::from_raw(&raw);

        assert!(labeler.label_role(&mut tree, "Kuala Lumpur", Role::Toponym, true, &[], false));
        assert_eq!(tree.leaf_text(), "Kuala Lumpur hotels are cheap");
        assert!(tree.node(tree.root_id).role.is_none());

        let toponym = tree.find_all(|n| n.role == Some(Role::Toponym));
        assert_eq!(toponym.len(), 1);
        assert_eq!(tree.node(toponym[0]).label, "Kuala Lumpur");
        assert_eq!(tree.node(toponym[0]).category, "NP");
    }

    #[test]
    fn test_several_matches_recompute_category() {
        let lexicon = Lexicon::builtin();
        let question_words = vec!["which".to_string()];

        // "which one is the river"
        let mut tree = Tree::from_raw(&RawNode::phrase(
            "SBARQ",
            vec![
                RawNode::phrase(
                    "WHNP",
                    vec![RawNode::leaf("which", "WDT"), RawNode::leaf("one", "NN")],
                ),
                RawNode::phrase(
                    "SQ",
                    vec![
                        RawNode::leaf("is", "VBZ"),
                        RawNode::phrase(
                            "NP",
                            vec![RawNode::leaf("the", "DT"), RawNode::leaf("river", "NN")],
                        ),
                    ],
                ),
            ],
        ));
        let mut labeler = Labeler::new(&lexicon);
        assert!(labeler.label_role(
            &mut tree,
            "which river",
            Role::PlaceType,
            false,
            &question_words,
            false
        ));
        let selected = tree.find_all(|n| n.role == Some(Role::PlaceType))[0];
        assert_eq!(tree.node(selected).label, "which river");
        assert_eq!(tree.node(selected).category, "WHNP");
        assert!(tree.find_all(|n| n.label == "river").is_empty());

        // "is it more than 30"
        let mut tree = Tree::from_raw(&RawNode::phrase(
            "S",
            vec![
                RawNode::leaf("is", "VBZ"),
                RawNode::leaf("more", "JJR"),
                RawNode::phrase(
                    "PP",
                    vec![RawNode::leaf("than", "IN"), RawNode::leaf("30", "CD")],
                ),
            ],
        ));
        let mut labeler = Labeler::new(&lexicon);
        assert!(labeler.label_role(
            &mut tree,
            "more than",
            Role::Comparison(ComparisonSign::Greater),
            true,
            &question_words,
            true
        ));
        let selected = tree.find_all(|n| n.has_role())[0];
        assert_eq!(tree.node(selected).label, "more than");
        assert!(tree.find_all(|n| n.label == "than").is_empty());
        assert_eq!(tree.node(selected).category, "JJR");

        // neither a question word nor a comparison
        let mut tree = Tree::from_raw(&RawNode::phrase(
            "NP",
            vec![
                RawNode::leaf("London", "NNP"),
                RawNode::phrase("NP", vec![RawNode::leaf("London", "NNP")]),
            ],
        ));
        let mut labeler = Labeler::new(&lexicon);
        assert!(labeler.label_role(
            &mut tree,
            "London",
            Role::Toponym,
            false,
            &question_words,
            false
        ));
        let selected = tree.find_all(|n| n.has_role())[0];
        assert_eq!(tree.node(selected).category, "NP");
    }

    #[test]
    fn test_leading_question_words() {
        let lexicon = Lexicon::builtin();
        let labeler = Labeler::new(&lexicon);

        // "Which cities host the When festival"
        let tree = Tree::from_raw(&RawNode::phrase(
            "SBARQ",
            vec![
                RawNode::phrase(
                    "WHNP",
                    vec![RawNode::leaf("Which", "WDT"), RawNode::leaf("cities", "NNS")],
                ),
                RawNode::phrase(
                    "SQ",
                    vec![
                        RawNode::leaf("host", "VBP"),
                        RawNode::phrase(
                            "NP",
                            vec![
                                RawNode::leaf("the", "DT"),
                                RawNode::leaf("When", "NNP"),
                                RawNode::leaf("festival", "NN"),
                            ],
                        ),
                    ],
                ),
            ],
        ));
        assert_eq!(labeler.leading_question_words(&tree), vec!["which".to_string()]);
    }

    #[test]
    fn test_labeled_nodes_are_not_candidates() {
        let lexicon = Lexicon::builtin();
        let mut labeler = Labeler::new(&lexicon);
        let mut tree = black_sea();

        assert!(labeler.label_role(&mut tree, "Black Sea", Role::Toponym, true, &[], false));
        assert!(!labeler.label_role(&mut tree, "Black Sea", Role::PlaceType, true, &[], false));
    }

    #[test]
    fn test_label_entities_records_misses() {
        let lexicon = Lexicon::builtin();
        let mut labeler = Labeler::new(&lexicon);
        let mut tree = black_sea();
        let entities = Entities {
            toponyms: vec!["Black Sea".to_string(), "Atlantis".to_string()],
            ..Entities::default()
        };

        labeler.label_entities(&mut tree, &entities);
        assert_eq!(tree.issues, vec![Issue::LookupMiss("Atlantis".to_string())]);
    }

    #[test]
    fn test_complete_entities_excludes_toponyms() {
        let lexicon = Lexicon::builtin();
        let mut entities = Entities {
            toponyms: vec!["Black Sea".to_string()],
            ..Entities::default()
        };
        entities.complete("Which rivers flow into the Black Sea?", &lexicon);

        assert_eq!(entities.place_types, vec!["rivers".to_string()]);
        assert!(entities.event_types.is_empty());
    }

    #[test]
    fn test_label_intent_where() {
        let lexicon = Lexicon::builtin();
        let mut labeler = Labeler::new(&lexicon);
        let mut tree = black_sea();
        labeler.label_intent(&mut tree);

        let where_ = tree.find_all(|n| n.label == "Where" && n.is_leaf())[0];
        assert_eq!(tree.node(where_).role, Some(Role::Intent(IntentKind::Where)));
    }

    #[test]
    fn test_label_intent_how_adjective_and_conditional() {
        let lexicon = Lexicon::builtin();
        let mut labeler = Labeler::new(&lexicon);

        let mut tree = Tree::from_raw(&RawNode::phrase(
            "SBARQ",
            vec![
                RawNode::phrase(
                    "WHADJP",
                    vec![RawNode::leaf("How", "WRB"), RawNode::leaf("big", "JJ")],
                ),
                RawNode::leaf("is", "VBZ"),
                RawNode::leaf("London", "NNP"),
            ],
        ));
        labeler.label_intent(&mut tree);
        assert_eq!(tree.role_code(), "6");

        let mut tree = Tree::from_raw(&RawNode::phrase(
            "SQ",
            vec![RawNode::leaf("Is", "VBZ"), RawNode::leaf("London", "NNP")],
        ));
        labeler.label_intent(&mut tree);
        assert_eq!(tree.role_code(), "8");
    }

    #[test]
    fn test_label_verbs() {
        let lexicon = Lexicon::builtin();
        let classifier = LexiconClassifier::new(lexicon.clone());
        let mut labeler = Labeler::new(&lexicon);
        let mut tree = Tree::from_raw(&RawNode::phrase(
            "S",
            vec![
                RawNode::leaf("I", "PRP"),
                RawNode::leaf("visit", "VBP"),
                RawNode::leaf("is", "VBZ"),
            ],
        ));
        labeler.label_verbs(&mut tree, &classifier);

        assert_eq!(tree.role_code(), "a");
    }
}
