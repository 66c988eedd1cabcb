//! Relation extraction from a dependency tree
//!
//! Detectors only read the dependency tree and append to one ordered,
//! duplicate-free list. They run in a fixed order: conjunctions, adjectives,
//! verb-object pairs, complex prepositions, units. Structural edits to the
//! dependency tree happen beforehand, in [`clean_d_tree`].

use memchr::memmem;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::Issue;
use crate::lexicon::Lexicon;
use crate::role::Role;
use crate::tree::{Node, NodeId, Span, Tree, normalize};

/// Kind of extracted relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelationKind {
    And,
    Or,
    Not,
    Property,
    Comparison,
    Modifier,
    Object,
    Unit,
    Preposition,
    Quantity,
}

/// Childless copy of a dependency node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub name: String,
    pub role: Option<Role>,
    pub category: String,
    pub attributes: Vec<String>,
    pub link: String,
    pub span: Span,
}

impl NodeSnapshot {
    pub fn of(node: &Node) -> Self {
        Self {
            id: node.id,
            name: node.label.clone(),
            role: node.role,
            category: node.category.clone(),
            attributes: node.attributes.clone(),
            link: node.link.clone(),
            span: node.span,
        }
    }
}

/// One extracted relation: `relation(arg1[, arg2])`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub kind: RelationKind,
    pub relation: NodeSnapshot,
    pub arg1: NodeSnapshot,
    pub arg2: Option<NodeSnapshot>,
}

impl Dependency {
    fn new(kind: RelationKind, tree: &Tree, relation: NodeId, arg1: NodeId, arg2: Option<NodeId>) -> Self {
        Self {
            kind,
            relation: NodeSnapshot::of(tree.node(relation)),
            arg1: NodeSnapshot::of(tree.node(arg1)),
            arg2: arg2.map(|a| NodeSnapshot::of(tree.node(a))),
        }
    }

    /// Names of the arguments
    pub fn arguments(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.arg1.name.as_str()).chain(self.arg2.as_ref().map(|a| a.name.as_str()))
    }
}

/// Ordered list of dependencies without duplicates
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DependencyList {
    items: Vec<Dependency>,
}

impl DependencyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless an equal dependency is already present
    pub fn push(&mut self, dependency: Dependency) -> bool {
        if self.items.contains(&dependency) {
            return false;
        }
        self.items.push(dependency);
        true
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dependency> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn of_kind(&self, kind: RelationKind) -> Vec<&Dependency> {
        self.items.iter().filter(|d| d.kind == kind).collect()
    }
}

impl<'a> IntoIterator for &'a DependencyList {
    type Item = &'a Dependency;
    type IntoIter = std::slice::Iter<'a, Dependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

fn has_pos(node: &Node, tags: &[&str]) -> bool {
    if node.attributes.is_empty() {
        tags.contains(&node.category.as_str())
    } else {
        node.attributes.iter().any(|a| tags.contains(&a.as_str()))
    }
}

const NOMINAL: &[&str] = &["NOUN", "PROPN"];
const VERBAL: &[&str] = &["VERB", "AUX"];

fn is_subject(node: &Node) -> bool {
    node.link.starts_with("nsubj")
}

fn nearest_noun_ancestor(tree: &Tree, id: NodeId) -> Option<NodeId> {
    tree.ancestors(id)
        .into_iter()
        .find(|&a| has_pos(tree.node(a), NOMINAL))
}

/// Runs the detectors over one dependency tree
pub struct DependencyExtractor<'a> {
    tree: &'a Tree,
    lexicon: &'a Lexicon,
    dependencies: DependencyList,
    issues: Vec<Issue>,
}

impl<'a> DependencyExtractor<'a> {
    pub fn new(tree: &'a Tree, lexicon: &'a Lexicon) -> Self {
        Self {
            tree,
            lexicon,
            dependencies: DependencyList::new(),
            issues: Vec::new(),
        }
    }

    /// Run every detector and return the relations and the issues found
    pub fn extract(mut self) -> (DependencyList, Vec<Issue>) {
        self.detect_conjunctions();
        self.detect_adjectives();
        self.detect_verb_objects();
        self.detect_complex_prepositions();
        self.detect_units();
        debug!(count = self.dependencies.len(), "dependencies extracted");
        (self.dependencies, self.issues)
    }

    fn push(&mut self, kind: RelationKind, relation: NodeId, arg1: NodeId, arg2: Option<NodeId>) {
        self.dependencies
            .push(Dependency::new(kind, self.tree, relation, arg1, arg2));
    }

    fn conjunction_kind(&self, word: &str) -> Option<RelationKind> {
        if self.lexicon.and_words.contains(word) {
            Some(RelationKind::And)
        } else if self.lexicon.or_words.contains(word) {
            Some(RelationKind::Or)
        } else if self.lexicon.not_words.contains(word) {
            Some(RelationKind::Not)
        } else {
            None
        }
    }

    fn detect_conjunctions(&mut self) {
        let tree = self.tree;
        for id in tree.preorder() {
            let node = tree.node(id);
            let word = node.normalized();

            if word == "except" || word == "excluding" {
                let object = tree
                    .children(id)
                    .iter()
                    .copied()
                    .find(|&c| has_pos(tree.node(c), NOMINAL))
                    .or_else(|| tree.parent(id));
                if let Some(object) = object {
                    self.push(RelationKind::Not, id, object, None);
                }
                continue;
            }

            let coordinating = has_pos(node, &["CCONJ"]);
            let subordinating = has_pos(node, &["SCONJ"]);
            let Some(kind) = self.conjunction_kind(&word) else {
                continue;
            };
            let mistagged = matches!(node.link.as_str(), "punct" | "dep" | "prep");
            if !(coordinating || subordinating || mistagged) {
                continue;
            }
            let Some(parent) = tree.parent(id) else {
                continue;
            };
            let parent_node = tree.node(parent);
            let conjuncts = tree
                .children(parent)
                .iter()
                .copied()
                .filter(|&c| tree.node(c).link == "conj");

            if subordinating && !coordinating {
                for conjunct in conjuncts.filter(|&c| has_pos(tree.node(c), NOMINAL)) {
                    self.push(kind, id, parent, Some(conjunct));
                }
                continue;
            }

            let governor = if has_pos(parent_node, VERBAL) {
                tree.children(parent)
                    .iter()
                    .copied()
                    .find(|&c| is_subject(tree.node(c)))
                    .unwrap_or(parent)
            } else {
                parent
            };
            let parent_pos = parent_node.attributes.first().cloned();
            for conjunct in conjuncts {
                if tree.node(conjunct).attributes.first() == parent_pos.as_ref() {
                    self.push(kind, id, governor, Some(conjunct));
                }
            }
        }
    }

    /// Candidate owners of an adjective
    fn adjective_governors(&self, adjective: NodeId) -> Vec<NodeId> {
        let tree = self.tree;
        let Some(parent) = tree.parent(adjective) else {
            return Vec::new();
        };
        let parent_node = tree.node(parent);
        if has_pos(parent_node, NOMINAL) {
            return vec![parent];
        }
        if has_pos(parent_node, VERBAL) {
            let subjects: Vec<NodeId> = tree
                .children(parent)
                .iter()
                .copied()
                .filter(|&c| c != adjective && is_subject(tree.node(c)))
                .collect();
            if !subjects.is_empty() {
                return subjects;
            }
        }
        nearest_noun_ancestor(tree, adjective).into_iter().collect()
    }

    fn unit_next_to(&self, number: NodeId) -> Option<NodeId> {
        let tree = self.tree;
        let is_unit = |id: NodeId| self.lexicon.is_unit(&tree.node(id).label);
        tree.parent(number)
            .filter(|&p| is_unit(p))
            .or_else(|| tree.children(number).iter().copied().find(|&c| is_unit(c)))
    }

    fn detect_adjectives(&mut self) {
        let tree = self.tree;
        let adjectives = tree.find_all(|n| has_pos(n, &["ADJ"]));

        for adjective in adjectives {
            for &child in tree.children(adjective) {
                if has_pos(tree.node(child), &["ADV"]) {
                    self.push(RelationKind::Modifier, child, adjective, None);
                }
            }

            let governors = self.adjective_governors(adjective);
            if governors.is_empty() {
                continue;
            }

            // comparison targets relate the adjective to every candidate owner
            let subtree = tree.preorder_from(adjective);
            let numbers: Vec<NodeId> = subtree
                .iter()
                .copied()
                .filter(|&n| n != adjective && has_pos(tree.node(n), &["NUM"]))
                .collect();
            if !numbers.is_empty() {
                for number in numbers {
                    for &owner in &governors {
                        self.push(RelationKind::Comparison, adjective, owner, Some(number));
                    }
                    if let Some(unit) = self.unit_next_to(number) {
                        self.push(RelationKind::Unit, unit, number, None);
                    }
                }
                continue;
            }

            let nouns: Vec<NodeId> = subtree
                .iter()
                .copied()
                .filter(|&n| n != adjective && has_pos(tree.node(n), NOMINAL))
                .collect();
            if !nouns.is_empty() {
                for noun in nouns {
                    for &owner in &governors {
                        self.push(RelationKind::Comparison, adjective, owner, Some(noun));
                    }
                }
                continue;
            }

            match governors[..] {
                [owner] => self.push(RelationKind::Property, adjective, owner, None),
                _ => {
                    let label = &tree.node(adjective).label;
                    error!(adjective = %label, candidates = governors.len(), "ambiguous adjective governor");
                    self.issues.push(Issue::AmbiguousStructure(format!(
                        "adjective {:?} has {} candidate governors",
                        label,
                        governors.len()
                    )));
                }
            }
        }
    }

    fn detect_verb_objects(&mut self) {
        let tree = self.tree;
        for verb in tree.find_all(|n| has_pos(n, &["VERB"])) {
            for &child in tree.children(verb) {
                let node = tree.node(child);
                if has_pos(node, NOMINAL) {
                    self.push(RelationKind::Object, verb, child, None);
                } else if has_pos(node, &["ADP"]) {
                    for &object in tree.children(child) {
                        let object_node = tree.node(object);
                        if object_node.link == "pobj" && has_pos(object_node, NOMINAL) {
                            self.push(RelationKind::Object, verb, object, None);
                        }
                    }
                }
            }
        }
    }

    fn detect_complex_prepositions(&mut self) {
        let tree = self.tree;
        for id in tree.preorder() {
            let node = tree.node(id);

            if has_pos(node, &["ADV"]) {
                if let [adp] = node.children[..] {
                    if has_pos(tree.node(adp), &["ADP"]) {
                        let object = tree
                            .children(adp)
                            .iter()
                            .copied()
                            .find(|&c| has_pos(tree.node(c), &["NOUN", "PROPN", "NUM"]));
                        self.push(RelationKind::Preposition, adp, id, object);
                    }
                }
                continue;
            }

            if has_pos(node, &["NUM"]) && !node.is_leaf() {
                let Some(adp) = tree
                    .ancestors(id)
                    .into_iter()
                    .find(|&a| has_pos(tree.node(a), &["ADP"]))
                else {
                    continue;
                };
                self.push(RelationKind::Quantity, adp, id, None);
                for &child in tree.children(id) {
                    if has_pos(tree.node(child), &["ADV", "ADJ"]) {
                        self.push(RelationKind::Modifier, child, id, None);
                    }
                }
            }
        }
    }

    fn detect_units(&mut self) {
        let tree = self.tree;
        for number in tree.find_all(|n| has_pos(n, &["NUM"])) {
            let unit = tree
                .ancestors(number)
                .into_iter()
                .find(|&a| self.lexicon.is_unit(&tree.node(a).label));
            if let Some(unit) = unit {
                self.push(RelationKind::Unit, unit, number, None);
            }
        }
    }
}

/// Multi-word phrases of a constituency tree located in a sentence
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpanMap {
    pub phrases: Vec<(String, Span)>,
}

impl SpanMap {
    /// Collect multi-word role-bearing labels of `ctree` found in `sentence`
    pub fn from_tree(ctree: &Tree, sentence: &str) -> Self {
        let lower = sentence.to_lowercase();
        // lowercasing can change byte lengths outside ASCII
        let folded = lower.len() == sentence.len();
        let haystack = if folded { lower.as_str() } else { sentence };

        let mut phrases: Vec<(String, Span)> = Vec::new();
        for (id, _) in ctree.roles() {
            let label = ctree.node(id).label.trim();
            if !label.contains(' ') {
                continue;
            }
            let needle = if folded {
                label.to_lowercase()
            } else {
                label.to_string()
            };
            if let Some(start) = memmem::find(haystack.as_bytes(), needle.as_bytes()) {
                let span = Span::new(start, start + needle.len());
                if !phrases.iter().any(|(p, _)| p == label) {
                    phrases.push((label.to_string(), span));
                }
            }
        }
        Self { phrases }
    }
}

/// Collapse dependency nodes that together spell a known phrase
///
/// Of the nodes inside a phrase's span whose text occurs in the phrase, the
/// shallowest stays and is renamed to the phrase. The others are detached
/// after handing over their children that are not part of the phrase.
pub fn clean_d_tree(dtree: &mut Tree, span_map: &SpanMap) {
    for (phrase, span) in &span_map.phrases {
        let normalized_phrase = normalize(phrase);
        let members: Vec<NodeId> = dtree
            .preorder()
            .into_iter()
            .filter(|&id| {
                let node = dtree.node(id);
                node.span_resolved
                    && span.contains(node.span)
                    && normalized_phrase.contains(&node.normalized())
            })
            .collect();
        let Some(&keep) = members.iter().min_by_key(|&&id| dtree.depth(id)) else {
            continue;
        };

        for &other in members.iter().filter(|&&m| m != keep) {
            for child in dtree.children(other).to_vec() {
                if !members.contains(&child) {
                    dtree.attach(keep, child);
                }
            }
            dtree.detach(other);
        }
        debug!(phrase = %phrase, merged = members.len(), "collapsed dependency phrase");
        dtree.set_label(keep, phrase.clone());
        dtree.node_mut(keep).span = *span;
    }
}

/// Copy roles from the constituency tree onto dependency nodes with the same text
pub fn transfer_roles(ctree: &Tree, dtree: &mut Tree) {
    for (id, role) in ctree.roles() {
        let text = ctree.node(id).normalized();
        let targets = dtree.find_all(|n| !n.has_role() && n.normalized() == text);
        for target in targets {
            dtree.set_role(target, Some(role));
        }
    }
}
