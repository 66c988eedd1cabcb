//! Conjunctions, qualities and comparisons
//!
//! These passes run once the entity, relation and object roles are in
//! place: conjunction markers spread a shared role to their phrase,
//! adjectives take the quality kind of the noun they modify, and
//! "more ... than" constructions become comparison nodes.

use regex::Regex;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::debug;

use crate::error::Error;
use crate::lexicon::Lexicon;
use crate::role::{ComparisonSign, Role};
use crate::tree::{NodeId, Span, Tree};

fn conjunction_role(word: &str, lexicon: &Lexicon) -> Option<Role> {
    if lexicon.and_words.contains(word) {
        Some(Role::And)
    } else if lexicon.or_words.contains(word) {
        Some(Role::Or)
    } else if lexicon.not_words.contains(word) {
        Some(Role::Not)
    } else {
        None
    }
}

/// Label conjunction markers and promote homogeneous coordinations
///
/// A parent whose role-bearing children (ignoring determiners and markers)
/// all share one role takes that role; its children stay.
pub fn label_conjunctions(tree: &mut Tree, lexicon: &Lexicon) {
    let markers: Vec<(NodeId, Role)> = tree
        .preorder()
        .into_iter()
        .filter_map(|id| {
            let node = tree.node(id);
            if !node.is_leaf() || node.has_role() {
                return None;
            }
            let role = conjunction_role(&node.normalized(), lexicon)?;
            let tagged = match node.category.as_str() {
                "CC" | "IN" | "DT" => true,
                // "not" is tagged as an adverb
                "RB" => role == Role::Not,
                _ => false,
            };
            tagged.then_some((id, role))
        })
        .collect();

    let mut parents = Vec::new();
    for (id, role) in markers {
        tree.set_role(id, Some(role));
        if let Some(parent) = tree.parent(id) {
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
    }

    for parent in parents {
        let roles: Vec<Role> = tree
            .children(parent)
            .iter()
            .map(|&c| tree.node(c))
            .filter(|c| !c.is_determiner())
            .filter_map(|c| c.role)
            .filter(|r| !r.is_conjunction())
            .collect();
        let distinct: FxHashSet<Role> = roles.iter().copied().collect();
        if roles.len() >= 2 && distinct.len() == 1 {
            let role = roles[0];
            debug!(label = %tree.node(parent).label, role = %role, "coordination shares one role");
            tree.set_role(parent, Some(role));
        }
    }

    tree.update();
}

/// Attach adjectives to the noun they qualify
///
/// Qualities of places and place types are `Quality`, anything else is an
/// `ObjectQuality`. An adjective directly before a prepositional phrase
/// ("nearest to") is folded into its preposition as a spatial relation.
pub fn label_qualities(tree: &mut Tree, lexicon: &Lexicon) {
    let adjectives = tree.find_all(|n| {
        !n.has_role()
            && ((n.is_leaf() && n.category.starts_with("JJ")) || n.category.starts_with("ADJP"))
    });

    for adjective in adjectives {
        if !tree.is_attached(adjective) || tree.node(adjective).has_role() {
            continue;
        }
        let inside_labeled_phrase = tree
            .parent(adjective)
            .is_some_and(|p| tree.node(p).is_adjective() && tree.node(p).has_role());
        if inside_labeled_phrase {
            continue;
        }

        if let Some(role) = qualified_role(tree, adjective) {
            debug!(adjective = %tree.node(adjective).label, role = %role, "quality");
            tree.set_role(adjective, Some(role));
            continue;
        }

        if fold_into_preposition(tree, adjective, lexicon) {
            continue;
        }
        debug!(adjective = %tree.node(adjective).label, "quality left unresolved");
    }
}

/// Role implied by the first following sibling that is a noun or carries a role
fn qualified_role(tree: &Tree, adjective: NodeId) -> Option<Role> {
    let mut next = tree.next_sibling(adjective);
    while let Some(sibling) = next {
        let node = tree.node(sibling);
        match node.role {
            Some(Role::PlaceType | Role::Toponym) => return Some(Role::Quality),
            Some(Role::Object | Role::Event | Role::EventType) => return Some(Role::ObjectQuality),
            Some(_) => return None,
            None if node.is_noun() => return Some(Role::ObjectQuality),
            None => next = tree.next_sibling(sibling),
        }
    }
    None
}

/// "nearest" + (PP (TO to) ...) becomes the relation "nearest to"
fn fold_into_preposition(tree: &mut Tree, adjective: NodeId, lexicon: &Lexicon) -> bool {
    let Some(pp) = tree.next_sibling(adjective) else {
        return false;
    };
    if !tree.node(pp).is_pp() {
        return false;
    }
    let Some(&preposition) = tree.children(pp).first() else {
        return false;
    };
    let prep = tree.node(preposition);
    if !prep.is_preposition() || !lexicon.is_spatiotemporal(&prep.label) {
        return false;
    }

    let label = format!("{} {}", tree.node(adjective).label, prep.label);
    let span = tree.node(adjective).span.hull(prep.span);
    debug!(relation = %label, "adjective folded into preposition");
    tree.detach(adjective);
    tree.set_label(preposition, label);
    tree.node_mut(preposition).span = span;
    tree.set_role(preposition, Some(Role::SpatialRelation));
    true
}

/// A "<comparative> ... than" occurrence in a sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonMatch {
    pub span: Span,
    /// The comparative word ("more", "taller")
    pub first: String,
    /// The closing word ("than")
    pub second: String,
    pub sign: ComparisonSign,
}

impl ComparisonMatch {
    /// Canonical phrase the comparison node is renamed to
    pub fn phrase(&self) -> &'static str {
        match self.sign {
            ComparisonSign::Greater => "more than",
            ComparisonSign::Less => "less than",
        }
    }
}

/// Finds comparisons using the lexicon's comparative adjectives
#[derive(Debug, Clone)]
pub struct ComparisonPattern {
    regex: Regex,
}

impl ComparisonPattern {
    pub fn new(lexicon: &Lexicon) -> Result<Self, Error> {
        let mut words: Vec<&str> = lexicon
            .greater_comparatives
            .iter()
            .chain(&lexicon.less_comparatives)
            .map(String::as_str)
            .collect();
        words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = words
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        let regex = Regex::new(&format!(r"(?i)\b({alternation})\b.*?\b(than)\b"))?;
        Ok(Self { regex })
    }
}

/// Every comparison in `sentence`, with its direction
pub fn find_comparisons(
    sentence: &str,
    pattern: &ComparisonPattern,
    lexicon: &Lexicon,
) -> Vec<ComparisonMatch> {
    pattern
        .regex
        .captures_iter(sentence)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let first = caps.get(1)?.as_str();
            let second = caps.get(2)?.as_str();
            let sign = lexicon.comparison_sign(first)?;
            Some(ComparisonMatch {
                span: Span::new(whole.start(), whole.end()),
                first: first.to_string(),
                second: second.to_string(),
                sign,
            })
        })
        .collect()
}

/// Turn a matched comparison into one comparison node
///
/// The comparative must be followed by an object, object quality or event
/// type (next sibling, else next leaf); otherwise nothing changes and false
/// is returned. On success "than" is removed, along with ancestors it
/// leaves empty, and the comparative is renamed to `phrase`.
pub fn label_complex_comparison(
    tree: &mut Tree,
    comparison: &ComparisonMatch,
    phrase: &str,
    role: Role,
) -> bool {
    let Some(host) = tree.deepest_covering(comparison.span) else {
        return false;
    };
    let leaves = tree.leaves_of(host);
    let first_word = comparison.first.to_lowercase();
    let second_word = comparison.second.to_lowercase();

    let Some(first_pos) = leaves
        .iter()
        .position(|&l| tree.node(l).normalized() == first_word)
    else {
        return false;
    };
    let Some(second) = leaves[first_pos + 1..]
        .iter()
        .copied()
        .find(|&l| tree.node(l).normalized() == second_word)
    else {
        return false;
    };
    let first = leaves[first_pos];

    let following = tree
        .next_sibling(first)
        .or_else(|| leaves.get(first_pos + 1).copied());
    let compared = following.and_then(|f| tree.node(f).role);
    if !matches!(
        compared,
        Some(Role::ObjectQuality | Role::EventType | Role::Object)
    ) {
        debug!(
            comparative = %comparison.first,
            "comparison not followed by a comparable quantity"
        );
        return false;
    }

    let mut emptied = tree.parent(second);
    tree.detach(second);
    while let Some(parent) = emptied {
        if parent == host || !tree.node(parent).is_leaf() {
            break;
        }
        emptied = tree.parent(parent);
        tree.detach(parent);
    }

    tree.set_label(first, phrase);
    tree.set_category(first, "JJR");
    tree.set_role(first, Some(role));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawNode;

    fn leaf(word: &str, tag: &str) -> RawNode {
        RawNode::leaf(word, tag)
    }

    fn phrase(tag: &str, children: Vec<RawNode>) -> RawNode {
        RawNode::phrase(tag, children)
    }

    fn set(tree: &mut Tree, label: &str, role: Role) -> NodeId {
        let id = tree.find_all(|n| n.label == label)[0];
        tree.set_role(id, Some(role));
        id
    }

    fn coordination(second_role: Role) -> Tree {
        let mut tree = Tree::from_raw(&phrase(
            "S",
            vec![
                phrase(
                    "NP",
                    vec![leaf("cities", "NNS"), leaf("and", "CC"), leaf("towns", "NNS")],
                ),
                leaf("exist", "VBP"),
            ],
        ));
        set(&mut tree, "cities", Role::PlaceType);
        set(&mut tree, "towns", second_role);
        tree
    }

    #[test]
    fn test_homogeneous_coordination_is_promoted() {
        let lexicon = Lexicon::builtin();
        let mut tree = coordination(Role::PlaceType);
        label_conjunctions(&mut tree, &lexicon);

        let np = tree.find_all(|n| n.category == "NP")[0];
        assert_eq!(tree.node(np).role, Some(Role::PlaceType));
        assert_eq!(tree.children(np).len(), 3);
        let and = tree.find_all(|n| n.label == "and")[0];
        assert_eq!(tree.node(and).role, Some(Role::And));
    }

    #[test]
    fn test_mixed_coordination_is_not_promoted() {
        let lexicon = Lexicon::builtin();
        let mut tree = coordination(Role::Object);
        label_conjunctions(&mut tree, &lexicon);

        let np = tree.find_all(|n| n.category == "NP")[0];
        assert_eq!(tree.node(np).role, None);
        assert_eq!(tree.role_code(), "p&o");
    }

    #[test]
    fn test_negation_marker() {
        let lexicon = Lexicon::builtin();
        let mut tree = Tree::from_raw(&phrase(
            "S",
            vec![leaf("not", "RB"), leaf("London", "NNP")],
        ));
        set(&mut tree, "London", Role::Toponym);
        label_conjunctions(&mut tree, &lexicon);

        assert_eq!(tree.role_code(), "!P");
    }

    #[test]
    fn test_place_quality() {
        let lexicon = Lexicon::builtin();
        let mut tree = Tree::from_raw(&phrase(
            "NP",
            vec![leaf("the", "DT"), leaf("largest", "JJS"), leaf("city", "NN")],
        ));
        set(&mut tree, "city", Role::PlaceType);
        label_qualities(&mut tree, &lexicon);

        assert_eq!(tree.role_code(), "Qp");
    }

    #[test]
    fn test_object_quality() {
        let lexicon = Lexicon::builtin();
        let mut tree = Tree::from_raw(&phrase(
            "NP",
            vec![leaf("average", "JJ"), leaf("price", "NN")],
        ));
        label_qualities(&mut tree, &lexicon);

        assert_eq!(tree.role_code(), "q");
    }

    #[test]
    fn test_adjective_folds_into_preposition() {
        let lexicon = Lexicon::builtin();
        let mut tree = Tree::from_raw(&phrase(
            "ADJP",
            vec![
                leaf("nearest", "JJS"),
                phrase("PP", vec![leaf("to", "TO"), leaf("Vienna", "NNP")]),
            ],
        ));
        set(&mut tree, "Vienna", Role::Toponym);
        label_qualities(&mut tree, &lexicon);

        let relation = tree.find_all(|n| n.role == Some(Role::SpatialRelation))[0];
        assert_eq!(tree.node(relation).label, "nearest to");
        assert_eq!(tree.role_code(), "rP");
    }

    #[test]
    fn test_find_comparisons() {
        let lexicon = Lexicon::builtin();
        let pattern = ComparisonPattern::new(&lexicon).unwrap();
        let found = find_comparisons(
            "Which cities have fewer inhabitants than Vienna?",
            &pattern,
            &lexicon,
        );

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first, "fewer");
        assert_eq!(found[0].sign, ComparisonSign::Less);
        assert_eq!(found[0].phrase(), "less than");
    }

    fn comparison_tree() -> Tree {
        // cities with more population than Vienna
        let mut tree = Tree::from_raw(&phrase(
            "NP",
            vec![
                leaf("cities", "NNS"),
                phrase(
                    "PP",
                    vec![
                        leaf("with", "IN"),
                        phrase(
                            "NP",
                            vec![
                                phrase(
                                    "NP",
                                    vec![leaf("more", "JJR"), leaf("population", "NN")],
                                ),
                                phrase("PP", vec![leaf("than", "IN"), leaf("Vienna", "NNP")]),
                            ],
                        ),
                    ],
                ),
            ],
        ));
        set(&mut tree, "cities", Role::PlaceType);
        set(&mut tree, "population", Role::Object);
        set(&mut tree, "Vienna", Role::Toponym);
        tree
    }

    #[test]
    fn test_complex_comparison() {
        let lexicon = Lexicon::builtin();
        let pattern = ComparisonPattern::new(&lexicon).unwrap();
        let mut tree = comparison_tree();
        let found = find_comparisons(&tree.sentence, &pattern, &lexicon);
        let role = Role::Comparison(found[0].sign);

        assert!(label_complex_comparison(&mut tree, &found[0], found[0].phrase(), role));
        tree.update();

        assert_eq!(tree.role_code(), "p>oP");
        assert!(tree.find_all(|n| n.label == "than").is_empty());
        let comparison = tree.find_all(|n| n.role == Some(role))[0];
        assert_eq!(tree.node(comparison).label, "more than");
        assert_eq!(tree.node(comparison).category, "JJR");
    }

    #[test]
    fn test_comparison_fails_closed() {
        let lexicon = Lexicon::builtin();
        let pattern = ComparisonPattern::new(&lexicon).unwrap();
        let mut tree = Tree::from_raw(&phrase(
            "S",
            vec![
                leaf("mountains", "NNS"),
                phrase(
                    "ADJP",
                    vec![
                        leaf("taller", "JJR"),
                        phrase("PP", vec![leaf("than", "IN"), leaf("Everest", "NNP")]),
                    ],
                ),
            ],
        ));
        set(&mut tree, "Everest", Role::Toponym);
        let before = tree.to_string();
        let found = find_comparisons(&tree.sentence, &pattern, &lexicon);

        assert_eq!(found.len(), 1);
        let role = Role::Comparison(found[0].sign);
        assert!(!label_complex_comparison(&mut tree, &found[0], found[0].phrase(), role));
        assert_eq!(tree.to_string(), before);
    }
}
