//! Structural rewrites of a labeled constituency tree
//!
//! Each pass collects the ids it will touch before mutating anything, then
//! edits the arena through the tree's primitives. Passes that change labels
//! leave span and label recomputation of ancestors to [`Tree::update`].

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Issue};
use crate::lexicon::Lexicon;
use crate::role::Role;
use crate::tree::{NodeId, Span, Tree};

/// Fold determiners and uniform children into their parent
///
/// A node whose two children are a role-bearing node and a determiner takes
/// the child's role and label ("the London" becomes "London"). A node whose
/// children all share one role takes that role. Either way the node drops
/// its children. Repeats until nothing changes.
pub fn clean_tree(tree: &mut Tree) {
    loop {
        let mut changed = false;
        for id in tree.postorder() {
            let children = tree.children(id).to_vec();
            if children.len() < 2 {
                continue;
            }

            if let [a, b] = children[..] {
                let pair = match (tree.node(a), tree.node(b)) {
                    (x, y) if x.role.is_some() && y.is_determiner() && !y.has_role() => Some(a),
                    (x, y) if y.role.is_some() && x.is_determiner() && !x.has_role() => Some(b),
                    _ => None,
                };
                if let Some(kept) = pair {
                    let role = tree.node(kept).role;
                    let label = tree.node(kept).label.clone();
                    tree.set_role(id, role);
                    tree.set_label(id, label);
                    tree.clear_children(id);
                    changed = true;
                    continue;
                }
            }

            let first = tree.node(children[0]).role;
            if first.is_some() && children.iter().all(|&c| tree.node(c).role == first) {
                tree.set_role(id, first);
                tree.clear_children(id);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Matcher for "NUMBER UNIT PREPOSITION" relations ("within 3 km of")
#[derive(Debug, Clone)]
pub struct CompoundRelationPattern {
    regex: Regex,
}

impl CompoundRelationPattern {
    pub fn new(lexicon: &Lexicon) -> Result<Self, Error> {
        let mut units: Vec<&str> = lexicon.units.iter().map(String::as_str).collect();
        // longest first so "kms" wins over "km"
        units.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let units = units
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(
            r"(?i)\b(?:(?:at\s+most|at\s+least|within|less\s+than|more\s+than|up\s+to|about|around|approximately|over|under)\s+)?\d+(?:[.,]\d+)*\s*(?:{units})\s+(?:away\s+from|from|of|to)\b"
        );
        Ok(Self {
            regex: Regex::new(&pattern)?,
        })
    }

    /// Byte spans of every match in `text`
    pub fn find_all(&self, text: &str) -> Vec<Span> {
        self.regex
            .find_iter(text)
            .map(|m| Span::new(m.start(), m.end()))
            .collect()
    }
}

fn bears_role(tree: &Tree, id: NodeId) -> bool {
    tree.preorder_from(id)
        .into_iter()
        .any(|n| tree.node(n).has_role())
}

/// Remove every descendant of `id` lying inside `span`
///
/// Children partially overlapping the span are carved recursively and
/// dropped once empty.
fn carve(tree: &mut Tree, id: NodeId, span: Span) {
    for child in tree.children(id).to_vec() {
        let node = tree.node(child);
        if !node.span_resolved {
            continue;
        }
        let child_span = node.span;
        if span.contains(child_span) {
            tree.detach(child);
        } else if child_span.overlaps(span) && !tree.node(child).is_leaf() {
            carve(tree, child, span);
            if tree.node(child).is_leaf() {
                tree.detach(child);
            }
        }
    }
}

/// Wrap two adjacent siblings into a new `Location` PP at the first one's place
fn wrap_location(tree: &mut Tree, first: NodeId, second: NodeId) -> NodeId {
    let label = format!("{} {}", tree.node(first).label, tree.node(second).label);
    let span = tree.node(first).span.hull(tree.node(second).span);
    let wrapper = tree.add_node(&label, "PP", span);
    tree.insert_before(first, wrapper);
    tree.attach(wrapper, first);
    tree.attach(wrapper, second);
    tree.set_role(wrapper, Some(Role::Location));
    wrapper
}

/// Mark spatial and temporal relations and the location phrases they head
pub fn label_spatiotemporal_relationships(
    tree: &mut Tree,
    lexicon: &Lexicon,
    compound: &CompoundRelationPattern,
) {
    label_compound_relations(tree, compound);
    label_simple_relations(tree, lexicon);
}

fn label_compound_relations(tree: &mut Tree, compound: &CompoundRelationPattern) {
    let matches = compound.find_all(&tree.sentence);
    for span in matches {
        let Some(host) = tree.deepest_covering(span) else {
            continue;
        };
        if tree.node(host).is_leaf() {
            continue;
        }
        let text = tree.sentence[span.start..span.end].to_string();
        debug!(relation = %text, "compound spatial relation");

        carve(tree, host, span);

        let position = tree
            .children(host)
            .iter()
            .filter(|&&c| tree.node(c).span.start < span.start)
            .count();
        let relation = tree.add_node(&text, "IN", span);
        tree.set_role(relation, Some(Role::SpatialRelation));
        tree.insert_child(host, position, relation);

        if let Some(anchor) = tree.next_sibling(relation) {
            if bears_role(tree, anchor) {
                wrap_location(tree, relation, anchor);
            }
        }
    }
}

fn label_simple_relations(tree: &mut Tree, lexicon: &Lexicon) {
    let entities = tree.find_all(|n| n.role.is_some_and(Role::is_entity));
    for entity in entities {
        if !tree.is_attached(entity) {
            continue;
        }
        let ancestors = tree.ancestors(entity);
        let Some(pp_pos) = ancestors.iter().position(|&a| tree.node(a).is_pp()) else {
            continue;
        };
        let pp = ancestors[pp_pos];
        if tree.node(pp).role == Some(Role::Location) {
            continue;
        }
        let argument = if pp_pos == 0 {
            entity
        } else {
            ancestors[pp_pos - 1]
        };
        let Some(preposition) = tree.prev_sibling(argument) else {
            continue;
        };
        let prep = tree.node(preposition);
        if !prep.is_preposition() || prep.has_role() || !lexicon.is_spatiotemporal(&prep.label) {
            continue;
        }

        debug!(preposition = %prep.label, entity = %tree.node(entity).label, "spatial relation");
        tree.set_role(preposition, Some(Role::SpatialRelation));
        if tree.children(pp) == [preposition, argument] {
            tree.set_role(pp, Some(Role::Location));
        } else {
            wrap_location(tree, preposition, argument);
        }
    }
}

/// Result of merging location phrases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocationMerge {
    /// Fewer than two location phrases, nothing to do
    Unchanged,
    /// The two phrases now hang under this compound node
    Merged(NodeId),
    /// Too many phrases, tree left as is
    Unsupported(usize),
}

/// Merge two location phrases into one compound location
///
/// The compound's children are the two phrases in sentence order. It takes
/// the place of the shallower phrase (the earlier one on a tie); the other
/// phrase is moved out of wherever it was.
pub fn clean_locations(tree: &mut Tree) -> LocationMerge {
    let locations = tree.find_all(|n| n.role == Some(Role::Location));
    match locations[..] {
        [a, b] => {
            let (first, second) = if tree.node(b).span.start < tree.node(a).span.start {
                (b, a)
            } else {
                (a, b)
            };
            let target = if tree.depth(second) < tree.depth(first) {
                second
            } else {
                first
            };

            let label = format!("{} {}", tree.node(first).label, tree.node(second).label);
            let span = tree.node(first).span.hull(tree.node(second).span);
            let compound = tree.add_node(&label, "PP", span);
            tree.set_role(compound, Some(Role::Location));

            tree.replace(target, compound);
            tree.attach(compound, first);
            tree.attach(compound, second);
            debug!(label = %label, "merged location phrases");
            LocationMerge::Merged(compound)
        }
        [_, _, _, ..] => {
            warn!(count = locations.len(), "cannot merge more than two location phrases");
            tree.issues
                .push(Issue::UnsupportedLocationMerge(locations.len()));
            LocationMerge::Unsupported(locations.len())
        }
        _ => LocationMerge::Unchanged,
    }
}

/// Label remaining nouns as non-platial objects
///
/// Every unlabeled noun leaf becomes an `Object`, except single-word
/// country names the entity recognizer missed, which become toponyms. A
/// parent whose children are only objects, determiners and qualities then
/// becomes the object itself.
pub fn label_non_platial_objects(tree: &mut Tree, lexicon: &Lexicon) {
    let mut nouns = tree.find_all(|n| {
        n.is_leaf() && n.is_noun() && !n.has_role() && !lexicon.is_stop_word(&n.label)
    });
    nouns.retain(|&noun| {
        let label = tree.node(noun).label.clone();
        if label.contains(' ') || !lexicon.is_country(&label) {
            return true;
        }
        debug!(country = %label, "unrecognized country labeled as toponym");
        tree.set_role(noun, Some(Role::Toponym));
        false
    });
    for &noun in &nouns {
        tree.set_role(noun, Some(Role::Object));
    }

    for noun in nouns {
        let mut current = tree.parent(noun);
        while let Some(parent) = current {
            if parent == tree.root_id || tree.node(parent).has_role() {
                break;
            }
            let children = tree.children(parent);
            let mut objects = 0;
            let absorbable = children.iter().all(|&c| {
                let child = tree.node(c);
                match child.role {
                    Some(Role::Object) => {
                        objects += 1;
                        true
                    }
                    Some(role) => role.is_quality(),
                    None => child.is_determiner(),
                }
            });
            if !absorbable || objects == 0 {
                break;
            }
            tree.set_role(parent, Some(Role::Object));
            tree.clear_children(parent);
            current = tree.parent(parent);
        }
    }
}

fn is_unit_leaf(tree: &Tree, id: NodeId, lexicon: &Lexicon) -> bool {
    let node = tree.node(id);
    node.is_leaf() && !node.has_role() && lexicon.is_unit(&node.label)
}

/// Collapse `first` and the following `unit` into one `Measure` leaf
fn merge_measure(tree: &mut Tree, first: NodeId, unit: NodeId) -> Option<NodeId> {
    let parent = tree.parent(first)?;
    let label = format!("{} {}", tree.node(first).label, tree.node(unit).label);
    let span = tree.node(first).span.hull(tree.node(unit).span);

    let target = if parent != tree.root_id && tree.children(parent) == [first, unit] {
        parent
    } else {
        let measure = tree.add_node(&label, "NP", span);
        tree.insert_before(first, measure);
        tree.detach(first);
        tree.detach(unit);
        measure
    };

    tree.clear_children(target);
    tree.set_label(target, label);
    tree.node_mut(target).span = span;
    tree.set_role(target, Some(Role::Measure));
    Some(target)
}

/// Label numbers, merging number-unit pairs into measures
pub fn label_numbers(tree: &mut Tree, lexicon: &Lexicon) {
    let numbers = tree.find_all(|n| n.is_leaf() && !n.has_role() && n.is_number());
    for number in numbers {
        if !tree.is_attached(number) {
            continue;
        }
        tree.set_role(number, Some(Role::Number));

        if let Some(next) = tree.next_sibling(number) {
            if is_unit_leaf(tree, next, lexicon) {
                merge_measure(tree, number, next);
            }
            continue;
        }

        // (QP (RB about) (CD 300)) (NNS meters)
        let Some(qp) = tree.parent(number) else {
            continue;
        };
        if tree.node(qp).category != "QP" {
            continue;
        }
        if let Some(unit) = tree.next_sibling(qp) {
            if is_unit_leaf(tree, unit, lexicon) {
                merge_measure(tree, qp, unit);
            }
        }
    }
}

/// Collapse single-child chains
///
/// A node with exactly one child takes the child's category and label,
/// the child's role when it has one, and adopts the grandchildren.
pub fn clean_single_child(tree: &mut Tree) {
    loop {
        let mut changed = false;
        for id in tree.postorder() {
            while let [child] = tree.children(id)[..] {
                let role = tree.node(child).role;
                tree.absorb(id, child);
                if role.is_some() {
                    tree.set_role(id, role);
                }
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}
