//! Arena tree for constituency and dependency parses
//!
//! Nodes are stored in a flat vector and addressed by stable `NodeId`s;
//! parent/child edges are id lists. Detaching a node only rewrites ids, the
//! node itself stays in the arena but is no longer reachable from the root.
//! Every traversal starts at the root, so detached subtrees are invisible.

use memchr::memmem;
use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::error::Issue;
use crate::raw::RawNode;
use crate::role::Role;

/// Unique identifier for a node
pub type NodeId = usize;

/// Byte span into the tree's sentence text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `other` lies entirely inside this span
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Smallest span covering both
    pub fn hull(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// A node in a constituency or dependency tree
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: NodeId,
    /// Surface text, possibly several words
    pub label: String,
    /// Syntactic category (NP, PP, NNP, ...) or dependency node type
    pub category: String,
    pub role: Option<Role>,
    pub span: Span,
    /// False when the span could not be located and was borrowed from the parent
    pub span_resolved: bool,
    /// Part-of-speech tags (dependency trees only)
    pub attributes: Vec<String>,
    /// Grammatical relation to the head (dependency trees only)
    pub link: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    /// Create a new node with the given attributes
    pub fn new(id: NodeId, label: &str, category: &str, span: Span) -> Self {
        Self {
            id,
            label: label.to_string(),
            category: category.to_string(),
            role: None,
            span,
            span_resolved: true,
            attributes: Vec::new(),
            link: String::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn has_role(&self) -> bool {
        self.role.is_some()
    }

    /// Lowercased, whitespace-collapsed label
    pub fn normalized(&self) -> String {
        normalize(&self.label)
    }

    pub fn is_noun(&self) -> bool {
        self.category.starts_with("NN")
    }

    pub fn is_verb(&self) -> bool {
        self.category.starts_with("VB")
    }

    pub fn is_determiner(&self) -> bool {
        self.category == "DT" || self.category == "PDT"
    }

    pub fn is_preposition(&self) -> bool {
        self.category == "IN" || self.category == "TO"
    }

    pub fn is_adjective(&self) -> bool {
        self.category.starts_with("JJ") || self.category.starts_with("ADJ")
    }

    pub fn is_wh(&self) -> bool {
        self.category.starts_with("WH")
    }

    pub fn is_pp(&self) -> bool {
        self.category.starts_with("PP")
    }

    pub fn is_number(&self) -> bool {
        self.category == "CD" || parse_number(&self.label).is_some()
    }
}

/// Lowercase and collapse whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a numeric token, allowing thousands separators ("1,300")
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|&c| c != ',').collect();
    if cleaned.is_empty() || !cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse().ok()
}

/// A parse tree over one sentence
#[derive(Debug, Clone, Serialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
    pub root_id: NodeId,
    /// Text every span indexes into
    pub sentence: String,
    /// Non-fatal problems found while building the tree
    pub issues: Vec<Issue>,
    #[serde(skip)]
    generation: u64,
}

impl Tree {
    /// Create a tree holding a single root node
    pub fn new(label: &str, category: &str) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root_id: 0,
            sentence: label.to_string(),
            issues: Vec::new(),
            generation: 0,
        };
        tree.root_id = tree.add_node(label, category, Span::new(0, label.len()));
        tree
    }

    /// Build a constituency tree from parser output
    ///
    /// The root's word is the sentence. Each child's span is found by
    /// searching its text inside the parent's span, starting right after the
    /// previous sibling. A child that cannot be located borrows its parent's
    /// span and is flagged.
    pub fn from_raw(raw: &RawNode) -> Self {
        let mut tree = Tree::new(&raw.word, &raw.node_type);
        let root = tree.root_id;
        tree.build_constituents(root, raw);
        tree
    }

    fn build_constituents(&mut self, parent: NodeId, raw: &RawNode) {
        let parent_span = self.nodes[parent].span;
        let mut cursor = parent_span.start;

        for raw_child in &raw.children {
            let located = self.locate(&raw_child.word, cursor, parent_span.end);
            let (span, resolved) = match located {
                Some(start) => {
                    let end = start + raw_child.word.len();
                    cursor = end;
                    (Span::new(start, end), true)
                }
                None => {
                    warn!(
                        child = %raw_child.word,
                        parent = %raw.word,
                        "span could not be located, reusing parent span"
                    );
                    self.issues.push(Issue::SpanResolution {
                        child: raw_child.word.clone(),
                        parent: raw.word.clone(),
                    });
                    (parent_span, false)
                }
            };

            let child = self.add_node(&raw_child.word, &raw_child.node_type, span);
            self.nodes[child].span_resolved = resolved;
            self.attach(parent, child);
            self.build_constituents(child, raw_child);
        }
    }

    /// Build a dependency tree aligned to `sentence`
    ///
    /// Spans reported by the parser are used as-is; otherwise the word is
    /// searched in the sentence.
    pub fn from_dependency(raw: &RawNode, sentence: &str) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root_id: 0,
            sentence: sentence.to_string(),
            issues: Vec::new(),
            generation: 0,
        };
        tree.root_id = tree.add_dependency_node(raw, None);
        tree
    }

    fn add_dependency_node(&mut self, raw: &RawNode, parent: Option<NodeId>) -> NodeId {
        let reported = raw
            .spans
            .first()
            .filter(|s| s.start <= s.end && s.end <= self.sentence.len())
            .map(|s| Span::new(s.start, s.end));

        let (span, resolved) = match reported {
            Some(span) => (span, true),
            None => match self.locate(&raw.word, 0, self.sentence.len()) {
                Some(start) => (Span::new(start, start + raw.word.len()), true),
                None => {
                    let fallback = parent
                        .map(|p| self.nodes[p].span)
                        .unwrap_or(Span::new(0, self.sentence.len()));
                    warn!(word = %raw.word, "dependency node not found in sentence");
                    self.issues.push(Issue::SpanResolution {
                        child: raw.word.clone(),
                        parent: self.sentence.clone(),
                    });
                    (fallback, false)
                }
            },
        };

        let id = self.add_node(&raw.word, &raw.node_type, span);
        let node = &mut self.nodes[id];
        node.span_resolved = resolved;
        node.attributes = raw.attributes.clone();
        node.link = raw.link.clone();

        if let Some(parent) = parent {
            self.attach(parent, id);
        }
        for child in &raw.children {
            self.add_dependency_node(child, Some(id));
        }
        id
    }

    /// Byte offset of `needle` in the sentence between `from` and `to`
    fn locate(&self, needle: &str, from: usize, to: usize) -> Option<usize> {
        let haystack = self.sentence.get(from..to)?;
        memmem::find(haystack.as_bytes(), needle.as_bytes()).map(|pos| from + pos)
    }

    /// Counter bumped by every structural edit
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    /// Add a detached node to the arena
    pub fn add_node(&mut self, label: &str, category: &str, span: Span) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id, label, category, span));
        id
    }

    /// Get a node by an ID handed out by this tree
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn root(&self) -> &Node {
        &self.nodes[self.root_id]
    }

    /// Current label of the root
    pub fn root_text(&self) -> &str {
        &self.nodes[self.root_id].label
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn set_role(&mut self, id: NodeId, role: Option<Role>) {
        self.nodes[id].role = role;
    }

    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) {
        self.nodes[id].label = label.into();
        self.touch();
    }

    pub fn set_category(&mut self, id: NodeId, category: &str) {
        self.nodes[id].category = category.to_string();
    }

    /// Remove a node from its parent's children
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
        self.touch();
    }

    /// Append `child` to `parent`'s children, detaching it first
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
    }

    /// Insert `child` at `index` among `parent`'s children, detaching it first
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child].parent = Some(parent);
    }

    /// Insert `new` right before `sibling` under the same parent
    pub fn insert_before(&mut self, sibling: NodeId, new: NodeId) {
        let Some(parent) = self.nodes[sibling].parent else {
            return;
        };
        self.detach(new);
        let Some(pos) = self.position(sibling) else {
            return;
        };
        self.insert_child(parent, pos, new);
    }

    /// Put `new` where `old` is and detach `old`
    ///
    /// Replacing the root makes `new` the root.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        self.detach(new);
        match self.nodes[old].parent {
            Some(parent) => {
                let Some(pos) = self.position(old) else {
                    return;
                };
                self.nodes[parent].children[pos] = new;
                self.nodes[new].parent = Some(parent);
                self.nodes[old].parent = None;
            }
            None if old == self.root_id => {
                self.root_id = new;
            }
            None => {}
        }
        self.touch();
    }

    /// Detach every child of a node
    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id].children);
        for child in children {
            self.nodes[child].parent = None;
        }
        self.touch();
    }

    /// Index of a node among its siblings
    pub fn position(&self, id: NodeId) -> Option<usize> {
        let parent = self.nodes[id].parent?;
        self.nodes[parent].children.iter().position(|&c| c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes[id].parent?;
        let pos = self.position(id)?;
        self.nodes[parent].children.get(pos + 1).copied()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes[id].parent?;
        let pos = self.position(id)?;
        pos.checked_sub(1)
            .map(|p| self.nodes[parent].children[p])
    }

    /// Other children of this node's parent, in order
    pub fn siblings(&self, id: NodeId) -> Vec<NodeId> {
        match self.nodes[id].parent {
            Some(parent) => self.nodes[parent]
                .children
                .iter()
                .copied()
                .filter(|&c| c != id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Ancestors from the parent up to the root
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = self.nodes[id].parent;
        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.nodes[parent].parent;
        }
        ancestors
    }

    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// True if the node is reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root_id || self.ancestors(id).last() == Some(&self.root_id)
    }

    /// Number of edges between the node and the root
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).len()
    }

    /// Attached nodes in pre-order (document order for constituency trees)
    pub fn preorder(&self) -> Vec<NodeId> {
        self.preorder_from(self.root_id)
    }

    pub fn preorder_from(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            stack.extend(self.nodes[current].children.iter().rev());
        }
        order
    }

    /// Attached nodes in post-order (children before parents)
    pub fn postorder(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        self.postorder_into(self.root_id, &mut order);
        order
    }

    fn postorder_into(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &child in &self.nodes[id].children {
            self.postorder_into(child, out);
        }
        out.push(id);
    }

    /// Leaves of the whole tree in document order
    pub fn leaves(&self) -> Vec<NodeId> {
        self.leaves_of(self.root_id)
    }

    pub fn leaves_of(&self, id: NodeId) -> Vec<NodeId> {
        self.preorder_from(id)
            .into_iter()
            .filter(|&n| self.nodes[n].is_leaf())
            .collect()
    }

    /// Space-joined labels of all leaves
    pub fn leaf_text(&self) -> String {
        self.leaves()
            .iter()
            .map(|&n| self.nodes[n].label.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Attached nodes matching a predicate, in pre-order
    pub fn find_all<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        self.preorder()
            .into_iter()
            .filter(|&n| predicate(&self.nodes[n]))
            .collect()
    }

    /// Deepest attached node whose span covers `span`
    pub fn deepest_covering(&self, span: Span) -> Option<NodeId> {
        let root = self.root();
        if !root.span.contains(span) {
            return None;
        }
        let mut current = self.root_id;
        'descend: loop {
            for &child in &self.nodes[current].children {
                let node = &self.nodes[child];
                if node.span_resolved && node.span.contains(span) {
                    current = child;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }

    /// Recompute internal labels and spans from the children
    ///
    /// Post-order: every internal node's label becomes its children's labels
    /// joined by spaces and its span the hull of the resolved child spans.
    /// A node left with a single child carrying the same role absorbs that
    /// child (takes its category and grandchildren). Running it twice gives
    /// the same tree as running it once.
    pub fn update(&mut self) {
        for id in self.postorder() {
            self.update_node(id);
        }
    }

    fn update_node(&mut self, id: NodeId) {
        if self.nodes[id].is_leaf() {
            return;
        }
        loop {
            self.recompute(id);
            let children = &self.nodes[id].children;
            if children.len() != 1 {
                break;
            }
            let child = children[0];
            let role = self.nodes[id].role;
            if role.is_none() || self.nodes[child].role != role {
                break;
            }
            self.absorb(id, child);
            if self.nodes[id].is_leaf() {
                break;
            }
        }
    }

    fn recompute(&mut self, id: NodeId) {
        let children = &self.nodes[id].children;
        let label = children
            .iter()
            .map(|&c| self.nodes[c].label.as_str())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let span = children
            .iter()
            .map(|&c| &self.nodes[c])
            .filter(|c| c.span_resolved)
            .map(|c| c.span)
            .reduce(|a, b| a.hull(b));

        let node = &mut self.nodes[id];
        if node.label != label {
            node.label = label;
            self.generation += 1;
        }
        if let Some(span) = span {
            node.span = span;
            node.span_resolved = true;
        }
    }

    /// Replace `child` by its own children under `id`, taking its category
    pub(crate) fn absorb(&mut self, id: NodeId, child: NodeId) {
        let grandchildren = std::mem::take(&mut self.nodes[child].children);
        let category = self.nodes[child].category.clone();
        let label = self.nodes[child].label.clone();
        let span = self.nodes[child].span;

        self.nodes[child].parent = None;
        for &g in &grandchildren {
            self.nodes[g].parent = Some(id);
        }
        let node = &mut self.nodes[id];
        node.children = grandchildren;
        node.category = category;
        node.label = label;
        node.span = span;
        self.touch();
    }

    /// Attached role-bearing units in document order
    ///
    /// A role-bearing node stands for its whole subtree, except `Location`
    /// wrappers whose parts are listed individually.
    pub fn roles(&self) -> Vec<(NodeId, Role)> {
        let mut roles = Vec::new();
        self.collect_roles(self.root_id, &mut roles);
        roles
    }

    fn collect_roles(&self, id: NodeId, out: &mut Vec<(NodeId, Role)>) {
        match self.nodes[id].role {
            Some(Role::Location) | None => {
                for &child in &self.nodes[id].children {
                    self.collect_roles(child, out);
                }
            }
            Some(role) => out.push((id, role)),
        }
    }

    /// Flattened role code, one character per role-bearing unit
    pub fn role_code(&self) -> String {
        crate::role::role_code(self.roles().into_iter().map(|(_, role)| role))
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, depth: usize) -> fmt::Result {
        let node = &self.nodes[id];
        let role = node.role.map(|r| r.code().to_string()).unwrap_or_default();
        writeln!(
            f,
            "{}{} ({}) {{{}}}",
            "  ".repeat(depth),
            node.label,
            node.category,
            role
        )?;
        for &child in &node.children {
            self.fmt_node(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root_id, 0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// (NP (DT the) (NN city)) inside "What is the city ?"
    pub(crate) fn sample_raw() -> RawNode {
        RawNode::phrase(
            "SBARQ",
            vec![
                RawNode::phrase("WHNP", vec![RawNode::leaf("What", "WP")]),
                RawNode::phrase(
                    "SQ",
                    vec![
                        RawNode::leaf("is", "VBZ"),
                        RawNode::phrase(
                            "NP",
                            vec![RawNode::leaf("the", "DT"), RawNode::leaf("city", "NN")],
                        ),
                    ],
                ),
                RawNode::leaf("?", "."),
            ],
        )
    }

    #[test]
    fn test_tree_creation() {
        let mut tree = Tree::new("runs", "VBZ");
        let child = tree.add_node("dog", "NN", Span::new(0, 3));
        tree.attach(tree.root_id, child);

        assert_eq!(tree.nodes.len(), 2);
        assert_eq!(tree.parent(child), Some(tree.root_id));
        assert_eq!(tree.children(tree.root_id).len(), 1);
    }

    #[test]
    fn test_spans_track_offsets() {
        let tree = Tree::from_raw(&sample_raw());
        assert_eq!(tree.sentence, "What is the city ?");

        let city = tree.find_all(|n| n.label == "city")[0];
        assert_eq!(tree.node(city).span, Span::new(12, 16));
        assert!(tree.issues.is_empty());
    }

    #[test]
    fn test_repeated_words_get_distinct_spans() {
        let raw = RawNode::phrase(
            "NP",
            vec![
                RawNode::leaf("the", "DT"),
                RawNode::leaf("river", "NN"),
                RawNode::leaf("the", "DT"),
            ],
        );
        let tree = Tree::from_raw(&raw);
        let thes = tree.find_all(|n| n.label == "the");

        assert_eq!(tree.node(thes[0]).span, Span::new(0, 3));
        assert_eq!(tree.node(thes[1]).span, Span::new(10, 13));
    }

    #[test]
    fn test_unlocatable_child_borrows_parent_span() {
        let mut raw = RawNode::phrase("NP", vec![RawNode::leaf("Sea", "NNP")]);
        raw.word = "Black".to_string();
        let tree = Tree::from_raw(&raw);
        let sea = tree.children(tree.root_id)[0];

        assert!(!tree.node(sea).span_resolved);
        assert_eq!(tree.node(sea).span, tree.root().span);
        assert_eq!(tree.issues.len(), 1);
    }

    #[test]
    fn test_detach_and_preorder() {
        let mut tree = Tree::from_raw(&sample_raw());
        let det = tree.find_all(|n| n.label == "the")[0];
        let before = tree.generation();
        tree.detach(det);

        assert!(tree.generation() > before);
        assert!(!tree.is_attached(det));
        assert!(tree.preorder().iter().all(|&n| n != det));
    }

    #[test]
    fn test_postorder_children_first() {
        let tree = Tree::from_raw(&sample_raw());
        let order = tree.postorder();
        assert_eq!(*order.last().unwrap(), tree.root_id);
        let labels: Vec<_> = order.iter().map(|&n| tree.node(n).label.as_str()).collect();
        assert_eq!(labels[0], "What");
    }

    #[test]
    fn test_update_recomputes_labels() {
        let mut tree = Tree::from_raw(&sample_raw());
        let det = tree.find_all(|n| n.label == "the")[0];
        tree.detach(det);
        tree.update();

        assert_eq!(tree.root().label, "What is city ?");
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut tree = Tree::from_raw(&sample_raw());
        let np = tree.find_all(|n| n.category == "NP")[0];
        let noun = tree.find_all(|n| n.label == "city")[0];
        let det = tree.find_all(|n| n.label == "the")[0];
        tree.detach(det);
        tree.set_role(np, Some(Role::PlaceType));
        tree.set_role(noun, Some(Role::PlaceType));

        tree.update();
        let once = tree.to_string();
        tree.update();
        assert_eq!(tree.to_string(), once);
        // NP absorbed its single same-role child
        assert!(tree.node(np).is_leaf());
        assert_eq!(tree.node(np).category, "NN");
    }

    #[test]
    fn test_deepest_covering() {
        let tree = Tree::from_raw(&sample_raw());
        let covering = tree.deepest_covering(Span::new(8, 16)).unwrap();
        assert_eq!(tree.node(covering).category, "NP");
    }

    #[test]
    fn test_role_code_skips_location_wrappers() {
        let mut tree = Tree::from_raw(&sample_raw());
        let what = tree.find_all(|n| n.label == "What")[0];
        let np = tree.find_all(|n| n.category == "NP")[0];
        let city = tree.find_all(|n| n.label == "city")[0];
        tree.set_role(what, Some(Role::Intent(crate::role::IntentKind::What)));
        tree.set_role(np, Some(Role::Location));
        tree.set_role(city, Some(Role::PlaceType));

        assert_eq!(tree.role_code(), "2p");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1,300"), Some(1300.0));
        assert_eq!(parse_number("3.5"), Some(3.5));
        assert_eq!(parse_number("km"), None);
    }
}
