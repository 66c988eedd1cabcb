//! Query model handed to the query generator
//!
//! Dependencies are split into declarations (what the query ranges over),
//! criteria (conditions on it) and intent (what is asked for). Every
//! concept named by a dependency argument gets one query variable.

use lasso::{Key, Rodeo, Spur};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::dependency::{Dependency, DependencyList, RelationKind};
use crate::role::Role;
use crate::tree::{NodeId, Tree, normalize};

/// Lowercased name without a leading article
pub fn canonical_name(name: &str) -> String {
    let name = normalize(name);
    match name.strip_prefix("the ") {
        Some(rest) => rest.to_string(),
        None => name,
    }
}

/// Concept name to query variable
///
/// Names are interned once; a name's variable is `?v` followed by its
/// interning index, so the first concept is `?v0`.
#[derive(Debug, Default)]
pub struct VariableMap {
    names: Rodeo<Spur>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn format(key: Spur) -> String {
        format!("?v{}", key.into_usize())
    }

    /// Variable for `name`, allocating one on first sight
    pub fn variable(&mut self, name: &str) -> String {
        Self::format(self.names.get_or_intern(canonical_name(name)))
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.names.get(canonical_name(name)).map(Self::format)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// (name, variable) pairs in allocation order
    pub fn iter(&self) -> impl Iterator<Item = (&str, String)> {
        self.names.iter().map(|(key, name)| (name, Self::format(key)))
    }
}

impl Serialize for VariableMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Dependencies partitioned for query generation
#[derive(Debug, Default, Serialize)]
pub struct QueryModel {
    pub declaration: Vec<Dependency>,
    pub criteria: Vec<Dependency>,
    pub intent: Vec<Dependency>,
    /// Canonical names of the asked-for concepts
    pub intent_names: Vec<String>,
    pub variables: VariableMap,
}

impl QueryModel {
    pub fn build(ctree: &Tree, dependencies: &DependencyList) -> Self {
        let intent_names = intent_names(ctree);
        let mut model = QueryModel {
            intent_names,
            ..QueryModel::default()
        };

        for dependency in dependencies {
            let names_intent = dependency
                .arguments()
                .any(|a| model.intent_names.contains(&canonical_name(a)));
            let bucket = if names_intent {
                &mut model.intent
            } else {
                match dependency.kind {
                    RelationKind::And
                    | RelationKind::Or
                    | RelationKind::Not
                    | RelationKind::Property
                    | RelationKind::Unit => &mut model.declaration,
                    _ => &mut model.criteria,
                }
            };
            bucket.push(dependency.clone());
        }

        for dependency in model
            .declaration
            .iter()
            .chain(&model.criteria)
            .chain(&model.intent)
        {
            for name in dependency.arguments() {
                model.variables.variable(name);
            }
        }
        debug!(
            declaration = model.declaration.len(),
            criteria = model.criteria.len(),
            intent = model.intent.len(),
            variables = model.variables.len(),
            "query model built"
        );
        model
    }
}

/// Top-most WH phrase holding an intent node
fn wh_phrase(tree: &Tree, intent: NodeId) -> NodeId {
    tree.ancestors(intent)
        .into_iter()
        .filter(|&a| tree.node(a).is_wh())
        .last()
        .unwrap_or(intent)
}

fn is_intent_candidate(tree: &Tree, id: NodeId) -> bool {
    let node = tree.node(id);
    match node.role {
        Some(Role::Object | Role::PlaceType) => true,
        None => node.is_leaf() && node.is_noun(),
        _ => false,
    }
}

/// Canonical names of the concepts a question asks for
///
/// The nouns and labeled nodes inside the WH phrase, or, when the phrase
/// only holds the question word, the first object or place type after it.
pub fn intent_names(tree: &Tree) -> Vec<String> {
    let intents = tree.find_all(|n| matches!(n.role, Some(Role::Intent(_))));
    let order = tree.preorder();
    let mut names = Vec::new();

    for intent in intents {
        let wh = wh_phrase(tree, intent);
        let inside = tree.preorder_from(wh);
        let mut found: Vec<String> = inside
            .iter()
            .copied()
            .filter(|&n| n != intent && n != wh)
            .filter(|&n| {
                let node = tree.node(n);
                matches!(node.role, Some(r) if !matches!(r, Role::Intent(_)))
                    || (node.role.is_none() && node.is_leaf() && node.is_noun())
            })
            .map(|n| canonical_name(&tree.node(n).label))
            .collect();

        if found.is_empty() {
            let after = order
                .iter()
                .position(|&n| n == wh)
                .map(|p| p + inside.len())
                .unwrap_or(order.len());
            if let Some(&next) = order[after.min(order.len())..]
                .iter()
                .find(|&&n| is_intent_candidate(tree, n))
            {
                found.push(canonical_name(&tree.node(next).label));
            }
        }

        for name in found {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}
