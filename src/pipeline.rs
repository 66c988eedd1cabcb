//! End-to-end analysis of one parsed question
//!
//! The Analyzer runs the labeling and rewriting passes in order:
//! 1. Entity, intent and type labeling
//! 2. Tree cleanup and spatial relation structure
//! 3. Numbers, verbs and objects
//! 4. Conjunctions, qualities and comparisons
//! 5. Role code
//! 6. Dependency extraction and query model, when a dependency parse is given
//!
//! Every sentence is processed on its own; nothing carries over between
//! sentences of a batch.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::bracketed::parse_bracketed;
use crate::config::Config;
use crate::conllu::DependencySentence;
use crate::dependency::{
    DependencyExtractor, DependencyList, SpanMap, clean_d_tree, transfer_roles,
};
use crate::error::{Error, Issue};
use crate::labeling::{Entities, Labeler};
use crate::lexicon::Lexicon;
use crate::query_model::QueryModel;
use crate::raw::RawNode;
use crate::resolve::{
    ComparisonPattern, find_comparisons, label_complex_comparison, label_conjunctions,
    label_qualities,
};
use crate::rewrite::{
    CompoundRelationPattern, LocationMerge, clean_locations, clean_single_child, clean_tree,
    label_non_platial_objects, label_numbers, label_spatiotemporal_relationships,
};
use crate::role::Role;
use crate::tree::Tree;
use crate::verbs::{Embedder, EmbeddingClassifier, LexiconClassifier, VerbClassifier};

/// A question as delivered by the upstream parsing and NER services
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuestion {
    pub sentence: String,
    /// Constituency parse
    pub tree: RawNode,
    #[serde(flatten)]
    pub entities: Entities,
    /// Dependency parse of the same sentence
    #[serde(default)]
    pub dependency: Option<RawNode>,
}

impl ParsedQuestion {
    pub fn new(sentence: &str, tree: RawNode, entities: Entities) -> Self {
        Self {
            sentence: sentence.to_string(),
            tree,
            entities,
            dependency: None,
        }
    }

    /// Question from a bracketed constituency parse; the sentence is its leaves
    pub fn from_bracketed(bracketed: &str, entities: Entities) -> Result<Self, Error> {
        let tree = parse_bracketed(bracketed)?;
        Ok(Self {
            sentence: tree.word.clone(),
            tree,
            entities,
            dependency: None,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Attach a dependency parse read from CoNLL-U
    pub fn with_dependency(mut self, parse: DependencySentence) -> Self {
        if self.sentence.is_empty() {
            self.sentence = parse.text;
        }
        self.dependency = Some(parse.root);
        self
    }
}

/// Everything derived from one question
#[derive(Debug, Serialize)]
pub struct Analysis {
    pub sentence: String,
    /// The labeled and rewritten constituency tree
    pub tree: Tree,
    pub role_code: String,
    pub location_merge: LocationMerge,
    pub dependency_tree: Option<Tree>,
    pub dependencies: DependencyList,
    pub query: Option<QueryModel>,
    /// Non-fatal problems from every stage
    pub issues: Vec<Issue>,
}

/// A question of a batch that could not be analyzed
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub sentence: String,
    pub message: String,
}

/// Results of a batch, in input order
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub analyses: Vec<Analysis>,
    pub failures: Vec<BatchFailure>,
}

/// Runs the full pass sequence over parsed questions
pub struct Analyzer {
    lexicon: Lexicon,
    config: Config,
    classifier: Box<dyn VerbClassifier>,
    relations: CompoundRelationPattern,
    comparisons: ComparisonPattern,
}

impl Analyzer {
    pub fn new(
        lexicon: Lexicon,
        config: Config,
        classifier: Box<dyn VerbClassifier>,
    ) -> Result<Self, Error> {
        let relations = CompoundRelationPattern::new(&lexicon)?;
        let comparisons = ComparisonPattern::new(&lexicon)?;
        Ok(Self {
            lexicon,
            config,
            classifier,
            relations,
            comparisons,
        })
    }

    /// Analyzer with the config's lexicon and lexicon-based verb classes
    pub fn from_config(config: Config) -> Result<Self, Error> {
        let lexicon = config.load_lexicon()?;
        let classifier = Box::new(LexiconClassifier::new(lexicon.clone()));
        Self::new(lexicon, config, classifier)
    }

    /// Analyzer classifying verbs by embedding similarity
    ///
    /// References are the lexicon's action and stative verbs; a verb closer
    /// to neither than `verb_similarity_threshold` stays unlabeled.
    pub fn with_embedder<E>(config: Config, embedder: E) -> Result<Self, Error>
    where
        E: Embedder + 'static,
    {
        let lexicon = config.load_lexicon()?;
        let classifier = Box::new(EmbeddingClassifier::from_lexicon(
            embedder,
            &lexicon,
            config.verb_similarity_threshold,
        ));
        Self::new(lexicon, config, classifier)
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn analyze(&self, question: &ParsedQuestion) -> Result<Analysis, Error> {
        if question.tree.is_empty() {
            return Err(Error::EmptyTree(question.sentence.clone()));
        }
        let sentence = if question.sentence.trim().is_empty() {
            question.tree.word.clone()
        } else {
            question.sentence.clone()
        };

        let mut tree = Tree::from_raw(&question.tree);
        let mut entities = question.entities.clone();
        if self.config.complete_types {
            entities.complete(&sentence, &self.lexicon);
        }

        let mut labeler = Labeler::new(&self.lexicon);
        labeler.label_entities(&mut tree, &entities);
        labeler.label_intent(&mut tree);
        clean_tree(&mut tree);

        label_spatiotemporal_relationships(&mut tree, &self.lexicon, &self.relations);
        let location_merge = clean_locations(&mut tree);
        tree.update();

        label_numbers(&mut tree, &self.lexicon);
        labeler.label_verbs(&mut tree, self.classifier.as_ref());
        label_non_platial_objects(&mut tree, &self.lexicon);

        label_conjunctions(&mut tree, &self.lexicon);
        label_qualities(&mut tree, &self.lexicon);
        self.label_comparisons(&mut tree);

        clean_single_child(&mut tree);
        tree.update();
        let role_code = tree.role_code();

        let mut issues = tree.issues.clone();
        let mut dependencies = DependencyList::new();
        let mut dependency_tree = None;
        let mut query = None;

        if let Some(raw) = question.dependency.as_ref().filter(|_| self.config.extract_dependencies)
        {
            let mut dtree = Tree::from_dependency(raw, &sentence);
            let span_map = SpanMap::from_tree(&tree, &sentence);
            clean_d_tree(&mut dtree, &span_map);
            transfer_roles(&tree, &mut dtree);

            let (found, extraction_issues) = DependencyExtractor::new(&dtree, &self.lexicon).extract();
            issues.extend(dtree.issues.iter().cloned());
            issues.extend(extraction_issues);
            query = Some(QueryModel::build(&tree, &found));
            dependencies = found;
            dependency_tree = Some(dtree);
        }

        info!(
            sentence = %sentence,
            role_code = %role_code,
            dependencies = dependencies.len(),
            issues = issues.len(),
            "analyzed question"
        );

        Ok(Analysis {
            sentence,
            tree,
            role_code,
            location_merge,
            dependency_tree,
            dependencies,
            query,
            issues,
        })
    }

    fn label_comparisons(&self, tree: &mut Tree) {
        let sentence = tree.sentence.clone();
        for comparison in find_comparisons(&sentence, &self.comparisons, &self.lexicon) {
            let role = Role::Comparison(comparison.sign);
            if !label_complex_comparison(tree, &comparison, comparison.phrase(), role) {
                debug!(first = %comparison.first, "comparison left unresolved");
            }
        }
    }

    /// Analyze questions one at a time, recording failures and moving on
    pub fn analyze_batch<'q, I>(&self, questions: I) -> BatchReport
    where
        I: IntoIterator<Item = &'q ParsedQuestion>,
    {
        let mut report = BatchReport::default();
        for (index, question) in questions.into_iter().enumerate() {
            match self.analyze(question) {
                Ok(analysis) => report.analyses.push(analysis),
                Err(e) => {
                    error!(index, sentence = %question.sentence, error = %e, "analysis failed");
                    report.failures.push(BatchFailure {
                        index,
                        sentence: question.sentence.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        report
    }
}
