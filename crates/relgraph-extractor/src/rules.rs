//! Extraction rules
//!
//! A rule is data: a label, a token pattern and a projection saying how a
//! match becomes a triple. A rule set also carries an optional dependency
//! rule, a subject-verb-object walk over the parse tree that runs
//! independently of the patterns.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::document::AnnotatedDocument;
use crate::pattern::{ConstraintSpec, Match, Pattern, PatternSet};
use relgraph_core::{RelgraphError, Result, Triple};

/// Rules shipped with the crate
pub const DEFAULT_RULES: &str = include_str!("rules/default.toml");

/// Characters trimmed from both ends of copula-split spans
const SPAN_TRIM: &[char] = &[
    ' ', '.', ',', ':', ';', '"', '\'', '(', ')', '[', ']', '{', '}',
];

const NOUN_TAGS: &[&str] = &["NOUN", "PROPN"];

// ============================================================================
// Projections
// ============================================================================

/// How a pattern match is turned into (subject, relation, object)
///
/// Every variant anchored on an entity token uses the full text of the
/// entity covering it, so multi-token names survive single-token matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Projection {
    /// Subject entity, relation chosen by the verb lemma, object noun phrase
    VerbObject { relations: BTreeMap<String, String> },

    /// Split at the first token with `lemma`; leading articles are dropped
    /// from the right-hand side
    CopulaSplit {
        lemma: String,
        relation: String,
        #[serde(default)]
        articles: Vec<String>,
    },

    /// Entity of the first token to entity of the last token
    EntityPair { relation: String },

    /// Entity of the first token to the first entity of `entity_types`
    /// lying inside the match (last token text when there is none)
    EntityWithin {
        relation: String,
        entity_types: Vec<String>,
    },

    /// Entity of the first token to the entity of the first token typed
    /// `entity_types`; no triple when the match has none
    EntityMention {
        relation: String,
        entity_types: Vec<String>,
    },

    /// Entity of the first token to the noun phrase of the last noun
    NounPhrase { relation: String },
}

impl Projection {
    fn validate(&self) -> Result<()> {
        let problem = match self {
            Self::VerbObject { relations } if relations.is_empty() => {
                Some("verb_object needs at least one verb relation")
            }
            Self::VerbObject { relations } if relations.values().any(|r| r.trim().is_empty()) => {
                Some("verb_object relation labels must not be empty")
            }
            Self::CopulaSplit { lemma, .. } if lemma.is_empty() => {
                Some("copula_split needs a lemma")
            }
            Self::EntityWithin { entity_types, .. } | Self::EntityMention { entity_types, .. }
                if entity_types.is_empty() =>
            {
                Some("entity projections need at least one entity type")
            }
            _ => None,
        };
        if let Some(problem) = problem {
            return Err(RelgraphError::PatternConfig(problem.to_string()));
        }
        match self.relation() {
            Some(relation) if relation.trim().is_empty() => Err(RelgraphError::PatternConfig(
                "projection relation must not be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Fixed relation label, if the projection has one
    pub fn relation(&self) -> Option<&str> {
        match self {
            Self::VerbObject { .. } => None,
            Self::CopulaSplit { relation, .. }
            | Self::EntityPair { relation }
            | Self::EntityWithin { relation, .. }
            | Self::EntityMention { relation, .. }
            | Self::NounPhrase { relation } => Some(relation),
        }
    }

    /// Project a match onto a triple
    pub fn apply(&self, doc: &AnnotatedDocument, m: &Match) -> Option<Triple> {
        let tokens = doc.tokens();
        let range = m.range();
        let first = m.start;
        let last = m.end.checked_sub(1)?;

        match self {
            Self::VerbObject { relations } => {
                let relation = tokens[range.clone()]
                    .iter()
                    .find_map(|t| relations.get(&t.lemma))?;
                let object = last_noun(doc, range)
                    .map(|head| doc.noun_phrase(head))
                    .unwrap_or_else(|| tokens[last].text.clone());
                Some(Triple::new(doc.entity_text(first), relation, object))
            }
            Self::CopulaSplit {
                lemma,
                relation,
                articles,
            } => {
                let pivot = range.clone().find(|&i| tokens[i].lemma == *lemma)?;
                let subject = clean_span(doc, first..pivot);
                let mut rhs = pivot + 1..m.end;
                if rhs.start < rhs.end {
                    let lower = tokens[rhs.start].text.to_lowercase();
                    if articles.iter().any(|a| *a == lower) {
                        rhs.start += 1;
                    }
                }
                let object = clean_span(doc, rhs);
                Some(Triple::new(subject, relation.clone(), object))
            }
            Self::EntityPair { relation } => Some(Triple::new(
                doc.entity_text(first),
                relation.clone(),
                doc.entity_text(last),
            )),
            Self::EntityWithin {
                relation,
                entity_types,
            } => {
                let object = doc
                    .entities_within(range)
                    .find(|e| entity_types.contains(&e.label))
                    .map(|e| doc.span_text(e.start..e.end))
                    .unwrap_or_else(|| tokens[last].text.clone());
                Some(Triple::new(doc.entity_text(first), relation.clone(), object))
            }
            Self::EntityMention {
                relation,
                entity_types,
            } => {
                let mention = range.clone().find(|&i| {
                    tokens[i]
                        .entity_type
                        .as_ref()
                        .map(|ent| entity_types.contains(ent))
                        .unwrap_or(false)
                })?;
                Some(Triple::new(
                    doc.entity_text(first),
                    relation.clone(),
                    doc.entity_text(mention),
                ))
            }
            Self::NounPhrase { relation } => {
                let head = last_noun(doc, range)?;
                Some(Triple::new(
                    doc.entity_text(first),
                    relation.clone(),
                    doc.noun_phrase(head),
                ))
            }
        }
    }
}

fn last_noun(doc: &AnnotatedDocument, range: Range<usize>) -> Option<usize> {
    range
        .rev()
        .find(|&i| NOUN_TAGS.contains(&doc.tokens()[i].pos.as_str()))
}

fn clean_span(doc: &AnnotatedDocument, range: Range<usize>) -> String {
    let words: Vec<&str> = doc.tokens()[range]
        .iter()
        .map(|t| t.text.as_str())
        .collect();
    words.join(" ").trim_matches(SPAN_TRIM).to_string()
}

// ============================================================================
// Dependency rule
// ============================================================================

/// Subject-verb-object extraction over the dependency tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencyRule {
    /// Verb lemma to relation label
    pub verbs: BTreeMap<String, String>,
    /// Dependency labels accepted for the subject child
    pub subject_deps: Vec<String>,
    /// Entity type the subject child must carry
    pub subject_entity: String,
    /// Dependency labels accepted for the object child
    pub object_deps: Vec<String>,
    /// Part-of-speech tags accepted for the object head
    pub object_pos: Vec<String>,
    /// Part-of-speech tag of the verb token
    #[serde(default = "default_verb_pos")]
    pub verb_pos: String,
}

fn default_verb_pos() -> String {
    "VERB".to_string()
}

impl DependencyRule {
    fn validate(&self) -> Result<()> {
        if self.verbs.is_empty()
            || self.subject_deps.is_empty()
            || self.object_deps.is_empty()
            || self.object_pos.is_empty()
            || self.subject_entity.is_empty()
        {
            return Err(RelgraphError::PatternConfig(
                "dependency rule needs verbs, subject/object labels and an entity type"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Walk every matching verb and emit (subject entity, relation, object phrase)
    pub fn apply(&self, doc: &AnnotatedDocument) -> Vec<Triple> {
        let mut triples = Vec::new();

        for verb in doc.tokens() {
            if verb.pos != self.verb_pos {
                continue;
            }
            let Some(relation) = self.verbs.get(&verb.lemma) else {
                continue;
            };

            let subject = doc.children(verb.index).find(|c| {
                self.subject_deps.contains(&c.dep)
                    && c.entity_type.as_deref() == Some(self.subject_entity.as_str())
            });
            let object = doc
                .children(verb.index)
                .find(|c| self.object_deps.contains(&c.dep) && self.object_pos.contains(&c.pos));

            if let (Some(subject), Some(object)) = (subject, object) {
                triples.push(Triple::new(
                    doc.entity_text(subject.index),
                    relation.clone(),
                    doc.noun_phrase(object.index),
                ));
            }
        }

        triples
    }
}

// ============================================================================
// Rule sets
// ============================================================================

/// Declarative rule as found in a rule file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub label: String,
    pub pattern: Vec<ConstraintSpec>,
    pub projection: Projection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RuleSpec>,
    dependency: Option<DependencyRule>,
}

/// Compiled, immutable extraction rules
#[derive(Debug, Clone)]
pub struct RuleSet {
    matcher: PatternSet,
    projections: Vec<Projection>,
    dependency: Option<DependencyRule>,
}

impl RuleSet {
    /// The rules bundled with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_toml(DEFAULT_RULES)
    }

    /// Compile rules from TOML text
    pub fn from_toml(input: &str) -> Result<Self> {
        let file: RuleFile = toml::from_str(input)
            .map_err(|e| RelgraphError::PatternConfig(format!("invalid rule file: {e}")))?;
        Self::from_specs(file.rules, file.dependency)
    }

    /// Compile rules from a TOML file on disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelgraphError::PatternConfig(format!("cannot read rule file {}: {e}", path.display()))
        })?;
        let rules = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), rules = rules.len(), "loaded rule file");
        Ok(rules)
    }

    /// Compile declarative rules
    pub fn from_specs(specs: Vec<RuleSpec>, dependency: Option<DependencyRule>) -> Result<Self> {
        if specs.is_empty() && dependency.is_none() {
            return Err(RelgraphError::PatternConfig(
                "rule set defines no rules".to_string(),
            ));
        }

        let mut patterns = Vec::with_capacity(specs.len());
        let mut projections = Vec::with_capacity(specs.len());
        for spec in specs {
            spec.projection.validate().map_err(|e| match e {
                RelgraphError::PatternConfig(msg) => {
                    RelgraphError::PatternConfig(format!("rule '{}': {msg}", spec.label))
                }
                other => other,
            })?;
            patterns.push(Pattern::from_specs(spec.label, &spec.pattern)?);
            projections.push(spec.projection);
        }
        if let Some(rule) = &dependency {
            rule.validate()?;
        }

        Ok(Self {
            matcher: PatternSet::new(patterns)?,
            projections,
            dependency,
        })
    }

    /// Number of pattern rules
    pub fn len(&self) -> usize {
        self.projections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projections.is_empty() && self.dependency.is_none()
    }

    /// Pattern rule labels in declaration order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.matcher.patterns().iter().map(|p| p.label())
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.matcher
    }

    pub fn dependency(&self) -> Option<&DependencyRule> {
        self.dependency.as_ref()
    }

    /// Unresolved candidate triples: pattern matches first, in match order,
    /// then the dependency walk
    pub fn candidates(&self, doc: &AnnotatedDocument) -> Vec<Triple> {
        let mut triples: Vec<Triple> = self
            .matcher
            .find_matches(doc)
            .iter()
            .filter_map(|m| self.projections[m.pattern].apply(doc, m))
            .collect();
        let from_patterns = triples.len();

        if let Some(rule) = &self.dependency {
            triples.extend(rule.apply(doc));
        }

        tracing::debug!(
            from_patterns,
            from_dependencies = triples.len() - from_patterns,
            "collected candidate triples"
        );
        triples
    }
}

// ============================================================================
// Tests
// ============================================================================
