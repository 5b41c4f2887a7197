//! relgraph Extractor - Rule-based relation extraction
//!
//! Turns annotated documents into subject–relation–object triples:
//! - `document`: tokens, entity spans and the dependency tree
//! - `pattern`: token-level pattern matching
//! - `rules`: declarative rules projecting matches onto triples
//! - `relation`: conflict resolution and the extractor entry point
//! - `source`: producers of annotated documents

use relgraph_core::{Result, Triple};

/// Trait for triple extractors
pub trait TripleExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<Vec<Triple>>;
}

pub mod document;
pub mod pattern;
pub mod relation;
pub mod rules;
pub mod source;

pub use document::{AnnotatedDocument, EntitySpan, Token};
pub use pattern::{Constraint, ConstraintSpec, Match, Pattern, PatternSet, Predicate, Quantifier};
pub use relation::{resolve_conflicts, RuleBasedExtractor, MAX_TRIPLES};
pub use rules::{DependencyRule, Projection, RuleSet, RuleSpec, DEFAULT_RULES};
pub use source::{CommandSource, ConlluSource, DocumentSource, JsonSource, LazySource};
