//! Relation extraction
//!
//! Runs a `RuleSet` over annotated documents and reduces the noisy
//! candidate list to at most `MAX_TRIPLES` facts.

use std::collections::HashMap;
use std::sync::Arc;

use crate::document::AnnotatedDocument;
use crate::rules::RuleSet;
use crate::source::DocumentSource;
use crate::TripleExtractor;
use relgraph_core::{RelgraphError, Result, Triple};

/// Upper bound on triples returned per extraction call
pub const MAX_TRIPLES: usize = 3;

// ============================================================================
// Conflict resolution
// ============================================================================

/// Keep one triple per (subject, relation) and cap the result
///
/// Fields are trimmed and candidates with an empty field are dropped. Among
/// candidates sharing a key the longest object (in characters) wins; an
/// equally long later object does not replace an earlier one. Groups come
/// out in the order their key was first seen.
pub fn resolve_conflicts(candidates: Vec<Triple>, limit: usize) -> Vec<Triple> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut best: HashMap<(String, String), Triple> = HashMap::new();

    for candidate in candidates {
        if !candidate.is_complete() {
            continue;
        }
        let key = (
            candidate.subject.trim().to_string(),
            candidate.relation.trim().to_string(),
        );
        let object = candidate.object.trim();

        let replace = match best.get(&key) {
            Some(current) => object.chars().count() > current.object.chars().count(),
            None => {
                order.push(key.clone());
                true
            }
        };
        if replace {
            let triple = Triple {
                subject: key.0.clone(),
                relation: key.1.clone(),
                object: object.to_string(),
                ..candidate
            };
            best.insert(key, triple);
        }
    }

    order
        .into_iter()
        .take(limit)
        .filter_map(|key| best.remove(&key))
        .collect()
}

// ============================================================================
// Rule-based extractor
// ============================================================================

/// Extractor combining a document source with a rule set
#[derive(Clone)]
pub struct RuleBasedExtractor {
    source: Arc<dyn DocumentSource>,
    rules: Arc<RuleSet>,
}

impl RuleBasedExtractor {
    pub fn new(source: Arc<dyn DocumentSource>, rules: Arc<RuleSet>) -> Self {
        Self { source, rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Name of the underlying document source
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Candidate generation and conflict resolution on a parsed document
    pub fn extract_document(&self, doc: &AnnotatedDocument) -> Vec<Triple> {
        let candidates = self.rules.candidates(doc);
        let found = candidates.len();
        let triples = resolve_conflicts(candidates, MAX_TRIPLES);

        tracing::info!(
            source = self.source_name(),
            tokens = doc.len(),
            candidates = found,
            triples = triples.len(),
            "extracted triples"
        );
        triples
    }

    /// Whether the document source can be used
    pub fn health(&self) -> Result<()> {
        self.source.ready()
    }
}

impl std::fmt::Debug for RuleBasedExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleBasedExtractor")
            .field("source", &self.source_name())
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl TripleExtractor for RuleBasedExtractor {
    fn extract(&self, text: &str) -> Result<Vec<Triple>> {
        if text.trim().is_empty() {
            return Err(RelgraphError::Validation("text is required".to_string()));
        }

        let doc = self.source.annotate(text)?;
        Ok(self.extract_document(&doc))
    }
}

// ============================================================================
// Tests
// ============================================================================
