//! Token pattern matcher
//!
//! A pattern is a sequence of constraints, each a single predicate over a
//! token plus a repetition quantifier. Quantifiers are greedy and the
//! matcher backtracks when a greedy choice leaves the rest of the pattern
//! unsatisfiable.
//!
//! Patterns are declared as data (`ConstraintSpec`, spaCy-style keys) and
//! compiled once; every malformed declaration is rejected at compile time.

use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::document::{AnnotatedDocument, Token};
use relgraph_core::{RelgraphError, Result};

// ============================================================================
// Predicates and quantifiers
// ============================================================================

/// A test over one token's attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    LemmaEquals(String),
    LemmaIn(Vec<String>),
    /// Exact surface form
    TextIn(Vec<String>),
    /// Lowercased surface form (values are lowercased at compile time)
    LowerIn(Vec<String>),
    PosIn(Vec<String>),
    EntityIn(Vec<String>),
    NotSpace,
}

impl Predicate {
    pub fn test(&self, token: &Token) -> bool {
        match self {
            Self::LemmaEquals(lemma) => token.lemma == *lemma,
            Self::LemmaIn(lemmas) => lemmas.iter().any(|l| *l == token.lemma),
            Self::TextIn(texts) => texts.iter().any(|t| *t == token.text),
            Self::LowerIn(lowers) => {
                let lower = token.text.to_lowercase();
                lowers.iter().any(|l| *l == lower)
            }
            Self::PosIn(tags) => tags.iter().any(|t| *t == token.pos),
            Self::EntityIn(labels) => token
                .entity_type
                .as_ref()
                .map(|ent| labels.iter().any(|l| l == ent))
                .unwrap_or(false),
            Self::NotSpace => !token.is_space(),
        }
    }
}

/// How many consecutive tokens a constraint consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quantifier {
    #[default]
    One,
    ZeroOrOne,
    OneOrMore,
}

impl std::str::FromStr for Quantifier {
    type Err = RelgraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1" => Ok(Self::One),
            "?" => Ok(Self::ZeroOrOne),
            "+" => Ok(Self::OneOrMore),
            other => Err(RelgraphError::PatternConfig(format!(
                "unsupported quantifier '{other}' (expected '1', '?' or '+')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub predicate: Predicate,
    pub quantifier: Quantifier,
}

impl Constraint {
    pub fn one(predicate: Predicate) -> Self {
        Self {
            predicate,
            quantifier: Quantifier::One,
        }
    }

    pub fn optional(predicate: Predicate) -> Self {
        Self {
            predicate,
            quantifier: Quantifier::ZeroOrOne,
        }
    }

    pub fn one_or_more(predicate: Predicate) -> Self {
        Self {
            predicate,
            quantifier: Quantifier::OneOrMore,
        }
    }
}

// ============================================================================
// Declarative form
// ============================================================================

/// Serialized constraint: exactly one predicate key plus an optional `op`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstraintSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ent_type_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_space: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
}

impl ConstraintSpec {
    /// Compile into a constraint, rejecting zero or several predicate kinds
    pub fn compile(&self) -> Result<Constraint> {
        let mut predicates = Vec::new();

        if let Some(lemma) = &self.lemma {
            if lemma.is_empty() {
                return Err(RelgraphError::PatternConfig("empty lemma".to_string()));
            }
            predicates.push(Predicate::LemmaEquals(lemma.clone()));
        }
        if let Some(values) = &self.lemma_in {
            predicates.push(Predicate::LemmaIn(non_empty("lemma_in", values)?));
        }
        if let Some(values) = &self.text_in {
            predicates.push(Predicate::TextIn(non_empty("text_in", values)?));
        }
        if let Some(values) = &self.lower_in {
            let lowered = values.iter().map(|v| v.to_lowercase()).collect::<Vec<_>>();
            predicates.push(Predicate::LowerIn(non_empty("lower_in", &lowered)?));
        }
        if let Some(values) = &self.pos_in {
            predicates.push(Predicate::PosIn(non_empty("pos_in", values)?));
        }
        if let Some(values) = &self.ent_type_in {
            predicates.push(Predicate::EntityIn(non_empty("ent_type_in", values)?));
        }
        match self.not_space {
            Some(true) => predicates.push(Predicate::NotSpace),
            Some(false) => {
                return Err(RelgraphError::PatternConfig(
                    "not_space = false is not a supported predicate".to_string(),
                ))
            }
            None => {}
        }

        if predicates.len() != 1 {
            return Err(RelgraphError::PatternConfig(format!(
                "a constraint needs exactly one predicate, found {}",
                predicates.len()
            )));
        }

        let quantifier = match &self.op {
            Some(op) => op.parse()?,
            None => Quantifier::One,
        };

        Ok(Constraint {
            predicate: predicates.remove(0),
            quantifier,
        })
    }
}

fn non_empty(key: &str, values: &[String]) -> Result<Vec<String>> {
    if values.is_empty() || values.iter().any(|v| v.is_empty()) {
        return Err(RelgraphError::PatternConfig(format!(
            "{key} needs at least one non-empty value"
        )));
    }
    Ok(values.to_vec())
}

// ============================================================================
// Patterns
// ============================================================================

/// A labelled, compiled constraint sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    label: String,
    constraints: Vec<Constraint>,
}

impl Pattern {
    pub fn new(label: impl Into<String>, constraints: Vec<Constraint>) -> Result<Self> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(RelgraphError::PatternConfig(
                "pattern label must not be empty".to_string(),
            ));
        }
        if constraints.is_empty() {
            return Err(RelgraphError::PatternConfig(format!(
                "pattern '{label}' has no constraints"
            )));
        }
        if constraints
            .iter()
            .all(|c| c.quantifier == Quantifier::ZeroOrOne)
        {
            return Err(RelgraphError::PatternConfig(format!(
                "pattern '{label}' can only match an empty span"
            )));
        }
        Ok(Self { label, constraints })
    }

    /// Compile from its declarative form
    pub fn from_specs(label: impl Into<String>, specs: &[ConstraintSpec]) -> Result<Self> {
        let label = label.into();
        let constraints = specs
            .iter()
            .map(ConstraintSpec::compile)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| match e {
                RelgraphError::PatternConfig(msg) => {
                    RelgraphError::PatternConfig(format!("pattern '{label}': {msg}"))
                }
                other => other,
            })?;
        Self::new(label, constraints)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// End of the match starting at `start`, never reading past `limit`
    pub fn match_at(&self, tokens: &[Token], start: usize, limit: usize) -> Option<usize> {
        let limit = limit.min(tokens.len());
        self.match_from(tokens, 0, start, limit)
            .filter(|&end| end > start)
    }

    fn match_from(&self, tokens: &[Token], ci: usize, pos: usize, limit: usize) -> Option<usize> {
        let Some(constraint) = self.constraints.get(ci) else {
            return Some(pos);
        };
        let accepts = |i: usize| i < limit && constraint.predicate.test(&tokens[i]);

        match constraint.quantifier {
            Quantifier::One => {
                if accepts(pos) {
                    self.match_from(tokens, ci + 1, pos + 1, limit)
                } else {
                    None
                }
            }
            Quantifier::ZeroOrOne => {
                if accepts(pos) {
                    if let Some(end) = self.match_from(tokens, ci + 1, pos + 1, limit) {
                        return Some(end);
                    }
                }
                self.match_from(tokens, ci + 1, pos, limit)
            }
            Quantifier::OneOrMore => {
                let mut run = 0;
                while accepts(pos + run) {
                    run += 1;
                }
                // longest run first, giving tokens back until the rest fits
                (1..=run)
                    .rev()
                    .find_map(|n| self.match_from(tokens, ci + 1, pos + n, limit))
            }
        }
    }
}

/// A located pattern match over `start..end`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Declaration index of the pattern within its set
    pub pattern: usize,
    pub label: String,
    pub start: usize,
    pub end: usize,
}

impl Match {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// An ordered collection of patterns with unique labels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new(patterns: Vec<Pattern>) -> Result<Self> {
        let mut seen = HashSet::new();
        for pattern in &patterns {
            if !seen.insert(pattern.label()) {
                return Err(RelgraphError::PatternConfig(format!(
                    "duplicate pattern label '{}'",
                    pattern.label()
                )));
            }
        }
        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Find matches in document order, then declaration order
    ///
    /// Each pattern reports at most one match per start position, never
    /// crosses a sentence boundary, and skips matches lying inside one of
    /// its own earlier matches.
    pub fn find_matches(&self, doc: &AnnotatedDocument) -> Vec<Match> {
        let tokens = doc.tokens();
        let mut matches = Vec::new();

        for sentence in doc.sentences() {
            let mut reach = vec![sentence.start; self.patterns.len()];

            for start in sentence.clone() {
                for (pi, pattern) in self.patterns.iter().enumerate() {
                    let Some(end) = pattern.match_at(tokens, start, sentence.end) else {
                        continue;
                    };
                    if end <= reach[pi] {
                        continue;
                    }
                    reach[pi] = end;
                    matches.push(Match {
                        pattern: pi,
                        label: pattern.label().to_string(),
                        start,
                        end,
                    });
                }
            }
        }

        tracing::debug!(
            patterns = self.patterns.len(),
            matches = matches.len(),
            "pattern matching finished"
        );
        matches
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(words: &[(&str, &str, &str)]) -> AnnotatedDocument {
        let tokens = words
            .iter()
            .map(|(text, lemma, pos)| Token::new(*text, *lemma, *pos))
            .collect();
        AnnotatedDocument::new(tokens, Vec::new()).unwrap()
    }

    fn lower(values: &[&str]) -> Predicate {
        Predicate::LowerIn(values.iter().map(|v| v.to_string()).collect())
    }

    fn spec_lemma(lemma: &str) -> ConstraintSpec {
        ConstraintSpec {
            lemma: Some(lemma.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_wildcard_gives_back_tokens() {
        // "x x a thing": the wildcard must leave "a" for the next constraint
        let d = doc(&[
            ("x", "x", "X"),
            ("y", "y", "X"),
            ("a", "a", "DET"),
            ("thing", "thing", "NOUN"),
        ]);
        let pattern = Pattern::new(
            "p",
            vec![
                Constraint::one_or_more(Predicate::NotSpace),
                Constraint::one(lower(&["a"])),
                Constraint::one(Predicate::PosIn(vec!["NOUN".to_string()])),
            ],
        )
        .unwrap();

        assert_eq!(pattern.match_at(d.tokens(), 0, d.len()), Some(4));
    }

    #[test]
    fn test_optional_article_is_taken_by_its_own_constraint() {
        let d = doc(&[
            ("Einstein", "Einstein", "PROPN"),
            ("is", "be", "AUX"),
            ("a", "a", "DET"),
            ("physicist", "physicist", "NOUN"),
        ]);
        let pattern = Pattern::new(
            "is_a",
            vec![
                Constraint::one_or_more(Predicate::NotSpace),
                Constraint::one(Predicate::LemmaEquals("be".to_string())),
                Constraint::optional(lower(&["a", "an", "the"])),
                Constraint::one_or_more(Predicate::PosIn(vec!["NOUN".to_string()])),
            ],
        )
        .unwrap();

        // the NOUN+ constraint cannot take "a", so the optional article must
        assert_eq!(pattern.match_at(d.tokens(), 0, d.len()), Some(4));
    }

    #[test]
    fn test_optional_can_be_skipped() {
        let d = doc(&[("is", "be", "AUX"), ("physicist", "physicist", "NOUN")]);
        let pattern = Pattern::new(
            "p",
            vec![
                Constraint::one(Predicate::LemmaEquals("be".to_string())),
                Constraint::optional(lower(&["a"])),
                Constraint::one(Predicate::PosIn(vec!["NOUN".to_string()])),
            ],
        )
        .unwrap();
        assert_eq!(pattern.match_at(d.tokens(), 0, d.len()), Some(2));
    }

    #[test]
    fn test_one_or_more_is_greedy() {
        let d = doc(&[
            ("won", "win", "VERB"),
            ("Nobel", "Nobel", "PROPN"),
            ("Prize", "Prize", "PROPN"),
            ("twice", "twice", "ADV"),
        ]);
        let pattern = Pattern::new(
            "p",
            vec![
                Constraint::one(Predicate::LemmaEquals("win".to_string())),
                Constraint::one_or_more(Predicate::PosIn(vec!["PROPN".to_string()])),
            ],
        )
        .unwrap();
        assert_eq!(pattern.match_at(d.tokens(), 0, d.len()), Some(3));
    }

    #[test]
    fn test_failing_constraint_means_no_match() {
        let d = doc(&[("is", "be", "AUX"), ("tall", "tall", "ADJ")]);
        let pattern = Pattern::new(
            "p",
            vec![
                Constraint::one(Predicate::LemmaEquals("be".to_string())),
                Constraint::one(Predicate::PosIn(vec!["NOUN".to_string()])),
            ],
        )
        .unwrap();
        assert_eq!(pattern.match_at(d.tokens(), 0, d.len()), None);
    }

    #[test]
    fn test_matches_stay_inside_sentences() {
        let tokens = vec![
            Token::new("Curie", "Curie", "PROPN").in_sentence(0),
            Token::new("won", "win", "VERB").in_sentence(1),
        ];
        let d = AnnotatedDocument::new(tokens, Vec::new()).unwrap();
        let set = PatternSet::new(vec![Pattern::new(
            "p",
            vec![
                Constraint::one(Predicate::PosIn(vec!["PROPN".to_string()])),
                Constraint::one(Predicate::LemmaEquals("win".to_string())),
            ],
        )
        .unwrap()])
        .unwrap();

        assert!(set.find_matches(&d).is_empty());
    }

    #[test]
    fn test_matches_ordered_and_contained_suffixes_dropped() {
        let d = doc(&[
            ("Curie", "Curie", "PROPN"),
            ("is", "be", "AUX"),
            ("a", "a", "DET"),
            ("chemist", "chemist", "NOUN"),
        ]);
        let set = PatternSet::new(vec![
            Pattern::new(
                "wild",
                vec![
                    Constraint::one_or_more(Predicate::NotSpace),
                    Constraint::one(Predicate::LemmaEquals("be".to_string())),
                    Constraint::one_or_more(Predicate::NotSpace),
                ],
            )
            .unwrap(),
            Pattern::new(
                "noun",
                vec![Constraint::one(Predicate::PosIn(vec!["NOUN".to_string()]))],
            )
            .unwrap(),
        ])
        .unwrap();

        let matches = set.find_matches(&d);
        let found: Vec<(&str, usize, usize)> = matches
            .iter()
            .map(|m| (m.label.as_str(), m.start, m.end))
            .collect();
        assert_eq!(found, vec![("wild", 0, 4), ("noun", 3, 4)]);
    }

    #[test]
    fn test_entity_predicate() {
        let tokens = vec![
            Token::new("Marie", "Marie", "PROPN"),
            Token::new("Curie", "Curie", "PROPN"),
        ];
        let d = AnnotatedDocument::new(
            tokens,
            vec![crate::document::EntitySpan::new("PERSON", 0, 2)],
        )
        .unwrap();
        let person = Predicate::EntityIn(vec!["PERSON".to_string()]);
        assert!(person.test(&d.tokens()[1]));
        assert!(!Predicate::EntityIn(vec!["GPE".to_string()]).test(&d.tokens()[0]));
    }

    #[test]
    fn test_spec_compiles() {
        let spec = ConstraintSpec {
            lower_in: Some(vec!["The".to_string(), "A".to_string()]),
            op: Some("?".to_string()),
            ..Default::default()
        };
        let constraint = spec.compile().unwrap();
        assert_eq!(constraint.quantifier, Quantifier::ZeroOrOne);
        assert_eq!(constraint.predicate, lower(&["the", "a"]));
    }

    #[test]
    fn test_spec_rejects_malformed() {
        // no predicate
        assert!(ConstraintSpec::default().compile().is_err());

        // two predicates
        let two = ConstraintSpec {
            lemma: Some("be".to_string()),
            pos_in: Some(vec!["AUX".to_string()]),
            ..Default::default()
        };
        assert!(two.compile().is_err());

        // unknown quantifier
        let bad_op = ConstraintSpec {
            op: Some("*".to_string()),
            ..spec_lemma("be")
        };
        assert!(matches!(
            bad_op.compile(),
            Err(RelgraphError::PatternConfig(_))
        ));

        // negation is not supported and must not compile as "exactly one"
        let negated = ConstraintSpec {
            op: Some("!".to_string()),
            ..spec_lemma("be")
        };
        assert!(matches!(
            negated.compile(),
            Err(RelgraphError::PatternConfig(_))
        ));

        // empty value set
        let empty = ConstraintSpec {
            pos_in: Some(Vec::new()),
            ..Default::default()
        };
        assert!(empty.compile().is_err());
    }

    #[test]
    fn test_unknown_predicate_key_is_rejected() {
        let parsed: std::result::Result<ConstraintSpec, _> =
            serde_json::from_str(r#"{"shape": "Xxxx"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_pattern_rejects_empty_and_optional_only() {
        assert!(Pattern::new("p", Vec::new()).is_err());
        assert!(Pattern::new("", vec![Constraint::one(Predicate::NotSpace)]).is_err());
        assert!(Pattern::new("p", vec![Constraint::optional(Predicate::NotSpace)]).is_err());
        assert!(Pattern::from_specs("p", &[]).is_err());
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let p = Pattern::new("p", vec![Constraint::one(Predicate::NotSpace)]).unwrap();
        let err = PatternSet::new(vec![p.clone(), p]).unwrap_err();
        assert!(matches!(err, RelgraphError::PatternConfig(_)));
    }
}
