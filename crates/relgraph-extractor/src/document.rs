//! Annotated document model
//!
//! A document is the output of a tokenizing/tagging/parsing pipeline:
//! tokens with lemma, part-of-speech, dependency head and label, typed
//! entity spans and sentence boundaries. The extractor only reads it.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use relgraph_core::{RelgraphError, Result};

/// A single annotated token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Position in the document (0-based, reassigned on construction)
    #[serde(default)]
    pub index: usize,

    /// Surface form
    pub text: String,

    pub lemma: String,

    /// Coarse part-of-speech tag (NOUN, PROPN, VERB, ...)
    pub pos: String,

    /// Dependency label towards the head
    #[serde(default)]
    pub dep: String,

    /// Document index of the syntactic head; `None` for sentence roots
    #[serde(default)]
    pub head: Option<usize>,

    /// Label of the entity covering this token, filled from the entity spans
    #[serde(default)]
    pub entity_type: Option<String>,

    /// Sentence index
    #[serde(default)]
    pub sentence: usize,

    /// Whether a space follows this token in the original text
    #[serde(default = "default_space_after")]
    pub space_after: bool,
}

fn default_space_after() -> bool {
    true
}

impl Token {
    /// Create a token with no dependency or entity information
    pub fn new(text: impl Into<String>, lemma: impl Into<String>, pos: impl Into<String>) -> Self {
        Self {
            index: 0,
            text: text.into(),
            lemma: lemma.into(),
            pos: pos.into(),
            dep: String::new(),
            head: None,
            entity_type: None,
            sentence: 0,
            space_after: true,
        }
    }

    /// Set dependency head and label
    pub fn with_dep(mut self, head: Option<usize>, dep: impl Into<String>) -> Self {
        self.head = head;
        self.dep = dep.into();
        self
    }

    /// Set sentence index
    pub fn in_sentence(mut self, sentence: usize) -> Self {
        self.sentence = sentence;
        self
    }

    pub fn is_space(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A typed entity covering tokens `start..end`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub label: String,
    pub start: usize,
    pub end: usize,
}

impl EntitySpan {
    pub fn new(label: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }
}

/// Raw document parts as they arrive from JSON
#[derive(Debug, Deserialize)]
struct DocumentParts {
    tokens: Vec<Token>,
    #[serde(default)]
    entities: Vec<EntitySpan>,
}

/// A validated, linguistically annotated document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DocumentParts")]
pub struct AnnotatedDocument {
    tokens: Vec<Token>,
    entities: Vec<EntitySpan>,
}

impl TryFrom<DocumentParts> for AnnotatedDocument {
    type Error = RelgraphError;

    fn try_from(parts: DocumentParts) -> Result<Self> {
        Self::new(parts.tokens, parts.entities)
    }
}

impl AnnotatedDocument {
    /// Build a document, checking heads and entity spans
    ///
    /// Token indices are renumbered to their positions and every token's
    /// `entity_type` is set from the span covering it.
    pub fn new(mut tokens: Vec<Token>, mut entities: Vec<EntitySpan>) -> Result<Self> {
        let len = tokens.len();

        for (i, token) in tokens.iter_mut().enumerate() {
            token.index = i;
            token.entity_type = None;
            if let Some(head) = token.head {
                if head >= len {
                    return Err(RelgraphError::Parse(format!(
                        "token {i} ({}) has head {head} outside the document",
                        token.text
                    )));
                }
            }
        }

        entities.sort_by_key(|e| (e.start, e.end));
        let mut covered_until = 0;
        for entity in &entities {
            if entity.start >= entity.end || entity.end > len {
                return Err(RelgraphError::Parse(format!(
                    "entity {} has invalid span {}..{}",
                    entity.label, entity.start, entity.end
                )));
            }
            if entity.start < covered_until {
                return Err(RelgraphError::Parse(format!(
                    "entity {} at {}..{} overlaps another entity",
                    entity.label, entity.start, entity.end
                )));
            }
            covered_until = entity.end;
            for token in &mut tokens[entity.start..entity.end] {
                token.entity_type = Some(entity.label.clone());
            }
        }

        Ok(Self { tokens, entities })
    }

    /// Parse the JSON form (`{"tokens": [...], "entities": [...]}`)
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| RelgraphError::Parse(e.to_string()))
    }

    /// Parse CoNLL-U
    ///
    /// Sentences are blank-line separated blocks; comment lines and
    /// multiword/empty-node rows are skipped. Columns may be tab or
    /// whitespace separated. Entities are read from BIO or BILOU tags
    /// (`NER=B-LABEL`, `NER=I-LABEL`, `NER=L-LABEL`, `NER=U-LABEL`, `NER=O`)
    /// in MISC and `SpaceAfter=No` is honored. Heads must point inside
    /// their own sentence.
    pub fn from_conllu(input: &str) -> Result<Self> {
        let mut tokens = Vec::new();
        let mut entities: Vec<EntitySpan> = Vec::new();
        let mut sentence = 0;
        let mut sentence_start = 0;
        let mut open_entity: Option<usize> = None;
        // (line number, 1-based head) of the sentence being read
        let mut heads: Vec<(usize, usize)> = Vec::new();

        for (line_no, raw) in input.lines().enumerate() {
            let line = raw.trim_end();

            if line.trim().is_empty() {
                check_heads(&heads, tokens.len() - sentence_start)?;
                heads.clear();
                if tokens.len() > sentence_start {
                    sentence += 1;
                    sentence_start = tokens.len();
                }
                open_entity = None;
                continue;
            }
            if line.starts_with('#') {
                continue;
            }

            let mut fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 8 {
                fields = line.split_whitespace().collect();
            }
            if fields.len() < 8 {
                return Err(RelgraphError::Parse(format!(
                    "line {}: expected at least 8 columns, found {}",
                    line_no + 1,
                    fields.len()
                )));
            }

            let id = fields[0];
            if id.contains('-') || id.contains('.') {
                continue;
            }
            let local_id: usize = id.parse().map_err(|_| {
                RelgraphError::Parse(format!("line {}: invalid token id {id}", line_no + 1))
            })?;
            if local_id != tokens.len() - sentence_start + 1 {
                return Err(RelgraphError::Parse(format!(
                    "line {}: token id {local_id} out of sequence",
                    line_no + 1
                )));
            }

            let head = match fields[6] {
                "_" | "0" => None,
                value => {
                    let local: usize = value
                        .parse()
                        .ok()
                        .filter(|&local| local > 0)
                        .ok_or_else(|| {
                            RelgraphError::Parse(format!(
                                "line {}: invalid head {value}",
                                line_no + 1
                            ))
                        })?;
                    heads.push((line_no + 1, local));
                    Some(sentence_start + local - 1)
                }
            };

            let text = fields[1].to_string();
            let lemma = match fields[2] {
                "_" if text != "_" => text.to_lowercase(),
                lemma => lemma.to_string(),
            };

            let mut space_after = true;
            let mut ner: Option<&str> = None;
            if let Some(misc) = fields.get(9) {
                for entry in misc.split('|') {
                    match entry.split_once('=') {
                        Some(("SpaceAfter", "No")) => space_after = false,
                        Some(("NER", tag)) => ner = Some(tag),
                        _ => {}
                    }
                }
            }

            let index = tokens.len();
            let tag = match ner {
                None | Some("O") | Some("_") => None,
                Some(tag) => match tag.split_once('-') {
                    Some((prefix @ ("B" | "I" | "L" | "U"), label)) if !label.is_empty() => {
                        Some((prefix, label))
                    }
                    _ => {
                        return Err(RelgraphError::Parse(format!(
                            "line {}: unsupported entity tag {tag}",
                            line_no + 1
                        )))
                    }
                },
            };
            match tag {
                Some((prefix @ ("I" | "L"), label))
                    if open_entity
                        .map(|e| entities[e].label == label && entities[e].end == index)
                        .unwrap_or(false) =>
                {
                    if let Some(e) = open_entity {
                        entities[e].end = index + 1;
                    }
                    if prefix == "L" {
                        open_entity = None;
                    }
                }
                Some((prefix, label)) => {
                    entities.push(EntitySpan::new(label, index, index + 1));
                    open_entity = match prefix {
                        "U" | "L" => None,
                        _ => Some(entities.len() - 1),
                    };
                }
                None => open_entity = None,
            }

            tokens.push(Token {
                index,
                text,
                lemma,
                pos: fields[3].to_string(),
                dep: fields[7].to_string(),
                head,
                entity_type: None,
                sentence,
                space_after,
            });
        }
        check_heads(&heads, tokens.len() - sentence_start)?;

        Self::new(tokens, entities)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn entities(&self) -> &[EntitySpan] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token ranges of consecutive tokens sharing a sentence index
    pub fn sentences(&self) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let mut start = 0;
        for i in 1..=self.tokens.len() {
            if i == self.tokens.len() || self.tokens[i].sentence != self.tokens[start].sentence {
                ranges.push(start..i);
                start = i;
            }
        }
        ranges
    }

    /// Text of a token range, reproducing the original spacing
    pub fn span_text(&self, range: Range<usize>) -> String {
        let mut text = String::new();
        let end = range.end;
        for token in &self.tokens[range] {
            text.push_str(&token.text);
            if token.space_after && token.index + 1 < end {
                text.push(' ');
            }
        }
        text
    }

    /// The entity span covering `index`, if any
    pub fn entity_at(&self, index: usize) -> Option<&EntitySpan> {
        self.entities.iter().find(|e| e.contains(index))
    }

    /// Full text of the entity covering `index`, or the token text alone
    pub fn entity_text(&self, index: usize) -> String {
        match self.entity_at(index) {
            Some(entity) => self.span_text(entity.start..entity.end),
            None => self.tokens[index].text.clone(),
        }
    }

    /// Entities lying completely inside `range`, in document order
    pub fn entities_within(&self, range: Range<usize>) -> impl Iterator<Item = &EntitySpan> {
        self.entities
            .iter()
            .filter(move |e| e.start >= range.start && e.end <= range.end)
    }

    /// Direct dependents of `index`, in document order
    pub fn children(&self, index: usize) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(move |t| t.head == Some(index))
    }

    /// Indices of `index` and all its dependents, in document order
    pub fn subtree(&self, index: usize) -> Vec<usize> {
        (0..self.tokens.len())
            .filter(|&i| self.descends_from(i, index))
            .collect()
    }

    fn descends_from(&self, mut node: usize, ancestor: usize) -> bool {
        // bounded walk so malformed (cyclic) trees terminate
        for _ in 0..=self.tokens.len() {
            if node == ancestor {
                return true;
            }
            match self.tokens[node].head {
                Some(head) => node = head,
                None => return false,
            }
        }
        false
    }

    /// Noun phrase headed by `index`: its subtree joined with spaces, with
    /// the space before commas and periods removed
    pub fn noun_phrase(&self, index: usize) -> String {
        let words: Vec<&str> = self
            .subtree(index)
            .into_iter()
            .map(|i| self.tokens[i].text.as_str())
            .collect();
        words
            .join(" ")
            .replace(" ,", ",")
            .replace(" .", ".")
            .trim()
            .to_string()
    }
}

/// Reject heads pointing past the end of their sentence
fn check_heads(heads: &[(usize, usize)], sentence_len: usize) -> Result<()> {
    match heads.iter().find(|(_, local)| *local > sentence_len) {
        Some((line, local)) => Err(RelgraphError::Parse(format!(
            "line {line}: head {local} outside its sentence of {sentence_len} tokens"
        ))),
        None => Ok(()),
    }
}
