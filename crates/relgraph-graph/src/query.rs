//! Graph queries
//!
//! A `GraphQuery` bundles the view controls a caller can set. Relation and
//! domain filters select the triples a graph is built from; the graph
//! stages then run in a fixed order: ego expansion, node restriction,
//! degree filter, final cap. Each stage measures the graph the previous
//! stage produced.

use serde::{Deserialize, Serialize};

use crate::KnowledgeGraph;
use relgraph_core::{GraphConfig, Triple};

/// View controls over a knowledge graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphQuery {
    /// Relations to keep; empty keeps every relation
    pub relations: Vec<String>,
    /// Domains to keep; empty keeps every triple, otherwise triples without
    /// a domain are dropped
    pub domains: Vec<String>,
    /// Centre node of an ego network; surrounding whitespace is ignored
    pub focus: Option<String>,
    /// Expansion rounds around `focus` (at least one is always run)
    pub hops: usize,
    /// Explicit node list; empty keeps everything
    pub nodes: Vec<String>,
    /// Minimum total degree; `<= 0` disables the filter
    pub min_degree: i64,
    /// Upper bound on returned nodes
    pub max_nodes: usize,
}

impl Default for GraphQuery {
    fn default() -> Self {
        Self::from_config(&GraphConfig::default())
    }
}

impl GraphQuery {
    /// Query with the configured defaults and no focus
    pub fn from_config(config: &GraphConfig) -> Self {
        Self {
            relations: Vec::new(),
            domains: Vec::new(),
            focus: None,
            hops: config.focus_hops,
            nodes: Vec::new(),
            min_degree: config.min_degree,
            max_nodes: config.max_nodes,
        }
    }

    /// Keep only triples with one of these relations
    pub fn with_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations = relations.into_iter().map(Into::into).collect();
        self
    }

    /// Keep only triples in one of these domains
    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Centre the view on a node
    pub fn with_focus(mut self, focus: impl Into<String>, hops: usize) -> Self {
        self.focus = Some(focus.into());
        self.hops = hops;
        self
    }

    /// Restrict the view to the given nodes
    pub fn with_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_min_degree(mut self, min_degree: i64) -> Self {
        self.min_degree = min_degree;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    /// Triples passing the relation and domain filters, in input order
    pub fn select_triples(&self, triples: &[Triple]) -> Vec<Triple> {
        let selected: Vec<Triple> = triples
            .iter()
            .filter(|t| {
                self.relations.is_empty()
                    || self.relations.iter().any(|r| r.trim() == t.relation.trim())
            })
            .filter(|t| {
                self.domains.is_empty()
                    || t.domain
                        .as_deref()
                        .map(|d| self.domains.iter().any(|want| want.trim() == d.trim()))
                        .unwrap_or(false)
            })
            .cloned()
            .collect();

        tracing::debug!(
            triples = triples.len(),
            selected = selected.len(),
            "applied relation/domain filters"
        );
        selected
    }

    /// Build the graph from the selected triples and derive the view
    pub fn build(&self, triples: &[Triple]) -> KnowledgeGraph {
        let graph = KnowledgeGraph::from_triples(&self.select_triples(triples));
        self.apply(&graph)
    }

    /// Focus node after trimming; blank counts as no focus
    fn focus_name(&self) -> Option<&str> {
        self.focus.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }

    /// Derive the view; `graph` is left untouched
    pub fn apply(&self, graph: &KnowledgeGraph) -> KnowledgeGraph {
        let mut view = match self.focus_name() {
            Some(focus) => graph.ego_subgraph(focus, self.hops, self.max_nodes),
            None => graph.clone(),
        };

        if !self.nodes.is_empty() {
            view = view.restrict_to(&self.nodes);
            tracing::debug!(nodes = view.node_count(), "restricted to node list");
        }

        view = view.degree_filter(self.min_degree);
        tracing::debug!(
            min_degree = self.min_degree,
            nodes = view.node_count(),
            "applied degree filter"
        );

        let view = view.cap_nodes(self.max_nodes);
        tracing::info!(
            focus = self.focus_name().unwrap_or("-"),
            nodes = view.node_count(),
            edges = view.edge_count(),
            "graph query applied"
        );
        view
    }
}
