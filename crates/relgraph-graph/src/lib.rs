//! relgraph Graph - Knowledge graph construction and querying
//!
//! Builds a directed multigraph from triples and derives bounded views of
//! it: ego networks, degree filters and node caps. Every derived graph is an
//! independent copy that keeps the parent's node order.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use relgraph_core::Triple;

pub mod query;
pub mod view;

pub use query::GraphQuery;
pub use view::{GraphView, ViewEdge, ViewNode};

// ============================================================================
// Node and edge payloads
// ============================================================================

/// Node attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub domain: Option<String>,
}

/// Edge attributes; one edge per supporting triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeData {
    pub relation: String,
    pub country: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub notes: Option<String>,
}

impl EdgeData {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            country: None,
            start_year: None,
            end_year: None,
            notes: None,
        }
    }
}

impl From<&Triple> for EdgeData {
    fn from(triple: &Triple) -> Self {
        Self {
            relation: triple.relation.trim().to_string(),
            country: triple.country.clone(),
            start_year: triple.start_year,
            end_year: triple.end_year,
            notes: triple.notes.clone(),
        }
    }
}

// ============================================================================
// Knowledge graph
// ============================================================================

/// Directed multigraph keyed by node name
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<NodeData, EdgeData>,
    index: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from triples
    ///
    /// Incomplete triples are skipped. A repeated triple adds a parallel
    /// edge; repeated nodes take the attributes of their latest mention.
    pub fn from_triples(triples: &[Triple]) -> Self {
        let mut graph = Self::new();
        let mut skipped = 0;
        for triple in triples {
            if !graph.add_triple(triple) {
                skipped += 1;
            }
        }

        if skipped > 0 {
            tracing::warn!(skipped, "skipped incomplete triples");
        }
        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built knowledge graph"
        );
        graph
    }

    /// Upsert both endpoints and add the edge; false for incomplete triples
    pub fn add_triple(&mut self, triple: &Triple) -> bool {
        if !triple.is_complete() {
            return false;
        }
        let subject = self.upsert_node(
            triple.subject.trim(),
            triple.subject_type.clone(),
            triple.domain.clone(),
        );
        let object = self.upsert_node(
            triple.object.trim(),
            triple.object_type.clone(),
            triple.domain.clone(),
        );
        self.graph.add_edge(subject, object, EdgeData::from(triple));
        true
    }

    /// Insert a node or overwrite its attributes (last write wins)
    pub fn upsert_node(
        &mut self,
        name: &str,
        node_type: Option<String>,
        domain: Option<String>,
    ) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            let node = &mut self.graph[idx];
            node.node_type = node_type;
            node.domain = domain;
            return idx;
        }

        let idx = self.graph.add_node(NodeData {
            name: name.to_string(),
            node_type,
            domain,
        });
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Add an edge between existing nodes; false when either is absent
    pub fn add_edge(&mut self, from: &str, to: &str, edge: EdgeData) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => {
                self.graph.add_edge(a, b, edge);
                true
            }
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Node attributes by name
    pub fn node(&self, name: &str) -> Option<&NodeData> {
        self.index.get(name).map(|&idx| &self.graph[idx])
    }

    /// Total degree (in + out) of a node
    pub fn degree(&self, name: &str) -> Option<usize> {
        self.index.get(name).map(|&idx| self.degree_of(idx))
    }

    fn degree_of(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Outgoing).count()
            + self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    /// Node names in insertion order
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes().map(|n| n.name.as_str()).collect()
    }

    /// Edges in insertion order as (source, target, attributes)
    pub fn edges(&self) -> impl Iterator<Item = (&NodeData, &NodeData, &EdgeData)> {
        self.graph.edge_indices().filter_map(move |e| {
            let (a, b) = self.graph.edge_endpoints(e)?;
            Some((&self.graph[a], &self.graph[b], &self.graph[e]))
        })
    }

    /// Number of edges from `from` to `to`
    pub fn edges_between(&self, from: &str, to: &str) -> usize {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => self.graph.edges_connecting(a, b).count(),
            _ => 0,
        }
    }

    // ------------------------------------------------------------------------
    // Derived graphs
    // ------------------------------------------------------------------------

    /// Ego network of `center`
    ///
    /// Expands breadth-first along edges in both directions for
    /// `max(1, hops)` rounds, then caps the result to `max_nodes` by degree
    /// on the expanded graph. Empty when `center` is absent.
    pub fn ego_subgraph(&self, center: &str, hops: usize, max_nodes: usize) -> Self {
        let Some(&start) = self.index.get(center) else {
            tracing::debug!(center, "ego centre not in graph");
            return Self::new();
        };

        let mut reached = HashSet::from([start]);
        let mut frontier = vec![start];
        for _ in 0..hops.max(1) {
            let mut next = Vec::new();
            for &node in &frontier {
                for neighbor in self.graph.neighbors_undirected(node) {
                    if reached.insert(neighbor) {
                        next.push(neighbor);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let ego = self.induce(&reached);
        tracing::debug!(center, nodes = ego.node_count(), "expanded ego network");
        ego.cap_nodes(max_nodes)
    }

    /// Keep nodes whose total degree is at least `min_degree`
    ///
    /// Degrees are measured on this graph; `min_degree <= 0` keeps all.
    pub fn degree_filter(&self, min_degree: i64) -> Self {
        if min_degree <= 0 {
            return self.clone();
        }
        let keep: HashSet<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| self.degree_of(idx) as i64 >= min_degree)
            .collect();
        self.induce(&keep)
    }

    /// Keep the `max_nodes` highest-degree nodes
    ///
    /// Ties keep the node inserted first.
    pub fn cap_nodes(&self, max_nodes: usize) -> Self {
        if self.node_count() <= max_nodes {
            return self.clone();
        }
        let mut ranked: Vec<(NodeIndex, usize)> = self
            .graph
            .node_indices()
            .map(|idx| (idx, self.degree_of(idx)))
            .collect();
        // stable: equal degrees stay in insertion order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let keep: HashSet<NodeIndex> = ranked
            .into_iter()
            .take(max_nodes)
            .map(|(idx, _)| idx)
            .collect();
        self.induce(&keep)
    }

    /// Induced subgraph on the named nodes; unknown names are ignored
    pub fn restrict_to<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let keep: HashSet<NodeIndex> = names
            .iter()
            .filter_map(|name| self.index.get(name.as_ref()).copied())
            .collect();
        self.induce(&keep)
    }

    /// Copy of the subgraph induced by `keep`, in parent order
    fn induce(&self, keep: &HashSet<NodeIndex>) -> Self {
        let graph = self.graph.filter_map(
            |idx, node| keep.contains(&idx).then(|| node.clone()),
            |_, edge| Some(edge.clone()),
        );
        let index = graph
            .node_indices()
            .map(|idx| (graph[idx].name.clone(), idx))
            .collect();
        Self { graph, index }
    }
}

// ============================================================================
// Tests
// ============================================================================
