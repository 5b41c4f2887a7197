//! Render-ready graph view
//!
//! Flattens a `KnowledgeGraph` into node and edge records carrying the
//! attributes a network renderer needs: colours, sizes, labels and hover
//! titles. Layout and drawing are left to the renderer.

use serde::{Deserialize, Serialize};

use crate::KnowledgeGraph;

/// Colour for nodes matching no palette entry
pub const DEFAULT_COLOR: &str = "#9aa0a6";

const TYPE_COLORS: &[(&str, &str)] = &[
    ("scientist", "#4e79a7"),
    ("person", "#e15759"),
    ("country", "#f28e2b"),
    ("concept", "#59a14f"),
    ("award", "#b07aa1"),
    ("institution", "#76b7b2"),
    ("field", "#9c755f"),
    ("topic", "#edc949"),
    ("discipline", "#af7aa1"),
    ("method", "#8cd17d"),
    ("task", "#59a14f"),
];

const DOMAIN_COLORS: &[(&str, &str)] = &[
    ("politics", "#e15759"),
    ("science", "#4e79a7"),
    ("ai_physics", "#4e79a7"),
    ("ai_medicine", "#59a14f"),
    ("cross_domain", "#9c755f"),
    ("physics", "#4e79a7"),
    ("biology", "#59a14f"),
    ("chemistry", "#b07aa1"),
    ("computer_science", "#76b7b2"),
    ("mathematics", "#af7aa1"),
];

/// Node colour: type palette first, then domain palette, then grey
pub fn color_for(node_type: &str, domain: &str) -> &'static str {
    lookup(TYPE_COLORS, node_type)
        .or_else(|| lookup(DOMAIN_COLORS, domain))
        .unwrap_or(DEFAULT_COLOR)
}

fn lookup(palette: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    let key = key.to_lowercase();
    palette
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, color)| *color)
}

/// Node size grows with degree and saturates at 30
pub fn node_size(degree: usize) -> f64 {
    8.0 + (degree as f64 * 1.5).min(22.0)
}

/// A renderable node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewNode {
    pub id: String,
    pub label: String,
    /// Hover text
    pub title: String,
    pub color: String,
    pub size: f64,
    pub degree: usize,
    #[serde(rename = "type")]
    pub node_type: String,
    pub domain: String,
}

/// A renderable edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEdge {
    pub from: String,
    pub to: String,
    pub label: String,
    /// Hover text
    pub title: String,
    pub country: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub notes: Option<String>,
}

/// Nodes and edges of a graph, ready to hand to a renderer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
}

impl GraphView {
    pub fn from_graph(graph: &KnowledgeGraph) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| {
                let node_type = node.node_type.as_deref().unwrap_or("").to_lowercase();
                let domain = node.domain.as_deref().unwrap_or("").to_lowercase();
                let degree = graph.degree(&node.name).unwrap_or(0);
                ViewNode {
                    id: node.name.clone(),
                    label: node.name.clone(),
                    title: format!("{}<br>type: {node_type}<br>domain: {domain}", node.name),
                    color: color_for(&node_type, &domain).to_string(),
                    size: node_size(degree),
                    degree,
                    node_type,
                    domain,
                }
            })
            .collect();

        let edges = graph
            .edges()
            .map(|(from, to, edge)| {
                let mut title = edge.relation.clone();
                if edge.start_year.is_some() || edge.end_year.is_some() {
                    let year = |y: Option<i32>| y.map(|y| y.to_string()).unwrap_or_default();
                    title.push_str(&format!(
                        " ({}\u{2013}{})",
                        year(edge.start_year),
                        year(edge.end_year)
                    ));
                }
                if let Some(notes) = edge.notes.as_deref().filter(|n| !n.is_empty()) {
                    title.push_str("<br>");
                    title.push_str(notes);
                }
                ViewEdge {
                    from: from.name.clone(),
                    to: to.name.clone(),
                    label: edge.relation.clone(),
                    title,
                    country: edge.country.clone(),
                    start_year: edge.start_year,
                    end_year: edge.end_year,
                    notes: edge.notes.clone(),
                }
            })
            .collect();

        Self { nodes, edges }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
