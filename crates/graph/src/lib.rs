//! In-memory knowledge graph over the ingredient catalog.
//!
//! A typed multi-relational directed graph built from a point-in-time
//! store snapshot. Node kinds: ingredient, branded, supplier, functional
//! category, chemical class. The graph is immutable once built; a
//! rebuild produces a fresh instance that replaces the previous one
//! wholesale (the engine handles the swap).
//!
//! Uses `petgraph` for the structure plus a `HashMap` keyed by
//! `NodeKey` for O(1) node lookups.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use incimatch_model::{CategoryRecord, FeatureVector, StoreSnapshot};
use incimatch_normalize::normalize;

/// The kind of entity a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Ingredient,
    Branded,
    Supplier,
    Func,
    Chem,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingredient => "ingredient",
            Self::Branded => "branded",
            Self::Supplier => "supplier",
            Self::Func => "func",
            Self::Chem => "chem",
        }
    }
}

/// Typed edges between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// ingredient → branded
    Contains,
    /// branded → supplier
    SuppliedBy,
    /// branded → functional category
    HasFunction,
    /// branded → chemical class
    HasClass,
    /// category → child category, within one namespace
    ParentOf,
}

/// Graph-wide node identity: entity kind plus store id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub kind: NodeKind,
    pub id: String,
}

impl NodeKey {
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn ingredient(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Ingredient, id)
    }

    pub fn branded(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Branded, id)
    }

    pub fn supplier(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Supplier, id)
    }
}

/// Payload stored on every node.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub key: NodeKey,
    /// Display name
    pub name: String,
    /// Category tree depth, category nodes only
    pub level: Option<u32>,
    /// Parent category id, category nodes only
    pub parent_id: Option<String>,
}

/// The knowledge graph. Read-only after `build`.
pub struct KnowledgeGraph {
    graph: DiGraph<NodeData, EdgeKind>,
    index: HashMap<NodeKey, NodeIndex>,
    /// normalized ingredient name → ingredient node
    ingredient_names: HashMap<String, NodeKey>,
}

impl KnowledgeGraph {
    /// Build a graph from a store snapshot.
    ///
    /// References to nonexistent ids are skipped, never inserted, so a
    /// partially-cleaned snapshot still yields a usable graph. Category
    /// parent links that would close a cycle are dropped with a warning.
    pub fn build(snapshot: &StoreSnapshot) -> Self {
        let mut kg = Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            ingredient_names: HashMap::new(),
        };

        for record in &snapshot.ingredients {
            let key = NodeKey::ingredient(&record.id);
            let normalized = record
                .inci_name_normalized
                .clone()
                .unwrap_or_else(|| normalize(&record.inci_name));
            if !normalized.is_empty() {
                kg.ingredient_names.entry(normalized).or_insert_with(|| key.clone());
            }
            kg.add_node(NodeData {
                key,
                name: record.inci_name.clone(),
                level: None,
                parent_id: None,
            });
        }

        for record in &snapshot.branded {
            kg.add_node(NodeData {
                key: NodeKey::branded(&record.id),
                name: record.name.clone(),
                level: None,
                parent_id: None,
            });
        }

        for record in &snapshot.suppliers {
            kg.add_node(NodeData {
                key: NodeKey::supplier(&record.id),
                name: record.name.clone(),
                level: None,
                parent_id: None,
            });
        }

        for record in &snapshot.functional_categories {
            kg.add_category_node(NodeKind::Func, record);
        }
        for record in &snapshot.chemical_classes {
            kg.add_category_node(NodeKind::Chem, record);
        }

        for record in &snapshot.branded {
            let branded = NodeKey::branded(&record.id);

            for inci_id in &record.inci_ids {
                kg.add_edge(&NodeKey::ingredient(inci_id), &branded, EdgeKind::Contains);
            }

            if let Some(supplier_id) = &record.supplier_id {
                kg.add_edge(&branded, &NodeKey::supplier(supplier_id), EdgeKind::SuppliedBy);
            }

            for func_id in &record.functional_category_ids {
                kg.add_edge(&branded, &NodeKey::new(NodeKind::Func, func_id), EdgeKind::HasFunction);
            }

            for chem_id in &record.chemical_class_ids {
                kg.add_edge(&branded, &NodeKey::new(NodeKind::Chem, chem_id), EdgeKind::HasClass);
            }
        }

        kg.add_parent_links(NodeKind::Func, &snapshot.functional_categories);
        kg.add_parent_links(NodeKind::Chem, &snapshot.chemical_classes);

        tracing::debug!(
            nodes = kg.node_count(),
            edges = kg.edge_count(),
            "knowledge graph built"
        );

        kg
    }

    fn add_node(&mut self, data: NodeData) {
        let key = data.key.clone();
        if self.index.contains_key(&key) {
            tracing::debug!(kind = key.kind.as_str(), id = %key.id, "duplicate node skipped");
            return;
        }
        let idx = self.graph.add_node(data);
        self.index.insert(key, idx);
    }

    fn add_category_node(&mut self, kind: NodeKind, record: &CategoryRecord) {
        self.add_node(NodeData {
            key: NodeKey::new(kind, &record.id),
            name: record.name.clone(),
            level: record.level,
            parent_id: record.parent_id.clone(),
        });
    }

    /// Add an edge if both endpoints exist; dangling references are dropped.
    fn add_edge(&mut self, from: &NodeKey, to: &NodeKey, kind: EdgeKind) {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => {
                self.graph.add_edge(a, b, kind);
            }
            _ => {
                tracing::debug!(
                    from = %from.id,
                    to = %to.id,
                    edge = ?kind,
                    "dangling reference skipped"
                );
            }
        }
    }

    /// Emit `ParentOf` edges for one category namespace, refusing any
    /// link that would close a cycle in the parent chain.
    fn add_parent_links(&mut self, kind: NodeKind, categories: &[CategoryRecord]) {
        let mut accepted: HashMap<&str, &str> = HashMap::new();

        for record in categories {
            let Some(parent_id) = record.parent_id.as_deref() else {
                continue;
            };
            let child = NodeKey::new(kind, &record.id);
            let parent = NodeKey::new(kind, parent_id);
            if !self.index.contains_key(&parent) || !self.index.contains_key(&child) {
                tracing::debug!(child = %record.id, parent = %parent_id, "dangling parent link skipped");
                continue;
            }
            if closes_cycle(&record.id, parent_id, &accepted) {
                tracing::warn!(
                    kind = kind.as_str(),
                    child = %record.id,
                    parent = %parent_id,
                    "category parent link closes a cycle, dropped"
                );
                continue;
            }
            accepted.insert(&record.id, parent_id);
            self.add_edge(&parent, &child, EdgeKind::ParentOf);
        }
    }

    /// Whether a node exists in the graph.
    pub fn exists(&self, key: &NodeKey) -> bool {
        self.index.contains_key(key)
    }

    /// Node payload, if present.
    pub fn node(&self, key: &NodeKey) -> Option<&NodeData> {
        self.index.get(key).map(|&idx| &self.graph[idx])
    }

    /// Neighbors reached by outgoing edges of the given kind.
    pub fn outgoing(&self, key: &NodeKey, kind: EdgeKind) -> Vec<&NodeData> {
        self.neighbors(key, kind, Direction::Outgoing)
    }

    /// Neighbors reaching this node by edges of the given kind.
    pub fn incoming(&self, key: &NodeKey, kind: EdgeKind) -> Vec<&NodeData> {
        self.neighbors(key, kind, Direction::Incoming)
    }

    fn neighbors(&self, key: &NodeKey, kind: EdgeKind, direction: Direction) -> Vec<&NodeData> {
        let Some(&idx) = self.index.get(key) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, direction)
            .filter(|e| *e.weight() == kind)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                &self.graph[other]
            })
            .collect()
    }

    fn out_degree(&self, key: &NodeKey, kind: EdgeKind) -> usize {
        let Some(&idx) = self.index.get(key) else {
            return 0;
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| *e.weight() == kind)
            .count()
    }

    /// Resolve a normalized ingredient name to its node.
    pub fn ingredient_by_name(&self, normalized: &str) -> Option<&NodeKey> {
        self.ingredient_names.get(normalized)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of edges of one kind.
    pub fn edge_count_of(&self, kind: EdgeKind) -> usize {
        self.graph.edge_weights().filter(|&&w| w == kind).count()
    }

    /// Branded nodes reachable by a single `Contains` hop from any query
    /// ingredient node, deduplicated and sorted by id. Nodes missing
    /// from the graph are ignored.
    pub fn branded_candidates(&self, query_nodes: &[NodeKey]) -> Vec<NodeKey> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for node in query_nodes {
            for neighbor in self.outgoing(node, EdgeKind::Contains) {
                if seen.insert(neighbor.key.clone()) {
                    out.push(neighbor.key.clone());
                }
            }
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Structural features for a (query, branded candidate) pair.
    ///
    /// Always fully populated; a candidate with no edges scores zero on
    /// every component.
    pub fn feature_vector(&self, query_nodes: &[NodeKey], candidate: &NodeKey) -> FeatureVector {
        let constituents: HashSet<&NodeKey> = self
            .incoming(candidate, EdgeKind::Contains)
            .iter()
            .map(|data| &data.key)
            .collect();
        let query_set: HashSet<&NodeKey> = query_nodes.iter().collect();
        let overlap = query_set.intersection(&constituents).count();

        FeatureVector {
            overlap_count: overlap as u32,
            branded_inci_total: constituents.len() as u32,
            supplier_degree: self.out_degree(candidate, EdgeKind::SuppliedBy) as u32,
            func_degree: self.out_degree(candidate, EdgeKind::HasFunction) as u32,
            chem_degree: self.out_degree(candidate, EdgeKind::HasClass) as u32,
        }
    }
}

/// Walk the accepted parent chain upward from `parent`; a link closes a
/// cycle if the chain reaches back to `child` (or to a repeated node).
fn closes_cycle(child: &str, parent: &str, accepted: &HashMap<&str, &str>) -> bool {
    let mut seen = HashSet::new();
    let mut current = parent;
    loop {
        if current == child || !seen.insert(current) {
            return true;
        }
        match accepted.get(current) {
            Some(&next) => current = next,
            None => return false,
        }
    }
}
