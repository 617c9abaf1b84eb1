//! Graph binding and validation
//!
//! Turns a client-submitted [`GraphDefinition`] into an immutable [`Graph`]:
//! every node is bound to its tool up front, and the entry node and edges are
//! checked against the node table so that a stored graph can never point at a
//! node that does not exist.

use crate::error::{Error, Result};
use crate::workflow::{
    registry::{Tool, ToolRegistry},
    types::GraphDefinition,
};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use std::{collections::HashMap, sync::Arc};

/// A graph definition bound to tool operations
///
/// Built once by [`Graph::bind`] and immutable afterwards. Every declared node
/// already holds its tool, so executing a graph never touches the registry and
/// later registrations do not change the behavior of stored graphs.
pub struct Graph {
    definition: GraphDefinition,
    /// Logical node name -> bound tool
    bound: HashMap<String, Arc<dyn Tool>>,
    cyclic: bool,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("definition", &self.definition)
            .field("cyclic", &self.cyclic)
            .finish()
    }
}

impl Graph {
    /// Bind and validate a definition against the tool registry
    ///
    /// Fails with `ToolNotRegistered` when a node names an unknown tool and with
    /// `InvalidGraph` when the entry node or an edge names an unknown node.
    pub fn bind(definition: GraphDefinition, registry: &ToolRegistry) -> Result<Self> {
        if definition.nodes.is_empty() {
            return Err(Error::InvalidGraph("graph has no nodes".to_string()));
        }

        let mut bound = HashMap::with_capacity(definition.nodes.len());
        for (node, tool_name) in &definition.nodes {
            let tool = registry.resolve(tool_name)?;
            tracing::debug!("  ➕ Bound node '{}' to tool '{}'", node, tool_name);
            bound.insert(node.clone(), tool);
        }

        if !definition.nodes.contains_key(&definition.entry_node) {
            return Err(Error::InvalidGraph(format!(
                "entry node '{}' is not a declared node",
                definition.entry_node
            )));
        }

        for (from, to) in &definition.edges {
            if !definition.nodes.contains_key(from) {
                return Err(Error::InvalidGraph(format!(
                    "edge source '{}' is not a declared node",
                    from
                )));
            }
            if !definition.nodes.contains_key(to) {
                return Err(Error::InvalidGraph(format!(
                    "edge '{}' -> '{}' targets an undeclared node",
                    from, to
                )));
            }
        }

        let cyclic = detect_cycle(&definition);
        if cyclic {
            tracing::warn!(
                "🔁 Graph starting at '{}' contains a cycle; termination depends on the done flag and the step limit",
                definition.entry_node
            );
        }

        Ok(Self {
            definition,
            bound,
            cyclic,
        })
    }

    /// Node where every execution of this graph starts
    ///
    /// Guaranteed to be a declared node once binding succeeded.
    pub fn entry_node(&self) -> &str {
        &self.definition.entry_node
    }

    /// Quality threshold declared by the definition
    ///
    /// The engine hands it to tools through the initial state under
    /// `quality_threshold`; it never compares scores against it itself.
    pub fn threshold(&self) -> f64 {
        self.definition.threshold
    }

    /// Tool bound to a logical node name
    pub fn tool(&self, node: &str) -> Option<&Arc<dyn Tool>> {
        self.bound.get(node)
    }

    /// Successor of a node, if it has one
    pub fn next(&self, node: &str) -> Option<&str> {
        self.definition.edges.get(node).map(String::as_str)
    }

    /// Whether some edge leads back to an earlier node
    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }

    /// Number of declared (and bound) nodes
    pub fn node_count(&self) -> usize {
        self.bound.len()
    }
}

/// Build a petgraph view of the edge map and check it for cycles
fn detect_cycle(definition: &GraphDefinition) -> bool {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();

    for node in definition.nodes.keys() {
        index.insert(node.as_str(), graph.add_node(node.as_str()));
    }
    for (from, to) in &definition.edges {
        if let (Some(&a), Some(&b)) = (index.get(from.as_str()), index.get(to.as_str())) {
            graph.add_edge(a, b, ());
        }
    }

    is_cyclic_directed(&graph)
}
