use derive_more::Display;
use std::fmt;

/// Path from the root graph through any nested subgraphs. The empty
/// sequence denotes the root graph. Each element is `(composite_node_index,
/// key)` where `key` discriminates between inner graphs of a switch/map node
/// (`0` for a graph with a single always-active inner graph, such as a
/// simple feedback wrapper).
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct GraphId(Vec<(usize, u64)>);

impl GraphId {
    pub fn root() -> Self {
        GraphId(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn nested(&self, composite_node_index: usize, key: u64) -> Self {
        let mut path = self.0.clone();
        path.push((composite_node_index, key));
        GraphId(path)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for (node, key) in &self.0 {
            write!(f, "/{node}:{key}")?;
        }
        Ok(())
    }
}

/// A node's identifier: the graph it lives in, plus its ordinal within
/// that graph's node array. Immutable and unique per engine.
#[derive(Clone, Debug, Default, Display, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[display("{graph_id}#{index}")]
pub struct NodeId {
    pub graph_id: GraphId,
    pub index: usize,
}

impl NodeId {
    pub fn new(graph_id: GraphId, index: usize) -> Self {
        Self { graph_id, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_empty() {
        assert!(GraphId::root().is_root());
    }

    #[test]
    fn nested_extends_path() {
        let root = GraphId::root();
        let inner = root.nested(3, 7);
        assert!(!inner.is_root());
        assert_eq!(inner.depth(), 1);
        let deeper = inner.nested(0, 0);
        assert_eq!(deeper.depth(), 2);
    }

    #[test]
    fn node_id_display() {
        let id = NodeId::new(GraphId::root().nested(1, 2), 5);
        assert_eq!(id.to_string(), "/1:2#5");
    }
}
