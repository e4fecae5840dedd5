//! Serializes a wired [`Graph`](crate::graph::Graph)'s topology to JSON, for
//! attaching to a bug report or diffing two builds of the same graph.
//! Deliberately separate from `Debug`: this is a stable, versionable wire
//! format, not a formatting convenience.

use crate::graph::Graph;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct NodeTopology {
    pub index: usize,
    pub id: String,
    pub is_push_source: bool,
    /// `(consumer_index, edge_is_active)` pairs for every edge sourced here.
    pub downstreams: Vec<(usize, bool)>,
}

#[derive(Debug, Serialize)]
pub struct GraphTopology {
    pub graph_id: String,
    pub node_count: usize,
    pub eval_order: Vec<usize>,
    pub push_source_indices: Vec<usize>,
    pub nodes: Vec<NodeTopology>,
}

/// Snapshots everything about `graph`'s shape that doesn't change between
/// ticks: node identities, push-source flags, the active-edge adjacency, and
/// the rank-sorted evaluation order.
pub fn dump_topology(graph: &Graph) -> GraphTopology {
    let nodes = graph
        .all_indices()
        .map(|i| NodeTopology {
            index: i,
            id: graph.node_id(i).to_string(),
            is_push_source: graph.node(i).borrow().is_push_source(),
            downstreams: graph.downstreams(i).to_vec(),
        })
        .collect();

    GraphTopology {
        graph_id: graph.graph_id().to_string(),
        node_count: graph.len(),
        eval_order: graph.eval_order().to_vec(),
        push_source_indices: graph.push_source_indices().to_vec(),
        nodes,
    }
}

impl GraphTopology {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Edge, GraphBuilder, NodeBuilder};
    use crate::ids::GraphId;
    use crate::node::{NodeBehavior, NodeContext};
    use crate::typemeta::TypeMeta;
    use crate::value::{InputHandle, OutputHandle, ScalarInput, ScalarOutput};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Noop;
    impl NodeBehavior for Noop {
        fn eval(&mut self, _ctx: &mut NodeContext) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    fn source_builder() -> NodeBuilder {
        NodeBuilder::new(
            "source",
            None,
            Some(TypeMeta::scalar_of::<i64>()),
            false,
            false,
            || {
                let out: OutputHandle = Rc::new(RefCell::new(ScalarOutput::<i64>::new()));
                (None, Some(out), None)
            },
            || Box::new(Noop),
        )
    }

    fn sink_builder() -> NodeBuilder {
        NodeBuilder::new(
            "sink",
            Some(TypeMeta::scalar_of::<i64>()),
            None,
            false,
            false,
            || {
                let input: InputHandle = Rc::new(RefCell::new(ScalarInput::<i64>::new(false)));
                (Some(input), None, None)
            },
            || Box::new(Noop),
        )
    }

    #[test]
    fn dump_round_trips_through_json() {
        let builder = GraphBuilder::new(vec![source_builder()], vec![]).unwrap();
        let graph = builder.make_instance(GraphId::root()).unwrap();

        let topology = dump_topology(&graph);
        assert_eq!(topology.node_count, 1);
        assert_eq!(topology.eval_order, vec![0]);

        let json = topology.to_json_pretty().unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(reparsed["node_count"], 1);
        assert_eq!(reparsed["nodes"][0]["id"], topology.nodes[0].id);
    }

    #[test]
    fn edge_line_up_shows_in_downstreams() {
        let builder = GraphBuilder::new(
            vec![source_builder(), sink_builder()],
            vec![Edge::direct(0, 1)],
        )
        .unwrap();
        let graph = builder.make_instance(GraphId::root()).unwrap();
        let topology = dump_topology(&graph);
        assert_eq!(topology.nodes[0].downstreams, vec![(1, false)]);
    }
}
