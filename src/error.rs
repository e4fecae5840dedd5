use crate::ids::NodeId;
use thiserror::Error;

/// Errors surfaced by the core runtime. Wiring and construction variants
/// are returned before a graph ever runs; the rest can surface from
/// `GraphEngine::run`.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("no sink nodes supplied to the graph builder")]
    NoSinkNodes,

    #[error("push source nodes are not supported in this graph")]
    PushSourceNotSupported,

    #[error("edges are not in canonical (src, dst, output_path, input_path) order")]
    EdgesNotCanonical,

    #[error("graph contains a cycle that rank propagation could not resolve")]
    CyclicGraph,

    #[error("invalid path while resolving {what} on node {node:?}: {path:?}")]
    InvalidPath {
        what: &'static str,
        node: NodeId,
        path: Vec<String>,
    },

    #[error("end_time ({end:?}) is before start_time ({start:?})")]
    InvalidTimeRange {
        start: crate::time::EngineTime,
        end: crate::time::EngineTime,
    },

    #[error("error in {phase} lifecycle phase for node {node:?}: {source}")]
    Lifecycle {
        phase: &'static str,
        node: NodeId,
        #[source]
        source: anyhow::Error,
    },

    #[error("error evaluating node {node:?}: {source}")]
    Eval {
        node: NodeId,
        #[source]
        source: anyhow::Error,
    },
}

pub type GraphResult<T> = Result<T, GraphError>;
