use crate::error::{GraphError, GraphResult};
use std::collections::VecDeque;

/// Computes a topological evaluation order over `node_count` nodes given
/// `edges` as `(src, dst)` index pairs (ignoring the output/input path
/// components an [`Edge`](crate::builder::edge::Edge) also carries, since
/// only node-to-node precedence matters for ranking).
///
/// Algorithm: assign every node rank 0, then repeatedly relax
/// `rank[dst] = max(rank[dst], rank[src] + 1)` across every edge until a
/// fixed point is reached (a longest-path-from-roots labeling). Push
/// source nodes are then forced back to rank 0 — they have no upstream
/// producers in this graph, but an earlier relaxation pass may have
/// already given them a higher rank if they're also fed a control edge.
/// Sink nodes (no outgoing edges) are forced to the maximum observed
/// rank, so an isolated or edge-case node that the relaxation left at a
/// low rank still evaluates after everything that could feed it.
///
/// `sink_indices`, when non-empty, names the nodes a caller considers the
/// graph's real outputs. A reverse-BFS from those sinks then decides
/// which nodes actually get ranked at all: anything that can't reach a
/// declared sink is a stub branch (wired but never consumed) and is
/// dropped from the returned order rather than given a rank it would
/// never need. Push sources are always kept regardless of reachability
/// — they ingest external data, and dropping one would silently stop a
/// feed with no in-graph consumer yet. When `sink_indices` is empty,
/// nothing is dropped: every node built without declaring sinks keeps
/// the older, permissive behavior of being ranked and evaluated.
///
/// Returns node indices ordered by `(rank, original index)`, the order
/// `Graph::evaluate_graph` walks each tick so producers are always
/// visited before their consumers.
pub fn rank_nodes(
    node_count: usize,
    edges: &[(usize, usize)],
    push_source_indices: &[usize],
    sink_indices: &[usize],
) -> GraphResult<Vec<usize>> {
    let mut rank = vec![0usize; node_count];
    let mut outgoing = vec![0usize; node_count];
    for &(src, _) in edges {
        outgoing[src] += 1;
    }

    let mut iterations = 0usize;
    loop {
        let mut changed = false;
        for &(src, dst) in edges {
            if rank[dst] <= rank[src] {
                rank[dst] = rank[src] + 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
        iterations += 1;
        if iterations > node_count + 1 {
            return Err(GraphError::CyclicGraph);
        }
    }

    for &i in push_source_indices {
        rank[i] = 0;
    }

    let max_rank = rank.iter().copied().max().unwrap_or(0);
    for i in 0..node_count {
        if outgoing[i] == 0 {
            rank[i] = max_rank;
        }
    }

    let reachable = if sink_indices.is_empty() {
        vec![true; node_count]
    } else {
        reachable_from_sinks(node_count, edges, sink_indices, push_source_indices)
    };

    let mut order: Vec<usize> = (0..node_count).filter(|&i| reachable[i]).collect();
    order.sort_by_key(|&i| (rank[i], i));
    Ok(order)
}

/// Reverse-BFS from `sinks` over `edges`: a node survives only if some
/// forward path connects it to a declared sink, or it's a push source
/// (kept unconditionally; see `rank_nodes`'s doc comment).
fn reachable_from_sinks(node_count: usize, edges: &[(usize, usize)], sinks: &[usize], push_source_indices: &[usize]) -> Vec<bool> {
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for &(src, dst) in edges {
        predecessors[dst].push(src);
    }

    let mut reachable = vec![false; node_count];
    let mut queue = VecDeque::new();
    for &s in sinks {
        if !reachable[s] {
            reachable[s] = true;
            queue.push_back(s);
        }
    }
    while let Some(node) = queue.pop_front() {
        for &pred in &predecessors[node] {
            if !reachable[pred] {
                reachable[pred] = true;
                queue.push_back(pred);
            }
        }
    }
    for &i in push_source_indices {
        reachable[i] = true;
    }
    reachable
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_chain_orders_by_distance_from_root() {
        // 0 -> 1 -> 2
        let order = rank_nodes(3, &[(0, 1), (1, 2)], &[], &[]).unwrap();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn diamond_keeps_both_midpoints_before_the_join() {
        //   0
        //  / \
        // 1   2
        //  \ /
        //   3
        let order = rank_nodes(4, &[(0, 1), (0, 2), (1, 3), (2, 3)], &[], &[]).unwrap();
        assert_eq!(order[0], 0);
        assert_eq!(order[3], 3);
        assert!(order[1..3].contains(&1) && order[1..3].contains(&2));
    }

    #[test]
    fn push_sources_are_pinned_to_rank_zero_even_with_incoming_edges() {
        // node 1 feeds node 0 (a control edge back into a declared push source);
        // 0 must still sort before 1 because it's a push source.
        let order = rank_nodes(2, &[(1, 0)], &[0], &[]);
        let order = order.unwrap();
        assert_eq!(order[0], 0);
    }

    #[test]
    fn cycle_is_rejected() {
        let err = rank_nodes(2, &[(0, 1), (1, 0)], &[], &[]);
        assert!(matches!(err, Err(GraphError::CyclicGraph)));
    }

    #[test]
    fn isolated_node_is_pushed_to_the_end() {
        // 0 -> 1, with node 2 disconnected from everything.
        let order = rank_nodes(3, &[(0, 1)], &[], &[]).unwrap();
        assert_eq!(order.last(), Some(&2));
    }

    #[test]
    fn explicit_sinks_drop_branches_that_never_reach_them() {
        // 0 -> 1, with node 2 a dead branch that feeds nothing declared
        // as a sink. Only node 1 is named a sink, so node 2 never
        // appears in the returned order at all.
        let order = rank_nodes(3, &[(0, 1)], &[], &[1]).unwrap();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn explicit_sinks_still_keep_push_sources_with_no_path_to_a_sink() {
        // node 0 is a push source that feeds nothing; node 1 -> 2 is the
        // only path to the declared sink. 0 survives anyway.
        let order = rank_nodes(3, &[(1, 2)], &[0], &[2]).unwrap();
        assert!(order.contains(&0));
        assert!(order.contains(&1));
        assert!(order.contains(&2));
    }
}
