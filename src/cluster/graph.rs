//! Directed trade-count graph for one token
//!
//! Edge weight buyer -> seller is the number of trades with that ordered pair.
//! Peeling never mutates a graph in place: [`TradeGraph::decayed`] returns the
//! next layer as a fresh snapshot.

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use std::collections::BTreeMap;

use crate::ledger::TraderId;

/// Adjacency snapshot: (buyer, seller) -> trade count
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeGraph {
    edges: BTreeMap<(TraderId, TraderId), u64>,
}

impl TradeGraph {
    /// Count ordered (buyer, seller) pairs
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (TraderId, TraderId)>,
    {
        let mut edges = BTreeMap::new();
        for pair in pairs {
            *edges.entry(pair).or_insert(0) += 1;
        }
        Self { edges }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes are exactly the endpoints of remaining edges
    pub fn node_count(&self) -> usize {
        let mut nodes: Vec<TraderId> = self.edges.keys().flat_map(|&(u, v)| [u, v]).collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes.len()
    }

    pub fn weight(&self, buyer: TraderId, seller: TraderId) -> u64 {
        self.edges.get(&(buyer, seller)).copied().unwrap_or(0)
    }

    pub fn max_weight(&self) -> u64 {
        self.edges.values().copied().max().unwrap_or(0)
    }

    /// Strongly connected components with at least two members.
    ///
    /// Each component is returned sorted; singletons are dropped.
    pub fn cyclic_components(&self) -> Vec<Vec<TraderId>> {
        let graph: DiGraphMap<TraderId, u64> = DiGraphMap::from_edges(
            self.edges
                .iter()
                .map(|(&(buyer, seller), &weight)| (buyer, seller, weight)),
        );

        let mut components: Vec<Vec<TraderId>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| component.len() >= 2)
            .map(|mut component| {
                component.sort_unstable();
                component
            })
            .collect();
        components.sort();
        components
    }

    /// Next layer: every weight minus one, zero-weight edges dropped.
    ///
    /// Nodes left without incident edges disappear with their last edge.
    pub fn decayed(&self) -> TradeGraph {
        let edges = self
            .edges
            .iter()
            .filter(|(_, &weight)| weight > 1)
            .map(|(&pair, &weight)| (pair, weight - 1))
            .collect();
        TradeGraph { edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_ordered_pairs() {
        let graph = TradeGraph::from_pairs([(1, 2), (1, 2), (2, 1), (2, 3)]);

        assert_eq!(graph.weight(1, 2), 2);
        assert_eq!(graph.weight(2, 1), 1);
        assert_eq!(graph.weight(3, 2), 0);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.max_weight(), 2);
    }

    #[test]
    fn test_cyclic_components_drop_singletons() {
        // 1 <-> 2 cycle, 2 -> 3 dangling, 4 -> 5 -> 6 -> 4 cycle
        let graph = TradeGraph::from_pairs([(1, 2), (2, 1), (2, 3), (4, 5), (5, 6), (6, 4)]);

        let components = graph.cyclic_components();
        assert_eq!(components, vec![vec![1, 2], vec![4, 5, 6]]);
    }

    #[test]
    fn test_acyclic_graph_has_no_components() {
        let graph = TradeGraph::from_pairs([(1, 2), (2, 3), (1, 3)]);
        assert!(graph.cyclic_components().is_empty());
    }

    #[test]
    fn test_decay_removes_exhausted_edges_and_nodes() {
        let graph = TradeGraph::from_pairs([(1, 2), (1, 2), (2, 1), (2, 3)]);
        let next = graph.decayed();

        assert_eq!(next.weight(1, 2), 1);
        assert_eq!(next.weight(2, 1), 0);
        assert_eq!(next.node_count(), 2);

        // Original snapshot is untouched
        assert_eq!(graph.weight(2, 1), 1);
        assert!(next.decayed().is_empty());
    }
}
