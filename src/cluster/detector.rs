//! Layered strongly-connected-component detection per token
//!
//! For each token the trade-count graph is peeled one multiplicity layer at a
//! time: find the cyclic components, register them, decrement every edge,
//! repeat. A cycle repeated k times is rediscovered k times, so the
//! recurrence count measures how much circular trading a cluster carried.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::graph::TradeGraph;
use super::registry::{ClusterId, ClusterRegistry};
use crate::error::{Error, Result};
use crate::ledger::{Trade, TraderId};

/// Bounds on a single token's peeling loop
#[derive(Debug, Clone, Default)]
pub struct PeelLimits {
    /// Stop peeling a token after this many layers
    pub max_iterations: Option<usize>,
    /// Aborts detection between layers
    pub cancel: CancellationToken,
}

/// Outcome of peeling one token's graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDetection {
    pub token: String,
    /// Layers that produced at least one cyclic component
    pub layers: usize,
    /// Every (layer, cluster) discovery in order
    pub discoveries: Vec<ClusterId>,
    /// Peeling stopped at the iteration cap with cycles left
    pub truncated: bool,
    /// Edges of the last layer; zero once the graph peeled away completely
    pub remaining_edges: usize,
}

/// Totals over every token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionReport {
    pub tokens: usize,
    pub discoveries: usize,
    pub unique_clusters: usize,
    pub truncated_tokens: Vec<String>,
}

/// Graph cluster detector writing into a shared registry
#[derive(Debug, Clone)]
pub struct GraphClusterDetector {
    registry: Arc<ClusterRegistry>,
    limits: PeelLimits,
}

impl GraphClusterDetector {
    pub fn new(registry: Arc<ClusterRegistry>, limits: PeelLimits) -> Self {
        Self { registry, limits }
    }

    pub fn registry(&self) -> &Arc<ClusterRegistry> {
        &self.registry
    }

    /// Peel one token's graph until it is empty or acyclic
    pub fn detect_token(&self, token: &str, graph: TradeGraph) -> Result<TokenDetection> {
        let mut detection = TokenDetection {
            token: token.to_string(),
            layers: 0,
            discoveries: Vec::new(),
            truncated: false,
            remaining_edges: 0,
        };

        let mut graph = graph;
        while !graph.is_empty() {
            if self.limits.cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    token: token.to_string(),
                });
            }

            let components = graph.cyclic_components();
            if components.is_empty() {
                break;
            }

            if let Some(max) = self.limits.max_iterations {
                if detection.layers >= max {
                    warn!(
                        token = %token,
                        layers = detection.layers,
                        remaining_edges = graph.edge_count(),
                        "Peeling stopped at iteration cap"
                    );
                    detection.truncated = true;
                    break;
                }
            }

            for members in components {
                detection.discoveries.push(self.registry.register(members));
            }
            detection.layers += 1;

            graph = graph.decayed();
        }
        detection.remaining_edges = graph.edge_count();

        debug!(
            token = %token,
            layers = detection.layers,
            discoveries = detection.discoveries.len(),
            remaining_edges = detection.remaining_edges,
            "Token decomposed"
        );

        Ok(detection)
    }

    /// Decompose every token, `parallelism` tokens at a time on the blocking pool
    pub async fn detect_all(&self, trades: &[Trade], parallelism: usize) -> Result<DetectionReport> {
        let graphs = token_graphs(trades);
        let tokens = graphs.len();
        info!("Detecting clusters for {} tokens", tokens);

        let detections: Vec<TokenDetection> = stream::iter(graphs)
            .map(|(token, graph)| {
                let detector = self.clone();
                async move {
                    match tokio::task::spawn_blocking(move || detector.detect_token(&token, graph)).await {
                        Ok(detection) => detection,
                        Err(e) => Err(Error::Internal(format!("detection task failed: {}", e))),
                    }
                }
            })
            .buffer_unordered(parallelism.max(1))
            .try_collect()
            .await?;

        let report = DetectionReport {
            tokens,
            discoveries: detections.iter().map(|d| d.discoveries.len()).sum(),
            unique_clusters: self.registry.len(),
            truncated_tokens: {
                let mut truncated: Vec<String> = detections
                    .iter()
                    .filter(|d| d.truncated)
                    .map(|d| d.token.clone())
                    .collect();
                truncated.sort();
                truncated
            },
        };

        info!(
            "Found {} cluster discoveries ({} unique clusters) across {} tokens",
            report.discoveries, report.unique_clusters, report.tokens
        );

        Ok(report)
    }
}

/// Build one trade-count graph per token, keyed in token order
pub fn token_graphs(trades: &[Trade]) -> BTreeMap<String, TradeGraph> {
    let mut pairs: BTreeMap<String, Vec<(TraderId, TraderId)>> = BTreeMap::new();
    for trade in trades {
        pairs
            .entry(trade.token().to_string())
            .or_default()
            .push((trade.eth_buyer_id, trade.eth_seller_id));
    }

    pairs
        .into_iter()
        .map(|(token, pairs)| (token, TradeGraph::from_pairs(pairs)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{TradeRecord, WashLabel};

    fn trade(tx: &str, token: &str, buyer: TraderId, seller: TraderId) -> Trade {
        Trade {
            record: TradeRecord {
                tx_hash: tx.to_string(),
                token: token.to_string(),
                timestamp: 0,
                day_start: 0,
                eth_buyer: format!("0x{}", buyer),
                eth_seller: format!("0x{}", seller),
                amount_eth: 1.0,
                amount_token: 1.0,
                amount_dollar: 1.0,
                raw: Vec::new(),
            },
            eth_buyer_id: buyer,
            eth_seller_id: seller,
            label: WashLabel::Unknown,
        }
    }

    fn detector() -> GraphClusterDetector {
        GraphClusterDetector::new(Arc::new(ClusterRegistry::new()), PeelLimits::default())
    }

    #[test]
    fn test_two_cycle_is_found_once_per_layer() {
        let detector = detector();
        let graph = TradeGraph::from_pairs([(1, 2), (1, 2), (2, 1), (2, 1)]);

        let detection = detector.detect_token("0xtok", graph).unwrap();

        let id = ClusterId::from_members(&[1, 2]);
        assert_eq!(detection.layers, 2);
        assert_eq!(detection.discoveries, vec![id.clone(), id.clone()]);
        assert!(!detection.truncated);
        assert_eq!(detection.remaining_edges, 0);
        assert_eq!(detector.registry().recurrence(&id), 2);
        assert_eq!(detector.registry().len(), 1);
    }

    #[test]
    fn test_uneven_cycle_counts_limited_by_weakest_edge() {
        let detector = detector();
        // 1 -> 2 three times, 2 -> 1 once: only one layer is cyclic
        let graph = TradeGraph::from_pairs([(1, 2), (1, 2), (1, 2), (2, 1)]);

        let detection = detector.detect_token("0xtok", graph).unwrap();
        assert_eq!(detection.layers, 1);
        // 1 -> 2 is left over with weight 2 and no way back
        assert_eq!(detection.remaining_edges, 1);
        assert_eq!(
            detector.registry().recurrence(&ClusterId::from_members(&[1, 2])),
            1
        );
    }

    #[test]
    fn test_empty_and_acyclic_graphs_yield_nothing() {
        let detector = detector();

        let empty = detector.detect_token("0xa", TradeGraph::default()).unwrap();
        assert_eq!(empty.layers, 0);

        let acyclic = detector
            .detect_token("0xb", TradeGraph::from_pairs([(1, 2), (2, 3)]))
            .unwrap();
        assert!(acyclic.discoveries.is_empty());
        assert!(detector.registry().is_empty());
    }

    #[test]
    fn test_iteration_cap_truncates() {
        let limits = PeelLimits {
            max_iterations: Some(2),
            cancel: CancellationToken::new(),
        };
        let detector = GraphClusterDetector::new(Arc::new(ClusterRegistry::new()), limits);
        let pairs: Vec<(TraderId, TraderId)> =
            std::iter::repeat([(1, 2), (2, 1)]).take(5).flatten().collect();

        let detection = detector
            .detect_token("0xtok", TradeGraph::from_pairs(pairs))
            .unwrap();
        assert_eq!(detection.layers, 2);
        assert!(detection.truncated);
        assert_eq!(detection.remaining_edges, 2);
    }

    #[test]
    fn test_cancellation_aborts() {
        let limits = PeelLimits::default();
        limits.cancel.cancel();
        let detector = GraphClusterDetector::new(Arc::new(ClusterRegistry::new()), limits);

        let err = detector
            .detect_token("0xtok", TradeGraph::from_pairs([(1, 2), (2, 1)]))
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_same_cycle_on_two_tokens_shares_identity() {
        let detector = detector();
        let trades = vec![
            trade("t1", "0xa", 1, 2),
            trade("t2", "0xa", 2, 1),
            trade("t3", "0xb", 2, 1),
            trade("t4", "0xb", 1, 2),
            trade("t5", "0xb", 3, 1),
        ];

        let report = detector.detect_all(&trades, 2).await.unwrap();

        assert_eq!(report.tokens, 2);
        assert_eq!(report.discoveries, 2);
        assert_eq!(report.unique_clusters, 1);
        assert!(report.truncated_tokens.is_empty());
        assert_eq!(
            detector.registry().recurrence(&ClusterId::from_members(&[1, 2])),
            2
        );
    }
}
