//! Content-addressed cluster registry
//!
//! A cluster is identified by a fingerprint of its sorted member ids, so the
//! same member set always maps to the same identity no matter which token or
//! peeling layer produced it. The registry is written concurrently while
//! tokens are decomposed and frozen into a [`ClusterCatalog`] afterwards.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ledger::TraderId;

/// Fingerprint of a sorted member id sequence (lower-case hex SHA-256)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    /// Fingerprint an already sorted member sequence
    pub fn from_members(sorted_members: &[TraderId]) -> Self {
        let joined = sorted_members
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append-only fingerprint -> members map plus recurrence counts
#[derive(Debug, Default)]
pub struct ClusterRegistry {
    members: DashMap<ClusterId, Arc<[TraderId]>>,
    recurrence: DashMap<ClusterId, u64>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one discovery of a cluster and return its identity.
    ///
    /// The first writer defines membership; later writers with the same
    /// fingerprint only bump the recurrence count.
    pub fn register(&self, mut members: Vec<TraderId>) -> ClusterId {
        members.sort_unstable();
        members.dedup();
        let id = ClusterId::from_members(&members);

        self.members
            .entry(id.clone())
            .or_insert_with(|| Arc::from(members));
        *self.recurrence.entry(id.clone()).or_insert(0) += 1;

        id
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn recurrence(&self, id: &ClusterId) -> u64 {
        self.recurrence.get(id).map(|c| *c.value()).unwrap_or(0)
    }

    /// Read-only, ordered snapshot for selection and labeling
    pub fn catalog(&self) -> ClusterCatalog {
        let members = self
            .members
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().to_vec()))
            .collect();
        let recurrence = self
            .recurrence
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        ClusterCatalog {
            members,
            recurrence,
        }
    }
}

/// One row of the cluster table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSummaryRow {
    pub scc_hash: ClusterId,
    pub occurrence: u64,
    pub num_traders: usize,
}

/// One row of the cluster membership table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterMembershipRow {
    pub hash: ClusterId,
    pub trader_id: TraderId,
}

/// Frozen view of every registered cluster, ordered by fingerprint
#[derive(Debug, Clone, Default)]
pub struct ClusterCatalog {
    members: BTreeMap<ClusterId, Vec<TraderId>>,
    recurrence: BTreeMap<ClusterId, u64>,
}

impl ClusterCatalog {
    pub fn members(&self, id: &ClusterId) -> Result<&[TraderId]> {
        self.members
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UnknownCluster(id.to_string()))
    }

    pub fn recurrence(&self, id: &ClusterId) -> u64 {
        self.recurrence.get(id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ClusterId> {
        self.members.keys()
    }

    /// (fingerprint, recurrence count, member count) per cluster
    pub fn summaries(&self) -> Vec<ClusterSummaryRow> {
        self.members
            .iter()
            .map(|(id, members)| ClusterSummaryRow {
                scc_hash: id.clone(),
                occurrence: self.recurrence(id),
                num_traders: members.len(),
            })
            .collect()
    }

    /// One row per (cluster, member)
    pub fn memberships(&self) -> Vec<ClusterMembershipRow> {
        self.members
            .iter()
            .flat_map(|(id, members)| {
                members.iter().map(move |&trader_id| ClusterMembershipRow {
                    hash: id.clone(),
                    trader_id,
                })
            })
            .collect()
    }
}
