//! Trader address to integer id assignment

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

use super::trade::{Trade, TradeRecord, TraderId, WashLabel};
use crate::error::{Error, Result};

/// One row of the trader id table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraderIdRow {
    pub trader_address: String,
    pub trader_id: TraderId,
}

/// Bidirectional address <-> id directory. Ids start at 1 and never change.
#[derive(Debug, Clone, Default)]
pub struct TraderDirectory {
    ids: HashMap<String, TraderId>,
    addresses: Vec<String>,
}

impl TraderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every unseen buyer/seller address, in sorted order, with the next ids
    pub fn extend_from(&mut self, records: &[TradeRecord]) -> usize {
        let unseen: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| [r.eth_buyer.as_str(), r.eth_seller.as_str()])
            .filter(|addr| !self.ids.contains_key(*addr))
            .collect();

        let added = unseen.len();
        for address in unseen {
            let id = self.addresses.len() as TraderId + 1;
            self.ids.insert(address.to_string(), id);
            self.addresses.push(address.to_string());
        }
        added
    }

    /// Assign ids to every record and return trades ordered by timestamp
    pub fn assign(&mut self, records: Vec<TradeRecord>) -> Result<Vec<Trade>> {
        let added = self.extend_from(&records);
        info!(
            "Assigned ids to {} new traders ({} total)",
            added,
            self.len()
        );

        let mut trades = records
            .into_iter()
            .map(|record| {
                let eth_buyer_id = self.id_of(&record.eth_buyer)?;
                let eth_seller_id = self.id_of(&record.eth_seller)?;
                Ok(Trade {
                    record,
                    eth_buyer_id,
                    eth_seller_id,
                    label: WashLabel::Unknown,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        trades.sort_by_key(|t| t.timestamp());
        Ok(trades)
    }

    pub fn id_of(&self, address: &str) -> Result<TraderId> {
        self.ids
            .get(address)
            .copied()
            .ok_or_else(|| Error::UnknownTrader(address.to_string()))
    }

    pub fn address_of(&self, id: TraderId) -> Option<&str> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.addresses.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Rows for the trader id table, in id order
    pub fn rows(&self) -> Vec<TraderIdRow> {
        self.addresses
            .iter()
            .enumerate()
            .map(|(i, address)| TraderIdRow {
                trader_address: address.clone(),
                trader_id: i as TraderId + 1,
            })
            .collect()
    }
}
