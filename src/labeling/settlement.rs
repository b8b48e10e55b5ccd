//! Backward balance-settlement heuristic for one DetailGroup
//!
//! Trades among a colluding cluster net out: every participant ends where it
//! started. Walking from the most recent trade backwards, the trailing tail is
//! trimmed one trade at a time until the remaining prefix settles, i.e. every
//! participant's net balance is within `margin` times the prefix's mean trade
//! size. That prefix is the wash-traded block.

use std::collections::HashMap;

use crate::ledger::{TraderId, WashLabel};

/// One trade inside a DetailGroup, reduced to the chosen amount leg
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTrade {
    /// Row of this trade in the global trade table
    pub row: usize,
    pub tx_hash: String,
    pub token: String,
    pub timestamp: i64,
    pub buyer: TraderId,
    pub seller: TraderId,
    pub amount: f64,
    pub amount_dollar: f64,
    pub label: WashLabel,
}

/// Settles DetailGroups against a fixed margin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WashTradeLabeler {
    margin: f64,
}

impl WashTradeLabeler {
    pub fn new(margin: f64) -> Self {
        Self { margin }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Length of the longest settled prefix, if any.
    ///
    /// Trades must be in time order. Groups of fewer than two trades never
    /// settle, and a prefix is never shorter than two trades.
    pub fn settled_prefix(&self, trades: &[GroupTrade]) -> Option<usize> {
        let n = trades.len();
        if n <= 1 {
            return None;
        }

        let mut balances: HashMap<TraderId, f64> = HashMap::new();
        let mut prefix_sums = Vec::with_capacity(n + 1);
        prefix_sums.push(0.0);
        for trade in trades {
            *balances.entry(trade.buyer).or_insert(0.0) += trade.amount;
            *balances.entry(trade.seller).or_insert(0.0) -= trade.amount;
            let last = prefix_sums[prefix_sums.len() - 1];
            prefix_sums.push(last + trade.amount);
        }

        for idx in (1..n).rev() {
            let len = idx + 1;
            let mut mean_volume = prefix_sums[len] / len as f64;
            if mean_volume == 0.0 {
                mean_volume = 1.0;
            }

            let settled = balances
                .values()
                .all(|balance| (balance / mean_volume).abs() <= self.margin);
            if settled {
                return Some(len);
            }

            // Drop trade idx from the considered prefix
            let trade = &trades[idx];
            *balances.entry(trade.buyer).or_insert(0.0) -= trade.amount;
            *balances.entry(trade.seller).or_insert(0.0) += trade.amount;
        }

        None
    }

    /// Label the settled prefix as wash; trades after it are left as they are
    pub fn label(&self, trades: &mut [GroupTrade]) -> Option<usize> {
        let settled = self.settled_prefix(trades)?;
        for trade in &mut trades[..settled] {
            trade.label = WashLabel::Wash;
        }
        Some(settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(legs: &[(TraderId, TraderId, f64)]) -> Vec<GroupTrade> {
        legs.iter()
            .enumerate()
            .map(|(i, &(buyer, seller, amount))| GroupTrade {
                row: i,
                tx_hash: format!("t{}", i),
                token: "0xtok".to_string(),
                timestamp: i as i64,
                buyer,
                seller,
                amount,
                amount_dollar: amount * 10.0,
                label: WashLabel::Unknown,
            })
            .collect()
    }

    fn labels(trades: &[GroupTrade]) -> Vec<WashLabel> {
        trades.iter().map(|t| t.label).collect()
    }

    #[test]
    fn test_balanced_group_fully_settles_at_zero_margin() {
        // A buys 1 from B, B buys 2 from A, A buys 1 from B: both net to zero
        let mut trades = group(&[(1, 2, 1.0), (2, 1, 2.0), (1, 2, 1.0)]);

        let settled = WashTradeLabeler::new(0.0).label(&mut trades);

        assert_eq!(settled, Some(3));
        assert!(trades.iter().all(|t| t.label == WashLabel::Wash));
    }

    #[test]
    fn test_imbalanced_tail_is_trimmed() {
        // First two trades cancel out, the third leaves 1 long by 5
        let mut trades = group(&[(1, 2, 1.0), (2, 1, 1.0), (1, 2, 5.0)]);

        let settled = WashTradeLabeler::new(0.1).label(&mut trades);

        assert_eq!(settled, Some(2));
        assert_eq!(
            labels(&trades),
            vec![WashLabel::Wash, WashLabel::Wash, WashLabel::Unknown]
        );
    }

    #[test]
    fn test_never_settling_group_is_unchanged() {
        // One-directional flow never nets out
        let mut trades = group(&[(1, 2, 1.0), (1, 2, 1.0), (1, 2, 1.0)]);

        let settled = WashTradeLabeler::new(0.5).label(&mut trades);

        assert_eq!(settled, None);
        assert!(trades.iter().all(|t| t.label == WashLabel::Unknown));
    }

    #[test]
    fn test_single_trade_is_a_no_op() {
        let mut trades = group(&[(1, 2, 0.0)]);
        assert_eq!(WashTradeLabeler::new(10.0).label(&mut trades), None);
        assert_eq!(trades[0].label, WashLabel::Unknown);

        let mut empty: Vec<GroupTrade> = Vec::new();
        assert_eq!(WashTradeLabeler::new(10.0).label(&mut empty), None);
    }

    #[test]
    fn test_margin_is_relative_to_prefix_mean() {
        // Full group: balances +/-2 over mean 2.0 => 1.0
        // Three trades: balances +/-4 over mean 2.0 => 2.0
        // Two trades: balances 0 => settled
        let trades = group(&[(1, 2, 1.0), (2, 1, 1.0), (2, 1, 4.0), (1, 2, 2.0)]);
        assert_eq!(WashTradeLabeler::new(1.0).settled_prefix(&trades), Some(4));
        assert_eq!(WashTradeLabeler::new(0.99).settled_prefix(&trades), Some(2));
    }

    #[test]
    fn test_zero_volume_uses_unit_mean() {
        let trades = group(&[(1, 2, 0.0), (2, 1, 0.0)]);
        assert_eq!(WashTradeLabeler::new(0.0).settled_prefix(&trades), Some(2));
    }
}
