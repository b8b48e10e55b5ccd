//! Self-trade filtering
//!
//! A trade where buyer and seller are the same address moves nothing and is
//! removed before graph construction. The removed rows are kept for reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use super::trade::TradeRecord;

/// Result of splitting the ledger into self and non-self trades
#[derive(Debug, Clone, Default)]
pub struct SelfTradeSplit {
    pub self_trades: Vec<TradeRecord>,
    pub non_self_trades: Vec<TradeRecord>,
}

/// Per (trader, token) roll-up of self trades
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfTradeSummaryRow {
    pub trader: String,
    pub token: String,
    pub tx_sum_eth: f64,
    pub tx_sum_dollar: f64,
    pub tx_sum_token: f64,
    pub start_date: String,
    pub end_date: String,
    pub tx_count: u64,
}

/// Split off trades whose buyer and seller coincide
pub fn filter_self_trades(records: Vec<TradeRecord>) -> SelfTradeSplit {
    let (self_trades, non_self_trades): (Vec<_>, Vec<_>) =
        records.into_iter().partition(TradeRecord::is_self_trade);

    info!(
        "Filtered {} self-trades. {} non-self-trades remaining.",
        self_trades.len(),
        non_self_trades.len()
    );

    SelfTradeSplit {
        self_trades,
        non_self_trades,
    }
}

#[derive(Default)]
struct Accumulator {
    eth: f64,
    dollar: f64,
    token: f64,
    first: i64,
    last: i64,
    count: u64,
}

/// Summarize self trades per (trader, token), ordered by first trade time
pub fn summarize_self_trades(self_trades: &[TradeRecord]) -> Vec<SelfTradeSummaryRow> {
    let mut groups: BTreeMap<(&str, &str), Accumulator> = BTreeMap::new();

    for trade in self_trades {
        let acc = groups
            .entry((trade.eth_buyer.as_str(), trade.token.as_str()))
            .or_insert_with(|| Accumulator {
                first: trade.timestamp,
                last: trade.timestamp,
                ..Default::default()
            });
        acc.eth += trade.amount_eth;
        acc.dollar += trade.amount_dollar;
        acc.token += trade.amount_token;
        acc.first = acc.first.min(trade.timestamp);
        acc.last = acc.last.max(trade.timestamp);
        acc.count += 1;
    }

    let mut rows: Vec<(i64, SelfTradeSummaryRow)> = groups
        .into_iter()
        .map(|((trader, token), acc)| {
            (
                acc.first,
                SelfTradeSummaryRow {
                    trader: trader.to_string(),
                    token: token.to_string(),
                    tx_sum_eth: acc.eth,
                    tx_sum_dollar: acc.dollar,
                    tx_sum_token: acc.token,
                    start_date: format_date(acc.first),
                    end_date: format_date(acc.last),
                    tx_count: acc.count,
                },
            )
        })
        .collect();

    // Stable: ties keep (trader, token) order
    rows.sort_by_key(|(first, _)| *first);
    rows.into_iter().map(|(_, row)| row).collect()
}

fn format_date(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| secs.to_string())
}
