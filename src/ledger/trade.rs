//! Canonical trade schema shared by every pipeline stage

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable integer id of a trader address, assigned once per run
pub type TraderId = u64;

/// Tri-state wash label carried by every trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WashLabel {
    /// Never examined by any labeling pass
    #[default]
    Unknown,
    /// Examined at least once, never settled
    NotWash,
    /// Confirmed wash trade (terminal)
    Wash,
}

impl WashLabel {
    /// Whether a labeling pass may still select this trade
    pub fn is_open(&self) -> bool {
        !matches!(self, WashLabel::Wash)
    }

    pub fn is_wash(&self) -> bool {
        matches!(self, WashLabel::Wash)
    }

    /// Mark as examined. Never downgrades a confirmed wash trade.
    pub fn mark_checked(&mut self) {
        if self.is_open() {
            *self = WashLabel::NotWash;
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WashLabel::Unknown => "unknown",
            WashLabel::NotWash => "not_wash",
            WashLabel::Wash => "wash",
        }
    }
}

impl fmt::Display for WashLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which leg of an ether/token trade feeds the balance heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSide {
    /// Balances in ether; buyer is the ether buyer
    Ether,
    /// Balances in token units; buyer is the token buyer (the ether seller)
    #[default]
    Token,
}

impl fmt::Display for AmountSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountSide::Ether => f.write_str("ether"),
            AmountSide::Token => f.write_str("token"),
        }
    }
}

/// One row of the canonical trade table as produced by ingestion
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TradeRecord {
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    pub token: String,
    #[serde(deserialize_with = "seconds")]
    pub timestamp: i64,
    /// Start of the day bucket the trade falls into
    #[serde(rename = "cut", deserialize_with = "seconds")]
    pub day_start: i64,
    pub eth_buyer: String,
    pub eth_seller: String,
    #[serde(rename = "trade_amount_eth")]
    pub amount_eth: f64,
    #[serde(rename = "trade_amount_token")]
    pub amount_token: f64,
    #[serde(rename = "trade_amount_dollar")]
    pub amount_dollar: f64,
    /// Every input field as read, in `TradeTable::columns` order
    #[serde(skip)]
    pub raw: Vec<String>,
}

impl TradeRecord {
    /// Column names every input table must carry
    pub const REQUIRED_COLUMNS: [&'static str; 9] = [
        "transactionHash",
        "token",
        "timestamp",
        "cut",
        "eth_buyer",
        "eth_seller",
        "trade_amount_eth",
        "trade_amount_token",
        "trade_amount_dollar",
    ];

    pub fn is_self_trade(&self) -> bool {
        self.eth_buyer == self.eth_seller
    }

    /// Field values for the given input columns.
    ///
    /// Rows read from a ledger replay their raw fields untouched. Rows built
    /// in code render the canonical columns and leave any other column empty.
    pub fn input_fields(&self, columns: &[String]) -> Vec<String> {
        if self.raw.len() == columns.len() {
            return self.raw.clone();
        }
        columns.iter().map(|column| self.canonical_field(column)).collect()
    }

    fn canonical_field(&self, column: &str) -> String {
        match column {
            "transactionHash" => self.tx_hash.clone(),
            "token" => self.token.clone(),
            "timestamp" => self.timestamp.to_string(),
            "cut" => self.day_start.to_string(),
            "eth_buyer" => self.eth_buyer.clone(),
            "eth_seller" => self.eth_seller.clone(),
            "trade_amount_eth" => self.amount_eth.to_string(),
            "trade_amount_token" => self.amount_token.to_string(),
            "trade_amount_dollar" => self.amount_dollar.to_string(),
            _ => String::new(),
        }
    }
}

/// Unix seconds, accepting the `1514764800.0` form float-typed exports produce
fn seconds<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Ok(secs);
    }
    match raw.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs.fract() == 0.0 => Ok(secs as i64),
        _ => Err(serde::de::Error::custom(format!(
            "invalid unix timestamp: {:?}",
            raw
        ))),
    }
}

/// A trade with resolved trader ids and its current wash label
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub record: TradeRecord,
    pub eth_buyer_id: TraderId,
    pub eth_seller_id: TraderId,
    pub label: WashLabel,
}

impl Trade {
    pub fn tx_hash(&self) -> &str {
        &self.record.tx_hash
    }

    pub fn token(&self) -> &str {
        &self.record.token
    }

    pub fn timestamp(&self) -> i64 {
        self.record.timestamp
    }

    pub fn amount_dollar(&self) -> f64 {
        self.record.amount_dollar
    }

    /// Buyer, seller and amount for the balance heuristic on the given leg
    pub fn leg(&self, side: AmountSide) -> (TraderId, TraderId, f64) {
        match side {
            AmountSide::Ether => (self.eth_buyer_id, self.eth_seller_id, self.record.amount_eth),
            AmountSide::Token => (
                self.eth_seller_id,
                self.eth_buyer_id,
                self.record.amount_token,
            ),
        }
    }

    /// Both parties are members of the given cluster
    pub fn within(&self, members: &std::collections::HashSet<TraderId>) -> bool {
        members.contains(&self.eth_buyer_id) && members.contains(&self.eth_seller_id)
    }
}

impl Trade {
    /// Columns appended to the input columns in the labeled table
    pub const LABEL_COLUMNS: [&'static str; 3] = ["eth_buyer_id", "eth_seller_id", "wash_label"];

    /// Labeled table row: every input field, then ids and the wash label
    pub fn labeled_fields(&self, columns: &[String]) -> Vec<String> {
        let mut fields = self.record.input_fields(columns);
        fields.push(self.eth_buyer_id.to_string());
        fields.push(self.eth_seller_id.to_string());
        fields.push(self.label.to_string());
        fields
    }
}
