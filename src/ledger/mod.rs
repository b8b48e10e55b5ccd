//! Trade ledger: canonical schema, ingestion, self-trade filtering and
//! trader id assignment

pub mod ingest;
pub mod self_trades;
pub mod trade;
pub mod traders;

pub use ingest::{load_trades, read_trades, TradeTable};
pub use self_trades::{filter_self_trades, summarize_self_trades, SelfTradeSplit, SelfTradeSummaryRow};
pub use trade::{AmountSide, Trade, TradeRecord, TraderId, WashLabel};
pub use traders::{TraderDirectory, TraderIdRow};
