//! Core data model shared by the parser, store and views.

use serde::{Deserialize, Serialize};

/// One parsed gainers row. Immutable once produced by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub ticker_symbol: String,
    pub company_name: String,
    pub change_percent: f64,
    pub current_price: f64,
    pub previous_close: f64,
}

/// All records parsed for a single trading date (YYYY-MM-DD).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: String,
    pub records: Vec<StockRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub id: i64,
    pub code: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub ticker_symbol: String,
    pub name: String,
    pub comments: Option<String>,
    pub exchange: Option<Exchange>,
    pub category: Option<Category>,
}

/// One persisted market-data row for a company on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub company_id: i64,
    pub record_date: String,
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub percentage_change: Option<f64>,
}

/// A company joined with its market-data row for one date, plus the
/// company's occurrence count across all stored dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyWithMarketData {
    pub company: Company,
    pub market_data: MarketData,
    pub occurrence_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataResponse {
    pub date: String,
    pub companies: Vec<CompanyWithMarketData>,
}

/// Derived repeat-occurrence group. Recomputed per aggregation request,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceGroup {
    pub ticker_symbol: String,
    pub name: String,
    pub comments: Option<String>,
    pub exchange: Option<Exchange>,
    pub category: Option<Category>,
    pub occurrence_count: u32,
    pub average_change: f64,
    pub latest_price: f64,
    pub latest_date: Option<String>,
    /// Per-date entries, newest first.
    pub occurrences: Vec<MarketData>,
}
