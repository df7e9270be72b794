//! StockPulse core crate.
//!
//! Tracks daily top-gainer tables pasted from broker sites: parse the raw
//! tab-separated text, persist per-date market data in SQLite, aggregate
//! repeated gainers across dates, and serve dashboard views with CSV export.

mod aggregate;
mod dashboard;
mod export;
mod format;
mod ingest;
mod model;
mod observability;
mod parser;
mod store;

pub use aggregate::{
    aggregate_over_dates, apply_exchange_filter, group_occurrences, sort_companies, sort_groups,
    DateSortColumn, ExchangeFilter, GroupSortColumn, LatestResultCell, SortDirection,
};
pub use dashboard::{
    build_date_view, build_threshold_view, gainers_router, render_date_view_html,
    render_threshold_view_html, DateViewQuery, DateViewSnapshot, ThresholdViewQuery,
    ThresholdViewSnapshot, DATE_VIEW_HEADERS, DEFAULT_EXCHANGE_CODE, DEFAULT_OCCURRENCE_THRESHOLD,
    GROUPED_VIEW_HEADERS,
};
pub use export::{
    datewise_csv, datewise_export_filename, grouped_csv, grouped_export_filename, ExportError,
    DATEWISE_CSV_HEADERS, GROUPED_CSV_HEADERS,
};
pub use format::{format_change, format_change_with_sign, format_date_short, format_inr};
pub use ingest::{save_gainers_table, IngestError, SaveReport, DEFAULT_CATEGORY};
pub use model::{
    Category, Company, CompanyWithMarketData, DailySnapshot, Exchange, MarketData,
    MarketDataResponse, OccurrenceGroup, StockRecord,
};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_store_opened, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use parser::{parse_daily_snapshot, parse_gainers_table};
pub use store::{InMemorySource, MarketDataSource, MarketStore, StoreError};
