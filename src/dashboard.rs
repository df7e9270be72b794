//! Gainers dashboard HTTP views: date-wise table, grouped occurrence table,
//! JSON snapshots and CSV export endpoints.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregate::{
    aggregate_over_dates, apply_exchange_filter, sort_companies, sort_groups, DateSortColumn,
    ExchangeFilter, GroupSortColumn, SortDirection,
};
use crate::export::{
    datewise_csv, datewise_export_filename, grouped_csv, grouped_export_filename,
};
use crate::format::{format_change_with_sign, format_date_short, format_inr};
use crate::model::{CompanyWithMarketData, OccurrenceGroup};
use crate::store::MarketDataSource;

pub const DATE_VIEW_HEADERS: [&str; 7] = [
    "Ticker Symbol",
    "Company Name",
    "Current Price",
    "Previous Close",
    "Change %",
    "Category",
    "Occurrences",
];

pub const GROUPED_VIEW_HEADERS: [&str; 6] = [
    "Ticker Symbol",
    "Company Name",
    "Latest Price",
    "Average Change %",
    "Category",
    "Occurrence Count",
];

pub const DEFAULT_EXCHANGE_CODE: &str = "NSE";
pub const DEFAULT_OCCURRENCE_THRESHOLD: u32 = 1;

const DATES_LOAD_ERROR: &str =
    "Unable to load the list of available dates. Please retry in a moment.";
const DATA_LOAD_ERROR: &str = "Failed to load market data. Please retry in a moment.";
const AGGREGATE_ERROR: &str = "Failed to aggregate market data. Please retry in a moment.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateViewQuery {
    pub date: Option<String>,
    pub exchange: Option<String>,
    pub sort: Option<String>,
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdViewQuery {
    pub threshold: Option<u32>,
    pub mode: Option<String>,
    pub exchange: Option<String>,
    pub sort: Option<String>,
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateViewSnapshot {
    pub date: String,
    pub exchange: String,
    pub sort: DateSortColumn,
    pub dir: SortDirection,
    pub available_dates: Vec<String>,
    pub rows: Vec<CompanyWithMarketData>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdViewSnapshot {
    pub threshold: u32,
    pub mode: String,
    pub exchange: String,
    pub sort: GroupSortColumn,
    pub dir: SortDirection,
    pub groups: Vec<OccurrenceGroup>,
    pub error: Option<String>,
}

pub fn gainers_router(source: Arc<dyn MarketDataSource>) -> Router {
    Router::new()
        .route("/gainers/date", get(get_date_html))
        .route("/gainers/date/snapshot", get(get_date_snapshot))
        .route("/gainers/date/export.csv", get(get_date_csv))
        .route("/gainers/threshold", get(get_threshold_html))
        .route("/gainers/threshold/snapshot", get(get_threshold_snapshot))
        .route("/gainers/threshold/export.csv", get(get_threshold_csv))
        .with_state(GainersAppState { source })
}

/// Resolve the date-wise view. Store failures never escape: the snapshot
/// carries empty rows and a user-facing error string instead.
pub fn build_date_view(source: &dyn MarketDataSource, query: &DateViewQuery) -> DateViewSnapshot {
    let filter = date_view_filter(query);
    let (sort, dir) = date_view_sort(query);

    let available_dates = match source.available_dates() {
        Ok(dates) => dates,
        Err(err) => {
            warn!(
                component = "dashboard",
                event = "dashboard.dates.failed",
                error = %err
            );
            return DateViewSnapshot {
                date: query.date.clone().unwrap_or_else(today_utc),
                exchange: filter.label(),
                sort,
                dir,
                available_dates: Vec::new(),
                rows: Vec::new(),
                error: Some(DATES_LOAD_ERROR.to_string()),
            };
        }
    };

    let date = resolve_date(query.date.as_deref(), &available_dates);
    let (rows, error) = match source.market_data_by_date(&date) {
        Ok(response) => {
            let mut rows = apply_exchange_filter(response.companies, &filter);
            sort_companies(&mut rows, sort, dir);
            (rows, None)
        }
        Err(err) => {
            warn!(
                component = "dashboard",
                event = "dashboard.date.failed",
                date = date.as_str(),
                error = %err
            );
            (Vec::new(), Some(DATA_LOAD_ERROR.to_string()))
        }
    };

    DateViewSnapshot {
        date,
        exchange: filter.label(),
        sort,
        dir,
        available_dates,
        rows,
        error,
    }
}

/// Resolve the grouped occurrence view across every stored date.
pub fn build_threshold_view(
    source: &dyn MarketDataSource,
    query: &ThresholdViewQuery,
) -> ThresholdViewSnapshot {
    let threshold = query.threshold.unwrap_or(DEFAULT_OCCURRENCE_THRESHOLD);
    let filter = threshold_view_filter(query);
    let (sort, dir) = threshold_view_sort(query);

    let (groups, error) = match aggregate_over_dates(source, threshold, &filter, |_| {}) {
        Ok(mut groups) => {
            sort_groups(&mut groups, sort, dir);
            (groups, None)
        }
        Err(err) => {
            warn!(
                component = "dashboard",
                event = "dashboard.threshold.failed",
                threshold,
                error = %err
            );
            (Vec::new(), Some(AGGREGATE_ERROR.to_string()))
        }
    };

    ThresholdViewSnapshot {
        threshold,
        mode: filter.mode_key().to_string(),
        exchange: filter.label(),
        sort,
        dir,
        groups,
        error,
    }
}

pub fn render_date_view_html(snapshot: &DateViewSnapshot) -> String {
    let mut out = page_open("Gainers by Date");
    out.push_str("<section class=\"hero\"><h1>Gainers by Date</h1>");
    out.push_str("<div class=\"hero-meta\">");
    out.push_str(&format!(
        "<span>Date: {} ({})</span>",
        escape_html(&snapshot.date),
        escape_html(&format_date_short(&snapshot.date))
    ));
    out.push_str(&format!(
        "<span>Exchange: {}</span>",
        escape_html(&snapshot.exchange)
    ));
    out.push_str(&format!("<span>Rows: {}</span>", snapshot.rows.len()));
    out.push_str("</div></section>\n");
    push_error_banner(&mut out, snapshot.error.as_deref());

    out.push_str(
        "<section class=\"card\"><div class=\"table-wrap\"><table id=\"gainers-date-table\">\n",
    );
    push_header_row(&mut out, &DATE_VIEW_HEADERS);
    for row in &snapshot.rows {
        out.push_str("<tr>");
        push_cell(&mut out, &row.company.ticker_symbol);
        push_cell(&mut out, &row.company.name);
        push_cell(&mut out, &format_inr(row.market_data.current_price));
        push_cell(&mut out, &format_inr(row.market_data.previous_close));
        push_cell(
            &mut out,
            &format_change_with_sign(row.market_data.percentage_change),
        );
        push_cell(&mut out, category_text(row.company.category.as_ref()));
        push_cell(&mut out, &row.occurrence_count.to_string());
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody></table></div></section>");
    out.push_str(&page_close());
    out
}

pub fn render_threshold_view_html(snapshot: &ThresholdViewSnapshot) -> String {
    let mut out = page_open("Repeated Gainers");
    out.push_str("<section class=\"hero\"><h1>Repeated Gainers</h1>");
    out.push_str("<div class=\"hero-meta\">");
    out.push_str(&format!(
        "<span>Minimum occurrences: more than {}</span>",
        snapshot.threshold
    ));
    out.push_str(&format!(
        "<span>Exchange: {}</span>",
        escape_html(&snapshot.exchange)
    ));
    out.push_str(&format!("<span>Groups: {}</span>", snapshot.groups.len()));
    out.push_str("</div></section>\n");
    push_error_banner(&mut out, snapshot.error.as_deref());

    out.push_str(
        "<section class=\"card\"><div class=\"table-wrap\"><table id=\"gainers-threshold-table\">\n",
    );
    push_header_row(&mut out, &GROUPED_VIEW_HEADERS);
    for group in &snapshot.groups {
        out.push_str("<tr>");
        push_cell(&mut out, &group.ticker_symbol);
        push_cell(&mut out, &group.name);
        push_cell(&mut out, &format_inr(Some(group.latest_price)));
        push_cell(
            &mut out,
            &format_change_with_sign(Some(group.average_change)),
        );
        push_cell(&mut out, category_text(group.category.as_ref()));
        push_cell(&mut out, &group.occurrence_count.to_string());
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody></table></div></section>");
    out.push_str(&page_close());
    out
}

#[derive(Clone)]
struct GainersAppState {
    source: Arc<dyn MarketDataSource>,
}

async fn get_date_html(
    State(state): State<GainersAppState>,
    Query(query): Query<DateViewQuery>,
) -> impl IntoResponse {
    let snapshot = build_date_view(state.source.as_ref(), &query);
    Html(render_date_view_html(&snapshot))
}

async fn get_date_snapshot(
    State(state): State<GainersAppState>,
    Query(query): Query<DateViewQuery>,
) -> impl IntoResponse {
    Json(build_date_view(state.source.as_ref(), &query))
}

async fn get_date_csv(
    State(state): State<GainersAppState>,
    Query(query): Query<DateViewQuery>,
) -> impl IntoResponse {
    let filter = date_view_filter(&query);
    let snapshot = build_date_view(state.source.as_ref(), &query);
    let filename = datewise_export_filename(&snapshot.date, &exchange_file_tag(&filter));
    match datewise_csv(&snapshot.rows) {
        Ok(body) => csv_attachment(&filename, body).into_response(),
        Err(err) => csv_failure(err).into_response(),
    }
}

async fn get_threshold_html(
    State(state): State<GainersAppState>,
    Query(query): Query<ThresholdViewQuery>,
) -> impl IntoResponse {
    let snapshot = build_threshold_view(state.source.as_ref(), &query);
    Html(render_threshold_view_html(&snapshot))
}

async fn get_threshold_snapshot(
    State(state): State<GainersAppState>,
    Query(query): Query<ThresholdViewQuery>,
) -> impl IntoResponse {
    Json(build_threshold_view(state.source.as_ref(), &query))
}

async fn get_threshold_csv(
    State(state): State<GainersAppState>,
    Query(query): Query<ThresholdViewQuery>,
) -> impl IntoResponse {
    let filter = threshold_view_filter(&query);
    let snapshot = build_threshold_view(state.source.as_ref(), &query);
    let filename = grouped_export_filename(&filter, snapshot.threshold);
    match grouped_csv(&snapshot.groups) {
        Ok(body) => csv_attachment(&filename, body).into_response(),
        Err(err) => csv_failure(err).into_response(),
    }
}

fn csv_attachment(filename: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
}

fn csv_failure(err: crate::export::ExportError) -> impl IntoResponse {
    warn!(
        component = "dashboard",
        event = "dashboard.export.failed",
        error = %err
    );
    (StatusCode::INTERNAL_SERVER_ERROR, "export failed")
}

fn date_view_filter(query: &DateViewQuery) -> ExchangeFilter {
    match query.exchange.as_deref() {
        None => ExchangeFilter::Only(DEFAULT_EXCHANGE_CODE.to_string()),
        Some("all") => ExchangeFilter::All,
        Some("none") => ExchangeFilter::Unfiltered,
        Some(code) => ExchangeFilter::Only(code.to_string()),
    }
}

fn threshold_view_filter(query: &ThresholdViewQuery) -> ExchangeFilter {
    match query.mode.as_deref().unwrap_or("all") {
        "one" => ExchangeFilter::Only(
            query
                .exchange
                .clone()
                .unwrap_or_else(|| DEFAULT_EXCHANGE_CODE.to_string()),
        ),
        "none" => ExchangeFilter::Unfiltered,
        _ => ExchangeFilter::All,
    }
}

fn date_view_sort(query: &DateViewQuery) -> (DateSortColumn, SortDirection) {
    let column = query
        .sort
        .as_deref()
        .and_then(DateSortColumn::from_key)
        .unwrap_or(DateSortColumn::TickerSymbol);
    let direction = query
        .dir
        .as_deref()
        .and_then(SortDirection::from_key)
        .unwrap_or(column.default_direction());
    (column, direction)
}

fn threshold_view_sort(query: &ThresholdViewQuery) -> (GroupSortColumn, SortDirection) {
    let column = query
        .sort
        .as_deref()
        .and_then(GroupSortColumn::from_key)
        .unwrap_or(GroupSortColumn::OccurrenceCount);
    let direction = query
        .dir
        .as_deref()
        .and_then(SortDirection::from_key)
        .unwrap_or(column.default_direction());
    (column, direction)
}

/// Pick the date to display. Dates sort lexicographically (YYYY-MM-DD), so
/// clamping a future request to the newest stored date is a string compare.
fn resolve_date(requested: Option<&str>, available: &[String]) -> String {
    let newest = available.first().map(String::as_str);
    match (requested, newest) {
        (Some(req), Some(newest)) if req > newest => newest.to_string(),
        (Some(req), _) => req.to_string(),
        (None, Some(newest)) => newest.to_string(),
        (None, None) => today_utc(),
    }
}

fn today_utc() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn exchange_file_tag(filter: &ExchangeFilter) -> String {
    match filter {
        ExchangeFilter::Only(code) => code.clone(),
        other => other.mode_key().to_string(),
    }
}

fn category_text(category: Option<&crate::model::Category>) -> &str {
    category.map(|c| c.name.as_str()).unwrap_or("N/A")
}

fn page_open(title: &str) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    out.push_str("<style>body{margin:0;color:#182026;font-family:\"Segoe UI\",sans-serif;background:#f5f1e7;min-height:100vh}.shell{max-width:1200px;margin:0 auto;padding:24px 18px}.hero{background:#102f3a;color:#f7fbfc;border-radius:12px;padding:16px 20px}.hero h1{margin:0 0 8px;font-size:1.5rem}.hero-meta{display:flex;gap:16px;flex-wrap:wrap;font-size:.9rem;color:#dcebf0}.error-banner{margin-top:12px;background:#fdecea;color:#8c2f26;border:1px solid #f2c6c0;border-radius:10px;padding:10px 14px;font-size:.9rem}.card{margin-top:16px;background:#fff;border:1px solid #cbd4db;border-radius:12px;overflow:hidden}.table-wrap{overflow:auto;max-height:75vh}table{width:100%;border-collapse:collapse;min-width:900px}thead th{position:sticky;top:0;background:#14343f;color:#f2f7f9;font-size:.8rem;text-transform:uppercase;padding:10px;border-bottom:1px solid #0e2730}tbody td{font-size:.85rem;padding:9px 10px;border-bottom:1px solid #d7dce1;white-space:nowrap}tbody tr:nth-child(even){background:#fafcfd}</style>\n");
    out.push_str("</head><body><main class=\"shell\">\n");
    out
}

fn page_close() -> String {
    "</main></body></html>\n".to_string()
}

fn push_error_banner(out: &mut String, error: Option<&str>) {
    if let Some(message) = error {
        out.push_str("<div class=\"error-banner\">");
        out.push_str(&escape_html(message));
        out.push_str("</div>\n");
    }
}

fn push_header_row(out: &mut String, headers: &[&str]) {
    out.push_str("<thead><tr>");
    for header in headers {
        out.push_str("<th>");
        out.push_str(&escape_html(header));
        out.push_str("</th>");
    }
    out.push_str("</tr></thead><tbody>\n");
}

fn push_cell(out: &mut String, value: &str) {
    out.push_str("<td>");
    out.push_str(&escape_html(value));
    out.push_str("</td>");
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
