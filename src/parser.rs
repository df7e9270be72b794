//! Pasted gainers-table parsing.
//!
//! Input is tab-separated text copied out of a spreadsheet or broker page:
//! one header row followed by data rows of
//! `TICKER Company Name \t change% \t current price \t previous close`.
//! Parsing is best-effort: malformed rows are skipped and logged, never
//! fatal. Tickers may start with a digit (3MINDIA, 21STCENMGM).

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::model::{DailySnapshot, StockRecord};

fn change_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\d.]+").expect("valid change pattern"))
}

/// Parse a pasted table into records sorted by change percent descending.
///
/// The first non-empty line is treated as a header and discarded regardless
/// of content. Rows with fewer than 4 tab-separated columns are skipped.
/// Never fails: bad input yields an empty Vec.
pub fn parse_gainers_table(raw: &str) -> Vec<StockRecord> {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut records = Vec::new();
    for line in lines.iter().skip(1) {
        let columns: Vec<&str> = line.split('\t').map(str::trim).collect();
        if columns.len() < 4 {
            warn!(
                component = "parser",
                event = "parser.row.skipped",
                reason = "too_few_columns",
                columns = columns.len(),
                row = *line
            );
            continue;
        }

        let (ticker_symbol, company_name) = split_ticker_and_name(columns[0]);
        records.push(StockRecord {
            ticker_symbol,
            company_name,
            change_percent: parse_change_percent(columns[1]),
            current_price: parse_price(columns[2]),
            previous_close: parse_price(columns[3]),
        });
    }

    records.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent));

    debug!(
        component = "parser",
        event = "parser.table.parsed",
        rows = records.len()
    );
    records
}

/// Parse a table together with its trading date.
pub fn parse_daily_snapshot(raw: &str, date: &str) -> DailySnapshot {
    DailySnapshot {
        date: date.trim().to_string(),
        records: parse_gainers_table(raw),
    }
}

/// Split the company cell into ticker and name.
///
/// The ticker is the leading whitespace-delimited token when it is ASCII
/// alphanumeric with at least one letter, upper-cased regardless of input
/// case. Otherwise the whole cell is the company name and the ticker is
/// empty.
fn split_ticker_and_name(cell: &str) -> (String, String) {
    if let Some((token, rest)) = cell.split_once(char::is_whitespace) {
        let rest = rest.trim();
        if !rest.is_empty()
            && token.bytes().all(|b| b.is_ascii_alphanumeric())
            && token.bytes().any(|b| b.is_ascii_alphabetic())
        {
            return (token.to_ascii_uppercase(), rest.to_string());
        }
    }
    (String::new(), cell.trim().to_string())
}

/// Numeric prefix of the change cell; trailing `%` is optional.
/// Non-finite results (`nan`, `inf`, overflow) default to 0 like any other
/// unparseable cell.
fn parse_change_percent(cell: &str) -> f64 {
    change_re()
        .find(cell)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Price cell with comma thousands-separators stripped. `f64::from_str`
/// accepts `nan`/`inf` literals; those count as unparseable here.
fn parse_price(cell: &str) -> f64 {
    cell.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}
