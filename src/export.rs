//! Client-facing CSV export for both table views. Every field is quoted.

use csv::{QuoteStyle, WriterBuilder};
use thiserror::Error;

use crate::aggregate::ExchangeFilter;
use crate::format::{format_change, format_inr};
use crate::model::{CompanyWithMarketData, OccurrenceGroup};

pub const GROUPED_CSV_HEADERS: [&str; 7] = [
    "Ticker Symbol",
    "Company Name",
    "Latest Price",
    "Average Change %",
    "Category",
    "Occurrence Count",
    "Comments",
];

pub const DATEWISE_CSV_HEADERS: [&str; 8] = [
    "Ticker Symbol",
    "Company Name",
    "Current Price",
    "Previous Close",
    "Change %",
    "Category",
    "Occurrences",
    "Comments",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv write error: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer error: {0}")]
    Buffer(String),
}

pub fn grouped_csv(groups: &[OccurrenceGroup]) -> Result<String, ExportError> {
    let mut writer = always_quoted_writer();
    writer.write_record(GROUPED_CSV_HEADERS)?;
    for group in groups {
        writer.write_record([
            group.ticker_symbol.as_str(),
            group.name.as_str(),
            &format_inr(Some(group.latest_price)),
            &format_change(Some(group.average_change)),
            category_or_na(group.category.as_ref().map(|c| c.name.as_str())),
            &group.occurrence_count.to_string(),
            comment_or_dash(group.comments.as_deref()),
        ])?;
    }
    finish(writer)
}

pub fn datewise_csv(rows: &[CompanyWithMarketData]) -> Result<String, ExportError> {
    let mut writer = always_quoted_writer();
    writer.write_record(DATEWISE_CSV_HEADERS)?;
    for row in rows {
        writer.write_record([
            row.company.ticker_symbol.as_str(),
            row.company.name.as_str(),
            &format_inr(row.market_data.current_price),
            &format_inr(row.market_data.previous_close),
            &format_change(row.market_data.percentage_change),
            category_or_na(row.company.category.as_ref().map(|c| c.name.as_str())),
            &row.occurrence_count.to_string(),
            comment_or_dash(row.company.comments.as_deref()),
        ])?;
    }
    finish(writer)
}

pub fn grouped_export_filename(filter: &ExchangeFilter, threshold: u32) -> String {
    format!(
        "gainers_grouped_{}_threshold{}.csv",
        filter.mode_key(),
        threshold
    )
}

pub fn datewise_export_filename(date: &str, exchange: &str) -> String {
    format!("gainers_datewise_{date}_{exchange}.csv")
}

fn always_quoted_writer() -> csv::Writer<Vec<u8>> {
    WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Buffer(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| ExportError::Buffer(err.to_string()))
}

fn category_or_na(category: Option<&str>) -> &str {
    match category {
        Some(name) if !name.is_empty() => name,
        _ => "N/A",
    }
}

fn comment_or_dash(comment: Option<&str>) -> &str {
    match comment {
        Some(text) if !text.trim().is_empty() => text,
        _ => "-",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Company, Exchange, MarketData};

    fn group(ticker: &str) -> OccurrenceGroup {
        OccurrenceGroup {
            ticker_symbol: ticker.to_string(),
            name: "Reliance Industries Limited".to_string(),
            comments: None,
            exchange: Some(Exchange {
                id: 1,
                code: "NSE".to_string(),
                name: None,
            }),
            category: Some(Category {
                id: 1,
                name: "Good".to_string(),
            }),
            occurrence_count: 3,
            average_change: 5.25,
            latest_price: 2500.50,
            latest_date: Some("2025-11-28".to_string()),
            occurrences: Vec::new(),
        }
    }

    #[test]
    fn grouped_csv_quotes_every_field() {
        let csv = grouped_csv(&[group("RELIANCE")]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "\"Ticker Symbol\",\"Company Name\",\"Latest Price\",\"Average Change %\",\"Category\",\"Occurrence Count\",\"Comments\""
        );
        assert_eq!(
            lines.next().unwrap(),
            "\"RELIANCE\",\"Reliance Industries Limited\",\"₹2,500.50\",\"5.25%\",\"Good\",\"3\",\"-\""
        );
    }

    #[test]
    fn datewise_csv_renders_missing_values_as_na() {
        let row = CompanyWithMarketData {
            company: Company {
                id: 1,
                ticker_symbol: "INFY".to_string(),
                name: "Infosys Limited".to_string(),
                comments: Some("  ".to_string()),
                exchange: None,
                category: None,
            },
            market_data: MarketData {
                company_id: 1,
                record_date: "2025-11-28".to_string(),
                current_price: None,
                previous_close: None,
                percentage_change: None,
            },
            occurrence_count: 1,
        };

        let csv = datewise_csv(&[row]).unwrap();
        let data_line = csv.lines().nth(1).unwrap();
        assert_eq!(
            data_line,
            "\"INFY\",\"Infosys Limited\",\"N/A\",\"N/A\",\"N/A\",\"N/A\",\"1\",\"-\""
        );
    }

    #[test]
    fn export_filenames_carry_mode_and_selection() {
        assert_eq!(
            grouped_export_filename(&ExchangeFilter::All, 2),
            "gainers_grouped_all_threshold2.csv"
        );
        assert_eq!(
            grouped_export_filename(&ExchangeFilter::Only("BSE".to_string()), 1),
            "gainers_grouped_one_threshold1.csv"
        );
        assert_eq!(
            datewise_export_filename("2025-11-28", "NSE"),
            "gainers_datewise_2025-11-28_NSE.csv"
        );
    }
}
