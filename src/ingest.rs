//! Save pipeline: pasted table text into the store.

use thiserror::Error;
use tracing::{info, warn};

use crate::parser::parse_gainers_table;
use crate::store::{MarketStore, StoreError};

/// Category assigned to newly imported companies.
pub const DEFAULT_CATEGORY: &str = "Good";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no parseable rows in input")]
    NoRows,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub rows_saved: usize,
    pub date: String,
    pub exchange_code: String,
}

struct ProgressSteps<'a> {
    current: usize,
    total: usize,
    notify: &'a mut dyn FnMut(u32, &str),
}

impl ProgressSteps<'_> {
    fn advance(&mut self, message: &str) {
        self.current += 1;
        let percent = ((self.current as f64 / self.total as f64) * 100.0).round() as u32;
        (self.notify)(percent.min(100), message);
    }
}

/// Parse `raw` and persist every row for `date` under `exchange_code`.
///
/// Progress is reported as a 0-100 percentage with a message, one tick per
/// step (exchange setup, category setup, then one per row). A store failure
/// aborts the remaining batch; rows already written stay written.
pub fn save_gainers_table(
    store: &MarketStore,
    raw: &str,
    date: &str,
    exchange_code: &str,
    mut progress: impl FnMut(u32, &str),
) -> Result<SaveReport, IngestError> {
    let records = parse_gainers_table(raw);
    if records.is_empty() {
        warn!(
            component = "ingest",
            event = "ingest.save.empty",
            date,
            exchange = exchange_code
        );
        return Err(IngestError::NoRows);
    }

    let mut steps = ProgressSteps {
        current: 0,
        total: records.len() + 2,
        notify: &mut progress,
    };

    info!(
        component = "ingest",
        event = "ingest.save.start",
        date,
        exchange = exchange_code,
        rows = records.len()
    );

    steps.advance("Setting up exchange...");
    let exchange = store.get_or_create_exchange(exchange_code)?;

    steps.advance("Setting up category...");
    let category = store.get_or_create_category(DEFAULT_CATEGORY)?;

    let total_rows = records.len();
    for (index, record) in records.iter().enumerate() {
        steps.advance(&format!(
            "Processing {} ({}/{})...",
            record.ticker_symbol,
            index + 1,
            total_rows
        ));
        let company_id = store.upsert_company(
            &record.ticker_symbol,
            &record.company_name,
            exchange.id,
            category.id,
        )?;
        store.upsert_market_data(
            company_id,
            date,
            record.current_price,
            record.previous_close,
            record.change_percent,
        )?;
    }

    info!(
        component = "ingest",
        event = "ingest.save.finish",
        date,
        exchange = exchange_code,
        rows_saved = total_rows
    );

    Ok(SaveReport {
        rows_saved: total_rows,
        date: date.to_string(),
        exchange_code: exchange_code.to_string(),
    })
}
