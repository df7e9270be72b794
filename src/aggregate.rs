//! Repeat-occurrence aggregation over stored dates.
//!
//! Dates are fetched sequentially (no parallel fan-out); progress is
//! reported as a coarse percentage after each date completes. Requests are
//! not cancelled: a newer request supersedes an older one through the
//! [`LatestResultCell`] ticket guard and the stale result is dropped.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{self, AtomicU64};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{CompanyWithMarketData, MarketData, OccurrenceGroup};
use crate::store::{MarketDataSource, StoreError};

/// Exchange scoping for aggregated views.
///
/// `All` and `Unfiltered` both keep every row; they are distinct modes in
/// the UI (and in export filenames) but not in behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeFilter {
    All,
    Only(String),
    Unfiltered,
}

impl ExchangeFilter {
    pub fn mode_key(&self) -> &'static str {
        match self {
            ExchangeFilter::All => "all",
            ExchangeFilter::Only(_) => "one",
            ExchangeFilter::Unfiltered => "none",
        }
    }

    pub fn label(&self) -> String {
        match self {
            ExchangeFilter::All => "All Exchanges".to_string(),
            ExchangeFilter::Only(code) => code.clone(),
            ExchangeFilter::Unfiltered => "No Exchange Filter".to_string(),
        }
    }

    fn keeps(&self, row: &CompanyWithMarketData) -> bool {
        match self {
            ExchangeFilter::Only(code) => row
                .company
                .exchange
                .as_ref()
                .is_some_and(|exchange| exchange.code == *code),
            ExchangeFilter::All | ExchangeFilter::Unfiltered => true,
        }
    }
}

pub fn apply_exchange_filter(
    rows: Vec<CompanyWithMarketData>,
    filter: &ExchangeFilter,
) -> Vec<CompanyWithMarketData> {
    rows.into_iter().filter(|row| filter.keeps(row)).collect()
}

/// Group rows by exact ticker symbol and keep groups appearing on strictly
/// more than `threshold` dates. Rows with an empty ticker are dropped.
/// Group order follows first appearance in the input.
pub fn group_occurrences(
    rows: &[CompanyWithMarketData],
    threshold: u32,
) -> Vec<OccurrenceGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut by_ticker: HashMap<String, (CompanyWithMarketData, Vec<MarketData>)> = HashMap::new();

    for row in rows {
        let key = &row.company.ticker_symbol;
        if key.is_empty() {
            continue;
        }
        let entry = by_ticker.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            (row.clone(), Vec::new())
        });
        entry.1.push(row.market_data.clone());
    }

    let mut groups = Vec::new();
    for ticker in order {
        let (row, occurrences) = by_ticker
            .remove(&ticker)
            .expect("ordered ticker must exist in map");
        let occurrence_count = occurrences.len() as u32;
        if occurrence_count <= threshold {
            continue;
        }

        let total_change: f64 = occurrences
            .iter()
            .map(|data| data.percentage_change.unwrap_or(0.0))
            .sum();
        let average_change = total_change / occurrences.len() as f64;

        // Newest first; the sort is stable so same-date entries keep input
        // order and the first one wins the latest-price slot.
        let mut sorted = occurrences;
        sorted.sort_by(|a, b| b.record_date.cmp(&a.record_date));
        let latest_price = sorted
            .first()
            .and_then(|data| data.current_price)
            .unwrap_or(0.0);
        let latest_date = sorted.first().map(|data| data.record_date.clone());

        groups.push(OccurrenceGroup {
            ticker_symbol: row.company.ticker_symbol,
            name: row.company.name,
            comments: row.company.comments,
            exchange: row.company.exchange,
            category: row.company.category,
            occurrence_count,
            average_change,
            latest_price,
            latest_date,
            occurrences: sorted,
        });
    }

    groups
}

/// Fetch every available date sequentially, pool the filtered rows and
/// group them. `progress` receives a 0-100 percentage after each date.
pub fn aggregate_over_dates<S: MarketDataSource + ?Sized>(
    source: &S,
    threshold: u32,
    filter: &ExchangeFilter,
    mut progress: impl FnMut(u32),
) -> Result<Vec<OccurrenceGroup>, StoreError> {
    let dates = source.available_dates()?;
    if dates.is_empty() {
        return Ok(Vec::new());
    }

    let total = dates.len();
    let mut pooled = Vec::new();
    for (index, date) in dates.iter().enumerate() {
        let response = source.market_data_by_date(date)?;
        let percent = (((index + 1) as f64 / total as f64) * 100.0).round() as u32;
        progress(percent);
        debug!(
            component = "aggregate",
            event = "aggregate.date.loaded",
            date = date.as_str(),
            rows = response.companies.len(),
            percent
        );
        if response.companies.is_empty() {
            continue;
        }
        pooled.extend(apply_exchange_filter(response.companies, filter));
    }

    let groups = group_occurrences(&pooled, threshold);
    info!(
        component = "aggregate",
        event = "aggregate.finish",
        dates = total,
        threshold,
        mode = filter.mode_key(),
        groups = groups.len()
    );
    Ok(groups)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Sortable columns of the grouped (threshold) view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupSortColumn {
    TickerSymbol,
    Name,
    LatestPrice,
    AverageChange,
    Category,
    OccurrenceCount,
}

impl GroupSortColumn {
    /// Alphabetic columns default ascending, numeric columns descending.
    pub fn default_direction(self) -> SortDirection {
        match self {
            GroupSortColumn::TickerSymbol | GroupSortColumn::Name | GroupSortColumn::Category => {
                SortDirection::Asc
            }
            GroupSortColumn::LatestPrice
            | GroupSortColumn::AverageChange
            | GroupSortColumn::OccurrenceCount => SortDirection::Desc,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ticker_symbol" => Some(GroupSortColumn::TickerSymbol),
            "name" => Some(GroupSortColumn::Name),
            "latest_price" | "current_price" => Some(GroupSortColumn::LatestPrice),
            "average_change" => Some(GroupSortColumn::AverageChange),
            "category" => Some(GroupSortColumn::Category),
            "occurrence_count" => Some(GroupSortColumn::OccurrenceCount),
            _ => None,
        }
    }
}

/// Sortable columns of the date-wise view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSortColumn {
    TickerSymbol,
    Name,
    CurrentPrice,
    PreviousClose,
    PercentageChange,
    Category,
    OccurrenceCount,
}

impl DateSortColumn {
    pub fn default_direction(self) -> SortDirection {
        match self {
            DateSortColumn::TickerSymbol | DateSortColumn::Name | DateSortColumn::Category => {
                SortDirection::Asc
            }
            DateSortColumn::CurrentPrice
            | DateSortColumn::PreviousClose
            | DateSortColumn::PercentageChange
            | DateSortColumn::OccurrenceCount => SortDirection::Desc,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ticker_symbol" => Some(DateSortColumn::TickerSymbol),
            "name" => Some(DateSortColumn::Name),
            "current_price" => Some(DateSortColumn::CurrentPrice),
            "previous_close" => Some(DateSortColumn::PreviousClose),
            "percentage_change" => Some(DateSortColumn::PercentageChange),
            "category" => Some(DateSortColumn::Category),
            "occurrence_count" => Some(DateSortColumn::OccurrenceCount),
            _ => None,
        }
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn category_name(category: &Option<crate::model::Category>) -> &str {
    category.as_ref().map(|c| c.name.as_str()).unwrap_or("")
}

pub fn sort_groups(
    groups: &mut [OccurrenceGroup],
    column: GroupSortColumn,
    direction: SortDirection,
) {
    groups.sort_by(|a, b| {
        let primary = match column {
            GroupSortColumn::TickerSymbol => a.ticker_symbol.cmp(&b.ticker_symbol),
            GroupSortColumn::Name => a.name.cmp(&b.name),
            GroupSortColumn::LatestPrice => a.latest_price.total_cmp(&b.latest_price),
            GroupSortColumn::AverageChange => a.average_change.total_cmp(&b.average_change),
            GroupSortColumn::Category => category_name(&a.category).cmp(category_name(&b.category)),
            GroupSortColumn::OccurrenceCount => a.occurrence_count.cmp(&b.occurrence_count),
        };
        let ordered = directed(primary, direction);
        // Equal occurrence counts fall back to change percent, biggest first.
        if ordered == Ordering::Equal && column == GroupSortColumn::OccurrenceCount {
            b.average_change.total_cmp(&a.average_change)
        } else {
            ordered
        }
    });
}

pub fn sort_companies(
    rows: &mut [CompanyWithMarketData],
    column: DateSortColumn,
    direction: SortDirection,
) {
    rows.sort_by(|a, b| {
        let primary = match column {
            DateSortColumn::TickerSymbol => {
                a.company.ticker_symbol.cmp(&b.company.ticker_symbol)
            }
            DateSortColumn::Name => a.company.name.cmp(&b.company.name),
            DateSortColumn::CurrentPrice => a
                .market_data
                .current_price
                .unwrap_or(0.0)
                .total_cmp(&b.market_data.current_price.unwrap_or(0.0)),
            DateSortColumn::PreviousClose => a
                .market_data
                .previous_close
                .unwrap_or(0.0)
                .total_cmp(&b.market_data.previous_close.unwrap_or(0.0)),
            DateSortColumn::PercentageChange => a
                .market_data
                .percentage_change
                .unwrap_or(0.0)
                .total_cmp(&b.market_data.percentage_change.unwrap_or(0.0)),
            DateSortColumn::Category => {
                category_name(&a.company.category).cmp(category_name(&b.company.category))
            }
            DateSortColumn::OccurrenceCount => a.occurrence_count.cmp(&b.occurrence_count),
        };
        directed(primary, direction)
    });
}

/// Last-writer-wins result slot with a monotonically increasing request id.
///
/// Every aggregation request takes a ticket; only the newest outstanding
/// ticket may apply its result. There is no in-flight cancellation, stale
/// results are simply dropped.
pub struct LatestResultCell<T> {
    newest_ticket: AtomicU64,
    applied: Mutex<(u64, Option<T>)>,
}

impl<T> LatestResultCell<T> {
    pub fn new() -> Self {
        Self {
            newest_ticket: AtomicU64::new(0),
            applied: Mutex::new((0, None)),
        }
    }

    /// Issue the next request ticket, superseding all earlier ones.
    pub fn begin(&self) -> u64 {
        self.newest_ticket.fetch_add(1, atomic::Ordering::SeqCst) + 1
    }

    /// Apply a finished request's result. Returns false (and drops the
    /// value) when a newer ticket has been issued since.
    pub fn apply(&self, ticket: u64, value: T) -> bool {
        if ticket != self.newest_ticket.load(atomic::Ordering::SeqCst) {
            debug!(
                component = "aggregate",
                event = "aggregate.result.stale",
                ticket
            );
            return false;
        }
        let mut slot = self
            .applied
            .lock()
            .expect("result cell lock should not be poisoned");
        *slot = (ticket, Some(value));
        true
    }

    pub fn latest(&self) -> Option<T>
    where
        T: Clone,
    {
        self.applied
            .lock()
            .expect("result cell lock should not be poisoned")
            .1
            .clone()
    }
}

impl<T> Default for LatestResultCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
