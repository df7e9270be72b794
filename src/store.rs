//! SQLite-backed market-data store.
//!
//! One typed method per query shape; nothing outside this module speaks SQL.
//! Views depend on the [`MarketDataSource`] trait rather than on the store
//! directly, so tests and demos can run against an in-memory source.

use std::path::Path;
use std::sync::{Mutex, RwLock};

use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::info;

use crate::model::{
    Category, Company, CompanyWithMarketData, Exchange, MarketData, MarketDataResponse,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

/// Read seam between the store and the table views.
pub trait MarketDataSource: Send + Sync + 'static {
    /// Distinct dates with stored market data, newest first.
    fn available_dates(&self) -> Result<Vec<String>, StoreError>;
    /// All companies with market data for one date, ordered by percentage
    /// change descending.
    fn market_data_by_date(&self, date: &str) -> Result<MarketDataResponse, StoreError>;
}

pub struct MarketStore {
    conn: Mutex<Connection>,
}

impl MarketStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            ",
        )?;
        create_schema(&conn)?;
        info!(
            component = "store",
            event = "store.opened",
            path = %path.display()
        );
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store lock should not be poisoned")
    }

    pub fn exchanges(&self) -> Result<Vec<Exchange>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT id, code, name FROM exchanges ORDER BY code")?;
        let rows = stmt.query_map([], |row| {
            Ok(Exchange {
                id: row.get(0)?,
                code: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn exchange_by_code(&self, code: &str) -> Result<Option<Exchange>, StoreError> {
        let conn = self.lock();
        let exchange = conn
            .query_row(
                "SELECT id, code, name FROM exchanges WHERE code = ?1",
                params![code],
                |row| {
                    Ok(Exchange {
                        id: row.get(0)?,
                        code: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(exchange)
    }

    pub fn get_or_create_exchange(&self, code: &str) -> Result<Exchange, StoreError> {
        if let Some(exchange) = self.exchange_by_code(code)? {
            return Ok(exchange);
        }
        let conn = self.lock();
        let id: i64 = conn.query_row(
            "INSERT INTO exchanges (code) VALUES (?1) RETURNING id",
            params![code],
            |row| row.get(0),
        )?;
        info!(
            component = "store",
            event = "store.exchange.created",
            code,
            id
        );
        Ok(Exchange {
            id,
            code: code.to_string(),
            name: None,
        })
    }

    pub fn categories(&self) -> Result<Vec<Category>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_or_create_category(&self, name: &str) -> Result<Category, StoreError> {
        let conn = self.lock();
        let existing = conn
            .query_row(
                "SELECT id, name FROM categories WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        if let Some(category) = existing {
            return Ok(category);
        }
        let id: i64 = conn.query_row(
            "INSERT INTO categories (name) VALUES (?1) RETURNING id",
            params![name],
            |row| row.get(0),
        )?;
        info!(
            component = "store",
            event = "store.category.created",
            name,
            id
        );
        Ok(Category {
            id,
            name: name.to_string(),
        })
    }

    pub fn companies(&self) -> Result<Vec<Company>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("{COMPANY_SELECT} ORDER BY c.name"))?;
        let rows = stmt.query_map([], company_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn company_by_ticker(&self, ticker_symbol: &str) -> Result<Option<Company>, StoreError> {
        let conn = self.lock();
        let company = conn
            .query_row(
                &format!("{COMPANY_SELECT} WHERE c.ticker_symbol = ?1"),
                params![ticker_symbol],
                company_from_row,
            )
            .optional()?;
        Ok(company)
    }

    pub fn company_by_id(&self, company_id: i64) -> Result<Option<Company>, StoreError> {
        let conn = self.lock();
        let company = conn
            .query_row(
                &format!("{COMPANY_SELECT} WHERE c.id = ?1"),
                params![company_id],
                company_from_row,
            )
            .optional()?;
        Ok(company)
    }

    /// Insert a company or refresh its name and exchange. Comments and a
    /// user-assigned category survive re-imports.
    pub fn upsert_company(
        &self,
        ticker_symbol: &str,
        name: &str,
        exchange_id: i64,
        category_id: i64,
    ) -> Result<i64, StoreError> {
        let conn = self.lock();
        let id: i64 = conn.query_row(
            "
            INSERT INTO companies (ticker_symbol, name, exchange_id, category_id)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(ticker_symbol) DO UPDATE SET
                name = excluded.name,
                exchange_id = excluded.exchange_id
            RETURNING id
            ",
            params![ticker_symbol, name, exchange_id, category_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn upsert_market_data(
        &self,
        company_id: i64,
        record_date: &str,
        current_price: f64,
        previous_close: f64,
        percentage_change: f64,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "
            INSERT INTO market_data (
                company_id, record_date, current_price, previous_close, percentage_change
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(company_id, record_date) DO UPDATE SET
                current_price = excluded.current_price,
                previous_close = excluded.previous_close,
                percentage_change = excluded.percentage_change
            ",
            params![
                company_id,
                record_date,
                current_price,
                previous_close,
                percentage_change
            ],
        )?;
        Ok(())
    }

    pub fn update_comment(&self, company_id: i64, comment: &str) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE companies SET comments = ?2 WHERE id = ?1",
            params![company_id, comment],
        )?;
        Ok(())
    }

    pub fn update_category(
        &self,
        company_id: i64,
        category_id: Option<i64>,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE companies SET category_id = ?2 WHERE id = ?1",
            params![company_id, category_id],
        )?;
        Ok(())
    }

    /// How many dates a ticker appears on, across the whole store.
    pub fn occurrence_count(&self, ticker_symbol: &str) -> Result<u32, StoreError> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "
            SELECT COUNT(*)
            FROM market_data m
            JOIN companies c ON c.id = m.company_id
            WHERE c.ticker_symbol = ?1
            ",
            params![ticker_symbol],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    /// Per-date rows for one company, oldest first. Feeds historical charts.
    pub fn company_history(&self, company_id: i64) -> Result<Vec<MarketData>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "
            SELECT company_id, record_date, current_price, previous_close, percentage_change
            FROM market_data
            WHERE company_id = ?1
            ORDER BY record_date ASC
            ",
        )?;
        let rows = stmt.query_map(params![company_id], market_data_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn query_available_dates(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT DISTINCT record_date FROM market_data ORDER BY record_date DESC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn query_market_data_by_date(&self, date: &str) -> Result<MarketDataResponse, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "
            SELECT
                c.id, c.ticker_symbol, c.name, c.comments,
                e.id, e.code, e.name,
                cat.id, cat.name,
                m.record_date, m.current_price, m.previous_close, m.percentage_change,
                (SELECT COUNT(*) FROM market_data m2 WHERE m2.company_id = c.id)
            FROM market_data m
            JOIN companies c ON c.id = m.company_id
            LEFT JOIN exchanges e ON e.id = c.exchange_id
            LEFT JOIN categories cat ON cat.id = c.category_id
            WHERE m.record_date = ?1
            ORDER BY m.percentage_change DESC
            ",
        )?;
        let rows = stmt.query_map(params![date], |row| {
            let company = Company {
                id: row.get(0)?,
                ticker_symbol: row.get(1)?,
                name: row.get(2)?,
                comments: row.get(3)?,
                exchange: joined_exchange(row, 4)?,
                category: joined_category(row, 7)?,
            };
            let market_data = MarketData {
                company_id: company.id,
                record_date: row.get(9)?,
                current_price: row.get(10)?,
                previous_close: row.get(11)?,
                percentage_change: row.get(12)?,
            };
            let occurrence_count: i64 = row.get(13)?;
            Ok(CompanyWithMarketData {
                company,
                market_data,
                occurrence_count: occurrence_count as u32,
            })
        })?;
        Ok(MarketDataResponse {
            date: date.to_string(),
            companies: rows.collect::<Result<Vec<_>, _>>()?,
        })
    }
}

impl MarketDataSource for MarketStore {
    fn available_dates(&self) -> Result<Vec<String>, StoreError> {
        self.query_available_dates()
    }

    fn market_data_by_date(&self, date: &str) -> Result<MarketDataResponse, StoreError> {
        self.query_market_data_by_date(date)
    }
}

const COMPANY_SELECT: &str = "
    SELECT
        c.id, c.ticker_symbol, c.name, c.comments,
        e.id, e.code, e.name,
        cat.id, cat.name
    FROM companies c
    LEFT JOIN exchanges e ON e.id = c.exchange_id
    LEFT JOIN categories cat ON cat.id = c.category_id
";

fn company_from_row(row: &Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        ticker_symbol: row.get(1)?,
        name: row.get(2)?,
        comments: row.get(3)?,
        exchange: joined_exchange(row, 4)?,
        category: joined_category(row, 7)?,
    })
}

fn joined_exchange(row: &Row<'_>, base: usize) -> rusqlite::Result<Option<Exchange>> {
    let id: Option<i64> = row.get(base)?;
    Ok(match id {
        Some(id) => Some(Exchange {
            id,
            code: row.get(base + 1)?,
            name: row.get(base + 2)?,
        }),
        None => None,
    })
}

fn joined_category(row: &Row<'_>, base: usize) -> rusqlite::Result<Option<Category>> {
    let id: Option<i64> = row.get(base)?;
    Ok(match id {
        Some(id) => Some(Category {
            id,
            name: row.get(base + 1)?,
        }),
        None => None,
    })
}

fn market_data_from_row(row: &Row<'_>) -> rusqlite::Result<MarketData> {
    Ok(MarketData {
        company_id: row.get(0)?,
        record_date: row.get(1)?,
        current_price: row.get(2)?,
        previous_close: row.get(3)?,
        percentage_change: row.get(4)?,
    })
}

fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS exchanges (
            id INTEGER PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT
        );
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );
        CREATE TABLE IF NOT EXISTS companies (
            id INTEGER PRIMARY KEY,
            ticker_symbol TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            comments TEXT,
            exchange_id INTEGER REFERENCES exchanges(id),
            category_id INTEGER REFERENCES categories(id)
        );
        CREATE TABLE IF NOT EXISTS market_data (
            company_id INTEGER NOT NULL REFERENCES companies(id),
            record_date TEXT NOT NULL,
            current_price REAL,
            previous_close REAL,
            percentage_change REAL,
            PRIMARY KEY (company_id, record_date)
        ) WITHOUT ROWID;
        CREATE INDEX IF NOT EXISTS idx_market_data_date ON market_data(record_date);
        ",
    )
}

/// In-memory [`MarketDataSource`] for tests and demos. Snapshots are
/// replaceable wholesale; an error string makes both methods fail, to
/// exercise the views' degraded path.
pub struct InMemorySource {
    inner: RwLock<InMemoryState>,
}

struct InMemoryState {
    days: Vec<MarketDataResponse>,
    error: Option<String>,
}

impl InMemorySource {
    pub fn new(days: Vec<MarketDataResponse>) -> Self {
        Self {
            inner: RwLock::new(InMemoryState { days, error: None }),
        }
    }

    pub fn replace(&self, days: Vec<MarketDataResponse>) {
        let mut state = self
            .inner
            .write()
            .expect("in-memory source lock should not be poisoned");
        state.days = days;
        state.error = None;
    }

    pub fn fail_with(&self, message: impl Into<String>) {
        let mut state = self
            .inner
            .write()
            .expect("in-memory source lock should not be poisoned");
        state.error = Some(message.into());
    }
}

impl MarketDataSource for InMemorySource {
    fn available_dates(&self) -> Result<Vec<String>, StoreError> {
        let state = self
            .inner
            .read()
            .expect("in-memory source lock should not be poisoned");
        if let Some(message) = &state.error {
            return Err(StoreError::Unavailable(message.clone()));
        }
        let mut dates: Vec<String> = state.days.iter().map(|day| day.date.clone()).collect();
        dates.sort_by(|a, b| b.cmp(a));
        dates.dedup();
        Ok(dates)
    }

    fn market_data_by_date(&self, date: &str) -> Result<MarketDataResponse, StoreError> {
        let state = self
            .inner
            .read()
            .expect("in-memory source lock should not be poisoned");
        if let Some(message) = &state.error {
            return Err(StoreError::Unavailable(message.clone()));
        }
        Ok(state
            .days
            .iter()
            .find(|day| day.date == date)
            .cloned()
            .unwrap_or_else(|| MarketDataResponse {
                date: date.to_string(),
                companies: Vec::new(),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let store = MarketStore::open_in_memory().expect("open in-memory store");
        let first = store.get_or_create_exchange("NSE").unwrap();
        let second = store.get_or_create_exchange("NSE").unwrap();
        assert_eq!(first, second);

        let good = store.get_or_create_category("Good").unwrap();
        let again = store.get_or_create_category("Good").unwrap();
        assert_eq!(good, again);
    }

    #[test]
    fn company_upsert_preserves_comments_and_category() {
        let store = MarketStore::open_in_memory().expect("open in-memory store");
        let nse = store.get_or_create_exchange("NSE").unwrap();
        let good = store.get_or_create_category("Good").unwrap();
        let watch = store.get_or_create_category("Watch").unwrap();

        let id = store
            .upsert_company("INFY", "Infosys Limited", nse.id, good.id)
            .unwrap();
        store.update_comment(id, "long-term hold").unwrap();
        store.update_category(id, Some(watch.id)).unwrap();

        let same_id = store
            .upsert_company("INFY", "Infosys Ltd", nse.id, good.id)
            .unwrap();
        assert_eq!(id, same_id);

        let company = store.company_by_ticker("INFY").unwrap().unwrap();
        assert_eq!(company.name, "Infosys Ltd");
        assert_eq!(company.comments.as_deref(), Some("long-term hold"));
        assert_eq!(company.category.unwrap().name, "Watch");
    }

    #[test]
    fn by_date_query_orders_by_change_descending() {
        let store = MarketStore::open_in_memory().expect("open in-memory store");
        let nse = store.get_or_create_exchange("NSE").unwrap();
        let good = store.get_or_create_category("Good").unwrap();

        for (ticker, change) in [("AAA", 3.0), ("BBB", 10.0), ("CCC", 5.0)] {
            let id = store.upsert_company(ticker, ticker, nse.id, good.id).unwrap();
            store
                .upsert_market_data(id, "2025-11-28", 100.0, 95.0, change)
                .unwrap();
        }

        let response = store.query_market_data_by_date("2025-11-28").unwrap();
        let changes: Vec<f64> = response
            .companies
            .iter()
            .map(|c| c.market_data.percentage_change.unwrap())
            .collect();
        assert_eq!(changes, vec![10.0, 5.0, 3.0]);
    }

    #[test]
    fn in_memory_source_reports_dates_newest_first() {
        let source = InMemorySource::new(vec![
            MarketDataResponse {
                date: "2025-11-27".to_string(),
                companies: Vec::new(),
            },
            MarketDataResponse {
                date: "2025-11-28".to_string(),
                companies: Vec::new(),
            },
        ]);
        assert_eq!(
            source.available_dates().unwrap(),
            vec!["2025-11-28".to_string(), "2025-11-27".to_string()]
        );
    }

    #[test]
    fn in_memory_source_error_mode_fails_both_methods() {
        let source = InMemorySource::new(Vec::new());
        source.fail_with("backend offline");
        assert!(source.available_dates().is_err());
        assert!(source.market_data_by_date("2025-11-28").is_err());
    }
}
