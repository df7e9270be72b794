use std::io::Read;
use std::path::PathBuf;

use chrono::Utc;
use stockpulse::{init_logging, logging_config_from_env, save_gainers_table, MarketStore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let store_path = std::env::var("STOCKPULSE_STORE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/stockpulse.sqlite"));
    let date = std::env::var("STOCKPULSE_IMPORT_DATE")
        .unwrap_or_else(|_| Utc::now().format("%Y-%m-%d").to_string());
    let exchange = std::env::var("STOCKPULSE_EXCHANGE").unwrap_or_else(|_| "NSE".to_string());

    let raw = read_input()?;

    println!(
        "Import start | store={} date={} exchange={}",
        store_path.display(),
        date,
        exchange
    );

    let store = MarketStore::open(&store_path)?;
    let report = save_gainers_table(&store, &raw, &date, &exchange, |percent, message| {
        println!("[{percent:>3}%] {message}");
    })?;

    println!(
        "Saved {} rows for {} ({})",
        report.rows_saved, report.date, report.exchange_code
    );
    Ok(())
}

fn read_input() -> Result<String, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            Ok(raw)
        }
    }
}
