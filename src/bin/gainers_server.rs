use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use stockpulse::{
    gainers_router, init_logging, log_app_bind, log_app_start, log_store_opened,
    logging_config_from_env, MarketDataSource, MarketStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let store_path = std::env::var("STOCKPULSE_STORE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/stockpulse.sqlite"));
    let addr: SocketAddr = std::env::var("STOCKPULSE_HTTP_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;

    let store = MarketStore::open(&store_path)?;
    log_store_opened(&store_path);

    let source: Arc<dyn MarketDataSource> = Arc::new(store);
    let app = gainers_router(source);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
