use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use stockpulse::{
    gainers_router, Category, Company, CompanyWithMarketData, Exchange, InMemorySource,
    MarketData, MarketDataResponse,
};
use tower::util::ServiceExt;

fn row(
    ticker: &str,
    name: &str,
    exchange: &str,
    change: f64,
    date: &str,
    occurrences: u32,
) -> CompanyWithMarketData {
    CompanyWithMarketData {
        company: Company {
            id: 1,
            ticker_symbol: ticker.to_string(),
            name: name.to_string(),
            comments: None,
            exchange: Some(Exchange {
                id: 1,
                code: exchange.to_string(),
                name: None,
            }),
            category: Some(Category {
                id: 1,
                name: "Good".to_string(),
            }),
        },
        market_data: MarketData {
            company_id: 1,
            record_date: date.to_string(),
            current_price: Some(2500.50),
            previous_close: Some(2375.00),
            percentage_change: Some(change),
        },
        occurrence_count: occurrences,
    }
}

fn day(date: &str, rows: Vec<CompanyWithMarketData>) -> MarketDataResponse {
    MarketDataResponse {
        date: date.to_string(),
        companies: rows,
    }
}

fn two_day_source() -> Arc<InMemorySource> {
    Arc::new(InMemorySource::new(vec![
        day(
            "2025-11-27",
            vec![
                row("RELIANCE", "Reliance Industries Limited", "NSE", 4.10, "2025-11-27", 2),
                row("INFY", "Infosys Limited", "NSE", 1.80, "2025-11-27", 1),
            ],
        ),
        day(
            "2025-11-28",
            vec![
                row("RELIANCE", "Reliance Industries Limited", "NSE", 5.25, "2025-11-28", 2),
                row("SENSEXCO", "Sensex Co Limited", "BSE", 3.20, "2025-11-28", 1),
            ],
        ),
    ]))
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn date_page_returns_table_for_newest_date() {
    let app = gainers_router(two_day_source());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/gainers/date")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;

    assert!(text.contains("<table"));
    assert!(text.contains("Gainers by Date"));
    assert!(text.contains("2025-11-28"));
    assert!(text.contains("RELIANCE"));
    assert!(text.contains("₹2,500.50"));
    // BSE row is excluded by the default NSE filter.
    assert!(!text.contains("SENSEXCO"));
}

#[tokio::test]
async fn date_snapshot_applies_exchange_and_sort_params() {
    let app = gainers_router(two_day_source());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/gainers/date/snapshot?exchange=all&sort=percentage_change")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(json["date"], "2025-11-28");
    assert_eq!(json["error"], serde_json::Value::Null);
    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    // Numeric sort defaults descending, so the bigger change leads.
    assert_eq!(rows[0]["company"]["ticker_symbol"], "RELIANCE");
    assert_eq!(rows[1]["company"]["ticker_symbol"], "SENSEXCO");
}

#[tokio::test]
async fn date_snapshot_clamps_future_dates_to_newest() {
    let app = gainers_router(two_day_source());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/gainers/date/snapshot?date=2031-01-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["date"], "2025-11-28");
}

#[tokio::test]
async fn threshold_snapshot_keeps_strictly_repeated_tickers() {
    let app = gainers_router(two_day_source());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/gainers/threshold/snapshot?threshold=1&mode=all")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    let groups = json["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["ticker_symbol"], "RELIANCE");
    assert_eq!(groups[0]["occurrence_count"], 2);
    assert_eq!(groups[0]["latest_date"], "2025-11-28");
}

#[tokio::test]
async fn date_export_returns_quoted_csv_attachment() {
    let app = gainers_router(two_day_source());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/gainers/date/export.csv?exchange=NSE")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/csv"));
    assert_eq!(
        disposition,
        "attachment; filename=\"gainers_datewise_2025-11-28_NSE.csv\""
    );

    let text = body_text(response).await;
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "\"Ticker Symbol\",\"Company Name\",\"Current Price\",\"Previous Close\",\"Change %\",\"Category\",\"Occurrences\",\"Comments\""
    );
    assert!(lines.next().unwrap().starts_with("\"RELIANCE\""));
}

#[tokio::test]
async fn threshold_export_filename_carries_mode_and_threshold() {
    let app = gainers_router(two_day_source());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/gainers/threshold/export.csv?threshold=1&mode=one&exchange=NSE")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(
        disposition,
        "attachment; filename=\"gainers_grouped_one_threshold1.csv\""
    );
}

#[tokio::test]
async fn failing_source_returns_ok_with_error_field() {
    let source = Arc::new(InMemorySource::new(Vec::new()));
    source.fail_with("database unavailable");

    let app = gainers_router(source);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/gainers/date/snapshot")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert!(json["rows"].as_array().unwrap().is_empty());
    assert_eq!(
        json["error"],
        "Unable to load the list of available dates. Please retry in a moment."
    );
}
