use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio::time::Instant;

use throttled_client::ClientConfig;
use throttled_client::Quota;
use throttled_client::SharedWindow;
use throttled_client::ThrottledClient;
use throttled_client::TimeUnit;
use throttled_client::document::Document;

#[tokio::main]
async fn main() {
    // 1. A local endpoint that accepts every document
    let app = Router::new().route(
        "/api/v3/lk/documents/create",
        post(|| async { StatusCode::CREATED }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    // 2. Two submissions per second
    let quota = Quota::per_unit(TimeUnit::Seconds, 2).unwrap();
    let config = ClientConfig::default()
        .with_endpoint(format!("http://{addr}/api/v3/lk/documents/create"))
        .with_send_timeout(Duration::from_secs(2));
    let client =
        ThrottledClient::with_shared_window(quota, Arc::new(SharedWindow::new()), config).unwrap();

    println!("🚀 Submitting 6 documents at 2 per second...\n");

    // 3. Fire them all at once; the gate spreads them over three windows
    let start = Instant::now();
    let mut tasks = JoinSet::new();
    for i in 0..6 {
        let client = client.clone();
        tasks.spawn(async move {
            let doc = Document {
                doc_id: format!("doc-{i}"),
                ..Document::default()
            };
            let status = client.submit_document(&doc, "demo-signature").await;
            (i, status, start.elapsed())
        });
    }

    let mut results = tasks.join_all().await;
    results.sort_by_key(|(_, _, elapsed)| *elapsed);
    for (i, status, elapsed) in results {
        match status {
            Ok(code) => println!("[{i}] {code} after {elapsed:.2?}"),
            Err(e) => println!("[{i}] ❌ {e}"),
        }
    }

    println!("\nTotal: {:.2?}", start.elapsed());
}
