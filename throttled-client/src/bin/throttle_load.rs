use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::bail;
use clap::Parser;
use hdrhistogram::Histogram;
use tokio::sync::Barrier;
use tokio::task::JoinSet;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use throttled_client::CallOrdering;
use throttled_client::ClientConfig;
use throttled_client::ClientError;
use throttled_client::Quota;
use throttled_client::SharedWindow;
use throttled_client::ThrottledClient;
use throttled_client::TimeUnit;
use throttled_client::document;
use throttled_client::document::Description;
use throttled_client::document::Document;
use throttled_client::document::Product;

/// Fire concurrent document submissions through one throttled client.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Window length, e.g. `1s`, `500ms`, `1m`
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    interval: Duration,

    /// Submissions admitted per window
    #[arg(long, default_value_t = 2)]
    limit: i64,

    /// Concurrent submissions to fire
    #[arg(long, default_value_t = 6)]
    tasks: usize,

    /// Target endpoint; overrides THROTTLE_ENDPOINT
    #[arg(long)]
    url: Option<String>,

    /// Value sent in the Signature header
    #[arg(long, default_value = "YOUR_SIGNATURE")]
    signature: String,

    /// Send calls strictly one at a time
    #[arg(long)]
    serialized: bool,
}

impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if self.interval < Duration::from_secs(1) || self.interval > Duration::from_secs(3600) {
            bail!("interval must be between 1s and 1h");
        }
        if !(1..=1000).contains(&self.limit) {
            bail!("limit must be between 1 and 1000");
        }
        if !(1..=10_000).contains(&self.tasks) {
            bail!("tasks must be between 1 and 10000");
        }
        Ok(())
    }
}

fn sample_document() -> Document {
    let date = "2020-01-23".to_string();
    Document {
        description: Description {
            participant_inn: "string".to_string(),
        },
        doc_id: "string".to_string(),
        doc_status: "string".to_string(),
        doc_type: "LP_INTRODUCE_GOODS".to_string(),
        import_request: true,
        owner_inn: "string".to_string(),
        participant_inn: "string".to_string(),
        producer_inn: "string".to_string(),
        production_date: date.clone(),
        production_type: "string".to_string(),
        products: vec![Product {
            certificate_document: "string".to_string(),
            certificate_document_date: date.clone(),
            certificate_document_number: "string".to_string(),
            owner_inn: "string".to_string(),
            producer_inn: "string".to_string(),
            production_date: date.clone(),
            tnved_code: "string".to_string(),
            uit_code: "string".to_string(),
            uitu_code: "string".to_string(),
        }],
        reg_date: date,
        reg_number: "string".to_string(),
    }
}

#[derive(Default)]
struct Outcomes {
    statuses: BTreeMap<u16, usize>,
    cancelled: usize,
    other: usize,
}

async fn run_load_test(
    client: ThrottledClient,
    document: Document,
    signature: String,
    total: usize,
) -> anyhow::Result<()> {
    let mut hist_elapsed = Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3)?;
    let mut tasks = JoinSet::new();
    let mut outcomes = Outcomes::default();

    let document = Arc::new(document);
    let barrier = Arc::new(Barrier::new(total));
    let start = Instant::now();

    for _ in 0..total {
        let client = client.clone();
        let document = Arc::clone(&document);
        let signature = signature.clone();
        let bar = Arc::clone(&barrier);
        tasks.spawn(async move {
            bar.wait().await;
            let req_start = Instant::now();
            let res = client.submit_document(&document, signature).await;
            (res, req_start.elapsed())
        });
    }

    while let Some(task) = tasks.join_next().await {
        let (res, elapsed) = task.context("submission task panicked")?;
        match res {
            Ok(status) => {
                *outcomes.statuses.entry(status).or_default() += 1;
                hist_elapsed.record(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX))?;
            }
            Err(ClientError::Cancelled) => outcomes.cancelled += 1,
            Err(e) => {
                tracing::error!(error = %e, "submission failed");
                outcomes.other += 1;
            }
        }
    }

    let total_duration = start.elapsed();

    println!("--- Load Test ---");
    println!("Total Duration:  {:.2?}", total_duration);
    println!(
        "Throughput:      {:.2} req/sec",
        total as f64 / total_duration.as_secs_f64()
    );
    for (status, count) in &outcomes.statuses {
        println!("  └─ {status}:        {count}");
    }
    if outcomes.cancelled > 0 {
        println!("  └─ Cancelled:  {}", outcomes.cancelled);
    }
    if outcomes.other > 0 {
        println!("  └─ Errors:     {}", outcomes.other);
    }
    if !hist_elapsed.is_empty() {
        println!("P50 (Elapsed):   {}µs", hist_elapsed.value_at_quantile(0.5));
        println!("P99 (Elapsed):   {}µs", hist_elapsed.value_at_quantile(0.99));
        println!("Max (Elapsed):   {}µs", hist_elapsed.max());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "throttle_load=info,throttled_client=info,admission_gate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    args.validate()?;

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &args.url {
        config = config.with_endpoint(url.clone());
    }
    if args.serialized {
        config = config.with_ordering(CallOrdering::Serialized);
    }

    let document = sample_document();
    let pretty = document::serialize_pretty(&document)?;
    println!("Serialized document:\n{pretty}\n");
    let parsed = document::deserialize(pretty.as_bytes())?;
    println!("Deserialized document:\n{parsed:#?}\n");

    let interval_ms = i64::try_from(args.interval.as_millis()).context("interval out of range")?;
    let quota = Quota::new(TimeUnit::Milliseconds, interval_ms, args.limit)?;
    let client =
        ThrottledClient::with_shared_window(quota, Arc::new(SharedWindow::new()), config.clone())?;

    println!("Tasks:           {}", args.tasks);
    println!("Limit:           {}", args.limit);
    println!("Interval:        {}", humantime::format_duration(args.interval));
    println!("URL:             {}", config.endpoint);
    println!("Ordering:        {:?}\n", config.ordering);

    run_load_test(client, document, args.signature, args.tasks).await?;

    tracing::debug!(tasks = args.tasks, "all submissions completed");
    Ok(())
}
