use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bootstrap_loader::EmaAnchor;
use candle_store::Db;
use ingestion_scheduler::Scheduler;
use notification_gateway::{DiscordWebhookNotifier, NotificationChannel, NotificationGateway};
use rust_decimal::Decimal;
use tokio::signal::unix::SignalKind;
use tokio::time;
use trading_core::{IngestConfig, Timeframe};
use vendor_client::{BirdeyeClient, MoralisClient, VendorClient};

/// Token admin API entry points (§6) called as a one-shot CLI subcommand,
/// since the HTTP/REST surface that would normally front them is out of
/// scope here. The full tick/reset loop is the default with no subcommand.
async fn run_add_token_command(args: &[String]) -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let config = IngestConfig::from_env();
    let db = Db::connect(&config.database_url).await?;
    let birdeye = BirdeyeClient::new(config.birdeye_credits_per_call, config.vendor_request_timeout());

    let mode = args[0].as_str();
    let token_address = args.get(1).context("usage: add-token <address> <pair> <symbol> <name> <pair_created_time> [added_by]")?;
    let pair_address = args.get(2).context("missing <pair>")?;
    let symbol = args.get(3).context("missing <symbol>")?;
    let name = args.get(4).context("missing <name>")?;
    let pair_created_time: i64 = args.get(5).context("missing <pair_created_time>")?.parse().context("pair_created_time must be a unix timestamp")?;
    let now = chrono::Utc::now().timestamp();

    let outcome = match mode {
        "add-token" => {
            let added_by = args.get(6).map(String::as_str);
            bootstrap_loader::add_new_token(&db, &birdeye as &dyn VendorClient, token_address, pair_address, symbol, name, pair_created_time, added_by, now).await
        }
        "add-old-token" => {
            // anchors: "timeframe:period:value:reference_time" entries, comma-separated.
            let anchors_arg = args.get(6).context("missing <anchors> (e.g. 15m:21:1.10:1704067200,1h:21:1.12:1704070800)")?;
            let added_by = args.get(7).map(String::as_str);
            let anchors = parse_ema_anchors(anchors_arg)?;
            bootstrap_loader::add_old_token(&db, &birdeye as &dyn VendorClient, token_address, pair_address, symbol, name, pair_created_time, &anchors, added_by, now).await
        }
        other => anyhow::bail!("unknown subcommand {other}"),
    };

    println!(
        "{{\"success\":{},\"tokenId\":{},\"mode\":\"{}\",\"candlesInserted\":{},\"creditsUsed\":{},\"error\":{}}}",
        outcome.success,
        outcome.token_id.map(|v| v.to_string()).unwrap_or_else(|| "null".to_string()),
        outcome.mode,
        outcome.candles_inserted,
        outcome.credits_used,
        outcome.error.map(|e| format!("\"{}\"", e.replace('"', "'"))).unwrap_or_else(|| "null".to_string()),
    );

    if !outcome.success {
        anyhow::bail!("bootstrap failed");
    }
    Ok(())
}

fn parse_ema_anchors(spec: &str) -> Result<Vec<EmaAnchor>> {
    spec.split(',')
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').collect();
            anyhow::ensure!(parts.len() == 4, "anchor entry must be timeframe:period:value:reference_time, got {entry}");
            let timeframe = Timeframe::from_str(parts[0]).ok_or_else(|| anyhow::anyhow!("unknown timeframe {}", parts[0]))?;
            let period: u32 = parts[1].parse().context("anchor period must be an integer")?;
            let value: Decimal = parts[2].parse().context("anchor value must be a decimal")?;
            let reference_time: i64 = parts[3].parse().context("anchor reference_time must be a unix timestamp")?;
            Ok(EmaAnchor { timeframe, period, value, reference_time })
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args: Vec<String> = std::env::args().skip(1).collect();
    if matches!(cli_args.first().map(String::as_str), Some("add-token") | Some("add-old-token")) {
        return run_add_token_command(&cli_args).await;
    }

    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting token ingestion scheduler");

    let config = IngestConfig::from_env();
    let db = Db::connect(&config.database_url).await?;

    if let Ok(key) = std::env::var("BIRDEYE_API_KEY") {
        db.register_credential("birdeye", &key, config.birdeye_credits_per_call * 1000, None, now())
            .await?;
    }
    if let Ok(key) = std::env::var("MORALIS_API_KEY") {
        db.register_credential("moralis", &key, config.moralis_credits_per_call * 1000, Some(30), now())
            .await?;
    }

    let birdeye = BirdeyeClient::new(config.birdeye_credits_per_call, config.vendor_request_timeout());
    let chain = std::env::var("VENDOR_CHAIN").unwrap_or_else(|_| "solana".to_string());
    let moralis = MoralisClient::new(config.moralis_credits_per_call, chain, config.vendor_request_timeout());

    let gateway = std::env::var("DISCORD_WEBHOOK_URL").ok().map(|url| {
        let channels: Vec<Box<dyn NotificationChannel>> = vec![Box::new(DiscordWebhookNotifier::new(url))];
        NotificationGateway::new(db.clone(), channels)
    });
    if gateway.is_none() {
        tracing::warn!("no DISCORD_WEBHOOK_URL set, alerts will only be logged to the notification table");
    }

    let scheduler = Arc::new(Scheduler::new(db, birdeye, moralis, gateway, config.clone()));

    // A tick still running when the next one fires is skipped rather than
    // queued (§5): overlapping ticks against the same tokens would race on
    // indicator state.
    let tick_in_flight = Arc::new(AtomicBool::new(false));

    let mut tick_interval = time::interval(config.tick_interval());
    let mut reset_interval = time::interval(Duration::from_secs(config.credential_reset_interval_hours * 3600));
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;

    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                if tick_in_flight.swap(true, Ordering::SeqCst) {
                    tracing::warn!("previous tick still running, skipping this one");
                    continue;
                }
                let scheduler = scheduler.clone();
                let tick_in_flight = tick_in_flight.clone();
                tokio::spawn(async move {
                    match scheduler.run_tick(now()).await {
                        Ok(summary) => tracing::info!(
                            tokens_processed = summary.tokens_processed,
                            pass_errors = summary.pass_errors,
                            "tick complete"
                        ),
                        Err(e) => tracing::error!(error = %e, "tick failed"),
                    }
                    tick_in_flight.store(false, Ordering::SeqCst);
                });
            }
            _ = reset_interval.tick() => {
                match scheduler.run_credential_reset(now()).await {
                    Ok(count) => tracing::info!(reset = count, "credential reset job complete"),
                    Err(e) => tracing::error!(error = %e, "credential reset job failed"),
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, exiting gracefully...");
                break;
            }
        }
    }

    Ok(())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
