//! bidstream CLI: watch a marketplace auction and optionally place a bid.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bidstream::api::HttpMarketplaceApi;
use bidstream::config::WatchConfig;
use bidstream::currency::{
    format_price, Currency, CurrencyConverter, FixedRateConverter, HttpRateConverter,
};
use bidstream::models::{BidderKind, ViewerContext};
use bidstream::notify::TracingSink;
use bidstream::watcher::AuctionWatcher;

#[derive(Parser)]
#[command(name = "bidstream")]
#[command(about = "Live auction monitor and bidding client")]
struct Cli {
    /// Auction id to watch
    #[arg(long)]
    auction: String,

    /// Configuration file path
    #[arg(short, long, default_value = "bidstream.toml")]
    config: String,

    /// Viewer account id (drives self-bid suppression and update detection)
    #[arg(long)]
    viewer: String,

    /// Viewer kind: user or vendor
    #[arg(long, default_value = "user")]
    viewer_kind: String,

    /// Auth token; falls back to the BIDSTREAM_TOKEN environment variable
    #[arg(long)]
    token: Option<String>,

    /// Display currency override
    #[arg(long)]
    currency: Option<String>,

    /// Place a bid of this display-currency amount before watching
    #[arg(long)]
    bid: Option<i64>,

    /// Confirm updating an existing bid
    #[arg(long)]
    confirm_update: bool,

    /// Poll interval override in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,

    /// Validate config, print the auction once, and exit
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if std::path::Path::new(&cli.config).exists() {
        WatchConfig::from_file(&cli.config)?
    } else {
        warn!("Config file not found, using defaults: {}", cli.config);
        WatchConfig::default()
    };
    if let Some(interval) = cli.interval {
        config.watcher.poll_interval_secs = interval;
    }
    config.validate()?;

    init_logging(cli.log_level.as_deref());

    info!("Starting bidstream");
    info!("Marketplace API: {}", config.api.base_url);
    info!("Auction: {}", cli.auction);
    info!("Poll interval: {}s", config.watcher.poll_interval_secs);

    let currency = cli
        .currency
        .as_deref()
        .map(Currency::new)
        .unwrap_or_else(|| config.currency.display_currency());
    let token = cli
        .token
        .clone()
        .or_else(|| std::env::var("BIDSTREAM_TOKEN").ok());
    if token.is_none() {
        warn!("No auth token provided; bidding is disabled, watch-only mode");
    }

    let viewer = ViewerContext {
        viewer_id: cli.viewer.clone(),
        kind: if cli.viewer_kind.eq_ignore_ascii_case("vendor") {
            BidderKind::Vendor
        } else {
            BidderKind::User
        },
        auth_token: token,
        currency: currency.clone(),
    };

    let api = Arc::new(HttpMarketplaceApi::new(
        &config.api.base_url,
        Duration::from_secs(config.api.request_timeout_secs),
    )?);
    let converter: Arc<dyn CurrencyConverter> = match &config.api.rates_url {
        Some(endpoint) => Arc::new(HttpRateConverter::new(reqwest::Client::new(), endpoint)),
        None => Arc::new(FixedRateConverter::new(config.currency.rate_table())),
    };

    let mut watcher = AuctionWatcher::new(
        api,
        converter,
        Arc::new(TracingSink),
        viewer,
        &cli.auction,
        &config,
    );

    watcher.load_initial().await?;
    print_summary(&watcher, &currency);

    if cli.dry_run {
        info!("Dry run mode - exiting after initial read");
        return Ok(());
    }

    if let Some(amount) = cli.bid {
        match watcher.submit_bid(amount, cli.confirm_update).await {
            Ok(mode) => info!("Bid accepted ({mode:?})"),
            // The sink already raised the toast; keep watching.
            Err(err) => warn!("Bid not submitted: {err}"),
        }
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = watcher.run() => {
            result?;
        }
    }

    info!("Shutting down bidstream");
    Ok(())
}

fn print_summary(watcher: &AuctionWatcher, currency: &Currency) {
    if let Some(view) = watcher.current_view() {
        let symbol = view.prices.currency.symbol().to_string();
        info!(
            "Current bid: {symbol}{} (next: {symbol}{})",
            format_price(view.prices.current_bid),
            format_price(view.prices.next_bid),
        );
        info!(
            "{} bids, ends in {} ({} display)",
            view.auction.bids.len(),
            view.time_left,
            currency
        );
    }
}

fn init_logging(override_level: Option<&str>) {
    let level = override_level.unwrap_or("info");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("bidstream={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
