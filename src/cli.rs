//! CLI definition and dispatch.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, TimeDelta};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::news_import::read_news_jsonl;
use crate::domain::clusterer::{RepresentativePolicy, TfidfClusterer, DEFAULT_SIMILARITY_THRESHOLD};
use crate::domain::config_validation::{
    check_since_hours, validate_cluster_config, validate_paper_config, validate_storage_config,
};
use crate::domain::error::StockotterError;
use crate::domain::news::{Cluster, NewsItem};
use crate::domain::paper_rules::{
    PaperRules, DEFAULT_SIDEWAYS_BAND_PCT, DEFAULT_SIDEWAYS_DAYS, DEFAULT_STOP_LOSS_PCT,
    DEFAULT_TAKE_PROFIT_PCT, DEFAULT_TRAILING_STOP_PCT,
};
use crate::domain::paper_step::{run_paper_step, StepSummary, DEFAULT_ENTRY_QUANTITY};
use crate::domain::position::{PaperEvent, PaperPosition};
use crate::ports::config_port::ConfigPort;
use crate::ports::news_port::NewsPort;
use crate::ports::paper_store_port::PaperStorePort;

pub const DEFAULT_SINCE_HOURS: i64 = 24;

#[derive(Parser, Debug)]
#[command(name = "stockotter", about = "News clustering and paper trading tracker")]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// SQLite database path, overrides [storage] path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import news items from a JSON Lines file
    ImportNews {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Cluster recent news per ticker
    Cluster {
        #[arg(long)]
        since_hours: Option<i64>,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        policy: Option<String>,
    },
    /// Apply daily closes to paper positions
    PaperStep {
        #[arg(short, long)]
        prices: PathBuf,
        /// Process one date; every date in the file when omitted
        #[arg(long)]
        asof: Option<NaiveDate>,
        #[arg(long)]
        quantity: Option<f64>,
    },
    /// List open paper positions
    Positions,
    /// List the paper event log
    Events {
        #[arg(long)]
        ticker: Option<String>,
    },
    /// Validate configuration and print the effective settings
    Validate,
}

pub fn run(cli: Cli) -> ExitCode {
    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => return report_error(&e),
    };

    let result = match &cli.command {
        Command::Validate => run_validate(&config),
        command => run_store_command(command, &config, cli.db.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(&e),
    }
}

fn report_error(err: &StockotterError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

/// Missing `--config` means defaults for every key.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, StockotterError> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            FileConfigAdapter::from_file(path)
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

#[cfg(feature = "sqlite")]
fn run_store_command(
    command: &Command,
    config: &FileConfigAdapter,
    db_override: Option<&Path>,
) -> Result<(), StockotterError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    validate_storage_config(config)?;
    let store = match db_override {
        Some(path) => {
            let pool_size = config.get_int("storage", "pool_size", 4);
            SqliteAdapter::open(path, u32::try_from(pool_size).unwrap_or(4))?
        }
        None => SqliteAdapter::from_config(config)?,
    };
    store.initialize_schema()?;

    match command {
        Command::ImportNews { input } => {
            let imported = run_import_news(&store, input)?;
            println!("imported={imported}");
            Ok(())
        }
        Command::Cluster {
            since_hours,
            threshold,
            policy,
        } => {
            let clusterer = build_clusterer(config, *threshold, policy.as_deref())?;
            let since_hours = resolve_since_hours(config, *since_hours)?;
            let cutoff = cluster_cutoff(Local::now().fixed_offset(), since_hours)?;
            let run = run_cluster_pipeline(&store, &clusterer, cutoff)?;
            for cluster in &run.clusters {
                println!("{}", format_cluster(cluster));
            }
            println!("clusters={} news={}", run.clusters.len(), run.news);
            Ok(())
        }
        Command::PaperStep {
            prices,
            asof,
            quantity,
        } => {
            let rules = build_paper_rules(config)?;
            let quantity = resolve_entry_quantity(config, *quantity)?;
            let prices = CsvPriceAdapter::new(prices.clone());
            let dates = match asof {
                Some(date) => vec![*date],
                None => prices.trading_dates()?,
            };
            for (asof, summary) in run_paper_replay(&store, &prices, &dates, &rules, quantity)? {
                println!("{}", format_step_summary(asof, &summary));
            }
            Ok(())
        }
        Command::Positions => {
            let positions = store.list_open_positions()?;
            for position in &positions {
                println!("{}", format_position(position));
            }
            println!("positions={}", positions.len());
            Ok(())
        }
        Command::Events { ticker } => {
            let events = store.list_events(ticker.as_deref())?;
            for event in &events {
                println!("{}", format_event(event));
            }
            println!("events={}", events.len());
            Ok(())
        }
        Command::Validate => run_validate(config),
    }
}

#[cfg(not(feature = "sqlite"))]
fn run_store_command(
    _command: &Command,
    _config: &FileConfigAdapter,
    _db_override: Option<&Path>,
) -> Result<(), StockotterError> {
    Err(StockotterError::Database {
        reason: "sqlite feature is required for this command".into(),
    })
}

fn run_validate(config: &dyn ConfigPort) -> Result<(), StockotterError> {
    validate_storage_config(config)?;
    let clusterer = build_clusterer(config, None, None)?;
    let since_hours = resolve_since_hours(config, None)?;
    let rules = build_paper_rules(config)?;
    let quantity = resolve_entry_quantity(config, None)?;

    println!(
        "storage.path={}",
        config.get_string_or("storage", "path", "data/stockotter.db")
    );
    println!(
        "storage.pool_size={}",
        config.get_int("storage", "pool_size", 4)
    );
    println!(
        "cluster.similarity_threshold={}",
        clusterer.similarity_threshold()
    );
    println!(
        "cluster.representative_policy={}",
        clusterer.representative_policy()
    );
    println!("cluster.since_hours={since_hours}");
    println!("paper.take_profit_pct={}", rules.take_profit_pct);
    println!("paper.trailing_stop_pct={}", rules.trailing_stop_pct);
    println!("paper.stop_loss_pct={}", rules.stop_loss_pct);
    println!("paper.enable_sideways_exit={}", rules.enable_sideways_exit);
    println!("paper.sideways_days={}", rules.sideways_days);
    println!("paper.sideways_band_pct={}", rules.sideways_band_pct);
    println!("paper.default_quantity={quantity}");
    eprintln!("Configuration is valid.");
    Ok(())
}

pub fn build_paper_rules(config: &dyn ConfigPort) -> Result<PaperRules, StockotterError> {
    validate_paper_config(config)?;

    // Integer text and range were checked above.
    let sideways_days = config.get_int("paper", "sideways_days", DEFAULT_SIDEWAYS_DAYS.into());
    let sideways_days = u32::try_from(sideways_days).map_err(|_| {
        StockotterError::config_invalid("paper", "sideways_days", "sideways_days is out of range")
    })?;

    Ok(PaperRules {
        take_profit_pct: config.get_double("paper", "take_profit_pct", DEFAULT_TAKE_PROFIT_PCT),
        trailing_stop_pct: config.get_double(
            "paper",
            "trailing_stop_pct",
            DEFAULT_TRAILING_STOP_PCT,
        ),
        stop_loss_pct: config.get_double("paper", "stop_loss_pct", DEFAULT_STOP_LOSS_PCT),
        enable_sideways_exit: config.get_bool("paper", "enable_sideways_exit", true),
        sideways_days,
        sideways_band_pct: config.get_double(
            "paper",
            "sideways_band_pct",
            DEFAULT_SIDEWAYS_BAND_PCT,
        ),
    })
}

/// Flag values win over config values.
pub fn build_clusterer(
    config: &dyn ConfigPort,
    threshold_override: Option<f64>,
    policy_override: Option<&str>,
) -> Result<TfidfClusterer, StockotterError> {
    validate_cluster_config(config)?;

    let threshold = threshold_override.unwrap_or_else(|| {
        config.get_double("cluster", "similarity_threshold", DEFAULT_SIMILARITY_THRESHOLD)
    });
    let policy: RepresentativePolicy = match policy_override {
        Some(policy) => policy.parse()?,
        None => config
            .get_string_or("cluster", "representative_policy", "earliest")
            .parse()?,
    };
    TfidfClusterer::new(threshold, policy)
}

pub fn resolve_since_hours(
    config: &dyn ConfigPort,
    since_hours_override: Option<i64>,
) -> Result<i64, StockotterError> {
    validate_cluster_config(config)?;
    let hours = since_hours_override
        .unwrap_or_else(|| config.get_int("cluster", "since_hours", DEFAULT_SINCE_HOURS));
    check_since_hours(hours)?;
    Ok(hours)
}

/// Start of the clustering window, `since_hours` before `now`.
pub fn cluster_cutoff(
    now: DateTime<FixedOffset>,
    since_hours: i64,
) -> Result<DateTime<FixedOffset>, StockotterError> {
    TimeDelta::try_hours(since_hours)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| {
            StockotterError::config_invalid(
                "cluster",
                "since_hours",
                format!("since_hours={since_hours} reaches past the supported date range"),
            )
        })
}

pub fn resolve_entry_quantity(
    config: &dyn ConfigPort,
    quantity_override: Option<f64>,
) -> Result<f64, StockotterError> {
    let quantity = quantity_override
        .unwrap_or_else(|| config.get_double("paper", "default_quantity", DEFAULT_ENTRY_QUANTITY));
    if !(quantity > 0.0) || !quantity.is_finite() {
        return Err(StockotterError::config_invalid(
            "paper",
            "default_quantity",
            "default_quantity must be positive",
        ));
    }
    Ok(quantity)
}

/// Reads a JSON Lines file and upserts every record. Returns the number of
/// distinct articles written.
pub fn run_import_news(news: &dyn NewsPort, input: &Path) -> Result<usize, StockotterError> {
    let items = read_news_jsonl(input)?;
    import_news_items(news, &items)
}

pub fn import_news_items(news: &dyn NewsPort, items: &[NewsItem]) -> Result<usize, StockotterError> {
    for item in items {
        news.upsert_news_item(item)?;
    }
    tracing::info!(count = items.len(), "imported news items");
    Ok(items.len())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRun {
    pub news: usize,
    pub clusters: Vec<Cluster>,
}

pub fn run_cluster_pipeline(
    news: &dyn NewsPort,
    clusterer: &TfidfClusterer,
    cutoff: DateTime<FixedOffset>,
) -> Result<ClusterRun, StockotterError> {
    let items = news.list_news_since(cutoff)?;
    let clusters = clusterer.cluster(&items);
    for cluster in &clusters {
        news.upsert_cluster(cluster)?;
    }
    tracing::info!(
        %cutoff,
        news = items.len(),
        clusters = clusters.len(),
        threshold = clusterer.similarity_threshold(),
        "clustered news"
    );
    Ok(ClusterRun {
        news: items.len(),
        clusters,
    })
}

/// Runs one step per date, in the order given.
pub fn run_paper_replay(
    store: &dyn PaperStorePort,
    prices: &CsvPriceAdapter,
    dates: &[NaiveDate],
    rules: &PaperRules,
    entry_quantity: f64,
) -> Result<Vec<(NaiveDate, StepSummary)>, StockotterError> {
    let mut summaries = Vec::with_capacity(dates.len());
    for &asof in dates {
        let closes = prices.closes_for(asof)?;
        let summary = run_paper_step(store, &closes, asof, rules, entry_quantity)?;
        summaries.push((asof, summary));
    }
    Ok(summaries)
}

pub fn format_step_summary(asof: NaiveDate, summary: &StepSummary) -> String {
    format!(
        "asof={} prices={} updated={} new_entries={} events={} failed={}",
        asof,
        summary.prices,
        summary.updated,
        summary.new_entries,
        summary.events,
        summary.failed.len()
    )
}

pub fn format_cluster(cluster: &Cluster) -> String {
    format!(
        "cluster_id={} representative={} members={} summary={}",
        cluster.cluster_id,
        cluster.representative_news_id,
        cluster.member_news_ids.len(),
        cluster.summary
    )
}

pub fn format_position(position: &PaperPosition) -> String {
    format!(
        "ticker={} state={} entry_price={:.4} qty_remaining={} last_close={:.4} entry_date={} sideways_days={}",
        position.ticker,
        position.state,
        position.entry_price,
        position.qty_remaining,
        position.last_close,
        position.entry_date,
        position.sideways_days
    )
}

pub fn format_event(event: &PaperEvent) -> String {
    format!(
        "date={} ticker={} event={} price={:.4} qty={} {}->{} note={}",
        event.event_date,
        event.ticker,
        event.event_type,
        event.price,
        event.quantity,
        event.state_before,
        event.state_after,
        event.note
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_paper_step_with_global_flags() {
        let cli = Cli::try_parse_from([
            "stockotter",
            "paper-step",
            "--prices",
            "daily_close.csv",
            "--asof",
            "2026-02-25",
            "--config",
            "otter.ini",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("otter.ini")));
        match cli.command {
            Command::PaperStep { prices, asof, quantity } => {
                assert_eq!(prices, PathBuf::from("daily_close.csv"));
                assert_eq!(asof, NaiveDate::from_ymd_opt(2026, 2, 25));
                assert_eq!(quantity, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_malformed_asof() {
        let result = Cli::try_parse_from([
            "stockotter",
            "paper-step",
            "--prices",
            "p.csv",
            "--asof",
            "25/02/2026",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_cluster_overrides() {
        let cli = Cli::try_parse_from([
            "stockotter",
            "cluster",
            "--threshold",
            "0.5",
            "--policy",
            "keyword",
            "--since-hours",
            "48",
        ])
        .unwrap();
        match cli.command {
            Command::Cluster {
                since_hours,
                threshold,
                policy,
            } => {
                assert_eq!(since_hours, Some(48));
                assert_eq!(threshold, Some(0.5));
                assert_eq!(policy.as_deref(), Some("keyword"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn format_step_summary_line() {
        let summary = StepSummary {
            prices: 3,
            updated: 2,
            new_entries: 1,
            events: 1,
            failed: vec!["000660".into()],
        };
        assert_eq!(
            format_step_summary(NaiveDate::from_ymd_opt(2026, 2, 26).unwrap(), &summary),
            "asof=2026-02-26 prices=3 updated=2 new_entries=1 events=1 failed=1"
        );
    }

    #[test]
    fn cluster_cutoff_subtracts_window() {
        let now = DateTime::parse_from_rfc3339("2026-02-26T09:00:00+09:00").unwrap();
        let cutoff = cluster_cutoff(now, 24).unwrap();
        assert_eq!(cutoff.to_rfc3339(), "2026-02-25T09:00:00+09:00");
    }

    #[test]
    fn cluster_cutoff_out_of_range_is_config_error() {
        let now = DateTime::parse_from_rfc3339("2026-02-26T09:00:00+09:00").unwrap();
        for hours in [i64::MAX / 2, 10_000_000_000] {
            assert!(matches!(
                cluster_cutoff(now, hours),
                Err(StockotterError::ConfigInvalid { ref key, .. }) if key == "since_hours"
            ));
        }
    }
}
