use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use colored::Colorize;
use kvlog::{Context, KvConfig, KvLog, SetOutcome, StorageConfig, SyncMode, Timestamp};
use serde_json::json;

use crate::cli::*;

const DEFAULT_DATA_DIR: &str = ".kvlog";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(cli.config.as_deref(), cli.data_dir)?;
    let db = KvLog::open(&config).context("failed to open store")?;
    let ctx = Context::background();

    match cli.command {
        Command::Set(args) => cmd_set(&db, &ctx, args, cli.format),
        Command::Get(args) => cmd_get(&db, &ctx, args, cli.format),
        Command::History(args) => cmd_history(&db, &ctx, args, cli.format),
    }
}

/// Load `--config` (if any) and point storage at `--data-dir`.
///
/// The CLI always uses file storage: an explicit `--data-dir` wins, then a
/// file backend from the config, then `.kvlog`.
pub fn resolve_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> anyhow::Result<KvConfig> {
    let mut config = match path {
        Some(path) => KvConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => KvConfig::default(),
    };

    config.storage = match (data_dir, config.storage) {
        (Some(dir), StorageConfig::File { sync_mode, .. }) => StorageConfig::File { dir, sync_mode },
        (Some(dir), StorageConfig::Memory) => StorageConfig::File {
            dir,
            sync_mode: SyncMode::default(),
        },
        (None, file @ StorageConfig::File { .. }) => file,
        (None, StorageConfig::Memory) => StorageConfig::File {
            dir: PathBuf::from(DEFAULT_DATA_DIR),
            sync_mode: SyncMode::default(),
        },
    };
    Ok(config)
}

/// Parse integer nanoseconds since the epoch or an RFC 3339 date-time.
pub fn parse_timestamp(s: &str) -> anyhow::Result<Timestamp> {
    if let Ok(nanos) = s.parse::<i64>() {
        return Ok(Timestamp::from_nanos(nanos));
    }
    let parsed = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp {s:?}: expected nanoseconds or RFC 3339"))?;
    let nanos = parsed
        .timestamp_nanos_opt()
        .with_context(|| format!("timestamp {s:?} is out of range"))?;
    Ok(Timestamp::from_nanos(nanos))
}

/// Render a timestamp as RFC 3339 in UTC with nanosecond precision.
pub fn format_timestamp(ts: Timestamp) -> String {
    let dt: DateTime<Utc> = Utc.timestamp_nanos(ts.as_nanos());
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn cmd_set(db: &KvLog, ctx: &Context, args: SetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let outcome = db.set(ctx, &args.key, &args.value)?;
    match (format, &outcome) {
        (OutputFormat::Json, SetOutcome::Appended(entry)) => println!(
            "{}",
            json!({ "key": args.key, "appended": true, "timestamp": entry.timestamp })
        ),
        (OutputFormat::Json, SetOutcome::Unchanged) => {
            println!("{}", json!({ "key": args.key, "appended": false }))
        }
        (OutputFormat::Text, SetOutcome::Appended(entry)) => println!(
            "{} {} @ {}",
            "appended".green().bold(),
            args.key.bold(),
            format_timestamp(entry.timestamp).yellow()
        ),
        (OutputFormat::Text, SetOutcome::Unchanged) => {
            println!("{} {}", "unchanged".dimmed(), args.key.bold())
        }
    }
    Ok(())
}

fn cmd_get(db: &KvLog, ctx: &Context, args: GetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let value = match &args.at {
        Some(at) => db.get_at(ctx, &args.key, parse_timestamp(at)?)?,
        None => db.get(ctx, &args.key)?,
    };
    match format {
        OutputFormat::Json => println!("{}", json!({ "key": args.key, "value": value })),
        OutputFormat::Text => println!("{value}"),
    }
    Ok(())
}

fn cmd_history(
    db: &KvLog,
    ctx: &Context,
    args: HistoryArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let limit = args.limit.unwrap_or(usize::MAX);
    let mut versions = Vec::new();
    // Dropping the iterator early releases the cursor.
    for version in db.history(ctx, &args.key)?.take(limit) {
        versions.push(version?);
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&versions)?);
        return Ok(());
    }

    if versions.is_empty() {
        println!("No history for {}.", args.key.bold());
        return Ok(());
    }
    for version in &versions {
        let when = format_timestamp(version.timestamp);
        if args.oneline {
            println!("{} {}", when.yellow(), first_line(&version.value));
        } else {
            println!("{}  {}", when.yellow().bold(), version.timestamp.to_string().dimmed());
            for line in version.value.lines() {
                println!("    {line}");
            }
        }
    }
    Ok(())
}

fn first_line(value: &str) -> &str {
    value.lines().next().unwrap_or("")
}
