// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! refwatch: watch a repository's refs and build every new commit once.

use anyhow::Context;
use clap::Parser;
use rw_adapters::{GithubRefFetcher, ProcessBuildAdapter};
use rw_core::{Sha, SystemClock};
use rw_engine::{Monitor, MonitorConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "refwatch", version, about = "Build every new commit a repository's refs point at")]
struct Args {
    /// Repository owner (user or organization)
    #[arg(long)]
    owner: String,

    /// Repository name
    #[arg(long)]
    repo: String,

    /// Build command, run through `bash -c` for each new commit with
    /// REFWATCH_REF and REFWATCH_SHA in the environment
    #[arg(long = "cmd")]
    build_cmd: String,

    /// Poll interval, e.g. "30s", "5m"
    #[arg(long, default_value = "30s", value_parser = parse_duration)]
    interval: Duration,

    /// Maximum number of builds running at once
    #[arg(long, default_value_t = 2)]
    max_concurrent: usize,

    /// API base URL (override for GitHub Enterprise hosts)
    #[arg(long, default_value = "https://api.github.com")]
    api_base: String,

    /// File of SHAs, one per line, to treat as already built
    #[arg(long)]
    seen_file: Option<PathBuf>,
}

/// Parse a duration string like "30s", "5m", "1h" into a Duration
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str.parse().map_err(|_| format!("invalid number in duration: {}", s))?;

    let multiplier = match suffix.trim() {
        "ms" | "millis" | "millisecond" | "milliseconds" => {
            return Ok(Duration::from_millis(num));
        }
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        other => return Err(format!("unknown duration suffix: {}", other)),
    };

    Ok(Duration::from_secs(num * multiplier))
}

/// Read a seen-commits file: one SHA per line, blanks and `#` comments
/// skipped.
fn load_seen_file(path: &Path) -> anyhow::Result<Vec<Sha>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading seen file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(Sha::new)
        .collect())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let token = std::env::var("REFWATCH_GITHUB_TOKEN").ok();

    let fetcher = GithubRefFetcher::new(&args.api_base, &args.owner, &args.repo, token)?;
    let builder = ProcessBuildAdapter::new();
    let (event_tx, event_rx) = mpsc::channel(256);
    let monitor = Monitor::new(
        fetcher,
        builder,
        SystemClock,
        MonitorConfig {
            poll_interval: args.interval,
            max_concurrent: args.max_concurrent,
            build_cmd: args.build_cmd,
        },
        event_tx,
    )?;

    if let Some(path) = &args.seen_file {
        let shas = load_seen_file(path)?;
        tracing::info!(n = shas.len(), file = %path.display(), "seeding seen commits");
        monitor.seed_seen(shas)?;
    }

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    tracing::info!(owner = %args.owner, repo = %args.repo, "watching refs");
    monitor.run(event_rx, shutdown).await;
    Ok(())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
