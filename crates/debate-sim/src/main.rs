use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use debate_coordination::events::{prefix_with_responses, EntryFilter, FilteredReceiver};
use debate_coordination::{
    DebateConfig, DebateProtocol, JudgePolicy, LogEntry, LogStats, ReplayResponder, Responder,
    ScriptedResponder,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Topic question to debate
    #[arg(long, default_value = "Q")]
    question: String,

    /// TOML config file (defaults to DEBATE_* environment variables)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the participant pool capacity
    #[arg(long)]
    pool_capacity: Option<usize>,

    /// Scripted judges decompose questions shallower than this
    #[arg(long, default_value_t = 0)]
    decompose_depth: usize,

    /// Subquestions per scripted decomposition
    #[arg(long, default_value_t = 2)]
    fan_out: usize,

    /// Scripted judges pick the malicious answer
    #[arg(long, default_value_t = false)]
    choose_second: bool,

    /// Previously exported log to replay before going live
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Replay only the first N recorded interactions
    #[arg(long, requires = "replay")]
    replay_prefix: Option<usize>,

    /// Write the run's log and statistics as JSON
    #[arg(long)]
    output: Option<PathBuf>,

    /// Trace log entries involving this participant as they are appended
    #[arg(long)]
    watch_participant: Option<usize>,

    /// Trace log entries of this kind as they are appended (repeatable)
    #[arg(
        long,
        value_parser = [
            "interact_request",
            "interact_response",
            "scheduler_request",
            "scheduler_response",
            "participant_allocated",
        ]
    )]
    watch_kind: Vec<String>,
}

impl Args {
    fn watch_filter(&self) -> Option<EntryFilter> {
        if self.watch_participant.is_none() && self.watch_kind.is_empty() {
            return None;
        }
        let mut filter = EntryFilter::new();
        if !self.watch_kind.is_empty() {
            filter = filter.kinds(self.watch_kind.iter().map(String::as_str).collect());
        }
        if let Some(participant) = self.watch_participant {
            filter = filter.participant(participant);
        }
        Some(filter)
    }
}

fn load_config(args: &Args) -> Result<DebateConfig> {
    let mut config = match &args.config {
        Some(path) => DebateConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => DebateConfig::from_env(),
    };
    if let Some(capacity) = args.pool_capacity {
        config = config.with_pool_capacity(capacity);
    }
    Ok(config)
}

/// Accepts either a bare entry array or an exported run document
fn load_recorded(path: &Path, prefix: Option<usize>) -> Result<Vec<LogEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading replay log {}", path.display()))?;
    let document: serde_json::Value =
        serde_json::from_str(&raw).context("replay log is not valid JSON")?;
    let entries = match document {
        serde_json::Value::Object(mut map) if map.contains_key("entries") => {
            map.remove("entries").unwrap_or_default()
        }
        other => other,
    };
    let entries: Vec<LogEntry> =
        serde_json::from_value(entries).context("replay log has malformed entries")?;

    Ok(match prefix {
        Some(count) => prefix_with_responses(&entries, count),
        None => entries,
    })
}

/// Trace matching entries until the log is dropped
fn spawn_watcher(mut receiver: FilteredReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(indexed) => {
                    let entry = serde_json::to_string(&indexed.entry).unwrap_or_default();
                    info!(index = indexed.index, kind = indexed.entry.kind(), %entry, "Watched entry");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Watcher fell behind, entries skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let scripted: Arc<dyn Responder> = Arc::new(ScriptedResponder::new(
        JudgePolicy::DecomposeUntil {
            depth: args.decompose_depth,
            fan_out: args.fan_out,
            chose_first: !args.choose_second,
        },
    ));
    let responder: Arc<dyn Responder> = match &args.replay {
        Some(path) => {
            let recorded = load_recorded(path, args.replay_prefix)?;
            info!(path = %path.display(), entries = recorded.len(), "Replaying captured log");
            Arc::new(ReplayResponder::new(recorded, scripted))
        }
        None => scripted,
    };

    let protocol = DebateProtocol::from_config(config, responder)?;
    let watcher = args
        .watch_filter()
        .map(|filter| spawn_watcher(protocol.log().subscribe_filtered(filter)));
    info!(run_id = %protocol.run_id(), question = %args.question, "Debate simulation starting");

    let outcome = protocol.start(&args.question).await;
    let entries = protocol.entries();
    let stats = LogStats::from_entries(&entries);

    let violations = protocol.log().validate();
    for violation in &violations {
        warn!(%violation, "Log invariant violated");
    }

    if let Some(path) = &args.output {
        let document = serde_json::json!({
            "run_id": protocol.run_id().to_string(),
            "question": args.question,
            "answer": outcome.as_ref().ok(),
            "error": outcome.as_ref().err().map(|e| e.to_string()),
            "stats": stats,
            "workspaces": protocol.workspaces(),
            "entries": entries,
        });
        std::fs::write(path, serde_json::to_string_pretty(&document)?)
            .with_context(|| format!("writing log to {}", path.display()))?;
        info!(path = %path.display(), "Log written");
    }

    drop(protocol);
    if let Some(watcher) = watcher {
        watcher.await.context("log watcher panicked")?;
    }

    let answer = outcome.context("debate failed")?;
    info!(
        entries = stats.total_entries,
        interactions = stats.interactions,
        participants = stats.participants_allocated,
        "Debate simulation finished"
    );
    println!("{}", answer);

    Ok(())
}
