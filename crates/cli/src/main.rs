// crates/cli/src/main.rs
mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use syncwatch_client::HttpTransport;
use syncwatch_core::{MonitorConfig, MonitorState, ProgressMonitor, SyncStatus};
use syncwatch_observability::{init_tracing, LogFormat, LogOptions};
use tokio::sync::mpsc;

use crate::render::{BarRenderer, JsonRenderer, Render};

/// Follow the progress of an email sync job.
#[derive(Parser, Debug)]
#[command(name = "syncwatch", version)]
struct Args {
    /// Account id whose sync job to follow.
    job_id: String,

    /// Auth token sent as the `token` query parameter.
    #[arg(long, env = "SYNCWATCH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Backend base url (overrides SYNCWATCH_BASE_URL).
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Print one JSON object per state change instead of a progress bar.
    #[arg(long)]
    json: bool,

    /// Grace period after the job finishes before the stream is closed.
    #[arg(long, value_name = "MS")]
    auto_close_ms: Option<u64>,

    /// Handshake timeout.
    #[arg(long, value_name = "MS")]
    connect_timeout_ms: Option<u64>,

    /// Tracing filter directive (overrides SYNCWATCH_LOG / RUST_LOG).
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,

    /// Also write logs to this file.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Emit logs as JSON on stderr.
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn log_options(&self) -> LogOptions {
        LogOptions {
            level: self.log_level.clone(),
            format: if self.log_json {
                LogFormat::Json
            } else {
                LogFormat::Compact
            },
            file: self.log_file.clone(),
        }
    }

    /// Environment first, flags on top.
    fn monitor_config(&self) -> MonitorConfig {
        let mut config = MonitorConfig::from_env();
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.clone());
        }
        if let Some(ms) = self.auto_close_ms {
            config = config.with_auto_close_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.connect_timeout_ms {
            config = config.with_connect_timeout(Duration::from_millis(ms));
        }
        config
    }
}

/// How the run ended, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
    Interrupted,
}

impl Outcome {
    fn from_state(state: &MonitorState, interrupted: bool) -> Self {
        let completed = state.error.is_none()
            && state
                .current
                .as_ref()
                .is_some_and(|snap| snap.is_terminal && snap.status == SyncStatus::Completed);
        match (completed, interrupted) {
            (true, _) => Self::Completed,
            (false, true) => Self::Interrupted,
            (false, false) => Self::Failed,
        }
    }

    fn code(self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::Failed => 1,
            Self::Interrupted => 130,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Args::parse()).await {
        Ok(outcome) => ExitCode::from(outcome.code()),
        Err(e) => {
            eprintln!("  \u{2717} {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<Outcome> {
    let _log_guard = init_tracing(&args.log_options()).context("initializing logging")?;

    let config = args.monitor_config();
    tracing::debug!(?config, "starting syncwatch");
    let transport = HttpTransport::new().context("building HTTP client")?;
    let mut monitor = ProgressMonitor::new(Arc::new(transport), config);

    let (tx, mut states) = mpsc::unbounded_channel();
    monitor.subscribe(move |state| {
        let _ = tx.send(state.clone());
    });

    let mut renderer: Box<dyn Render> = if args.json {
        Box::new(JsonRenderer::new(std::io::stdout()))
    } else {
        Box::new(BarRenderer::new()?)
    };

    let token = args.token.clone().unwrap_or_default();
    monitor.open(&args.job_id, &token).await;

    let finished = monitor.wait_until_finished();
    tokio::pin!(finished);
    let mut interrupted = false;
    loop {
        tokio::select! {
            biased;
            Some(state) = states.recv() => renderer.render(&state)?,
            _ = &mut finished => break,
            res = tokio::signal::ctrl_c() => {
                res.context("listening for Ctrl-C")?;
                interrupted = true;
                monitor.close().await;
                break;
            }
        }
    }
    while let Ok(state) = states.try_recv() {
        renderer.render(&state)?;
    }

    let state = monitor.state();
    renderer.finish(&state)?;
    Ok(Outcome::from_state(&state, interrupted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use syncwatch_core::{ConnectionPhase, MonitorError, Snapshot};

    fn terminal(status: SyncStatus) -> Snapshot {
        let at = Utc.with_ymd_and_hms(2026, 2, 5, 12, 0, 0).unwrap();
        Snapshot {
            job_id: "acc-1".into(),
            status,
            total_units: 10,
            processed_units: 10,
            successful_units: 10,
            failed_units: 0,
            current_item_label: None,
            current_operation: String::new(),
            elapsed_seconds: 5,
            remaining_seconds_estimate: None,
            error_message: None,
            is_terminal: true,
            last_updated_at: at,
            started_at: at,
            ended_at: Some(at),
        }
    }

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "syncwatch",
            "acc-1",
            "--token",
            "t",
            "--base-url",
            "http://mail.local:9000",
            "--auto-close-ms",
            "0",
            "--json",
        ])
        .unwrap();
        assert_eq!(args.job_id, "acc-1");
        assert_eq!(args.token.as_deref(), Some("t"));
        assert!(args.json);

        let config = args.monitor_config();
        assert_eq!(config.base_url, "http://mail.local:9000");
        assert_eq!(config.auto_close_delay, Duration::ZERO);
    }

    #[test]
    fn job_id_is_required() {
        assert!(Args::try_parse_from(["syncwatch"]).is_err());
    }

    #[test]
    fn log_json_selects_json_format() {
        let args = Args::try_parse_from(["syncwatch", "acc-1", "--log-json"]).unwrap();
        assert_eq!(args.log_options().format, LogFormat::Json);
    }

    #[test]
    fn outcome_follows_final_state() {
        let mut state = MonitorState::new();
        state.connection_phase = ConnectionPhase::Closed;
        state.current = Some(terminal(SyncStatus::Completed));
        assert_eq!(Outcome::from_state(&state, false), Outcome::Completed);
        assert_eq!(Outcome::from_state(&state, true), Outcome::Completed);

        state.current = Some(terminal(SyncStatus::Failed));
        assert_eq!(Outcome::from_state(&state, false), Outcome::Failed);
        assert_eq!(Outcome::from_state(&state, true), Outcome::Interrupted);

        let mut errored = MonitorState::new();
        errored.error = Some(MonitorError::MissingAuth);
        assert_eq!(Outcome::from_state(&errored, false).code(), 1);
    }
}
