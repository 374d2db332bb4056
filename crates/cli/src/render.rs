// crates/cli/src/render.rs
//! Terminal output for published monitor states.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use syncwatch_core::{MonitorPhase, MonitorState, ProgressView};

pub trait Render {
    /// Called for every published state, in order.
    fn render(&mut self, state: &MonitorState) -> Result<()>;

    /// Called once with the final state.
    fn finish(&mut self, state: &MonitorState) -> Result<()>;
}

/// Tracks how many log appends were printed so each one is printed once,
/// even when the log is full and lines repeat.
#[derive(Debug, Default)]
pub struct LogTail {
    seen: u64,
}

impl LogTail {
    /// Lines appended since the previous call, oldest first.
    pub fn new_lines(&mut self, state: &MonitorState) -> Vec<String> {
        let total = state.log.total_appended();
        if total < self.seen {
            // A new open() reset the log.
            self.seen = 0;
        }
        let fresh = usize::try_from(total - self.seen).unwrap_or(usize::MAX);
        self.seen = total;
        let skip = state.log.len().saturating_sub(fresh);
        state.log.iter().skip(skip).map(str::to_string).collect()
    }
}

/// indicatif bar on stderr, log lines printed above it.
pub struct BarRenderer {
    bar: ProgressBar,
    tail: LogTail,
    with_total: Option<bool>,
    error_shown: bool,
}

impl BarRenderer {
    pub fn new() -> Result<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style()?);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message("Connecting...");
        Ok(Self {
            bar,
            tail: LogTail::default(),
            with_total: None,
            error_shown: false,
        })
    }

    fn apply_view(&mut self, view: &ProgressView) -> Result<()> {
        if self.with_total != Some(view.show_bar) {
            self.bar.set_style(if view.show_bar {
                bar_style()?
            } else {
                spinner_style()?
            });
            self.with_total = Some(view.show_bar);
        }
        if view.show_bar {
            self.bar.set_length(view.total);
            self.bar.set_position(view.processed.min(view.total));
        }
        self.bar.set_message(status_line(view));
        Ok(())
    }
}

fn spinner_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_spinner().template("  {spinner} {msg}")?)
}

fn bar_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template("  {spinner} [{bar:30}] {pos}/{len} {msg}")?
        .progress_chars("=> "))
}

/// `40% processing · Processing email 40/100 · 12s elapsed, ~18s left`
pub fn status_line(view: &ProgressView) -> String {
    let mut line = format!("{}% {}", view.percent, view.status);
    if !view.operation.is_empty() {
        line.push_str(" \u{b7} ");
        line.push_str(&view.operation);
    }
    line.push_str(&format!(" \u{b7} {} elapsed", view.elapsed));
    if let Some(remaining) = &view.remaining {
        line.push_str(&format!(", ~{remaining} left"));
    }
    line
}

/// One-line outcome printed after the bar is cleared.
pub fn summary_line(state: &MonitorState) -> Option<String> {
    if let Some(err) = &state.error {
        return Some(format!("\u{2717} {}", err.message()));
    }
    let view = state.progress()?;
    match view.status {
        syncwatch_core::SyncStatus::Completed => Some(format!(
            "\u{2713} Sync completed \u{2014} {} synced, {} failed ({})",
            view.successful, view.failed, view.elapsed
        )),
        syncwatch_core::SyncStatus::Failed => Some(format!(
            "\u{2717} Sync failed: {}",
            view.error_message.as_deref().unwrap_or(syncwatch_core::reducer::UNKNOWN_ERROR)
        )),
        _ => None,
    }
}

impl Render for BarRenderer {
    fn render(&mut self, state: &MonitorState) -> Result<()> {
        for line in self.tail.new_lines(state) {
            self.bar.println(format!("  {line}"));
        }
        if let Some(view) = state.progress() {
            self.apply_view(&view)?;
        }
        if let Some(err) = &state.error {
            if !self.error_shown {
                self.error_shown = true;
                self.bar.set_message(err.message());
            }
        }
        Ok(())
    }

    fn finish(&mut self, state: &MonitorState) -> Result<()> {
        self.bar.finish_and_clear();
        if let Some(line) = summary_line(state) {
            eprintln!("  {line}");
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    phase: MonitorPhase,
    progress: Option<ProgressView>,
    #[serde(flatten)]
    state: &'a MonitorState,
}

/// One JSON object per published state on stdout.
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Render for JsonRenderer<W> {
    fn render(&mut self, state: &MonitorState) -> Result<()> {
        let line = JsonLine {
            phase: state.phase(),
            progress: state.progress(),
            state,
        };
        serde_json::to_writer(&mut self.out, &line)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }

    fn finish(&mut self, _state: &MonitorState) -> Result<()> {
        Ok(())
    }
}
