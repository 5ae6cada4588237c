use crate::sink::{Sink, WindowReport};
use async_trait::async_trait;
use colloquy_core::{AnalysisResult, ColloquyResult};
use std::fmt::Write as _;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Prints reports to stdout as readable blocks.
pub struct ConsoleSink {
    stdout: Mutex<tokio::io::Stdout>,
}

impl ConsoleSink {
    /// Writes to the process stdout.
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, report: &WindowReport) -> ColloquyResult<()> {
        let text = render_report(report);
        // One lock per report keeps blocks from interleaving.
        let mut stdout = self.stdout.lock().await;
        stdout.write_all(text.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// Renders a report the way [`ConsoleSink`] prints it.
pub fn render_report(report: &WindowReport) -> String {
    let window = &report.window;
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(
        out,
        "Session {} | window #{} ({:?}) | {} -> {} | {} messages",
        window.session_id(),
        window.sequence(),
        window.trigger(),
        window.window_start().format("%H:%M:%S"),
        window.window_end().format("%H:%M:%S"),
        window.len()
    );
    let _ = writeln!(out, "{}", "-".repeat(60));
    for message in window.messages() {
        let _ = writeln!(
            out,
            "{} {}: {}",
            message.timestamp().format("%H:%M:%S"),
            message.speaker().label(),
            message.text()
        );
    }
    let _ = writeln!(out, "{}", "-".repeat(60));
    match &report.analysis {
        AnalysisResult::Analyzed(analysis) => {
            let _ = writeln!(out, "Advice:      {}", analysis.response_text);
            let _ = writeln!(out, "Intent:      {}", analysis.intent);
            let _ = writeln!(out, "Strategy:    {}", analysis.strategy);
            let _ = writeln!(out, "Urgency:     {}", analysis.urgency);
            let _ = writeln!(out, "Emotion:     {}", analysis.emotion);
            let _ = writeln!(out, "Next action: {}", analysis.next_action);
        }
        AnalysisResult::Unavailable { reason } => {
            let _ = writeln!(out, "[analysis unavailable] {reason}");
        }
    }
    out
}
