use crate::sink::{Sink, WindowReport};
use async_trait::async_trait;
use colloquy_core::ColloquyResult;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

/// Appends one JSON object per report to a file.
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    /// Opens `path` for appending, creating it and its parent directories.
    pub async fn open(path: impl AsRef<Path>) -> ColloquyResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        info!(path = %path.display(), "Writing reports");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// File the reports are appended to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn deliver(&self, report: &WindowReport) -> ColloquyResult<()> {
        let mut line = serde_json::to_string(report)?;
        line.push('\n');
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use colloquy_core::{AnalysisResult, Event, FallbackReason, Speaker, Window, WindowTrigger};

    fn report(seq: u64) -> WindowReport {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let window = Window::new(
            "abc123",
            seq,
            None,
            WindowTrigger::Flush,
            vec![Event::new("abc123", ts, Speaker::Customer, "Hi").unwrap()],
        )
        .unwrap();
        WindowReport::new(window, AnalysisResult::unavailable(FallbackReason::Disabled))
    }

    #[tokio::test]
    async fn test_appends_one_line_per_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("reports.jsonl");
        let sink = JsonlSink::open(&path).await.unwrap();
        sink.deliver(&report(0)).await.unwrap();
        sink.deliver(&report(1)).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: WindowReport = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second, report(1));
    }

    #[tokio::test]
    async fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.jsonl");
        JsonlSink::open(&path).await.unwrap().deliver(&report(0)).await.unwrap();
        JsonlSink::open(&path).await.unwrap().deliver(&report(1)).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_fallback_is_tagged_in_json() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::open(dir.path().join("r.jsonl")).await.unwrap();
        sink.deliver(&report(0)).await.unwrap();
        let content = tokio::fs::read_to_string(sink.path()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(value["analysis"]["status"], "unavailable");
        assert_eq!(value["analysis"]["reason"]["kind"], "disabled");
    }
}
