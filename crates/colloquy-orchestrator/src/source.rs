use colloquy_core::{ColloquyError, ColloquyResult, Event, RawRecord};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub(crate) enum Command {
    Ingest(RawRecord),
    IngestEvent(Event),
    Flush(String),
    FlushAll,
    Close,
}

/// Push-style handle into a running pipeline.
///
/// Cloneable; every method fails with [`ColloquyError::Pipeline`] once the
/// pipeline has stopped.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<Command>,
}

impl PipelineHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    /// Submits a raw record; malformed records are rejected by the engine.
    pub async fn ingest(&self, raw: RawRecord) -> ColloquyResult<()> {
        self.send(Command::Ingest(raw)).await
    }

    /// Submits an already validated event.
    pub async fn ingest_event(&self, event: Event) -> ColloquyResult<()> {
        self.send(Command::IngestEvent(event)).await
    }

    /// Emits whatever `session_id` has buffered.
    pub async fn flush(&self, session_id: impl Into<String>) -> ColloquyResult<()> {
        self.send(Command::Flush(session_id.into())).await
    }

    /// Emits whatever every session has buffered.
    pub async fn flush_all(&self) -> ColloquyResult<()> {
        self.send(Command::FlushAll).await
    }

    /// Ends input. The pipeline flushes all sessions, drains dispatch and
    /// returns from `run`.
    pub async fn close(self) -> ColloquyResult<()> {
        self.send(Command::Close).await
    }

    async fn send(&self, command: Command) -> ColloquyResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ColloquyError::Pipeline("pipeline is not running".into()))
    }
}

/// `[source]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Base delay between records, before the speed factor.
    #[serde(default = "default_emission_interval_ms")]
    pub emission_interval_ms: u64,
    /// Replay speed multiplier. `<= 0` replays without delay.
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,
}

fn default_emission_interval_ms() -> u64 {
    500
}

fn default_speed_factor() -> f64 {
    2.0
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            emission_interval_ms: default_emission_interval_ms(),
            speed_factor: default_speed_factor(),
        }
    }
}

impl SourceSettings {
    /// Delay between records, or `None` for as-fast-as-possible replay.
    pub fn delay(&self) -> Option<Duration> {
        if self.emission_interval_ms == 0
            || !self.speed_factor.is_finite()
            || self.speed_factor <= 0.0
        {
            return None;
        }
        let secs =
            Duration::from_millis(self.emission_interval_ms).as_secs_f64() / self.speed_factor;
        Duration::try_from_secs_f64(secs).ok().filter(|d| !d.is_zero())
    }
}

/// What a replay read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    /// Non-blank lines read.
    pub lines: u64,
    /// Lines parsed and handed to the pipeline.
    pub records: u64,
    /// Lines that were not a JSON record.
    pub invalid_lines: u64,
}

/// Replays a JSON-lines file of raw records into a pipeline.
pub struct JsonlSource {
    path: PathBuf,
    delay: Option<Duration>,
}

impl JsonlSource {
    /// Replays `path`, paced by `settings`.
    pub fn new(path: impl AsRef<Path>, settings: &SourceSettings) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delay: settings.delay(),
        }
    }

    /// The replayed file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Streams every record of the file into `handle`, pacing by the
    /// configured delay. Lines that are not valid JSON are logged with
    /// their line number and skipped. Does not close the handle.
    pub async fn replay(&self, handle: &PipelineHandle) -> ColloquyResult<ReplayStats> {
        let file = tokio::fs::File::open(&self.path).await.map_err(|e| {
            ColloquyError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {e}", self.path.display()),
            ))
        })?;
        info!(
            path = %self.path.display(),
            delay_ms = self.delay.map_or(0, |d| d.as_millis() as u64),
            "Replaying conversation stream"
        );

        let mut lines = BufReader::new(file).lines();
        let mut stats = ReplayStats::default();
        let mut line_no = 0u64;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            stats.lines += 1;

            let raw: RawRecord = match serde_json::from_str(&line) {
                Ok(raw) => raw,
                Err(e) => {
                    stats.invalid_lines += 1;
                    warn!(line = line_no, error = %e, "Skipping invalid JSON line");
                    continue;
                }
            };

            if stats.records > 0 {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
            }
            debug!(line = line_no, "Emitting record");
            handle.ingest(raw).await?;
            stats.records += 1;
        }

        info!(
            records = stats.records,
            invalid_lines = stats.invalid_lines,
            "Replay finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_scales_with_speed_factor() {
        let settings = SourceSettings::default();
        assert_eq!(settings.delay(), Some(Duration::from_millis(250)));

        let fast = SourceSettings {
            speed_factor: 4.0,
            ..SourceSettings::default()
        };
        assert_eq!(fast.delay(), Some(Duration::from_millis(125)));
    }

    #[test]
    fn test_non_positive_speed_means_no_delay() {
        for speed_factor in [0.0, -1.0, f64::NAN] {
            let settings = SourceSettings {
                speed_factor,
                ..SourceSettings::default()
            };
            assert_eq!(settings.delay(), None);
        }
        let zero = SourceSettings {
            emission_interval_ms: 0,
            ..SourceSettings::default()
        };
        assert_eq!(zero.delay(), None);
    }

    #[tokio::test]
    async fn test_replay_skips_invalid_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");
        tokio::fs::write(
            &path,
            concat!(
                r#"{"session_id":"abc123","timestamp":"2024-01-15T10:00:00Z","sender":"customer","message":"Hi"}"#,
                "\n\n",
                "not json\n",
                r#"{"session_id":"abc123","timestamp":"2024-01-15T10:00:10Z","sender":"rm","message":"Hello"}"#,
                "\n",
            ),
        )
        .await
        .unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let handle = PipelineHandle::new(tx);
        let source = JsonlSource::new(
            &path,
            &SourceSettings {
                speed_factor: 0.0,
                ..SourceSettings::default()
            },
        );
        let stats = source.replay(&handle).await.unwrap();
        assert_eq!(
            stats,
            ReplayStats {
                lines: 3,
                records: 2,
                invalid_lines: 1
            }
        );

        drop(handle);
        let mut senders = Vec::new();
        while let Some(Command::Ingest(raw)) = rx.recv().await {
            senders.push(raw.sender.unwrap());
        }
        assert_eq!(senders, vec!["customer", "rm"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let (tx, _rx) = mpsc::channel(1);
        let source = JsonlSource::new("/nonexistent/messages.jsonl", &SourceSettings::default());
        let err = source.replay(&PipelineHandle::new(tx)).await.unwrap_err();
        assert!(matches!(err, ColloquyError::Io(_)));
    }

    #[tokio::test]
    async fn test_stopped_pipeline_is_reported() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = PipelineHandle::new(tx);
        assert!(matches!(
            handle.flush_all().await,
            Err(ColloquyError::Pipeline(_))
        ));
    }
}
