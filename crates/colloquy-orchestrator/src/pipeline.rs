use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::monitor::{DispatchMonitor, DispatchStats};
use crate::source::{Command, PipelineHandle};
use colloquy_analysis::AnalysisService;
use colloquy_channels::SinkManager;
use colloquy_core::Window;
use colloquy_engine::{EngineConfig, EngineStats, WindowingEngine};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::info;

/// Runtime configuration of a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Windowing configuration.
    pub engine: EngineConfig,
    /// Analysis timeout and shutdown grace.
    pub dispatch: DispatchConfig,
    /// Idle sweep period; only used when the engine has an idle timeout.
    pub sweep_interval: Duration,
    /// Capacity of the command channel behind [`PipelineHandle`].
    pub command_capacity: usize,
}

impl PipelineConfig {
    /// Default sweep interval and command capacity around `engine`.
    pub fn new(engine: EngineConfig) -> Self {
        Self {
            engine,
            dispatch: DispatchConfig::default(),
            sweep_interval: Duration::from_secs(5),
            command_capacity: 1024,
        }
    }
}

/// Final counters of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    /// Ingestion and windowing counters.
    pub engine: EngineStats,
    /// Analysis and delivery counters.
    pub dispatch: DispatchStats,
}

impl PipelineSummary {
    /// JSON form, as printed at the end of a run.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "engine": self.engine.to_json(),
            "dispatch": self.dispatch,
        })
    }
}

/// The ingest loop: one task owns the windowing engine and feeds closed
/// windows to the dispatcher.
///
/// All session state is touched from this loop only. Analysis runs on the
/// dispatcher's workers, so a slow model never stalls ingestion.
pub struct Pipeline {
    engine: WindowingEngine,
    dispatcher: Dispatcher,
    commands: mpsc::Receiver<Command>,
    sweep_interval: Duration,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Pipeline {
    /// Builds a pipeline and the handle that feeds it.
    pub fn new(
        config: PipelineConfig,
        service: Option<Arc<dyn AnalysisService>>,
        sinks: SinkManager,
    ) -> (Self, PipelineHandle) {
        let (tx, commands) = mpsc::channel(config.command_capacity.max(1));
        let pipeline = Self {
            engine: WindowingEngine::new(config.engine),
            dispatcher: Dispatcher::new(service, sinks, config.dispatch),
            commands,
            sweep_interval: config.sweep_interval,
            shutdown: None,
        };
        (pipeline, PipelineHandle::new(tx))
    }

    /// Stops ingestion early once `shutdown` turns `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Live dispatch counters.
    pub fn monitor(&self) -> Arc<DispatchMonitor> {
        self.dispatcher.monitor()
    }

    /// Runs until input ends (every handle dropped or `close` called) or
    /// shutdown is signalled, then flushes every session and drains the
    /// dispatcher within its grace period.
    pub async fn run(mut self) -> PipelineSummary {
        info!(
            window_size_ms = self.engine.config().window_size().num_milliseconds(),
            idle_timeout_secs = self.engine.config().idle_timeout().map(|d| d.as_secs_f64()),
            "Pipeline started"
        );

        let sweeping = self.engine.config().idle_timeout().is_some();
        let mut sweep = tokio::time::interval(self.sweep_interval.max(Duration::from_millis(1)));
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        sweep.tick().await;

        let mut shutdown = self.shutdown.take();
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Close) | None => {
                        info!("Input closed");
                        break;
                    }
                    Some(command) => self.handle(command),
                },
                _ = sweep.tick(), if sweeping => self.sweep(),
                () = shutdown_requested(&mut shutdown) => {
                    info!("Shutdown requested, stopping ingestion");
                    break;
                }
            }
        }

        // Commands already accepted by a handle are still processed.
        self.commands.close();
        let mut drained = 0usize;
        while let Ok(command) = self.commands.try_recv() {
            drained += 1;
            self.handle(command);
        }
        if drained > 0 {
            info!(commands = drained, "Processed commands queued before close");
        }

        let remaining = self.engine.flush_all();
        info!(windows = remaining.len(), "Flushed remaining sessions");
        self.submit_all(remaining);

        let monitor = self.dispatcher.monitor();
        self.dispatcher.shutdown().await;

        let summary = PipelineSummary {
            engine: self.engine.stats().clone(),
            dispatch: monitor.snapshot().await,
        };
        info!(summary = %summary.to_json(), "Pipeline finished");
        summary
    }

    fn handle(&mut self, command: Command) {
        // Rejected events are already logged and counted by the engine.
        let windows = match command {
            Command::Ingest(raw) => self.engine.ingest_raw(raw).unwrap_or_default(),
            Command::IngestEvent(event) => self.engine.ingest(event).unwrap_or_default(),
            Command::Flush(session_id) => self.engine.flush(&session_id).into_iter().collect(),
            Command::FlushAll => self.engine.flush_all(),
            Command::Close => Vec::new(),
        };
        self.submit_all(windows);
    }

    fn sweep(&mut self) {
        let outcome = self.engine.sweep_idle(Instant::now());
        self.submit_all(outcome.windows);
        for session_id in &outcome.evicted {
            self.dispatcher.retire(session_id);
        }
    }

    fn submit_all(&mut self, windows: Vec<Window>) {
        for window in windows {
            self.dispatcher.submit(window);
        }
    }
}

async fn shutdown_requested(shutdown: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = shutdown {
        if rx.wait_for(|stop| *stop).await.is_ok() {
            return;
        }
        // Sender dropped without signalling: keep running.
    }
    std::future::pending::<()>().await;
}
