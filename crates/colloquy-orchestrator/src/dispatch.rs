use crate::monitor::DispatchMonitor;
use colloquy_analysis::AnalysisService;
use colloquy_channels::{SinkManager, WindowReport};
use colloquy_core::{AnalysisResult, FallbackReason, Window};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Dispatch timing.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound for one analysis call.
    pub timeout: Duration,
    /// How long shutdown waits for queued and in-flight analyses.
    pub grace: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            grace: Duration::from_secs(10),
        }
    }
}

struct Shared {
    service: Option<Arc<dyn AnalysisService>>,
    sinks: SinkManager,
    monitor: Arc<DispatchMonitor>,
    timeout: Duration,
}

/// Sends closed windows to the analysis service and their reports to the
/// sinks.
///
/// Each session gets one worker task fed by its own queue, so a session's
/// windows are analyzed and delivered in emission order while sessions
/// never wait on each other. Submitting never blocks the caller.
pub struct Dispatcher {
    shared: Arc<Shared>,
    grace: Duration,
    workers: HashMap<String, Worker>,
    /// Completion signals of retired workers that may still be draining.
    retiring: HashMap<String, oneshot::Receiver<()>>,
    tasks: JoinSet<()>,
    abandon: watch::Sender<bool>,
}

struct Worker {
    tx: mpsc::UnboundedSender<Window>,
    done: oneshot::Receiver<()>,
}

impl Dispatcher {
    /// `service: None` delivers every window with a `disabled` fallback.
    pub fn new(
        service: Option<Arc<dyn AnalysisService>>,
        sinks: SinkManager,
        config: DispatchConfig,
    ) -> Self {
        let (abandon, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                service,
                sinks,
                monitor: Arc::new(DispatchMonitor::new()),
                timeout: config.timeout,
            }),
            grace: config.grace,
            workers: HashMap::new(),
            retiring: HashMap::new(),
            tasks: JoinSet::new(),
            abandon,
        }
    }

    /// Shared dispatch counters.
    pub fn monitor(&self) -> Arc<DispatchMonitor> {
        Arc::clone(&self.shared.monitor)
    }

    /// Number of live session workers.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Analyzes and delivers one window on the caller's task, bypassing the
    /// session workers.
    pub async fn dispatch_now(&self, window: Window) -> AnalysisResult {
        self.shared.monitor.record_dispatched().await;
        process(&self.shared, window, self.abandon.subscribe()).await
    }

    /// Queues a window on its session's worker, spawning the worker on
    /// first use.
    pub fn submit(&mut self, window: Window) {
        let session_id = window.session_id().to_string();
        let window = match self.workers.get(&session_id) {
            Some(worker) => match worker.tx.send(window) {
                Ok(()) => return,
                // Worker gone; start a fresh one below.
                Err(mpsc::error::SendError(window)) => window,
            },
            None => window,
        };
        let worker = self.spawn_worker(&session_id);
        if worker.tx.send(window).is_err() {
            error!(session_id = %session_id, "Dispatch worker exited before its first window");
        }
        self.workers.insert(session_id, worker);
        self.reap();
    }

    /// Lets a session's worker finish its queue and exit.
    ///
    /// A worker started later for the same session waits for this one, so
    /// the session's reports keep their order.
    pub fn retire(&mut self, session_id: &str) {
        if let Some(worker) = self.workers.remove(session_id) {
            self.retiring.insert(session_id.to_string(), worker.done);
            debug!(session_id = %session_id, "Retired dispatch worker");
        }
        self.reap();
    }

    fn spawn_worker(&mut self, session_id: &str) -> Worker {
        let (tx, mut rx) = mpsc::unbounded_channel::<Window>();
        let (done_tx, done) = oneshot::channel();
        let predecessor = self.retiring.remove(session_id);
        let shared = Arc::clone(&self.shared);
        let abandon = self.abandon.subscribe();
        let session_id = session_id.to_string();
        self.tasks.spawn(async move {
            if let Some(predecessor) = predecessor {
                debug!(session_id = %session_id, "Waiting for retired dispatch worker");
                // Resolves on completion, or when the predecessor was aborted.
                let _ = predecessor.await;
            }
            debug!(session_id = %session_id, "Dispatch worker started");
            while let Some(window) = rx.recv().await {
                shared.monitor.record_dispatched().await;
                process(&shared, window, abandon.clone()).await;
            }
            debug!(session_id = %session_id, "Dispatch worker stopped");
            let _ = done_tx.send(());
        });
        Worker { tx, done }
    }

    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                error!(error = %e, "Dispatch worker crashed");
            }
        }
        self.retiring
            .retain(|_, done| matches!(done.try_recv(), Err(TryRecvError::Empty)));
    }

    /// Closes every session queue and waits for the workers.
    ///
    /// Workers get the grace period to drain. After that, pending analyses
    /// are abandoned: their windows are still delivered, marked
    /// `cancelled`. Workers still stuck after a second grace period (a
    /// blocked sink) are aborted.
    pub async fn shutdown(mut self) {
        self.workers.clear();
        self.retiring.clear();
        let pending = self.tasks.len();
        if pending > 0 {
            info!(
                workers = pending,
                grace_ms = self.grace.as_millis() as u64,
                "Draining dispatch workers"
            );
        }

        if tokio::time::timeout(self.grace, join_all(&mut self.tasks))
            .await
            .is_ok()
        {
            return;
        }

        warn!(
            workers = self.tasks.len(),
            "Shutdown grace expired, abandoning pending analyses"
        );
        self.abandon.send_replace(true);
        if tokio::time::timeout(self.grace, join_all(&mut self.tasks))
            .await
            .is_err()
        {
            error!(workers = self.tasks.len(), "Aborting stuck dispatch workers");
            self.tasks.abort_all();
            join_all(&mut self.tasks).await;
        }
    }
}

async fn join_all(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            if !e.is_cancelled() {
                error!(error = %e, "Dispatch worker crashed");
            }
        }
    }
}

async fn process(
    shared: &Shared,
    window: Window,
    abandon: watch::Receiver<bool>,
) -> AnalysisResult {
    let result = analyze(shared, &window, abandon).await;
    if let Some(reason) = result.fallback_reason() {
        warn!(
            session_id = %window.session_id(),
            sequence = window.sequence(),
            reason = %reason,
            "Delivering window without analysis"
        );
    } else {
        info!(
            session_id = %window.session_id(),
            sequence = window.sequence(),
            "Window analyzed"
        );
    }

    let report = WindowReport::new(window, result);
    let errors = shared.sinks.broadcast(&report).await;
    shared.monitor.record_delivery(&report.analysis, errors.len()).await;
    report.analysis
}

async fn analyze(
    shared: &Shared,
    window: &Window,
    mut abandon: watch::Receiver<bool>,
) -> AnalysisResult {
    let Some(service) = &shared.service else {
        return AnalysisResult::unavailable(FallbackReason::Disabled);
    };
    if *abandon.borrow() {
        return AnalysisResult::unavailable(FallbackReason::Cancelled);
    }

    tokio::select! {
        biased;
        () = abandoned(&mut abandon) => AnalysisResult::unavailable(FallbackReason::Cancelled),
        outcome = tokio::time::timeout(shared.timeout, service.analyze(window)) => match outcome {
            Ok(Ok(analysis)) => AnalysisResult::Analyzed(analysis),
            Ok(Err(e)) => {
                debug!(session_id = %window.session_id(), error = %e, "Analysis failed");
                AnalysisResult::unavailable(FallbackReason::from_error(&e))
            }
            Err(_) => AnalysisResult::unavailable(FallbackReason::Timeout),
        },
    }
}

async fn abandoned(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|abandon| *abandon).await.is_err() {
        std::future::pending::<()>().await;
    }
}
