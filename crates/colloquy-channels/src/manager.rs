use crate::sink::{Sink, WindowReport};
use colloquy_core::ColloquyError;

/// Delivers each report to every registered sink, in registration order.
pub struct SinkManager {
    sinks: Vec<Box<dyn Sink>>,
}

impl SinkManager {
    /// Creates a manager without sinks.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink to the manager.
    pub fn add_sink(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    /// Builder-style [`add_sink`](Self::add_sink).
    pub fn with_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.add_sink(sink);
        self
    }

    /// Deliver a report to all sinks.
    /// A failing sink does not stop delivery to the others; errors are
    /// collected and returned together.
    pub async fn broadcast(&self, report: &WindowReport) -> Vec<ColloquyError> {
        let mut errors = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(report).await {
                tracing::warn!(
                    sink = sink.name(),
                    session_id = %report.window.session_id(),
                    error = %e,
                    "Report delivery failed"
                );
                errors.push(e);
            }
        }
        errors
    }

    /// Names of the registered sinks, in registration order.
    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// `true` when no sink is registered.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Default for SinkManager {
    fn default() -> Self {
        Self::new()
    }
}
