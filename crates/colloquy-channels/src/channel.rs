use crate::sink::{Sink, WindowReport};
use async_trait::async_trait;
use colloquy_core::{ColloquyError, ColloquyResult};
use tokio::sync::mpsc;

/// Forwards reports to an in-process receiver.
///
/// Delivery waits when the channel is full, so a slow consumer slows the
/// dispatch worker of the session being reported, not ingestion.
pub struct ChannelSink {
    tx: mpsc::Sender<WindowReport>,
}

impl ChannelSink {
    /// Creates the sink and the receiving end of its queue.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<WindowReport>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Sink for ChannelSink {
    fn name(&self) -> &str {
        "channel"
    }

    async fn deliver(&self, report: &WindowReport) -> ColloquyResult<()> {
        self.tx
            .send(report.clone())
            .await
            .map_err(|_| ColloquyError::Sink("report receiver dropped".into()))
    }
}
