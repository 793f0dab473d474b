use crate::forwarder::connector::Connector;
use crate::prelude::{DoaError, DoaResult};
use log::{debug, error, warn};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Pause between a failed connect or send and the next attempt.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Single background worker draining a queue onto one persistent stream.
///
/// The queue exists before the worker starts, so `enqueue` never waits on
/// initialisation. A line is retried on a fresh connection until it has been
/// written; it is never dropped because the link failed.
pub struct QueuedForwarder {
    sender: mpsc::UnboundedSender<String>,
    pending: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

impl QueuedForwarder {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn<C: Connector>(connector: C, backoff: Duration) -> Self {
        let (sender, queue) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(run_worker(connector, queue, backoff, Arc::clone(&pending)));
        Self {
            sender,
            pending,
            worker,
        }
    }

    /// Hands a line to the worker and returns immediately.
    pub fn enqueue(&self, line: String) -> DoaResult<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.sender.send(line).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(DoaError::ForwarderClosed);
        }
        Ok(())
    }

    /// Lines accepted but not yet written.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Closes the queue and lets the worker flush what is left, up to
    /// `deadline`.
    pub async fn shutdown(self, deadline: Duration) -> DoaResult<()> {
        let QueuedForwarder {
            sender,
            pending,
            mut worker,
        } = self;
        drop(sender);

        match timeout(deadline, &mut worker).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                error!("forwarder worker failed: {}", err);
                Ok(())
            }
            Err(_) => {
                worker.abort();
                Err(DoaError::DrainTimeout {
                    pending: pending.load(Ordering::Acquire),
                })
            }
        }
    }
}

async fn run_worker<C: Connector>(
    connector: C,
    mut queue: mpsc::UnboundedReceiver<String>,
    backoff: Duration,
    pending: Arc<AtomicUsize>,
) {
    let mut link: Option<C::Stream> = None;
    while let Some(line) = queue.recv().await {
        let mut frame = line.into_bytes();
        frame.push(b'\n');
        deliver(&connector, &mut link, &frame, backoff).await;
        pending.fetch_sub(1, Ordering::AcqRel);
    }
    debug!("forwarder queue closed, worker exiting");
}

async fn deliver<C: Connector>(
    connector: &C,
    link: &mut Option<C::Stream>,
    frame: &[u8],
    backoff: Duration,
) {
    loop {
        if link.is_none() {
            match connector.connect().await {
                Ok(stream) => {
                    debug!("forwarder connected");
                    *link = Some(stream);
                }
                Err(err) => {
                    warn!("forwarder connect failed: {}; retrying in {:?}", err, backoff);
                    sleep(backoff).await;
                    continue;
                }
            }
        }

        let Some(stream) = link.as_mut() else {
            continue;
        };
        match write_frame(stream, frame).await {
            Ok(()) => return,
            Err(err) => {
                warn!("forwarder send failed: {}; reconnecting in {:?}", err, backoff);
                *link = None;
                sleep(backoff).await;
            }
        }
    }
}

async fn write_frame<S: AsyncWrite + Unpin>(stream: &mut S, frame: &[u8]) -> io::Result<()> {
    stream.write_all(frame).await?;
    stream.flush().await
}
