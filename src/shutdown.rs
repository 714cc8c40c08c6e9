use std::time::Duration;

use tokio::sync::watch;
use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::models::StopReason;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Single-fire stop signal shared by the orchestrator, the workers and the
/// termination triggers.
///
/// The first [`trigger`](StopLatch::trigger) wins; later calls are ignored, so
/// whichever path ends the run decides the [`StopReason`].
#[derive(Debug, Clone)]
pub struct StopLatch {
    tx: watch::Sender<Option<StopReason>>,
}

impl Default for StopLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl StopLatch {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Fire the latch. Returns `true` only for the call that actually fired it.
    pub fn trigger(&self, reason: StopReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.tx.borrow()
    }

    pub fn is_triggered(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once the latch has fired, immediately if it already has.
    pub async fn triggered(&self) -> StopReason {
        let mut rx = self.tx.subscribe();
        let reason = rx.wait_for(Option::is_some).await.ok().and_then(|reason| *reason);
        match reason {
            Some(reason) => reason,
            // The sender lives in `self`, so the channel cannot close while we wait.
            None => std::future::pending().await,
        }
    }
}

/// Fire the latch with [`StopReason::DeadlineElapsed`] once `limit` has passed.
pub fn setup_deadline(latch: &StopLatch, limit: Duration) -> tokio::task::JoinHandle<()> {
    let latch = latch.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = latch.triggered() => {}
            () = tokio::time::sleep(limit) => {
                if latch.trigger(StopReason::DeadlineElapsed) {
                    debug!(limit_ms = limit.as_millis() as u64, "duration limit elapsed");
                }
            }
        }
    })
}

/// Exit status for a run cut short by a second interrupt (128 + SIGINT)
const FORCED_EXIT_CODE: i32 = 130;

/// Fire the latch with [`StopReason::Interrupted`] on Ctrl+C (and SIGTERM on unix).
///
/// The listener lives as long as the runtime. An interrupt that arrives once
/// the latch has fired, for example while the report is being written, exits
/// the process right away.
pub fn setup_signal_handler(latch: &StopLatch) {
    let latch = latch.clone();
    tokio::spawn(async move {
        let interrupts = std::pin::pin!(interrupts());
        relay_interrupts(&latch, interrupts, || {
            warn!("interrupted again, exiting without a report");
            std::process::exit(FORCED_EXIT_CODE);
        })
        .await;
    });
}

/// Trigger `latch` on the first interrupt and run `escalate` on any interrupt
/// that finds the latch already fired.
async fn relay_interrupts<S, F>(latch: &StopLatch, mut interrupts: S, escalate: F)
where
    S: Stream<Item = ()> + Unpin,
    F: FnOnce(),
{
    while interrupts.next().await.is_some() {
        if latch.trigger(StopReason::Interrupted) {
            info!("interrupted, stopping clients (interrupt again to exit immediately)");
        } else {
            escalate();
            return;
        }
    }
}

/// Every Ctrl+C, plus SIGTERM on unix
fn interrupts() -> impl Stream<Item = ()> {
    #[cfg(unix)]
    let term_signal = match signal(SignalKind::terminate()) {
        Ok(signal) => Some(signal),
        Err(err) => {
            warn!("failed to register SIGTERM handler: {}", err);
            None
        }
    };
    #[cfg(not(unix))]
    let term_signal: Option<()> = None;

    stream::unfold(term_signal, |mut term_signal| async move {
        let received = next_interrupt(&mut term_signal).await;
        received.then_some(((), term_signal))
    })
}

#[cfg(unix)]
async fn next_interrupt(term_signal: &mut Option<tokio::signal::unix::Signal>) -> bool {
    match term_signal.as_mut() {
        Some(term) => tokio::select! {
            result = tokio::signal::ctrl_c() => result.is_ok(),
            received = term.recv() => received.is_some(),
        },
        None => tokio::signal::ctrl_c().await.is_ok(),
    }
}

#[cfg(not(unix))]
async fn next_interrupt(_term_signal: &mut Option<()>) -> bool {
    tokio::signal::ctrl_c().await.is_ok()
}
