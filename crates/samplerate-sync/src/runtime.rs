//! Thread wiring for the sync service.
//!
//! - sync worker: owns the [`SyncEngine`], runs one cycle per batch of triggers
//! - ticker: raises a tick every poll interval
//! - device watcher: raises a device change whenever the default output identity changes
//!
//! Ticker and watcher only ever raise triggers, so slow log reads or device writes on the
//! worker never hold them up.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, select};

use crate::config::SyncConfig;
use crate::device::CapabilityProvider;
use crate::engine::{CycleOutcome, SyncEngine};
use crate::playback_log::PlaybackLogSource;
use crate::status::{RateDisplay, SyncStatus};
use crate::trigger::{TriggerQueue, TriggerSender};

/// Handle to the running sync threads.
pub struct SyncService {
    triggers: TriggerSender,
    shutdown_tx: Option<Sender<()>>,
    display: Arc<RateDisplay>,
    threads: Vec<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
    worker_done: Receiver<()>,
    shutdown_grace: Duration,
}

impl SyncService {
    /// Start the sync worker, ticker and device watcher.
    pub fn spawn<P, L>(provider: Arc<P>, log_source: L, config: &SyncConfig) -> Result<Self>
    where
        P: CapabilityProvider + 'static,
        L: PlaybackLogSource + 'static,
    {
        let display = RateDisplay::shared();
        let (triggers, queue) = TriggerQueue::new();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        let (done_tx, worker_done) = crossbeam_channel::bounded::<()>(0);

        // The watcher starts from the device id the engine holds.
        let mut engine = SyncEngine::new(provider.clone(), log_source, display.clone());
        engine.refresh_device();
        let initial_id = engine.device().map(|d| d.id.clone());

        let worker = std::thread::Builder::new()
            .name("sync-worker".to_string())
            .spawn(move || {
                let _done = done_tx;
                sync_worker_main(engine, queue)
            })
            .context("spawn sync worker")?;

        let mut threads = Vec::new();

        let ticker_triggers = triggers.clone();
        let ticker_shutdown = shutdown_rx.clone();
        let poll_interval = config.poll_interval;
        threads.push(
            std::thread::Builder::new()
                .name("sync-ticker".to_string())
                .spawn(move || ticker_main(poll_interval, ticker_triggers, ticker_shutdown))
                .context("spawn sync ticker")?,
        );

        let watcher_triggers = triggers.clone();
        let device_poll_interval = config.device_poll_interval;
        threads.push(
            std::thread::Builder::new()
                .name("device-watcher".to_string())
                .spawn(move || {
                    device_watcher_main(
                        provider,
                        initial_id,
                        device_poll_interval,
                        watcher_triggers,
                        shutdown_rx,
                    )
                })
                .context("spawn device watcher")?,
        );

        tracing::info!(
            poll_ms = config.poll_interval.as_millis() as u64,
            device_poll_ms = config.device_poll_interval.as_millis() as u64,
            "sample rate sync started"
        );

        Ok(Self {
            triggers,
            shutdown_tx: Some(shutdown_tx),
            display,
            threads,
            worker: Some(worker),
            worker_done,
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Published rate, readable from any thread.
    pub fn display(&self) -> Arc<RateDisplay> {
        self.display.clone()
    }

    /// Trigger handle, e.g. for forwarding OS device notifications.
    pub fn triggers(&self) -> TriggerSender {
        self.triggers.clone()
    }

    /// Stop all threads.
    ///
    /// The worker gets `shutdown_grace` to finish its current cycle; a worker stuck in a
    /// log read or device call past that is left behind.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shutdown_tx.take();
        self.triggers.shutdown();
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("sync").to_string();
            if handle.join().is_err() {
                tracing::warn!(thread = %name, "thread panicked during shutdown");
            }
        }

        let Some(worker) = self.worker.take() else {
            return;
        };
        match self.worker_done.recv_timeout(self.shutdown_grace) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    grace_ms = self.shutdown_grace.as_millis() as u64,
                    "sync worker still busy; abandoning in-flight cycle"
                );
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.join().is_err() {
                    tracing::warn!("sync worker panicked during shutdown");
                }
            }
        }
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn sync_worker_main<P, L>(mut engine: SyncEngine<P, L>, queue: TriggerQueue)
where
    P: CapabilityProvider,
    L: PlaybackLogSource,
{
    loop {
        let triggers = queue.wait();
        if triggers.shutdown {
            break;
        }
        let _busy = queue.busy();
        let outcome = if triggers.device_changed {
            engine.on_device_changed()
        } else {
            engine.run_cycle()
        };
        log_outcome(&outcome);
    }
    tracing::debug!("sync worker stopped");
}

fn log_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::AlreadySynced { rate_hz } => {
            tracing::trace!(rate_hz = *rate_hz, "device already at playback rate");
        }
        CycleOutcome::Failed(err) => tracing::debug!(error = %err, "sync cycle failed"),
        _ => {}
    }
}

fn ticker_main(interval: Duration, triggers: TriggerSender, shutdown: Receiver<()>) {
    let ticker = crossbeam_channel::tick(interval);
    loop {
        select! {
            recv(ticker) -> _ => {
                if !triggers.tick() {
                    tracing::trace!("tick skipped: sync cycle in flight");
                }
            }
            recv(shutdown) -> _ => break,
        }
    }
}

fn device_watcher_main<P>(
    provider: Arc<P>,
    initial_id: Option<String>,
    interval: Duration,
    triggers: TriggerSender,
    shutdown: Receiver<()>,
) where
    P: CapabilityProvider,
{
    let mut last = initial_id;
    let ticker = crossbeam_channel::tick(interval);
    loop {
        select! {
            recv(ticker) -> _ => match provider.default_device_id() {
                Ok(current) if current != last => {
                    tracing::info!(from = ?last, to = ?current, "default output device changed");
                    last = current;
                    triggers.device_changed();
                }
                Ok(_) => {}
                Err(err) => tracing::debug!(error = %err, "default device check failed"),
            },
            recv(shutdown) -> _ => break,
        }
    }
}

/// Poll the published rate and hand every change to `sink` until `stop` fires.
pub fn watch_display<F>(display: &RateDisplay, interval: Duration, stop: &Receiver<()>, mut sink: F)
where
    F: FnMut(&str),
{
    let ticker = crossbeam_channel::tick(interval);
    let mut last: Option<String> = None;
    loop {
        let text = display.text();
        if text.is_some() && text != last {
            if let Some(t) = text.as_deref() {
                sink(t);
            }
            last = text;
        }
        select! {
            recv(ticker) -> _ => {}
            recv(stop) -> _ => break,
        }
    }
}

/// Fetch the default device and run a single cycle.
pub fn run_once<P, L>(provider: Arc<P>, log_source: L) -> (CycleOutcome, SyncStatus)
where
    P: CapabilityProvider,
    L: PlaybackLogSource,
{
    let mut engine = SyncEngine::new(provider, log_source, RateDisplay::shared());
    engine.refresh_device();
    let outcome = engine.run_cycle();
    (outcome, engine.status())
}
