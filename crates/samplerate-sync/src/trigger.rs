//! Fan-in of sync triggers into the single sync worker.
//!
//! Producers (ticker, device watcher, shutdown) set a bit in a shared pending word and
//! post a wake-up into a one-slot channel. A wake-up that is already queued absorbs new
//! ones, so any number of triggers raised during a cycle collapse into one follow-up run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};

const TICK: u8 = 1 << 0;
const DEVICE_CHANGED: u8 = 1 << 1;
const SHUTDOWN: u8 = 1 << 2;

/// Triggers collected since the worker last woke up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Triggers {
    pub tick: bool,
    pub device_changed: bool,
    pub shutdown: bool,
}

impl Triggers {
    fn from_bits(bits: u8) -> Self {
        Self {
            tick: bits & TICK != 0,
            device_changed: bits & DEVICE_CHANGED != 0,
            shutdown: bits & SHUTDOWN != 0,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    pending: AtomicU8,
    busy: AtomicBool,
}

/// Producer side, cloned into every trigger source.
#[derive(Clone, Debug)]
pub struct TriggerSender {
    shared: Arc<Shared>,
    wake_tx: Sender<()>,
}

impl TriggerSender {
    /// Request a periodic sync. Dropped while a cycle is running; returns `false` then.
    pub fn tick(&self) -> bool {
        if self.shared.busy.load(Ordering::Acquire) {
            return false;
        }
        self.raise(TICK);
        true
    }

    /// Report that the default output device changed.
    pub fn device_changed(&self) {
        self.raise(DEVICE_CHANGED);
    }

    /// Ask the worker to stop once its current cycle is done.
    pub fn shutdown(&self) {
        self.raise(SHUTDOWN);
    }

    fn raise(&self, flag: u8) {
        self.shared.pending.fetch_or(flag, Ordering::AcqRel);
        match self.wake_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::trace!("trigger raised after sync worker exited");
            }
        }
    }
}

/// Consumer side, owned by the sync worker.
#[derive(Debug)]
pub struct TriggerQueue {
    shared: Arc<Shared>,
    wake_rx: Receiver<()>,
}

impl TriggerQueue {
    pub fn new() -> (TriggerSender, TriggerQueue) {
        let shared = Arc::new(Shared::default());
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        (
            TriggerSender {
                shared: shared.clone(),
                wake_tx,
            },
            TriggerQueue { shared, wake_rx },
        )
    }

    /// Block until at least one trigger is pending and take all of them.
    ///
    /// Reports `shutdown` once every sender is gone.
    pub fn wait(&self) -> Triggers {
        loop {
            if let Some(triggers) = self.try_take() {
                return triggers;
            }
            if self.wake_rx.recv().is_err() {
                return Triggers {
                    shutdown: true,
                    ..Triggers::default()
                };
            }
        }
    }

    /// Take pending triggers without blocking.
    pub fn try_take(&self) -> Option<Triggers> {
        let bits = self.shared.pending.swap(0, Ordering::AcqRel);
        (bits != 0).then(|| Triggers::from_bits(bits))
    }

    /// Mark a cycle as in flight until the guard drops. Ticks are skipped meanwhile.
    pub fn busy(&self) -> BusyGuard<'_> {
        self.shared.busy.store(true, Ordering::Release);
        BusyGuard { shared: &self.shared }
    }
}

pub struct BusyGuard<'a> {
    shared: &'a Shared,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.shared.busy.store(false, Ordering::Release);
    }
}
