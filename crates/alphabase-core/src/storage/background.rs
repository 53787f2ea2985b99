//! Background maintenance: periodic expiry sweeps and deferred flushes.
//!
//! The thread holds only a weak reference to the store, so it never keeps a
//! store alive. It exits when told to stop or when the store is gone.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::store::Inner;
use super::types::WriteMode;
use crate::error::{AlphaError, Result};

const MIN_TICK: Duration = Duration::from_millis(5);
const FLUSH_TICKS_PER_WINDOW: u32 = 4;

pub(crate) struct Maintenance {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl Maintenance {
    /// Start the thread if there is anything to do; `None` otherwise.
    pub(crate) fn start(
        inner: &Arc<Inner>,
        sweep_interval: Option<Duration>,
        write_mode: WriteMode,
    ) -> Result<Option<Self>> {
        let flush_window = match write_mode {
            WriteMode::Deferred(window) => Some(window),
            WriteMode::Immediate => None,
        };
        let Some(tick) = tick_for(sweep_interval, flush_window) else {
            return Ok(None);
        };

        let weak = Arc::downgrade(inner);
        let (shutdown, receiver) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("alphabase-maintenance".to_string())
            .spawn(move || run(weak, receiver, tick, sweep_interval))
            .map_err(|e| {
                AlphaError::Storage(format!("Failed to start maintenance thread: {}", e))
            })?;
        debug!(?tick, ?sweep_interval, ?flush_window, "maintenance thread started");

        Ok(Some(Self { shutdown, handle }))
    }

    pub(crate) fn stop(self) {
        let _ = self.shutdown.send(());
        if self.handle.join().is_err() {
            warn!("maintenance thread panicked");
        }
    }
}

/// Wake-up period for the maintenance thread.
///
/// A deferred write becomes due one window after the first unsaved change
/// and is picked up at the next tick, so it lands within 1.25 windows.
fn tick_for(sweep_interval: Option<Duration>, flush_window: Option<Duration>) -> Option<Duration> {
    let tick = match (sweep_interval, flush_window) {
        (None, None) => return None,
        (Some(sweep), None) => sweep,
        (None, Some(window)) => window / FLUSH_TICKS_PER_WINDOW,
        (Some(sweep), Some(window)) => sweep.min(window / FLUSH_TICKS_PER_WINDOW),
    };
    Some(tick.max(MIN_TICK))
}

fn run(
    inner: Weak<Inner>,
    shutdown: Receiver<()>,
    tick: Duration,
    sweep_interval: Option<Duration>,
) {
    let mut last_sweep = Instant::now();
    loop {
        match shutdown.recv_timeout(tick) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };

        if let Some(interval) = sweep_interval {
            if last_sweep.elapsed() >= interval {
                last_sweep = Instant::now();
                if let Err(err) = inner.sweep() {
                    warn!(error = %err, "background sweep failed");
                }
            }
        }
        if let Err(err) = inner.flush_if_due() {
            warn!(error = %err, "deferred flush failed; will retry");
        }
    }
    debug!("maintenance thread stopped");
}
