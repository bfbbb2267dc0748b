//! Background loops driving the tracker.
//!
//! Each periodic responsibility runs on its own thread and sleeps between
//! ticks. Sleeping is a `recv_timeout` on a shutdown channel, so
//! [`Daemon::shutdown`] wakes every loop immediately instead of waiting out
//! the interval.

use crate::error::Result;
use crate::tracker::{Dispatcher, FlatSource, Tracker};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

/// Daemon configuration.
#[derive(Clone, Debug)]
pub struct DaemonConfig {
    /// Delay between reconciliation cycles.
    pub poll_interval: Duration,

    /// Delay between catalog refreshes.
    pub catalog_refresh_interval: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5 * 60),
            catalog_refresh_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Handle to the running loops. Dropping it stops them.
pub struct Daemon {
    /// Dropping the sender disconnects every loop's receiver.
    shutdown: Option<Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl Daemon {
    /// Start the catalog refresh and reconciliation loops.
    ///
    /// Both run their first tick immediately.
    pub fn spawn(
        config: DaemonConfig,
        tracker: Arc<Tracker>,
        source: Arc<dyn FlatSource>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self> {
        let (shutdown, signal) = bounded::<()>(0);
        let mut handles = Vec::with_capacity(2);

        {
            let tracker = Arc::clone(&tracker);
            let source = Arc::clone(&source);
            let dispatcher = Arc::clone(&dispatcher);
            let signal = signal.clone();
            handles.push(spawn_loop("catalog-refresh", config.catalog_refresh_interval, signal, move || {
                match tracker.refresh_catalog(source.as_ref(), dispatcher.as_ref()) {
                    Ok(added) if !added.is_empty() => info!(count = added.len(), "announced new complexes"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "catalog refresh failed"),
                }
            })?);
        }

        handles.push(spawn_loop("reconcile", config.poll_interval, signal, move || {
            let report = tracker.run_cycle(source.as_ref(), dispatcher.as_ref());
            info!(
                passes = report.passes.len(),
                failures = report.failures.len(),
                "reconciliation cycle done"
            );
        })?);

        Ok(Self {
            shutdown: Some(shutdown),
            handles,
        })
    }

    /// Stop every loop and wait for the current ticks to finish.
    pub fn shutdown(&mut self) {
        if self.shutdown.take().is_none() {
            return;
        }
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("daemon").to_string();
            if handle.join().is_err() {
                warn!(thread = %name, "loop panicked");
            }
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_loop<F>(name: &str, interval: Duration, signal: Receiver<()>, mut tick: F) -> Result<JoinHandle<()>>
where
    F: FnMut() + Send + 'static,
{
    let handle = thread::Builder::new().name(name.to_string()).spawn(move || loop {
        tick();
        match signal.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            // Disconnected (or an explicit message): stop.
            _ => break,
        }
    })?;
    Ok(handle)
}
