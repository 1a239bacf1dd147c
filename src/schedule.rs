use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, bounded, select, tick};
use tracing::{debug, error, info, warn};

use crate::service::Service;

/// How often the timer thread wakes up to compare elapsed time with the
/// configured interval.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Handle to the background timer thread.
#[derive(Debug)]
pub struct Scheduler {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn spawn(service: Arc<Service>) -> std::io::Result<Self> {
        Self::spawn_with_tick(service, DEFAULT_TICK)
    }

    /// Start the timer thread. The first scheduled cycle happens one full
    /// interval after start.
    pub fn spawn_with_tick(service: Arc<Service>, period: Duration) -> std::io::Result<Self> {
        let (stop, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("wallflow-timer".into())
            .spawn(move || {
                let ticker = tick(period);
                let mut last_run = Instant::now();
                loop {
                    let stopping = select! {
                        recv(stop_rx) -> _ => true,
                        recv(ticker) -> _ => false,
                    };
                    if stopping {
                        info!("timer stopping");
                        break;
                    }
                    if let Err(err) = service.reload_config_if_modified() {
                        warn!(error = %format!("{err:#}"), "could not reload config");
                    }
                    let interval = service.config().change_interval();
                    let now = Instant::now();
                    if is_due(last_run, now, interval) {
                        info!("scheduled wallpaper cycle");
                        if let Err(err) = service.cycle_all() {
                            error!(error = %format!("{err:#}"), "scheduled cycle failed");
                        }
                        last_run = now;
                    }
                }
            })?;
        debug!("timer thread started");
        Ok(Self { stop, handle })
    }

    /// Block until the thread exits on its own (it only does so if it panics).
    pub fn wait(self) {
        if self.handle.join().is_err() {
            error!("timer thread panicked");
        }
    }

    /// Ask the thread to stop and wait for the cycle in flight, if any.
    pub fn stop(self) {
        if self.stop.send(()).is_err() {
            debug!("timer thread already gone");
        }
        if self.handle.join().is_err() {
            error!("timer thread panicked");
        }
    }
}

/// Whether a cycle is due, judged by elapsed time rather than tick count.
pub fn is_due(last_run: Instant, now: Instant, interval: Duration) -> bool {
    now.saturating_duration_since(last_run) >= interval
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_after_interval_elapses() {
        let start = Instant::now();
        let interval = Duration::from_secs(300);
        assert!(!is_due(start, start + Duration::from_secs(299), interval));
        assert!(is_due(start, start + Duration::from_secs(300), interval));
        assert!(is_due(start, start + Duration::from_secs(4000), interval));
    }

    #[test]
    fn clock_going_backwards_is_not_due() {
        let start = Instant::now() + Duration::from_secs(10);
        assert!(!is_due(start, Instant::now(), Duration::from_secs(1)));
    }
}
