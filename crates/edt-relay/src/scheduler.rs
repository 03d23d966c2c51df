//! Scheduled execution
//!
//! The [`Scheduler`] fires on a cron schedule. Every tick rewrites the
//! heartbeat file first, then starts a run on a blocking thread unless the
//! previous run is still going. Run exclusion is owned here through
//! [`RunLock`]; the pipeline itself assumes a single caller.

use chrono::Local;
use cron::Schedule;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::constants::HEARTBEAT_CONTENT;
use crate::pipeline::RunOutcome;
use crate::relay::Relay;

/// A unit of work the scheduler can start
pub trait RunJob: Send + Sync + 'static {
    /// Execute one run to completion. Called on a blocking thread.
    fn run(&self) -> RunOutcome;
}

impl RunJob for Relay {
    fn run(&self) -> RunOutcome {
        self.run_once()
    }
}

/// "A run is in progress" flag
#[derive(Debug, Clone, Default)]
pub struct RunLock {
    running: Arc<AtomicBool>,
}

impl RunLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock unless a run already holds it
    pub fn try_acquire(&self) -> Option<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                running: Arc::clone(&self.running),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Releases the [`RunLock`] when dropped, including on panic
#[derive(Debug)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// What a single tick did
#[derive(Debug)]
pub enum Tick {
    /// A run was started
    Started(JoinHandle<RunOutcome>),
    /// The previous run is still in progress
    Busy,
    /// The heartbeat could not be written; nothing was started
    HeartbeatFailed,
}

pub struct Scheduler<J: RunJob> {
    job: Arc<J>,
    schedule: Schedule,
    heartbeat: PathBuf,
    lock: RunLock,
}

impl<J: RunJob> Scheduler<J> {
    pub fn new(job: J, schedule: Schedule, heartbeat: impl Into<PathBuf>) -> Self {
        Self {
            job: Arc::new(job),
            schedule,
            heartbeat: heartbeat.into(),
            lock: RunLock::new(),
        }
    }

    pub fn lock(&self) -> &RunLock {
        &self.lock
    }

    /// Write the heartbeat and start a run if none is in progress
    pub async fn tick(&self) -> Tick {
        if let Err(e) = tokio::fs::write(&self.heartbeat, HEARTBEAT_CONTENT).await {
            error!(
                path = %self.heartbeat.display(),
                error = %e,
                "failed to write heartbeat file"
            );
            return Tick::HeartbeatFailed;
        }

        let Some(guard) = self.lock.try_acquire() else {
            info!("download process remains...");
            return Tick::Busy;
        };

        let job = Arc::clone(&self.job);
        Tick::Started(tokio::task::spawn_blocking(move || {
            let _guard = guard;
            job.run()
        }))
    }

    /// Tick on schedule until `shutdown` resolves, then wait for the run in
    /// progress, if any
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut in_flight: Option<JoinHandle<RunOutcome>> = None;

        loop {
            let Some(next) = self.schedule.upcoming(Local).next() else {
                warn!("schedule has no upcoming fire time, stopping");
                break;
            };
            let delay = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {
                    if let Tick::Started(handle) = self.tick().await {
                        in_flight = Some(handle);
                    }
                }
            }
        }

        if let Some(handle) = in_flight {
            if !handle.is_finished() {
                info!("waiting for the current run to finish");
            }
            if let Err(e) = handle.await {
                error!(error = %e, "run terminated abnormally");
            }
        }
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc::{channel, Receiver, Sender};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use uuid::Uuid;

    /// Job that blocks until released through its channel
    struct Gated {
        release: Mutex<Receiver<()>>,
        runs: AtomicUsize,
    }

    impl Gated {
        fn new() -> (Self, Sender<()>) {
            let (tx, rx) = channel();
            let job = Self {
                release: Mutex::new(rx),
                runs: AtomicUsize::new(0),
            };
            (job, tx)
        }
    }

    impl RunJob for Gated {
        fn run(&self) -> RunOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let _ = self.release.lock().unwrap().recv();
            RunOutcome {
                run_id: Uuid::new_v4(),
                records: Vec::new(),
                error: None,
            }
        }
    }

    fn every_second() -> Schedule {
        Schedule::from_str("* * * * * *").unwrap()
    }

    #[test]
    fn test_run_lock_is_exclusive_and_released_on_drop() {
        let lock = RunLock::new();
        let guard = lock.try_acquire().unwrap();
        assert!(lock.is_running());
        assert!(lock.try_acquire().is_none());

        drop(guard);
        assert!(!lock.is_running());
        assert!(lock.try_acquire().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tick_skips_while_a_run_is_in_progress() {
        let dir = TempDir::new().unwrap();
        let heartbeat = dir.path().join("alive.txt");
        let (job, release) = Gated::new();
        let scheduler = Scheduler::new(job, every_second(), &heartbeat);

        let Tick::Started(first) = scheduler.tick().await else {
            panic!("first tick should start a run");
        };
        assert!(matches!(scheduler.tick().await, Tick::Busy));
        assert_eq!(std::fs::read_to_string(&heartbeat).unwrap(), "alive\n");

        release.send(()).unwrap();
        first.await.unwrap();
        assert!(!scheduler.lock().is_running());

        let Tick::Started(second) = scheduler.tick().await else {
            panic!("tick after completion should start a run");
        };
        release.send(()).unwrap();
        second.await.unwrap();
        assert_eq!(scheduler.job.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_heartbeat_failure_prevents_the_run() {
        let dir = TempDir::new().unwrap();
        let heartbeat = dir.path().join("missing").join("alive.txt");
        let (job, _release) = Gated::new();
        let scheduler = Scheduler::new(job, every_second(), heartbeat);

        assert!(matches!(scheduler.tick().await, Tick::HeartbeatFailed));
        assert!(!scheduler.lock().is_running());
        assert_eq!(scheduler.job.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_until_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let (job, release) = Gated::new();
        let scheduler = Scheduler::new(job, every_second(), dir.path().join("alive.txt"));
        drop(release);

        tokio::time::timeout(
            Duration::from_secs(5),
            scheduler.run_until(tokio::time::sleep(Duration::from_millis(1500))),
        )
        .await
        .unwrap();

        assert!(dir.path().join("alive.txt").exists());
    }
}
