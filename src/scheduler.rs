//! Per-host queue registry and drain loops.
//!
//! The scheduler owns one FIFO queue and one running flag per host.
//! Requests to the same host execute strictly one at a time, in
//! submission order, with a computed pause between attempts; requests to
//! different hosts proceed independently. A host's drain loop is spawned
//! lazily on the first submission and parks itself once its queue runs
//! empty, to be reactivated by the next submission.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;
use tokio::time::sleep;

use crate::host::HostKey;
use crate::job::{FetchJob, Outcome};
use crate::queue::Queue;

/// Pause before a freshly activated host's first drain attempt.
/// Independent of the configured time between calls.
pub(crate) const STARTUP_DELAY: Duration = Duration::from_millis(100);

/// Queue and activity flag for one host.
///
/// Entries are created lazily on first submission and never removed, so
/// the registry grows with the number of distinct hosts contacted.
#[derive(Debug, Default)]
struct HostState {
    queue: Queue<FetchJob>,
    /// Whether a drain loop is currently active for this host
    running: bool,
}

/// Registry of per-host queues plus the drain loops that service them.
///
/// All registry state sits behind a single mutex which is never held
/// across an await point. It is only touched from [`Scheduler::submit`]
/// (enqueue, flag flip on activation) and from the owning host's drain
/// loop (dequeue, re-enqueue, flag flip on parking); per-host mutual
/// exclusion follows from the running flag.
#[derive(Debug)]
pub(crate) struct Scheduler {
    http: reqwest::Client,
    hosts: Mutex<HashMap<HostKey, HostState>>,
}

impl Scheduler {
    pub(crate) fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Enqueue a job on its host's queue and activate the host's drain
    /// loop if it is parked. Returns immediately; the job reports back
    /// through its reply channel once it settles.
    ///
    /// # Panics
    ///
    /// Panics if the registry mutex is poisoned.
    pub(crate) fn submit(self: &Arc<Self>, job: FetchJob) {
        let host = job.host().clone();
        let mut hosts = self.hosts.lock().unwrap();
        let state = hosts.entry(host.clone()).or_default();
        state.queue.enqueue(job);

        if !state.running {
            state.running = true;
            debug!("activating drain loop for host {host}");
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                sleep(STARTUP_DELAY).await;
                scheduler.drain(&host).await;
            });
        }
    }

    /// Drain one host's queue, one job per iteration, sleeping for the
    /// previously executed job's computed delay in between. Exits once
    /// the queue is empty; the host is reactivated by the next submit.
    async fn drain(&self, host: &HostKey) {
        loop {
            let mut job = {
                let mut hosts = self.hosts.lock().unwrap();
                // Entries are never removed, so the host is always present.
                let state = hosts.get_mut(host).expect("host state missing");
                match state.queue.dequeue() {
                    Some(job) => job,
                    None => {
                        state.running = false;
                        return;
                    }
                }
            };

            let outcome = job.execute(&self.http).await;
            let delay = job.retry_in();

            match outcome {
                Outcome::Success(response) => job.settle(Ok(response)),
                Outcome::Fatal(error) => job.settle(Err(error)),
                Outcome::Retry(response) => {
                    debug!(
                        "re-queueing request to {host} after status {}",
                        response.status()
                    );
                    // Back to the tail: the attempt count and throttle
                    // state travel with the job.
                    let mut hosts = self.hosts.lock().unwrap();
                    let state = hosts.get_mut(host).expect("host state missing");
                    state.queue.enqueue(job);
                }
            }

            {
                let mut hosts = self.hosts.lock().unwrap();
                let state = hosts.get_mut(host).expect("host state missing");
                if state.queue.is_empty() {
                    debug!("parking drain loop for host {host}");
                    state.running = false;
                    return;
                }
            }

            sleep(delay).await;
        }
    }
}
