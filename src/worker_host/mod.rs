//! Supervised worker host — owns N long-running jobs, starts them once,
//! propagates cancellation, and waits for all to drain.
//!
//! Grounded on the teacher's `kernel/jobs/manager.rs` job-registration shape
//! and the original Go `PrimeWorker` (`monitor/cli/pkg/worker/worker.go`):
//! one task per registered job, a shared cancellation signal, and
//! mutex-guarded live/completed bookkeeping.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A unit of work that runs until it returns or observes cancellation.
pub type Job = Box<dyn FnOnce(CancellationToken) -> BoxFuture + Send>;
type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Registered {
    id: String,
    job: Job,
}

#[derive(Default)]
struct Bookkeeping {
    live: Vec<String>,
    completed: Vec<String>,
}

/// Owns a set of long-running jobs, starts them once, and waits for all of
/// them to observe cancellation and return.
pub struct WorkerHost {
    root_token: CancellationToken,
    pending: Mutex<Vec<Registered>>,
    books: Arc<Mutex<Bookkeeping>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    running: Mutex<bool>,
}

impl Default for WorkerHost {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerHost {
    pub fn new() -> Self {
        Self {
            root_token: CancellationToken::new(),
            pending: Mutex::new(Vec::new()),
            books: Arc::new(Mutex::new(Bookkeeping::default())),
            handles: Mutex::new(Vec::new()),
            running: Mutex::new(false),
        }
    }

    /// Register a job. Only valid before `start()`; jobs registered after a
    /// successful `start()` are ignored — the host only accepts new
    /// registrations in its "not running" state, matching §4.1's
    /// "Registration is only valid before `start`".
    pub async fn register<F, Fut>(&self, id: impl Into<String>, job: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = id.into();
        if *self.running.lock().await {
            warn!(job_id = %id, "ignoring job registration while host is running");
            return;
        }
        let boxed: Job = Box::new(move |token| Box::pin(job(token)));
        self.pending.lock().await.push(Registered { id, job: boxed });
    }

    /// Idempotent: a second call while running is rejected and logged; the
    /// first call spawns every registered job in parallel, each isolated so
    /// one job's exit never cancels the others.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if *running {
            warn!("worker host start() called while already running");
            return;
        }
        *running = true;
        drop(running);

        let mut pending = self.pending.lock().await;
        let jobs: Vec<Registered> = pending.drain(..).collect();
        drop(pending);

        {
            let mut books = self.books.lock().await;
            books.live = jobs.iter().map(|j| j.id.clone()).collect();
        }

        let mut handles = self.handles.lock().await;
        for registered in jobs {
            let token = self.root_token.child_token();
            let books = self.books.clone();
            let id = registered.id.clone();
            let job = registered.job;

            let handle = tokio::spawn(async move {
                info!(job_id = %id, "job started");
                job(token).await;
                info!(job_id = %id, "job exited");

                let mut books = books.lock().await;
                books.live.retain(|live_id| live_id != &id);
                books.completed.push(id);
            });
            handles.push(handle);
        }
    }

    /// Cancels the root context; returns only after every job observes the
    /// signal and exits.
    pub async fn shutdown(&self) {
        self.root_token.cancel();
        self.wait().await;
        *self.running.lock().await = false;
    }

    /// Blocks until all jobs have completed, whether by cancellation or by
    /// returning on their own.
    pub async fn wait(&self) {
        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
    }

    /// IDs of jobs that have returned (normally or via cancellation).
    pub async fn completed_jobs(&self) -> Vec<String> {
        self.books.lock().await.completed.clone()
    }

    /// IDs of jobs still live.
    pub async fn live_jobs(&self) -> Vec<String> {
        self.books.lock().await.live.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn runs_jobs_and_tracks_completion() {
        let host = WorkerHost::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for i in 0..3 {
            let counter = counter.clone();
            host.register(format!("job-{i}"), move |_token| async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        }

        host.start().await;
        host.wait().await;

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        let mut completed = host.completed_jobs().await;
        completed.sort();
        assert_eq!(completed, vec!["job-0", "job-1", "job-2"]);
        assert!(host.live_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn start_is_idempotent_while_running() {
        let host = Arc::new(WorkerHost::new());
        host.register("slow", |token| async move {
            token.cancelled().await;
        })
        .await;

        host.start().await;
        assert!(host.is_running().await);
        // Second start() while running must not panic or double-spawn.
        host.start().await;

        host.shutdown().await;
        assert!(!host.is_running().await);
    }

    #[tokio::test]
    async fn shutdown_cancels_outstanding_jobs() {
        let host = WorkerHost::new();
        let observed_cancel = Arc::new(AtomicUsize::new(0));
        let observed = observed_cancel.clone();

        host.register("cancellable", move |token| async move {
            token.cancelled().await;
            observed.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        host.start().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        host.shutdown().await;

        assert_eq!(observed_cancel.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_job_exiting_does_not_cancel_others() {
        let host = WorkerHost::new();
        let long_job_seen_cancel = Arc::new(AtomicUsize::new(0));
        let seen = long_job_seen_cancel.clone();

        host.register("short", |_token| async move {}).await;
        host.register("long", move |token| {
            let seen = seen.clone();
            async move {
                tokio::select! {
                    _ = token.cancelled() => { seen.fetch_add(1, Ordering::SeqCst); }
                    _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                }
            }
        })
        .await;

        host.start().await;
        host.wait().await;

        assert_eq!(long_job_seen_cancel.load(Ordering::SeqCst), 0);
    }
}
