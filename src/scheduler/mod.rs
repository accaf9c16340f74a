//! Fixed-interval job dispatcher with pre/post lifecycle hooks.
//!
//! Grounded on the original Go `PrimeScheduler`
//! (`monitor/lib/cron/jobs.go`), which wraps interval jobs with named tasks
//! and fires a healthcheck callback once a tick's probes are aggregated.
//! The teacher depends on `tokio-cron-scheduler` for its own background
//! tasks (`kernel/scheduled_tasks.rs`); this module uses
//! `tokio::time::interval` directly since the spec calls for fixed-interval
//! dispatch rather than calendar (cron) rules.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::healthcheck::{AccumulatedHealthCheck, HealthCheckEngine, HealthCheckOptions};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Lifecycle hooks fired around each scheduled job execution.
pub trait SchedulerHooks: Send + Sync {
    fn pre_run(&self, _id: &str, _name: &str) {}
    fn post_run(&self, _id: &str, _name: &str) {}
    fn post_run_err(&self, _id: &str, _name: &str, _err: &str) {}
}

/// Default hooks that only log; callers can supply their own `SchedulerHooks`
/// impl to integrate with metrics or other observability backends.
pub struct LoggingHooks;

impl SchedulerHooks for LoggingHooks {
    fn pre_run(&self, id: &str, name: &str) {
        info!(job_id = %id, job_name = %name, "scheduled job starting");
    }

    fn post_run(&self, id: &str, name: &str) {
        info!(job_id = %id, job_name = %name, "scheduled job finished");
    }

    fn post_run_err(&self, id: &str, name: &str, err: &str) {
        error!(job_id = %id, job_name = %name, error = %err, "scheduled job failed");
    }
}

type RunFn = Arc<dyn Fn(CancellationToken) -> BoxFuture<Result<(), String>> + Send + Sync>;

struct ScheduledJob {
    id: String,
    name: String,
    interval: Duration,
    run: RunFn,
}

/// Interval-based job dispatcher. Register jobs before calling `start()` or
/// `start_blocking()`.
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    hooks: Arc<dyn SchedulerHooks>,
}

impl Scheduler {
    pub fn new(hooks: Arc<dyn SchedulerHooks>) -> Self {
        Self {
            jobs: Vec::new(),
            hooks,
        }
    }

    /// On each tick, run the health-check engine to completion and pass the
    /// aggregated result to `callback`.
    pub fn register_health_check<F>(
        &mut self,
        interval: Duration,
        engine: Arc<HealthCheckEngine>,
        options: HealthCheckOptions,
        callback: F,
    ) where
        F: Fn(AccumulatedHealthCheck) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        self.jobs.push(ScheduledJob {
            id: format!("health-check-{}", self.jobs.len()),
            name: "Service Health Check".to_string(),
            interval,
            run: Arc::new(move |token| {
                let engine = engine.clone();
                let options = options.clone();
                let callback = callback.clone();
                Box::pin(async move {
                    let result = engine.get_accumulated_health_check(token, options).await;
                    callback(result);
                    Ok(())
                })
            }),
        });
    }

    /// On each tick, invoke `task` with a fresh cancellation token.
    pub fn register_license_refresh<F, Fut>(&mut self, interval: Duration, task: F)
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.jobs.push(ScheduledJob {
            id: format!("license-refresh-{}", self.jobs.len()),
            name: "License Refresh".to_string(),
            interval,
            run: Arc::new(move |token| Box::pin(task(token))),
        });
    }

    /// Spawn every registered job as a background task; returns immediately.
    pub fn start(&self, root: CancellationToken) {
        for job in &self.jobs {
            self.spawn_job(job, root.clone());
        }
    }

    /// Spawn every job and block until the root token is cancelled.
    pub async fn start_blocking(&self, root: CancellationToken) {
        self.start(root.clone());
        root.cancelled().await;
    }

    fn spawn_job(&self, job: &ScheduledJob, root: CancellationToken) {
        let interval_dur = job.interval;
        let id = job.id.clone();
        let name = job.name.clone();
        let hooks = self.hooks.clone();
        let run = job.run.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval_dur);
            loop {
                tokio::select! {
                    _ = root.cancelled() => {
                        info!(job_id = %id, "scheduler job cancelled");
                        return;
                    }
                    _ = ticker.tick() => {
                        hooks.pre_run(&id, &name);
                        let tick_token = root.child_token();
                        match run(tick_token).await {
                            Ok(()) => hooks.post_run(&id, &name),
                            Err(err) => hooks.post_run_err(&id, &name, &err),
                        }
                    }
                }
            }
        });
    }
}
