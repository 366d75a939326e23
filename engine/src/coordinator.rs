// Copyright 2025 Maurice S. Barnum
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fans the run out to `num_threads` identical workers, waits for all of them,
//! then tears the pool down exactly once.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::Error;
use crate::Result;
use crate::config::RunConfig;
use crate::document::SharedDocument;
use crate::observer::BatchObserver;
use crate::observer::LogObserver;
use crate::pool::ConnectionFactory;
use crate::pool::ConnectionPool;
use crate::pool::PoolStats;
use crate::util::with_timeout;
use crate::worker::Worker;
use crate::worker::WorkerReport;

#[derive(Clone, Debug, Default)]
pub struct RunReport {
    /// Ordered by worker id
    pub workers: Vec<WorkerReport>,
    pub elapsed: Duration,
    /// Pool state after teardown
    pub pool: PoolStats,
}

impl RunReport {
    fn total(&self, f: impl Fn(&WorkerReport) -> usize) -> usize {
        self.workers.iter().map(f).fold(0, usize::saturating_add)
    }

    pub fn batches(&self) -> usize {
        self.total(WorkerReport::runs)
    }

    pub fn succeeded(&self) -> usize {
        self.total(|w| w.succeeded)
    }

    pub fn failed(&self) -> usize {
        self.total(|w| w.failed)
    }

    /// Documents submitted across all workers
    pub fn attempted(&self) -> usize {
        self.total(|w| w.attempted)
    }

    /// Documents the server applied, including those from failed batches
    pub fn inserted(&self) -> usize {
        self.total(|w| w.inserted)
    }

    /// Applied documents per second of wall-clock time
    pub fn docs_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.inserted() as f64 / secs
        } else {
            0.0
        }
    }
}

pub struct Coordinator<F: ConnectionFactory> {
    config: Arc<RunConfig>,
    pool: ConnectionPool<F>,
    document: SharedDocument,
    observer: Arc<dyn BatchObserver>,
}

impl<F: ConnectionFactory> Coordinator<F> {
    /// Build the pool for `config` from `factory`
    pub fn new(config: Arc<RunConfig>, factory: F, document: SharedDocument) -> Result<Self> {
        let capacity = config.pool_size();
        if capacity < config.num_threads() {
            warn!(
                capacity,
                workers = config.num_threads(),
                "pool is smaller than the worker count; workers will wait for connections"
            );
        }
        let pool = ConnectionPool::new(factory, capacity)?;
        Ok(Self::with_pool(config, pool, document))
    }

    pub fn with_pool(
        config: Arc<RunConfig>,
        pool: ConnectionPool<F>,
        document: SharedDocument,
    ) -> Self {
        Self {
            config,
            pool,
            document,
            observer: Arc::new(LogObserver),
        }
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn pool(&self) -> &ConnectionPool<F> {
        &self.pool
    }

    /// Run every worker to completion, then shut the pool down.  The pool is
    /// shut down on every path once no worker is left running.
    pub async fn run(self) -> Result<RunReport> {
        let start = Instant::now();
        let outcome = self.run_workers().await;
        let teardown = self.pool.shutdown().await;

        let workers = outcome?;
        teardown?;

        let report = RunReport {
            workers,
            elapsed: start.elapsed(),
            pool: self.pool.stats(),
        };
        info!(
            workers = report.workers.len(),
            batches = report.batches(),
            failed = report.failed(),
            inserted = report.inserted(),
            elapsed_secs = report.elapsed.as_secs_f64(),
            docs_per_sec = report.docs_per_sec(),
            "run complete"
        );
        Ok(report)
    }

    async fn run_workers(&self) -> Result<Vec<WorkerReport>> {
        let mut tasks = JoinSet::new();
        let mut joined = Joined::new(self.config.num_threads());
        let outcome = with_timeout(
            self.config.run_timeout(),
            self.spawn_and_join(&mut tasks, &mut joined),
            Error::RunTimeout,
        )
        .await;

        // On a run timeout the remaining workers are cancelled; their
        // connections go back to the pool as the tasks are dropped.
        tasks.shutdown().await;
        if let Err(err) = outcome {
            for worker in joined.unfinished() {
                self.observer.worker_failed(worker, &err);
            }
            return Err(err);
        }

        if let Some(err) = joined.failures.into_iter().next() {
            return Err(err);
        }
        joined.reports.sort_by_key(|r| r.worker);
        Ok(joined.reports)
    }

    /// Prewarm, start every worker and wait for all of them, keeping going
    /// past failures
    async fn spawn_and_join(
        &self,
        tasks: &mut JoinSet<(usize, Result<WorkerReport>)>,
        joined: &mut Joined,
    ) -> Result<()> {
        if self.config.prewarm() {
            self.pool.prewarm(self.config.pool_size()).await?;
        }

        for id in 0..self.config.num_threads() {
            let worker = Worker::new(
                id,
                Arc::clone(&self.config),
                self.pool.clone(),
                self.document.clone(),
                Arc::clone(&self.observer),
            );
            joined.ended.push(false);
            tasks.spawn(async move {
                let outcome = AssertUnwindSafe(worker.run()).catch_unwind().await;
                (id, outcome.unwrap_or_else(|payload| Err(panicked(id, payload))))
            });
        }
        debug!(workers = tasks.len(), "workers spawned");

        while let Some(task) = tasks.join_next().await {
            match task {
                Ok((worker, Ok(report))) => {
                    joined.ended[worker] = true;
                    joined.reports.push(report);
                }
                Ok((worker, Err(err))) => {
                    joined.ended[worker] = true;
                    self.observer.worker_failed(worker, &err);
                    joined.failures.push(err);
                }
                // Only cancellation gets here; panics are caught inside the task.
                Err(err) => joined.failures.push(Error::Custom(err.to_string())),
            }
        }
        Ok(())
    }
}

/// What the workers handed back so far
struct Joined {
    reports: Vec<WorkerReport>,
    failures: Vec<Error>,
    /// Indexed by worker id, one entry per spawned worker
    ended: Vec<bool>,
}

impl Joined {
    fn new(workers: usize) -> Self {
        Self {
            reports: Vec::with_capacity(workers),
            failures: Vec::new(),
            ended: Vec::with_capacity(workers),
        }
    }

    fn unfinished(&self) -> impl Iterator<Item = usize> + '_ {
        self.ended
            .iter()
            .enumerate()
            .filter(|(_, ended)| !**ended)
            .map(|(worker, _)| worker)
    }
}

fn panicked(worker: usize, payload: Box<dyn Any + Send>) -> Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    Error::WorkerPanicked { worker, message }
}
