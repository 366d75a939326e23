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

//! A worker checks out one connection, runs its batches back to back on it,
//! and gives it back.  A failed batch is reported and the loop moves on.

use std::sync::Arc;
use std::time::Instant;

use tracing::trace;

use crate::Result;
use crate::config::RunConfig;
use crate::document::SharedDocument;
use crate::executor::BatchExecutor;
use crate::executor::BatchOutcome;
use crate::executor::BatchResult;
use crate::observer::BatchObserver;
use crate::pool::ConnectionFactory;
use crate::pool::ConnectionPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    AcquiringConnection,
    Running,
    ReleasingConnection,
    Done,
}

/// Per-worker tally of how its runs went
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Documents submitted, acknowledged or not
    pub attempted: usize,
    pub inserted: usize,
}

impl WorkerReport {
    fn new(worker: usize) -> Self {
        Self {
            worker,
            ..Self::default()
        }
    }

    // Totals saturate rather than overflow on absurd batch sizes.
    fn record(&mut self, result: &BatchResult) {
        if result.is_success() {
            self.succeeded = self.succeeded.saturating_add(1);
        } else {
            self.failed = self.failed.saturating_add(1);
        }
        self.attempted = self.attempted.saturating_add(result.requested);
        self.inserted = self.inserted.saturating_add(result.inserted());
    }

    pub fn runs(&self) -> usize {
        self.succeeded.saturating_add(self.failed)
    }
}

pub struct Worker<F: ConnectionFactory> {
    id: usize,
    state: WorkerState,
    config: Arc<RunConfig>,
    pool: ConnectionPool<F>,
    document: SharedDocument,
    executor: BatchExecutor,
    observer: Arc<dyn BatchObserver>,
}

impl<F: ConnectionFactory> Worker<F> {
    pub fn new(
        id: usize,
        config: Arc<RunConfig>,
        pool: ConnectionPool<F>,
        document: SharedDocument,
        observer: Arc<dyn BatchObserver>,
    ) -> Self {
        let executor = BatchExecutor::new(config.batch_timeout());
        Self {
            id,
            state: WorkerState::Created,
            config,
            pool,
            document,
            executor,
            observer,
        }
    }

    fn transition(&mut self, to: WorkerState) {
        trace!(worker = self.id, from = ?self.state, ?to, "worker state");
        self.state = to;
    }

    pub async fn run(mut self) -> Result<WorkerReport> {
        self.observer.worker_started(self.id);

        self.transition(WorkerState::AcquiringConnection);
        let mut conn = self.pool.acquire().await?;

        self.transition(WorkerState::Running);
        let batch_size = self.config.batch_size();
        let mut report = WorkerReport::new(self.id);
        for run in 0..self.config.num_runs() {
            let start = Instant::now();
            let outcome = self
                .executor
                .execute(&mut *conn, &self.document, batch_size)
                .await;
            let result = BatchResult {
                requested: batch_size,
                elapsed: start.elapsed(),
                outcome: BatchOutcome::from(outcome),
            };
            report.record(&result);
            self.observer.batch_completed(self.id, run, &result);
        }

        self.transition(WorkerState::ReleasingConnection);
        self.pool.release(conn);

        self.transition(WorkerState::Done);
        self.observer.worker_finished(&report);
        Ok(report)
    }
}
