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

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::Error;
use crate::executor::BatchResult;
use crate::worker::WorkerReport;

/// Receives worker lifecycle and per-batch events.  Called concurrently from
/// every worker.
pub trait BatchObserver: Send + Sync {
    fn worker_started(&self, _worker: usize) {}

    fn batch_completed(&self, worker: usize, run: usize, result: &BatchResult);

    fn worker_finished(&self, _report: &WorkerReport) {}

    /// The worker stopped without finishing its runs: it could not get a
    /// connection, panicked, or was cut off by the run deadline.
    fn worker_failed(&self, _worker: usize, _error: &Error) {}
}

/// Emits every event through `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl BatchObserver for LogObserver {
    fn worker_started(&self, worker: usize) {
        info!(worker, "worker started");
    }

    fn batch_completed(&self, worker: usize, run: usize, result: &BatchResult) {
        let elapsed_secs = result.elapsed.as_secs_f64();
        match (result.ack(), result.error()) {
            (Some(ack), _) => {
                info!(
                    worker,
                    run,
                    elapsed_secs,
                    inserted = ack.inserted,
                    "bulk insert"
                );
                if let Some(reply) = ack.to_extended_json() {
                    debug!(worker, run, %reply, "bulk insert reply");
                }
            }
            (None, error) => {
                warn!(
                    worker,
                    run,
                    elapsed_secs,
                    inserted = result.inserted(),
                    error = error.unwrap_or_default(),
                    "bulk insert failed"
                );
            }
        }
    }

    fn worker_finished(&self, report: &WorkerReport) {
        info!(
            worker = report.worker,
            succeeded = report.succeeded,
            failed = report.failed,
            inserted = report.inserted,
            "worker finished"
        );
    }

    fn worker_failed(&self, worker: usize, error: &Error) {
        error!(worker, %error, "worker failed");
    }
}
