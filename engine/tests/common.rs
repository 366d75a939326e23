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

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use mongocat_engine::Ack;
use mongocat_engine::BatchObserver;
use mongocat_engine::BatchResult;
use mongocat_engine::Connection;
use mongocat_engine::ConnectionFactory;
use mongocat_engine::Error;
use mongocat_engine::Result;
use mongocat_engine::SharedDocument;
use mongocat_engine::WorkerReport;
use mongocat_engine::bson::doc;
use mongocat_engine::document;
use tokio::sync::Barrier;

pub fn sample_document() -> SharedDocument {
    let input = br#"{"name": "mongocat", "tags": ["bench", "bulk"], "n": 42}"#;
    document::from_reader(&input[..])
        .expect("sample document")
        .document
}

/// Knobs and counters shared by every fake connection of one factory
#[derive(Default)]
pub struct FakeState {
    pub delay: Duration,
    pub fail_connections: HashSet<usize>,
    pub fail_create: bool,
    pub create_delay: Duration,
    pub panic_on_insert: bool,
    /// The server applies this many documents of a larger batch, then
    /// reports a duplicate key
    pub apply_at_most: Option<usize>,
    /// Every connection waits here on its first batch
    pub rendezvous: Option<Barrier>,

    pub created: AtomicUsize,
    pub closed: AtomicUsize,
    pub round_trips: AtomicUsize,
    pub documents: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,

    /// Workers between `worker_started` and `worker_finished`
    pub running_workers: AtomicUsize,
    pub closed_while_running: AtomicBool,
    pub finished: AtomicUsize,
    pub failed_workers: Mutex<Vec<usize>>,
    pub results: Mutex<Vec<(usize, usize, BatchResult)>>,
}

impl FakeState {
    pub fn results(&self) -> Vec<(usize, usize, BatchResult)> {
        self.results.lock().unwrap().clone()
    }

    pub fn failed_workers(&self) -> Vec<usize> {
        let mut workers = self.failed_workers.lock().unwrap().clone();
        workers.sort_unstable();
        workers
    }
}

#[derive(Clone, Default)]
pub struct FakeFactory {
    pub state: Arc<FakeState>,
}

impl FakeFactory {
    pub fn new(state: FakeState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub fn observer(&self) -> Arc<dyn BatchObserver> {
        Arc::new(Recorder {
            state: Arc::clone(&self.state),
        })
    }
}

#[async_trait]
impl ConnectionFactory for FakeFactory {
    type Connection = FakeConnection;

    async fn create(&self, id: usize) -> Result<FakeConnection> {
        if !self.state.create_delay.is_zero() {
            tokio::time::sleep(self.state.create_delay).await;
        }
        if self.state.fail_create {
            return Err(Error::Custom("connection refused".to_string()));
        }
        self.state.created.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConnection {
            id,
            state: Arc::clone(&self.state),
            batches: 0,
        })
    }
}

pub struct FakeConnection {
    pub id: usize,
    state: Arc<FakeState>,
    batches: usize,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn bulk_insert(
        &mut self,
        document: &mongocat_engine::bson::Document,
        count: usize,
    ) -> Result<Ack> {
        assert!(document.contains_key("name"));
        let state = &self.state;

        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        state.round_trips.fetch_add(1, Ordering::SeqCst);

        if self.batches == 0
            && let Some(barrier) = &state.rendezvous
        {
            barrier.wait().await;
        }
        self.batches += 1;

        if !state.delay.is_zero() {
            tokio::time::sleep(state.delay).await;
        }
        state.in_flight.fetch_sub(1, Ordering::SeqCst);

        assert!(!state.panic_on_insert, "fake connection {} exploded", self.id);
        if state.fail_connections.contains(&self.id) {
            return Err(Error::Custom(format!(
                "write concern error on connection {}",
                self.id
            )));
        }
        if let Some(limit) = state.apply_at_most
            && count > limit
        {
            state.documents.fetch_add(limit, Ordering::SeqCst);
            let applied = i64::try_from(limit).unwrap_or(i64::MAX);
            return Ack::from_reply(doc! {
                "n": applied,
                "ok": 1,
                "writeErrors": [{
                    "index": applied,
                    "code": 11000,
                    "errmsg": "E11000 duplicate key error",
                }],
            });
        }
        state.documents.fetch_add(count, Ordering::SeqCst);
        Ack::from_reply(doc! { "n": i64::try_from(count).unwrap_or(i64::MAX), "ok": 1 })
    }

    async fn close(self) -> Result<()> {
        if self.state.running_workers.load(Ordering::SeqCst) != 0 {
            self.state.closed_while_running.store(true, Ordering::SeqCst);
        }
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Observer that records every batch and tracks live workers
pub struct Recorder {
    state: Arc<FakeState>,
}

impl BatchObserver for Recorder {
    fn worker_started(&self, _worker: usize) {
        self.state.running_workers.fetch_add(1, Ordering::SeqCst);
    }

    fn batch_completed(&self, worker: usize, run: usize, result: &BatchResult) {
        self.state
            .results
            .lock()
            .unwrap()
            .push((worker, run, result.clone()));
    }

    fn worker_finished(&self, _report: &WorkerReport) {
        self.state.running_workers.fetch_sub(1, Ordering::SeqCst);
        self.state.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn worker_failed(&self, worker: usize, _error: &Error) {
        self.state.failed_workers.lock().unwrap().push(worker);
    }
}
