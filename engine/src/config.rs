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

use std::sync::Arc;
use std::time::Duration;

use crate::Error;
use crate::Result;

pub const DEFAULT_SOURCE_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "db_name";
pub const DEFAULT_COLLECTION: &str = "coll_name";

/// Immutable snapshot of a benchmark run, fixed before any worker starts
#[derive(Clone, Debug)]
pub struct RunConfig {
    source_uri: String,               // must not be empty
    database: String,                 // defaults to DEFAULT_DATABASE
    collection: String,               // defaults to DEFAULT_COLLECTION
    batch_size: usize,                // zero is a legal, empty batch
    num_runs: usize,                  // batches per worker
    num_threads: usize,               // must be non-zero
    pool_size: Option<usize>,         // None: one connection per worker
    batch_timeout: Option<Duration>,  // None: unbounded
    run_timeout: Option<Duration>,    // None: unbounded
    prewarm: bool,
}

impl RunConfig {
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }
    pub fn database(&self) -> &str {
        &self.database
    }
    pub fn collection(&self) -> &str {
        &self.collection
    }
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
    pub fn num_runs(&self) -> usize {
        self.num_runs
    }
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
    pub fn pool_size(&self) -> usize {
        self.pool_size.unwrap_or(self.num_threads)
    }
    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout
    }
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout
    }
    pub fn prewarm(&self) -> bool {
        self.prewarm
    }

    /// Documents the run will attempt to insert across all workers
    pub fn insert_volume(&self) -> usize {
        self.num_threads
            .saturating_mul(self.num_runs)
            .saturating_mul(self.batch_size)
    }
}

#[derive(Clone)]
pub struct Builder {
    c: RunConfig,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            c: RunConfig {
                source_uri: DEFAULT_SOURCE_URI.to_string(),
                database: String::new(),
                collection: String::new(),
                batch_size: 1,
                num_runs: 1,
                num_threads: 1,
                pool_size: None,
                batch_timeout: None,
                run_timeout: None,
                prewarm: false,
            },
        }
    }

    pub fn new_from(config: &RunConfig) -> Self {
        Self { c: config.clone() }
    }

    #[must_use]
    pub fn source_uri(mut self, x: impl Into<String>) -> Self {
        self.c.source_uri = x.into();
        self
    }

    #[must_use]
    pub fn database(mut self, x: impl Into<String>) -> Self {
        self.c.database = x.into();
        self
    }

    #[must_use]
    pub fn collection(mut self, x: impl Into<String>) -> Self {
        self.c.collection = x.into();
        self
    }

    #[must_use]
    pub fn batch_size(mut self, x: usize) -> Self {
        self.c.batch_size = x;
        self
    }

    #[must_use]
    pub fn num_runs(mut self, x: usize) -> Self {
        self.c.num_runs = x;
        self
    }

    #[must_use]
    pub fn num_threads(mut self, x: usize) -> Self {
        self.c.num_threads = x;
        self
    }

    #[must_use]
    pub fn pool_size(mut self, x: usize) -> Self {
        self.c.pool_size = Some(x);
        self
    }

    #[must_use]
    pub fn maybe_pool_size(mut self, x: Option<usize>) -> Self {
        self.c.pool_size = x;
        self
    }

    #[must_use]
    pub fn batch_timeout(mut self, x: Duration) -> Self {
        self.c.batch_timeout = if x.is_zero() { None } else { Some(x) };
        self
    }

    #[must_use]
    pub fn run_timeout(mut self, x: Duration) -> Self {
        self.c.run_timeout = if x.is_zero() { None } else { Some(x) };
        self
    }

    #[must_use]
    pub fn prewarm(mut self, x: bool) -> Self {
        self.c.prewarm = x;
        self
    }

    pub fn build(mut self) -> Result<Arc<RunConfig>> {
        if self.c.source_uri.is_empty() {
            return Err(Error::NoSourceUri);
        }
        if self.c.num_threads == 0 {
            return Err(Error::InvalidConfig(
                "numThreads must be at least 1".to_string(),
            ));
        }
        if self.c.pool_size == Some(0) {
            return Err(Error::InvalidConfig(
                "poolSize must be at least 1".to_string(),
            ));
        }
        if self.c.database.is_empty() {
            self.c.database = DEFAULT_DATABASE.to_string();
        }
        if self.c.collection.is_empty() {
            self.c.collection = DEFAULT_COLLECTION.to_string();
        }
        Ok(Arc::new(self.c))
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
