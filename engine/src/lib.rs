// Copyright 2025-2026 Maurice S. Barnum
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

//! Concurrent bulk-insert benchmark engine.
//!
//! A [`Coordinator`] starts `num_threads` workers against one bounded
//! [`ConnectionPool`].  Each worker checks out a single connection, submits
//! `num_runs` bulk writes of `batch_size` copies of the same
//! [`SharedDocument`], times each one, and returns the connection.  The total
//! insert volume is `num_threads * num_runs * batch_size`.

pub mod config;
pub mod connection;
pub mod coordinator;
pub mod document;
pub mod errors;
pub mod executor;
pub mod mongo;
pub mod observer;
pub mod pool;
mod util;
pub mod worker;

pub use mongodb::bson;

pub use config::RunConfig;
pub use connection::Ack;
pub use connection::Connection;
pub use coordinator::Coordinator;
pub use coordinator::RunReport;
pub use document::Input;
pub use document::SharedDocument;
pub use errors::*;
pub use executor::BatchExecutor;
pub use executor::BatchOutcome;
pub use executor::BatchResult;
pub use mongo::MongoConnectionFactory;
pub use observer::BatchObserver;
pub use observer::LogObserver;
pub use pool::ConnectionFactory;
pub use pool::ConnectionPool;
pub use pool::PoolStats;
pub use worker::WorkerReport;

pub type Result<T> = std::result::Result<T, Error>;
