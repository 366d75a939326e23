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

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error as ThisError;

/// Problems with the document source that prevent a run from starting
#[derive(Debug, ThisError)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot convert JSON to BSON: {0}")]
    Bson(#[from] mongodb::bson::extjson::de::Error),

    #[error("top-level value is a {0}, expected an object")]
    NotAnObject(&'static str),

    #[error("cannot encode document: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
}

#[derive(Debug, ThisError)]
#[non_exhaustive]
pub enum Error {
    #[error("No source URI")]
    NoSourceUri,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to open \"{path}\": {source}")]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error in JSON parsing: {0}")]
    Decode(#[from] DecodeError),

    #[error("Input contains no document")]
    EmptyInput,

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Bulk write failed after {inserted} insert(s): {message}")]
    BulkWrite { inserted: usize, message: String },

    #[error("Batch timed out after {0:?}")]
    BatchTimeout(Duration),

    #[error("Run timed out after {0:?}")]
    RunTimeout(Duration),

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("{0} connection(s) still checked out at pool shutdown")]
    ConnectionsOutstanding(usize),

    #[error("Worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },

    #[error("Custom error: {0}")]
    Custom(String),
}

impl Error {
    /// Documents the server applied before the failure
    pub fn inserted(&self) -> usize {
        match self {
            Error::BulkWrite { inserted, .. } => *inserted,
            _ => 0,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Decode(value.into())
    }
}
