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

use std::time::Duration;

use crate::Error;
use crate::Result;
use crate::connection::Ack;
use crate::connection::Connection;
use crate::document::SharedDocument;
use crate::util::with_timeout;

/// What one batch produced: the server's acknowledgment or its complaint
#[derive(Clone, Debug, PartialEq)]
pub enum BatchOutcome {
    Acknowledged(Ack),
    /// `inserted` counts documents applied before the batch failed
    Failed { error: String, inserted: usize },
}

impl From<Result<Ack>> for BatchOutcome {
    fn from(r: Result<Ack>) -> Self {
        match r {
            Ok(ack) => BatchOutcome::Acknowledged(ack),
            Err(err) => BatchOutcome::Failed {
                inserted: err.inserted(),
                error: err.to_string(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchResult {
    /// Documents submitted in the batch
    pub requested: usize,
    pub elapsed: Duration,
    pub outcome: BatchOutcome,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Acknowledged(_))
    }

    pub fn inserted(&self) -> usize {
        match &self.outcome {
            BatchOutcome::Acknowledged(ack) => ack.inserted,
            BatchOutcome::Failed { inserted, .. } => *inserted,
        }
    }

    pub fn ack(&self) -> Option<&Ack> {
        match &self.outcome {
            BatchOutcome::Acknowledged(ack) => Some(ack),
            BatchOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            BatchOutcome::Acknowledged(_) => None,
            BatchOutcome::Failed { error, .. } => Some(error),
        }
    }
}

/// Submits one bulk write per call.  Never retries.
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchExecutor {
    timeout: Option<Duration>,
}

impl BatchExecutor {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub async fn execute<C: Connection>(
        &self,
        conn: &mut C,
        document: &SharedDocument,
        batch_size: usize,
    ) -> Result<Ack> {
        with_timeout(
            self.timeout,
            conn.bulk_insert(document.as_document(), batch_size),
            Error::BatchTimeout,
        )
        .await
    }
}
