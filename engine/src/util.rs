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

use std::future::Future;
use std::time::Duration;

use crate::Result;

/// Run `fut` under an optional deadline, mapping expiry through `on_elapsed`
pub(crate) async fn with_timeout<T, Fut, E>(
    timeout: Option<Duration>,
    fut: Fut,
    on_elapsed: E,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
    E: FnOnce(Duration) -> crate::Error,
{
    match timeout {
        Some(t) => tokio::time::timeout(t, fut)
            .await
            .map_err(|_| on_elapsed(t))?,
        None => fut.await,
    }
}
