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

use std::env;

use clap::Args;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Override log level or filter.
    /// Simple levels: `trace`, `debug`, `info`, `warn`, `error`
    ///
    /// Extended syntax (like `RUST_LOG`) is also supported,
    /// e.g. "mongocat_engine=debug,mongodb=warn"
    #[arg(long = "log-level", value_parser = parse_env_filter)]
    pub log_level: Option<EnvFilter>,

    /// Verbose output: log at debug level unless a filter is given
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Emit log events as JSON
    #[arg(short, long, default_value_t = false)]
    pub json: bool,
}

fn parse_env_filter(s: &str) -> Result<EnvFilter, String> {
    EnvFilter::try_new(s).map_err(|e| e.to_string())
}

impl LogArgs {
    fn default_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Build an `EnvFilter` from `RUST_LOG` or CLI args, falling back to the
    /// verbosity default
    pub fn to_filter(&self) -> EnvFilter {
        if env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if let Some(filter) = &self.log_level {
            filter.clone()
        } else {
            EnvFilter::new(self.default_level())
        }
    }

    /// Install the global subscriber
    pub fn setup(&self) -> anyhow::Result<()> {
        let builder = FmtSubscriber::builder().with_env_filter(self.to_filter());
        let installed = if self.json {
            tracing::subscriber::set_global_default(builder.json().finish())
        } else {
            tracing::subscriber::set_global_default(builder.finish())
        };
        installed.map_err(Into::into)
    }
}
