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

use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing::warn;

use mongocat_engine::Coordinator;
use mongocat_engine::Input;
use mongocat_engine::MongoConnectionFactory;
use mongocat_engine::RunConfig;
use mongocat_engine::config;
use mongocat_engine::document;

mod log;
use log::LogArgs;

#[derive(Parser, Debug)]
#[command(name = "mongocat", version, about = "MongoDB bulk-insert throughput probe")]
pub struct Cli {
    #[command(flatten)]
    log: LogArgs,

    /// URI for source MongoDB
    #[arg(short, long, value_name = "uri", default_value = config::DEFAULT_SOURCE_URI)]
    source: String,

    /// Input filename, `-` reads standard input
    #[arg(short, long, value_name = "input filename", default_value = "-")]
    input: Input,

    /// Database to insert into
    #[arg(long, default_value = config::DEFAULT_DATABASE)]
    database: String,

    /// Collection to insert into
    #[arg(long, default_value = config::DEFAULT_COLLECTION)]
    collection: String,

    /// Number of documents to insert per batch
    #[arg(long = "batchSize", alias = "batch-size", value_name = "#", default_value_t = 1)]
    batch_size: usize,

    /// Number of batches each thread inserts
    #[arg(long = "numRuns", alias = "num-runs", value_name = "#", default_value_t = 1)]
    num_runs: usize,

    /// Number of concurrent inserting threads
    #[arg(long = "numThreads", alias = "num-threads", value_name = "#", default_value_t = num_cpus::get())]
    num_threads: usize,

    /// Connections in the pool, defaults to the thread count
    #[arg(long = "poolSize", alias = "pool-size", value_name = "#")]
    pool_size: Option<usize>,

    /// Give up on a single batch after this long
    #[arg(long = "batchTimeout", alias = "batch-timeout", value_parser = humantime::parse_duration)]
    batch_timeout: Option<Duration>,

    /// Give up on the whole run after this long
    #[arg(long = "runTimeout", alias = "run-timeout", value_parser = humantime::parse_duration)]
    run_timeout: Option<Duration>,

    /// Open every pool connection before the first batch
    #[arg(long, default_value_t = false)]
    prewarm: bool,
}

impl Cli {
    fn run_config(&self) -> mongocat_engine::Result<Arc<RunConfig>> {
        let mut builder = RunConfig::builder()
            .source_uri(self.source.clone())
            .database(self.database.clone())
            .collection(self.collection.clone())
            .batch_size(self.batch_size)
            .num_runs(self.num_runs)
            .num_threads(self.num_threads)
            .maybe_pool_size(self.pool_size)
            .prewarm(self.prewarm);
        if let Some(t) = self.batch_timeout {
            builder = builder.batch_timeout(t);
        }
        if let Some(t) = self.run_timeout {
            builder = builder.run_timeout(t);
        }
        builder.build()
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.run_config()?;
    let factory = MongoConnectionFactory::new(&config).await?;

    let input = cli.input.clone();
    let loaded = tokio::task::spawn_blocking(move || document::load(&input)).await??;
    info!(
        input = %cli.input,
        bytes = loaded.document.encoded_len(),
        parse_secs = loaded.parse_time.as_secs_f64(),
        "document loaded"
    );

    info!(
        source = config.source_uri(),
        batch_size = config.batch_size(),
        num_runs = config.num_runs(),
        num_threads = config.num_threads(),
        pool_size = config.pool_size(),
        volume = config.insert_volume(),
        "starting run"
    );
    let report = Coordinator::new(Arc::clone(&config), factory, loaded.document)?
        .run()
        .await?;
    if report.attempted() != config.insert_volume() {
        warn!(
            attempted = report.attempted(),
            volume = config.insert_volume(),
            "run submitted a different number of documents than configured"
        );
    }
    if report.failed() > 0 {
        warn!(
            failed = report.failed(),
            batches = report.batches(),
            "some batches failed"
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and are not failures.
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };
    cli.log.setup()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cli.num_threads.max(1))
        .enable_all()
        .build()?;
    runtime.block_on(run(cli))
}
