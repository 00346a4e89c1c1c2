use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;
use bytesize::ByteSize;
use writebench_storage::Transport;

use crate::benchmark::{
    BenchmarkConfig, DEFAULT_PAYLOAD_SIZE, DEFAULT_RUNS, DEFAULT_WARMUP_RUNS, Source,
};
use crate::config::Config;
use crate::destination::Destination;
use crate::error::{ConfigError, Error};
use crate::report::OutputFormat;
use crate::{executor, observability};

/// Benchmark repeated uploads to a storage system.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    File(FileCommand),
    Bytes(BytesCommand),
}

/// upload a local file repeatedly, deleting the object after every run
///
/// Intended for HDFS, e.g. `writebench file ./blob hdfs://namenode:8020/tmp/blob 10 true`.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "file")]
struct FileCommand {
    /// the file to upload
    #[argh(positional)]
    local_path: PathBuf,

    /// where to upload to
    #[argh(positional)]
    remote_destination: String,

    /// number of measured runs
    #[argh(positional)]
    run_count: usize,

    /// true to write every run to its own object with a -{n} suffix
    #[argh(positional)]
    rename_each_run: bool,
}

/// upload generated bytes repeatedly and verify the remote object size
///
/// Intended for cloud buckets, e.g. `writebench bytes --runs 5 gs://bucket/blob`.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "bytes")]
struct BytesCommand {
    /// use the XML API instead of the JSON API
    #[argh(switch)]
    xml: bool,

    /// number of measured runs
    #[argh(option, default = "DEFAULT_RUNS")]
    runs: usize,

    /// number of runs before measuring
    #[argh(option, default = "DEFAULT_WARMUP_RUNS")]
    warmup: usize,

    /// bytes per upload, e.g. `134217728` or `128MiB`
    #[argh(option, default = "ByteSize::b(DEFAULT_PAYLOAD_SIZE)")]
    size: ByteSize,

    /// seed of the generated bytes
    #[argh(option, default = "0")]
    seed: u64,

    /// upload this local file instead of generated bytes
    #[argh(option)]
    file: Option<PathBuf>,

    /// print the summary as JSON
    #[argh(switch)]
    json: bool,

    /// where to upload to
    #[argh(positional)]
    remote_destination: String,
}

impl Command {
    fn into_benchmark(self) -> Result<BenchmarkConfig, ConfigError> {
        let benchmark = match self {
            Command::File(command) => {
                let destination = Destination::parse(&command.remote_destination)?;
                BenchmarkConfig::file_profile(
                    command.local_path,
                    destination,
                    command.run_count,
                    command.rename_each_run,
                )
            }
            Command::Bytes(command) => {
                let destination = Destination::parse(&command.remote_destination)?;
                let size = command.size.as_u64();

                let mut benchmark = BenchmarkConfig::bytes_profile(destination, size);
                benchmark.source = match command.file {
                    Some(path) => Source::File(path),
                    None => Source::Synthetic {
                        size,
                        seed: command.seed,
                    },
                };
                benchmark.total_runs = command.runs;
                benchmark.warmup_runs = command.warmup;
                if command.xml {
                    benchmark.transport = Transport::Xml;
                }
                if command.json {
                    benchmark.output = OutputFormat::Json;
                }
                benchmark
            }
        };

        benchmark.validate()?;
        Ok(benchmark)
    }
}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    let config = Config::load(args.config.as_deref())?;
    observability::init_tracing(&config.logging);
    tracing::debug!(?config);

    let benchmark = args.command.into_benchmark()?;
    tracing::debug!(?benchmark);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("writebench")
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = config
            .connect(&benchmark.destination, benchmark.transport)
            .await
            .map_err(Error::Connect)?;

        let mut stdout = std::io::stdout().lock();
        executor::run(&benchmark, client, &mut stdout).await
    })?;

    Ok(())
}
