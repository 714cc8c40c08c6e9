use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use fusillade::{
    Benchmark, BenchmarkBuilder, ConfigError, dump_latencies, get_writer, logger, parse_period,
    summarize, write_json, write_text,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of requests per client
    #[arg(short = 'r')]
    requests: Option<u64>,

    /// Number of concurrent clients
    #[arg(short = 'c', default_value = "100")]
    clients: usize,

    /// URL
    #[arg(short = 'u')]
    url: Option<String>,

    /// URL's file path (line separated)
    #[arg(short = 'f')]
    urls_file: Option<PathBuf>,

    /// Do HTTP keep-alive
    #[arg(short = 'k', default_value = "true", action = clap::ArgAction::Set)]
    keepalive: bool,

    /// HTTP POST data file path
    #[arg(short = 'd')]
    body_file: Option<PathBuf>,

    /// Period of time (seconds, or a duration such as 1m30s)
    #[arg(short = 't', value_parser = parse_period)]
    period: Option<Duration>,

    /// Write timeout (in milliseconds)
    #[arg(long = "tw", default_value = "5000")]
    write_timeout: u64,

    /// Read timeout (in milliseconds)
    #[arg(long = "tr", default_value = "5000")]
    read_timeout: u64,

    /// Authorization header
    #[arg(long)]
    auth: Option<String>,

    /// User-Agent header
    #[arg(long)]
    agent: Option<String>,

    /// Accept-Encoding header
    #[arg(long)]
    accept: Option<String>,

    /// Content type
    #[arg(long)]
    ct: Option<String>,

    /// Randomize URL order
    #[arg(long)]
    random: bool,

    /// Skip verifying SSL certificate
    #[arg(long)]
    insecure: bool,

    /// Show debug messages
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Support <UUID> & <CID> substitution in uri
    #[arg(short = 's')]
    substitution: bool,

    /// Number of CPUs to use (default = number of cpus)
    #[arg(long)]
    cpus: Option<usize>,

    /// File receiving every request latency in seconds, one per line
    #[arg(long = "latency-file", default_value = "delay.txt")]
    latency_file: PathBuf,

    /// Report output file
    #[arg(long, default_value = "stdout")]
    output: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn builder(&self) -> BenchmarkBuilder {
        let mut builder = BenchmarkBuilder::new()
            .clients(self.clients)
            .keepalive(self.keepalive)
            .randomize(self.random)
            .uri_substitution(self.substitution)
            .read_timeout(Duration::from_millis(self.read_timeout))
            .write_timeout(Duration::from_millis(self.write_timeout))
            .insecure(self.insecure);

        if let Some(url) = &self.url {
            builder = builder.url(url.clone());
        }
        if let Some(path) = &self.urls_file {
            builder = builder.urls_file(path.clone());
        }
        if let Some(path) = &self.body_file {
            builder = builder.body_file(path.clone());
        }
        if let Some(requests) = self.requests {
            builder = builder.requests(requests);
        }
        if let Some(period) = self.period {
            builder = builder.duration(period);
        }
        if let Some(auth) = &self.auth {
            builder = builder.auth_header(auth.clone());
        }
        if let Some(agent) = &self.agent {
            builder = builder.user_agent(agent.clone());
        }
        if let Some(accept) = &self.accept {
            builder = builder.accept_encoding(accept.clone());
        }
        if let Some(ct) = &self.ct {
            builder = builder.content_type(ct.clone());
        }

        builder
    }
}

fn usage_error(err: ConfigError) -> ! {
    let kind = match err {
        ConfigError::NoTargets | ConfigError::MissingLimit => ErrorKind::MissingRequiredArgument,
        ConfigError::ConflictingLimits => ErrorKind::ArgumentConflict,
        ConfigError::ReadTargets { .. } | ConfigError::ReadBody { .. } => ErrorKind::Io,
        _ => ErrorKind::ValueValidation,
    };
    let message = match std::error::Error::source(&err) {
        Some(source) => format!("{}: {}", err, source),
        None => err.to_string(),
    };
    Cli::command().error(kind, message).exit()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_logging(cli.verbose);

    let config = match cli.builder().build() {
        Ok(config) => config,
        Err(err) => usage_error(err),
    };

    let cpus = cli.cpus.unwrap_or_else(num_cpus::get).max(1);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cpus)
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    info!("using {} CPUs", cpus);

    let outcome = runtime.block_on(async move {
        let benchmark = Benchmark::new(config)?.handle_signals(true);
        Ok::<_, ConfigError>(benchmark.run().await)
    });
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => usage_error(err),
    };

    dump_latencies(&cli.latency_file, &outcome.results)?;

    let summary = summarize(&outcome);
    let mut writer = get_writer(&cli.output)?;
    if cli.json {
        write_json(&mut writer, &summary)?;
    } else {
        write_text(&mut writer, &summary)?;
    }
    writer.flush().context("Failed to write report")?;

    Ok(())
}
