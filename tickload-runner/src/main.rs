use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process;
use tickload_runner::config::{ConfigOverrides, FileConfig, LoadConfig};
use tickload_runner::driver;
use tickload_runner::report::{JsonReporter, Reporter, TextReporter};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Output {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "tickload", about = "Staged HTTP load generator for the ticket endpoint")]
struct Args {
    /// JSON config file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scheme and host of the target, e.g. https://example.com
    #[arg(long)]
    base_url: Option<String>,

    /// Shop whose ticket queue receives the load
    #[arg(long)]
    shop: Option<String>,

    /// serviceId sent in every ticket
    #[arg(long)]
    service_id: Option<u64>,

    /// Ramp profile as RATExSECONDS,... (e.g. 2x30,5x60)
    #[arg(long)]
    ramp: Option<String>,

    /// Per-request timeout (milliseconds)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Exit with code 1 if the overall error rate exceeds this fraction
    #[arg(long)]
    max_error_rate: Option<f64>,

    /// Report format on stdout
    #[arg(long, value_enum, default_value_t = Output::Text)]
    output: Output,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(3);
    });

    info!(
        stages = config.ramp.stages().len(),
        planned_secs = config.ramp.total_duration().as_secs(),
        "configuration loaded"
    );

    let mut reporter: Box<dyn Reporter> = match args.output {
        Output::Text => Box::new(TextReporter::new(std::io::stdout())),
        Output::Json => Box::new(JsonReporter::new(std::io::stdout())),
    };

    let report = driver::run(&config, reporter.as_mut()).await.unwrap_or_else(|e| {
        error!(error = %e, "run aborted");
        process::exit(3);
    });

    let error_rate_exceeded = config
        .max_error_rate
        .is_some_and(|max| report.overall.total > 0 && report.overall.error_rate() > max);

    if error_rate_exceeded {
        error!(
            error_rate = report.overall.error_rate(),
            "overall error rate above threshold"
        );
        process::exit(1);
    }
}

fn load_config(args: &Args) -> tickload_common::Result<LoadConfig> {
    let file = args.config.as_deref().map(FileConfig::load).transpose()?;
    let overrides = ConfigOverrides {
        base_url: args.base_url.clone(),
        shop_slug: args.shop.clone(),
        service_id: args.service_id,
        ramp: args.ramp.clone(),
        timeout_ms: args.timeout_ms,
        max_error_rate: args.max_error_rate,
    };
    LoadConfig::resolve(file, overrides)
}
