use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

use gcloud::config::ConfigStore;
use gcloud::error::ApiError;
use gcloud::operations::DEFAULT_TIMEOUT_SECS;
use gcloud::resource::ReleaseTrack;

use crate::common::{Ctx, OutputFormat};

#[derive(Parser, Debug)]
#[command(
    name = "gcloud",
    version,
    about = "Manage Google Cloud resources from the command line"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Project id for this invocation, overriding `core/project`
    #[arg(long, global = true)]
    project: Option<String>,
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "default")]
    format: OutputFormat,
    /// Disable all interactive prompts
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
    /// Log level on stderr
    #[arg(long, global = true, value_enum, default_value = "warning")]
    verbosity: Verbosity,
    /// Seconds to wait for long-running operations
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Verbosity {
    None,
    Error,
    Warning,
    Info,
    Debug,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a command against the alpha API surface
    Alpha {
        #[command(subcommand)]
        cmd: Surface,
    },
    /// Run a command against the beta API surface
    Beta {
        #[command(subcommand)]
        cmd: Surface,
    },
    #[command(flatten)]
    Ga(Surface),
}

#[derive(Subcommand, Debug)]
enum Surface {
    /// View and edit properties of the active configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCmd),
    /// Manage credentials for Google Cloud APIs
    #[command(subcommand)]
    Auth(commands::auth::AuthCmd),
    /// Manage Compute Engine resources
    #[command(subcommand)]
    Compute(commands::compute::ComputeCmd),
    /// Work with Cloud Storage buckets and objects
    #[command(subcommand)]
    Storage(commands::storage::StorageCmd),
    /// Work with Pub/Sub topics and subscriptions
    #[command(subcommand)]
    Pubsub(commands::pubsub::PubsubCmd),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.global.verbosity);

    if let Err(e) = run(cli).await {
        eprintln!("ERROR: (gcloud) {:#}", e);
        if let Some(hint) = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<ApiError>().and_then(ApiError::hint))
        {
            eprintln!("{hint}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (track, surface) = match cli.cmd {
        Commands::Alpha { cmd } => (ReleaseTrack::Alpha, cmd),
        Commands::Beta { cmd } => (ReleaseTrack::Beta, cmd),
        Commands::Ga(cmd) => (ReleaseTrack::Ga, cmd),
    };
    let ctx = Ctx {
        track,
        store: ConfigStore::open()?,
        project: cli.global.project,
        format: cli.global.format,
        quiet: cli.global.quiet,
        timeout: Duration::from_secs(cli.global.timeout),
    };
    match surface {
        Surface::Config(cmd) => commands::config::run(&ctx, cmd).await,
        Surface::Auth(cmd) => commands::auth::run(&ctx, cmd).await,
        Surface::Compute(cmd) => commands::compute::run(&ctx, cmd).await,
        Surface::Storage(cmd) => commands::storage::run(&ctx, cmd).await,
        Surface::Pubsub(cmd) => commands::pubsub::run(&ctx, cmd).await,
    }
}

fn setup_logging(verbosity: Verbosity) {
    let filter = match verbosity {
        Verbosity::None => LevelFilter::OFF,
        Verbosity::Error => LevelFilter::ERROR,
        Verbosity::Warning => LevelFilter::WARN,
        Verbosity::Info => LevelFilter::INFO,
        Verbosity::Debug => LevelFilter::DEBUG,
    };

    // Log lines go to stderr so stdout stays parseable.
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .init();
}

mod commands;
mod common;

#[cfg(test)]
mod tests {
    use super::*;

    // https://docs.rs/clap/latest/clap/_derive/_tutorial/index.html#testing
    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn release_track_prefixes_parse() {
        let cli = Cli::parse_from(["gcloud", "compute", "instances", "list"]);
        assert!(matches!(cli.cmd, Commands::Ga(Surface::Compute(_))));

        let cli = Cli::parse_from(["gcloud", "beta", "compute", "instances", "list"]);
        assert!(matches!(cli.cmd, Commands::Beta { .. }));

        let cli = Cli::parse_from(["gcloud", "alpha", "pubsub", "topics", "list"]);
        assert!(matches!(cli.cmd, Commands::Alpha { .. }));
    }

    #[test]
    fn global_flags_bind_after_subcommands() {
        let cli = Cli::parse_from([
            "gcloud", "storage", "ls", "--format", "json", "--project", "p1", "-q",
        ]);
        assert_eq!(cli.global.format, OutputFormat::Json);
        assert_eq!(cli.global.project.as_deref(), Some("p1"));
        assert!(cli.global.quiet);
        assert_eq!(cli.global.timeout, 300);
    }
}
