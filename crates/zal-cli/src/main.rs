mod cmd;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "zal",
    about = "Zabbix provisioning from Prometheus alerting rules, plus an Alertmanager forwarder",
    version
)]
struct Cli {
    /// Minimum log level (RUST_LOG overrides per target)
    #[arg(long, global = true, env = "ZAL_LOG_LEVEL", default_value = "info")]
    log_level: tracing::Level,

    #[arg(long, global = true, env = "ZAL_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Output results as JSON
    #[arg(long, short = 'j', global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile Zabbix hosts, items and triggers with Prometheus alerting rules
    Prov(cmd::prov::ProvArgs),

    /// Forward Alertmanager webhook notifications to a Zabbix trapper
    Send(cmd::send::SendArgs),

    /// Validate a provisioner config and its rules without contacting Zabbix
    Check {
        #[arg(long, short = 'c', env = "ZAL_CONFIG", default_value = "config.yml")]
        config: PathBuf,
    },
}

fn init_logging(level: tracing::Level, format: LogFormat) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_format);

    let result = match cli.command {
        Commands::Prov(args) => cmd::prov::run(args, cli.json),
        Commands::Send(args) => cmd::send::run(args),
        Commands::Check { config } => cmd::check::run(&config, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
