pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use echoshop_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "echoshop",
    about = "EchoShop operator CLI",
    long_about = "Run utterances through the EchoShop agent pipeline and inspect agents, tasks, and the knowledge graph.",
    after_help = "Examples:\n  echoshop ask --user 1 order a pizza\n  echoshop demo\n  echoshop recommend --user 2\n  echoshop graph --export"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to an echoshop.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override logging.level for this run")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one utterance through the pipeline and print the reply")]
    Ask {
        #[arg(long, default_value = "1", help = "User id the utterance belongs to")]
        user: String,
        #[arg(required = true, num_args = 1.., help = "Utterance words")]
        utterance: Vec<String>,
    },
    #[command(about = "Play a scripted conversation ending in checkout")]
    Demo,
    #[command(about = "Print system status counts")]
    Status {
        #[command(flatten)]
        warmup: Warmup,
    },
    #[command(about = "Print every registered agent")]
    Agents {
        #[command(flatten)]
        warmup: Warmup,
    },
    #[command(about = "Print every task created in this process")]
    Tasks {
        #[command(flatten)]
        warmup: Warmup,
    },
    #[command(about = "Print knowledge graph statistics")]
    Graph {
        #[arg(long, help = "Print all nodes and relationships instead of counts")]
        export: bool,
    },
    #[command(about = "Rank restaurants for one user")]
    Recommend {
        #[arg(long, help = "User id to rank for")]
        user: String,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
}

#[derive(Debug, clap::Args)]
struct Warmup {
    #[arg(long, default_value = "1", help = "User id for --run utterances")]
    user: String,
    #[arg(long = "run", help = "Utterance to run before reporting; repeatable")]
    utterances: Vec<String>,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        config_path: cli.config,
        require_file: false,
        overrides: ConfigOverrides { log_level: cli.log_level, ..ConfigOverrides::default() },
    };

    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Ask { user, utterance } => commands::ask::run(options, &user, &utterance.join(" ")),
        Command::Demo => commands::demo::run(options),
        Command::Status { warmup } => commands::status::run(options, &warmup.user, &warmup.utterances),
        Command::Agents { warmup } => commands::agents::run(options, &warmup.user, &warmup.utterances),
        Command::Tasks { warmup } => commands::tasks::run(options, &warmup.user, &warmup.utterances),
        Command::Graph { export } => commands::graph::run(options, export),
        Command::Recommend { user } => commands::recommend::run(options, &user),
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout carries only the JSON payload.
fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);
    let initialized = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if initialized.is_err() {
        tracing::debug!(event_name = "cli.logging.already_initialized", "subscriber already set");
    }
}
