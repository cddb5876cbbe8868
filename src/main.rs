#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use book_translator::app_config::{self, Config};
use book_translator::app_controller::Controller;
use book_translator::language_utils;

/// CLI wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the translation worker until Ctrl-C (default command)
    Work,

    /// Upload a .txt file, or every .txt file in a directory, and enqueue translation jobs
    Enqueue {
        /// File or directory to submit
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Source language code (e.g. 'en', 'fra')
        #[arg(short, long)]
        source_language: String,

        /// Target language code (e.g. 'vi', 'deu')
        #[arg(short, long)]
        target_language: String,

        /// Email address told when the translation is ready
        #[arg(short, long)]
        recipient: Option<String>,
    },

    /// Print the supported languages as JSON
    Languages,

    /// Show queue depth
    QueueStats,

    /// Generate shell completions for book-translator
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// book-translator - queue-driven book translation worker
#[derive(Parser, Debug)]
#[command(name = "book-translator")]
#[command(version)]
#[command(about = "Translate plain-text books from a job queue with local MT models")]
#[command(long_about = "book-translator consumes translation jobs from a durable queue, translates each book
chunk by chunk with local machine-translation models, stores the result and sends
the recipient a time-limited download link.

EXAMPLES:
    book-translator                                   # Run the worker with conf.json
    book-translator enqueue novel.txt -s en -t vi     # Submit one book
    book-translator enqueue books/ -s fr -t de -r me@example.com
    book-translator queue-stats                       # Show queue depth
    book-translator completions bash > book-translator.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file does not exist,
    a default one is created. Model pairs are read from the file named in
    models.model_names_path (key=value lines such as 'en-vi=opus-mt-en-vi').")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Colored stderr logger
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and tag for a level
    fn style(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let (color, tag) = Self::style(record.level());
        let _ = writeln!(std::io::stderr(), "{}{} {} {}\x1B[0m", color, now, tag, record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Level is lowered or raised once the config is loaded
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();
    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level((&level).into());
    }

    match cli.command.unwrap_or(Commands::Work) {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "book-translator", &mut std::io::stdout());
            Ok(())
        }
        Commands::Languages => {
            let json = serde_json::to_string_pretty(&language_utils::supported_languages())
                .context("Failed to serialize supported languages")?;
            println!("{}", json);
            Ok(())
        }
        Commands::Work => {
            let controller = load_controller(&cli.config_path, cli.log_level)?;
            let stats = controller.run_worker().await?;
            info!(
                "Processed {} jobs ({} failed, {} dead-lettered)",
                stats.completed + stats.failed,
                stats.failed,
                stats.dead_lettered
            );
            Ok(())
        }
        Commands::Enqueue {
            path,
            source_language,
            target_language,
            recipient,
        } => {
            let controller = load_controller(&cli.config_path, cli.log_level)?;
            let summary = controller
                .enqueue_path(&path, &source_language, &target_language, recipient)
                .await?;
            for job_id in &summary.enqueued {
                println!("{}", job_id);
            }
            if summary.failed > 0 {
                warn!("{} files could not be enqueued", summary.failed);
            }
            Ok(())
        }
        Commands::QueueStats => {
            let controller = load_controller(&cli.config_path, cli.log_level)?;
            let stats = controller.queue_stats().await?;
            println!("{}", stats);
            Ok(())
        }
    }
}

/// Load (or create) the config, apply CLI overrides, validate, and set the log level
fn load_controller(config_path: &Path, cli_level: Option<CliLogLevel>) -> Result<Controller> {
    let mut config = Config::load_or_create(config_path)?;

    match cli_level {
        Some(level) => config.log_level = level.into(),
        None => log::set_max_level((&config.log_level).into()),
    }

    config.validate().context("Configuration validation failed")?;
    Controller::with_config(config)
}
