mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_SPEC_ERROR, EXIT_STORE_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "matomo-dl",
    version,
    about = "Reproducible Matomo distribution lock tool"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Synchronize the lock file against the distribution spec.
    Lock {
        /// Path to the distribution spec TOML file.
        #[arg(long, default_value = "distribution.toml")]
        distribution: PathBuf,
        /// Path to the lock file to read and update.
        #[arg(long, default_value = "matomo.lock")]
        lock: PathBuf,
        /// Directory for the content cache.
        #[arg(long, default_value = "~/.cache/matomo-dl")]
        cache: String,
        /// Maximum concurrent plugin downloads.
        #[arg(long, default_value_t = 4)]
        jobs: usize,
    },
    /// Print a summary of an existing lock file.
    Show {
        /// Path to the lock file.
        #[arg(long, default_value = "matomo.lock")]
        lock: PathBuf,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MATOMO_DL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;

    let result = match cli.command {
        Commands::Lock {
            distribution,
            lock,
            cache,
            jobs,
        } => commands::lock::run(
            &distribution,
            &lock,
            &expand_tilde(&cache),
            jobs,
            json_output,
        ),
        Commands::Show { lock } => commands::show::run(&lock, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("distribution spec:") || msg.starts_with("lock file:") {
                EXIT_SPEC_ERROR
            } else if msg.starts_with("store lock:") || msg.starts_with("store error:") {
                EXIT_STORE_ERROR
            } else if msg.contains("cancelled") {
                EXIT_INTERRUPTED
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
