use clap::{Parser, Subcommand};
use colored::Colorize;
use dbc_core::{Config, Error, Options};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;

/// DBC: design-by-contract lowering for JavaScript
///
/// Compile `pre:`, `post:`, `invariant:` and `assert:` blocks into
/// runtime guards, check them, or run lowered code.
#[derive(Parser)]
#[command(name = "dbc", version, about, long_about = None)]
struct Cli {
    /// Log lowering decisions to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// Path to a JSON options file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Remove contracts instead of compiling them
    #[arg(long)]
    strip: bool,
    /// Active environment (defaults to NODE_ENV)
    #[arg(long)]
    env: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower contracts and print the resulting program
    Lower {
        /// Path to .js file
        file: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Check that contracts are well formed
    Check {
        /// Path to .js file
        file: PathBuf,
        /// Path to a JSON options file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Lower, load and call a function
    Run {
        /// Path to .js file
        file: PathBuf,
        /// Function to call; `default` for the default export
        #[arg(long)]
        call: String,
        /// JSON array of arguments
        #[arg(long, default_value = "[]")]
        args: String,
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if !std::io::stderr().is_terminal() {
        colored::control::set_override(false);
    }

    let exit_code = match cli.command {
        Commands::Lower {
            file,
            config,
            output,
        } => cmd_lower(&file, &config, output.as_deref()),
        Commands::Check { file, config, json } => cmd_check(&file, config.as_deref(), json),
        Commands::Run {
            file,
            call,
            args,
            config,
        } => cmd_run(&file, &call, &args, &config),
        Commands::Version => {
            println!(
                "dbc {} (dbc-core {})",
                env!("CARGO_PKG_VERSION"),
                env!("CARGO_PKG_VERSION")
            );
            0
        }
    };

    process::exit(exit_code);
}

// ── Commands ──────────────────────────────────────────────

fn cmd_lower(file: &Path, args: &ConfigArgs, output: Option<&Path>) -> i32 {
    let result = resolve_config(args).and_then(|config| {
        let source = std::fs::read_to_string(file)?;
        dbc_core::lower(&source, &config)
    });
    let lowered = match result {
        Ok(lowered) => lowered,
        Err(e) => return fail(file, &e),
    };
    match output {
        Some(path) => match std::fs::write(path, lowered) {
            Ok(()) => {
                eprintln!("{} {}", "wrote".green(), path.display());
                0
            }
            Err(e) => fail(path, &Error::Io(e)),
        },
        None => {
            print!("{}", lowered);
            0
        }
    }
}

fn cmd_check(file: &Path, config: Option<&Path>, json: bool) -> i32 {
    let args = ConfigArgs {
        config: config.map(Path::to_path_buf),
        strip: false,
        env: None,
    };
    let result = resolve_config(&args).and_then(|config| {
        let source = std::fs::read_to_string(file)?;
        dbc_core::check(&source, &config)
    });
    let report = match result {
        Ok(report) => report,
        Err(e) => return fail(file, &e),
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                return 2;
            }
        }
    } else if let Some(error) = &report.error {
        eprintln!("{} {}: {}", "invalid".red().bold(), file.display(), error);
    } else {
        println!("{} {}", "ok".green().bold(), file.display());
    }

    if report.valid {
        0
    } else {
        1
    }
}

fn cmd_run(file: &Path, call: &str, args: &str, config_args: &ConfigArgs) -> i32 {
    let result = resolve_config(config_args).and_then(|config| {
        let source = std::fs::read_to_string(file)?;
        dbc_core::run(&source, &config, call, args)
    });
    match result {
        Ok(value) => {
            println!("{}", value);
            0
        }
        Err(Error::Uncaught { message }) => {
            eprintln!("{} {}", "contract violated:".red().bold(), message);
            1
        }
        Err(e) => fail(file, &e),
    }
}

// ── Helpers ───────────────────────────────────────────────

fn resolve_config(args: &ConfigArgs) -> dbc_core::Result<Config> {
    let options = match &args.config {
        Some(path) => Options::load(path)?,
        None => Options::default(),
    };
    let active_env = args
        .env
        .clone()
        .or_else(|| std::env::var("NODE_ENV").ok());
    let mut config = Config::resolve(&options, active_env.as_deref())?;
    config.strip |= args.strip;
    Ok(config)
}

/// Report `err` and pick the exit code: 1 for contract failures, 2 otherwise
fn fail(file: &Path, err: &Error) -> i32 {
    eprintln!("{} {}: {}", "error:".red().bold(), file.display(), err);
    if err.is_build_time() {
        1
    } else {
        2
    }
}
