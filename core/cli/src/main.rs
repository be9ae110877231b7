//! livecheck: one-shot report of the system's live/persistent state.
//!
//! Runs the probes once, applies the installer marker, prints the result and
//! exits non-zero if the state could not be determined.
//!
//! ## Subcommands
//!
//! - `report` (default): human-readable report, or JSON with `--json`
//! - `state`: just the state token, for scripts

mod logging;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use livecheck_core::{
    exit_code_for, load_config, query_with_config, render_report, DetailFormat, LiveSnapshot,
};

#[derive(Parser)]
#[command(name = "livecheck")]
#[command(about = "Report whether this system is running live or persistent")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $LIVECHECK_CONFIG, then the user and system config)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full report
    Report {
        /// Emit the snapshot as JSON instead of text
        #[arg(long)]
        json: bool,

        /// How filesystem lists are rendered
        #[arg(long, value_enum, default_value_t = ListFormat::Plain)]
        format: ListFormat,
    },

    /// Print only the state token
    State,
}

#[derive(Clone, Copy, ValueEnum)]
enum ListFormat {
    Plain,
    Html,
}

impl From<ListFormat> for DetailFormat {
    fn from(format: ListFormat) -> Self {
        match format {
            ListFormat::Plain => DetailFormat::PlainText,
            ListFormat::Html => DetailFormat::Html,
        }
    }
}

fn main() {
    let logging_guard = logging::init();
    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "livecheck failed");
            eprintln!("livecheck: {}", err);
            2
        }
    };

    drop(logging_guard);
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32, String> {
    let config = load_config(cli.config).map_err(|err| err.to_string())?;
    let command = cli.command.unwrap_or(Commands::Report {
        json: false,
        format: ListFormat::Plain,
    });

    match command {
        Commands::Report { json, format } => {
            let snapshot = query_with_config(&config, format.into());
            print_report(&snapshot, json)?;
            Ok(exit_code_for(snapshot.state))
        }
        Commands::State => {
            let snapshot = query_with_config(&config, DetailFormat::PlainText);
            println!("{}", snapshot.state);
            Ok(exit_code_for(snapshot.state))
        }
    }
}

fn print_report(snapshot: &LiveSnapshot, json: bool) -> Result<(), String> {
    if json {
        let line = serde_json::to_string(snapshot)
            .map_err(|err| format!("Failed to serialize snapshot: {}", err))?;
        println!("{}", line);
    } else {
        print!("{}", render_report(snapshot));
    }
    Ok(())
}
