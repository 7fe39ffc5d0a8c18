//! CLI for wifimon: measure WiFi quality around a building and keep the history.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wifimon_core::Location;

#[derive(Parser)]
#[command(name = "wifimon")]
#[command(about = "wifimon: sample WiFi quality at named locations and keep the history")]
#[command(version = wifimon_core::VERSION)]
struct Cli {
    /// TOML config file (defaults apply to anything it leaves out)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one collection pass over the given locations, in order.
    /// Ctrl+C stops at the next location boundary.
    Collect {
        /// Location as NAME:X:Y (repeatable); default: locations from the config file
        #[arg(long = "location", value_name = "NAME:X:Y")]
        locations: Vec<Location>,

        /// Pause between locations (e.g. "5s", "500ms", "1m")
        #[arg(long)]
        delay: Option<String>,

        /// Sample store (JSON file)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Second JSON file receiving a copy of every sample
        #[arg(long)]
        mirror: Option<PathBuf>,

        /// Use random readings instead of speedtest-cli, ping and the wireless tools
        #[arg(long)]
        simulate: bool,
    },

    /// Serve the collection and history HTTP API for the dashboard
    Serve {
        /// Bind address (default: from config, 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Port (default: from config, 8050)
        #[arg(long)]
        port: Option<u16>,

        /// Sample store (JSON file)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Second JSON file receiving a copy of every sample
        #[arg(long)]
        mirror: Option<PathBuf>,

        /// Use random readings instead of the system tools
        #[arg(long)]
        simulate: bool,
    },

    /// Show the most recent samples, newest first
    Recent {
        /// Number of samples
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Sample store (JSON file)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Per-group means of every metric
    Summary {
        /// Grouping: location, date, hour, run
        #[arg(long, default_value = "location")]
        by: String,

        /// Only this location
        #[arg(long)]
        location: Option<String>,

        /// Only this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Only this hour (HH:00)
        #[arg(long)]
        hour: Option<String>,

        /// Sample store (JSON file)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the run number the next collection would use
    NextRun {
        /// Sample store (JSON file)
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Run each measurement probe once and print what it returns
    Probe,

    /// Write a synthetic history for trying the dashboard without hardware
    Seed {
        /// Output JSON file
        #[arg(long)]
        output: PathBuf,

        /// First timestamp (YYYY-MM-DD [HH:MM[:SS]]); default 2025-04-05 08:00
        #[arg(long)]
        start: Option<String>,

        /// Last timestamp, inclusive; default 2025-04-08 18:00
        #[arg(long)]
        end: Option<String>,

        /// Spacing between samples of one location
        #[arg(long, default_value = "5m")]
        interval: String,

        /// Replace an existing output file instead of refusing
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref());

    match cli.command {
        Commands::Collect {
            locations,
            delay,
            store,
            mirror,
            simulate,
        } => commands::collect::run(
            &config,
            locations,
            delay.as_deref(),
            store.as_deref(),
            mirror.as_deref(),
            simulate,
        ),
        Commands::Serve {
            host,
            port,
            store,
            mirror,
            simulate,
        } => commands::serve::run(
            &config,
            host.as_deref(),
            port,
            store.as_deref(),
            mirror.as_deref(),
            simulate,
        ),
        Commands::Recent { limit, store, json } => {
            commands::recent::run(&config, limit, store.as_deref(), json)
        }
        Commands::Summary {
            by,
            location,
            date,
            hour,
            store,
            json,
        } => commands::summary::run(
            &config,
            &by,
            wifimon_core::RowFilter {
                location,
                date,
                hour,
            },
            store.as_deref(),
            json,
        ),
        Commands::NextRun { store } => commands::next_run::run(&config, store.as_deref()),
        Commands::Probe => commands::probe::run(&config),
        Commands::Seed {
            output,
            start,
            end,
            interval,
            force,
        } => commands::seed::run(
            &output,
            start.as_deref(),
            end.as_deref(),
            &interval,
            force,
        ),
    }
}
