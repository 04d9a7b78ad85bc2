//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Test and benchmark execution engine
#[derive(Parser, Debug)]
#[command(name = "benchsuite")]
#[command(author = "hephaex@gmail.com")]
#[command(version)]
#[command(about = "Run test and benchmark trees sequentially or in parallel")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the test tree
    Run(RunArgs),

    /// List tests in the tree
    List(ListArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Run only tests with this full name (repeatable)
    #[arg(short, long)]
    pub test: Vec<String>,

    /// Run only tests in these categories (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub category: Vec<String>,

    /// Worker threads (0 = sequential)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Default timeout per test in ms (0 = none)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Stop the run after the first failure
    #[arg(long)]
    pub stop_on_error: bool,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Measured runs per benchmark
    #[arg(long)]
    pub bench_count: Option<u32>,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Save results to file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Configuration file
    #[arg(long)]
    pub config: Option<String>,

    /// Do not print tests as they run
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Show categories and run state of each test
    #[arg(short, long)]
    pub detailed: bool,

    /// List only tests in these categories (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub category: Vec<String>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "benchsuite.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the first file found)
        file: Option<String>,
    },

    /// Set a run setting, e.g. `NumberOfWorkers 4`
    Set {
        key: String,
        value: String,

        /// File to update
        #[arg(short, long, default_value = "benchsuite.yaml")]
        file: String,
    },

    /// Print a run setting
    Get {
        key: String,

        /// File to read (defaults to the first file found)
        #[arg(short, long)]
        file: Option<String>,
    },

    /// List environment variable overrides
    Env,
}
