//! benchsuite - test and benchmark execution engine
//!
//! Runs the built-in demo tree through the engine and reports results.
//!
//! ## Usage
//!
//! ```bash
//! # Run everything, choosing the dispatcher from configuration
//! benchsuite run
//!
//! # Only benchmarks, sequentially, as JSON
//! benchsuite run --category bench --workers 0 --format json
//!
//! # Inspect the tree
//! benchsuite list --detailed
//!
//! # Configuration
//! benchsuite config init
//! benchsuite config set NumberOfWorkers 8
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use benchsuite::cli::{self, Args};
use benchsuite::config::{print_env_help, ConfigFile, EnvConfig};
use benchsuite::demo::demo_tree;
use benchsuite::executor::TestRunner;
use benchsuite::filter::TestFilter;
use benchsuite::listener::{NullListener, TestListener};
use benchsuite::models::Test;
use benchsuite::output::{write_results_to_file, ConsoleListener, OutputFormat, ResultFormatter};
use benchsuite::utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let level = match args.log_level.as_deref().or(env.log_level.as_deref()) {
        Some(name) => name.parse().map_err(anyhow::Error::msg)?,
        None if args.verbose => LogLevel::Debug,
        None => LogLevel::default(),
    };
    init_logger(level);

    match args.command {
        cli::Command::Run(run_args) => {
            let has_failures = run_tests(run_args, &env).await?;
            if has_failures {
                std::process::exit(1);
            }
        }
        cli::Command::List(list_args) => {
            list_tests(list_args);
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &env)?;
        }
    }

    Ok(())
}

/// Configuration file (explicit path, `BENCHSUITE_CONFIG`, or default
/// locations) with environment overrides applied
fn load_config(path: Option<&str>, env: &EnvConfig) -> Result<ConfigFile> {
    let mut config = match path.or(env.config_file.as_deref()) {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };
    env.apply_to(&mut config.settings);
    Ok(config)
}

fn build_filter(names: &[String], categories: &[String]) -> TestFilter {
    let by_name = names.iter().cloned().map(TestFilter::full_name).reduce(TestFilter::or);
    let by_category = (!categories.is_empty()).then(|| TestFilter::Categories(categories.to_vec()));

    match (by_name, by_category) {
        (Some(names), Some(categories)) => names.and(categories),
        (Some(filter), None) | (None, Some(filter)) => filter,
        (None, None) => TestFilter::Empty,
    }
}

async fn run_tests(args: cli::RunArgs, env: &EnvConfig) -> Result<bool> {
    let config = load_config(args.config.as_deref(), env)?;
    let mut settings = config.settings;

    if let Some(workers) = args.workers {
        settings.number_of_workers = Some(workers);
    }
    if let Some(timeout) = args.timeout {
        settings.default_timeout_ms = timeout;
    }
    if args.stop_on_error {
        settings.stop_on_error = true;
    }
    if let Some(seed) = args.seed {
        settings.random_seed = seed;
    }
    if let Some(count) = args.bench_count {
        if count == 0 {
            anyhow::bail!("--bench-count must be at least 1");
        }
        settings.benchmark_count = count;
    }

    let format: OutputFormat = args
        .format
        .or_else(|| env.format.clone())
        .or(config.format)
        .as_deref()
        .unwrap_or("table")
        .parse()
        .map_err(anyhow::Error::msg)?;
    let filter = build_filter(&args.test, &args.category);

    let mut runner = TestRunner::new(settings);
    let loaded = runner.load(demo_tree());
    let selected = runner.count_test_cases(&filter)?;
    info!("Loaded {} tests, {} selected", loaded, selected);

    let live = format == OutputFormat::Table && !args.quiet;
    let listener: Arc<dyn TestListener> = if live {
        Arc::new(ConsoleListener::stdout())
    } else {
        Arc::new(NullListener)
    };

    let handle = runner.run_async(listener, &filter)?;
    let stopper = handle.clone();
    let result = tokio::select! {
        result = handle.join() => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping run");
            stopper.stop(false);
            stopper.join().await?
        }
    };

    let formatter = ResultFormatter::new(format);
    if live {
        println!("{}", formatter.format_summary(&result.summary()));
    } else {
        println!("{}", formatter.format_result(&result));
    }

    if let Some(path) = &args.output {
        write_results_to_file(path, &result, format)
            .with_context(|| format!("Failed to write results to {path}"))?;
        println!("Results saved to: {path}");
    }

    Ok(result.summary().has_failures())
}

fn list_tests(args: cli::ListArgs) {
    let root = demo_tree();
    let filter = build_filter(&[], &args.category);

    println!("Tests ({}):", filter.count_test_cases(&root));
    print_node(&root, &filter, &mut Vec::new(), args.detailed);
}

fn print_node<'a>(test: &'a Test, filter: &TestFilter, ancestors: &mut Vec<&'a Test>, detailed: bool) {
    if !filter.pass(test, ancestors.as_slice()) {
        return;
    }

    let indent = "  ".repeat(ancestors.len() + 1);
    if detailed {
        let categories = test.categories().join(",");
        println!(
            "{indent}{:<40} {:<12} {}",
            test.name(),
            test.run_state().to_string(),
            categories
        );
    } else {
        println!("{indent}{}", test.name());
    }

    ancestors.push(test);
    for child in test.children() {
        print_node(child, filter, ancestors, detailed);
    }
    ancestors.pop();
}

fn manage_config(args: cli::ConfigArgs, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!("Configuration file already exists: {output}. Use --force to overwrite.");
            }

            ConfigFile::example().save(path)?;
            println!("✓ Configuration file created: {output}");
        }

        cli::ConfigAction::Show { format } => {
            let config = load_config(None, env)?;
            let output = if format == "json" {
                serde_json::to_string_pretty(&config)?
            } else {
                serde_yaml::to_string(&config)?
            };
            println!("{output}");
        }

        cli::ConfigAction::Validate { file } => {
            let path = match file {
                Some(file) => file,
                None => ConfigFile::find()
                    .map(|p| p.display().to_string())
                    .context("No configuration file found")?,
            };

            match ConfigFile::load(&path) {
                Ok(_) => println!("✓ Configuration file is valid: {path}"),
                Err(e) => {
                    println!("✗ Configuration file is invalid: {path}");
                    println!("  Error: {e:#}");
                    std::process::exit(1);
                }
            }
        }

        cli::ConfigAction::Set { key, value, file } => {
            let mut config = if Path::new(&file).exists() {
                ConfigFile::load(&file)?
            } else {
                ConfigFile::new()
            };

            if !config.settings.apply(&key, &value)? {
                anyhow::bail!("Unknown setting: {key}");
            }
            config.save(&file)?;
            println!("✓ Set {key} = {value} in {file}");
        }

        cli::ConfigAction::Get { key, file } => {
            let config = match file {
                Some(path) => ConfigFile::load(path)?,
                None => load_config(None, env)?,
            };

            let map = config.settings.to_map();
            let value = map.get(&key).with_context(|| format!("Unknown setting: {key}"))?;
            println!("{value}");
        }

        cli::ConfigAction::Env => {
            print_env_help();
        }
    }

    Ok(())
}
