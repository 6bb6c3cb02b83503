//! FlowRunner CLI Entry Point
//!
//! Command-line interface for validating and running workflow templates.
//!
//! # Usage
//!
//! ```bash
//! # Validate a template without running it
//! flowrunner validate kickoff.yaml
//!
//! # Run a template with the built-in handlers
//! flowrunner run kickoff.yaml --input '{"env":"demo"}'
//!
//! # Simulate a template through the mock engine
//! flowrunner simulate kickoff.yaml --failure-rate 0.2
//!
//! # Load engine settings from a config file
//! flowrunner run kickoff.yaml --config engine.yaml
//! ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info};
use serde_json::Value;
use tokio::time::{sleep, Duration};

use flowrunner::config::EngineConfig;
use flowrunner::mock::MockWorkflowEngine;
use flowrunner::monitoring::ExecutionMonitor;
use flowrunner::registry::default_registry;
use flowrunner::service::{WorkflowEngine, WorkflowService};
use flowrunner::store::MemoryStore;
use flowrunner::workflow::load_template;
use flowrunner::workflow::model::StepStatus;
use flowrunner::{APP_NAME, VERSION};

/// How often run progress is polled, in milliseconds.
const POLL_INTERVAL_MS: u64 = 100;

/// What the CLI was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Validate,
    Run,
    Simulate,
}

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    command: Command,
    template_path: String,
    input: Value,
    config_path: Option<String>,
    failure_rate: Option<f64>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Workflow Execution Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: flowrunner <COMMAND> <TEMPLATE_FILE> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  validate            Check a template without running it");
    println!("  run                 Execute a template with the built-in handlers");
    println!("  simulate            Drive a template through the mock engine");
    println!();
    println!("Options:");
    println!("  --input JSON        Run input as a JSON object (default: {{}})");
    println!("  --config PATH       Engine configuration YAML file");
    println!("  --failure-rate F    Simulated failure probability, 0.0-1.0 (simulate only)");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  flowrunner validate kickoff.yaml");
    println!("  flowrunner run kickoff.yaml --input '{{\"env\":\"demo\"}}'");
    println!("  flowrunner simulate kickoff.yaml --failure-rate 0.2");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut command: Option<Command> = None;
    let mut template_path: Option<String> = None;
    let mut input = Value::Object(serde_json::Map::new());
    let mut config_path = None;
    let mut failure_rate = None;
    let mut verbose = false;

    let mut i = 1; // Skip program name
    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                verbose = true;
            }
            "--input" => {
                i += 1;
                if i >= args.len() {
                    return Err("--input requires a JSON argument".to_string());
                }
                input = serde_json::from_str(&args[i])
                    .map_err(|e| format!("Invalid --input JSON: {}", e))?;
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("--config requires a path argument".to_string());
                }
                config_path = Some(args[i].clone());
            }
            "--failure-rate" => {
                i += 1;
                if i >= args.len() {
                    return Err("--failure-rate requires a number argument".to_string());
                }
                let rate: f64 = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid failure rate: {}", args[i]))?;
                if !(0.0..=1.0).contains(&rate) {
                    return Err(format!("Failure rate must be in 0.0-1.0, got {}", rate));
                }
                failure_rate = Some(rate);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if command.is_none() {
                    command = Some(match arg.as_str() {
                        "validate" => Command::Validate,
                        "run" => Command::Run,
                        "simulate" => Command::Simulate,
                        other => return Err(format!("Unknown command: {}", other)),
                    });
                } else if template_path.is_none() {
                    template_path = Some(arg.clone());
                } else {
                    return Err(format!("Unexpected argument: {}", arg));
                }
            }
        }
        i += 1;
    }

    let command = command.ok_or_else(|| "Missing command".to_string())?;
    let template_path = template_path.ok_or_else(|| "Missing template file".to_string())?;

    Ok(Config {
        command,
        template_path,
        input,
        config_path,
        failure_rate,
        verbose,
    })
}

/// Prints the final per-step outcome table for a finished run.
async fn print_run_summary(
    service: &dyn WorkflowService,
    execution_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let view = service.get_execution_status(execution_id).await?;

    println!();
    println!("Execution {} finished: {:?}", execution_id, view.execution.status);
    println!(
        "  {} completed, {} failed, {} skipped of {} steps",
        view.execution.completed_steps,
        view.execution.failed_steps,
        view.execution.skipped_steps,
        view.execution.total_steps
    );
    if let Some(error) = &view.execution.error {
        println!("  Error: {}", error);
    }
    println!();

    for step in &view.steps {
        let marker = match step.status {
            StepStatus::Completed => "ok",
            StepStatus::Skipped => "skip",
            StepStatus::Pending | StepStatus::Running => "-",
            _ => "FAIL",
        };
        let attempts = if step.attempt > 1 {
            format!(" ({} attempts)", step.attempt)
        } else {
            String::new()
        };
        println!("  [{:>4}] {}{}", marker, step.step_id, attempts);
    }

    Ok(())
}

/// Waits for a run to reach a terminal state.
async fn wait_for_completion(
    service: &dyn WorkflowService,
    execution_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let view = service.get_execution_status(execution_id).await?;
        if view.execution.status.is_terminal() {
            return Ok(());
        }
        sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

async fn run_command(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let engine_config = match &config.config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    info!("Loading template: {}", config.template_path);
    let template = load_template(&config.template_path).map_err(|e| {
        error!("Failed to load template: {}", e);
        format!(
            "Could not load template from '{}': {}",
            config.template_path, e
        )
    })?;

    info!(
        "Template loaded: '{}' with {} steps",
        template.name,
        template.steps.len()
    );

    match config.command {
        Command::Validate => {
            // load_template already validated; report and exit
            println!("Template '{}' is valid ({} steps)", template.name, template.steps.len());
            Ok(())
        }
        Command::Run => {
            let store = Arc::new(MemoryStore::new());
            let engine = WorkflowEngine::new(
                store.clone(),
                store,
                Arc::new(default_registry()),
                Arc::new(ExecutionMonitor::with_capacity(
                    engine_config.event_log_capacity,
                )),
                engine_config,
            );

            let template = engine.create_template(template).await?;
            let started = engine.start_execution(&template.id, config.input).await?;
            info!(
                "Execution {} started ({} steps)",
                started.execution_id, started.total_steps
            );

            wait_for_completion(&engine, &started.execution_id).await?;
            print_run_summary(&engine, &started.execution_id).await?;
            Ok(())
        }
        Command::Simulate => {
            let mut mock_config = engine_config.mock;
            if let Some(rate) = config.failure_rate {
                mock_config.failure_rate = rate;
            }
            info!(
                "Simulating with failure rate {:.2}, delay {:?} ms",
                mock_config.failure_rate, mock_config.delay_range_ms
            );

            let engine = MockWorkflowEngine::new(mock_config);
            let template = engine.create_template(template).await?;
            let started = engine.start_execution(&template.id, config.input).await?;

            wait_for_completion(&engine, &started.execution_id).await?;
            print_run_summary(&engine, &started.execution_id).await?;

            let stats = engine.stats();
            println!(
                "Simulator: {} steps executed, {} retries",
                stats.steps_executed, stats.retries
            );
            Ok(())
        }
    }
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);

    // Print banner
    print_banner();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_command(config))
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
