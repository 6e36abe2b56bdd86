use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use epo_codegen::CodeStrategy;
use epo_core::OrchestratorConfig;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod simulate;

use simulate::{run_simulation, SimulationConfig};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_strategy(s: &str) -> Result<CodeStrategy, String> {
    match s {
        "sequence" => Ok(CodeStrategy::Sequence),
        "derived-count" => Ok(CodeStrategy::DerivedCount),
        other => Err(format!(
            "unknown strategy {other:?}, expected sequence or derived-count"
        )),
    }
}

fn cli() -> Command {
    Command::new("epo")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Entity provisioning orchestrator tools")
        .arg_required_else_help(true)
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(
            Command::new("check-config")
                .about("Load and validate an orchestrator configuration file")
                .arg(
                    Arg::new("path")
                        .required(true)
                        .value_parser(value_parser!(std::path::PathBuf))
                        .help("Path to the TOML configuration"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the effective configuration as JSON"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Create studies concurrently against in-memory backends")
                .arg(
                    Arg::new("studies")
                        .long("studies")
                        .default_value("20")
                        .value_parser(value_parser!(usize))
                        .help("Number of concurrent study creations"),
                )
                .arg(
                    Arg::new("strategy")
                        .long("strategy")
                        .default_value("sequence")
                        .value_parser(parse_strategy)
                        .help("Code strategy: sequence or derived-count"),
                )
                .arg(
                    Arg::new("latency-ms")
                        .long("latency-ms")
                        .default_value("20")
                        .value_parser(value_parser!(u64))
                        .help("Simulated storage latency per call"),
                )
                .arg(
                    Arg::new("program")
                        .long("program")
                        .default_value("SIM")
                        .help("Program code the studies are created under"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                ),
        )
}

fn check_config(path: &std::path::Path, json: bool) -> anyhow::Result<()> {
    let config = OrchestratorConfig::from_file(path)
        .with_context(|| format!("checking {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("Configuration OK: {}", path.display());
    println!("  Backend timeout: {}s", config.backend_timeout().as_secs());
    println!("  Code strategy: {:?}", config.code_strategy);
    println!("  Drives: {}", config.storage.drives.len());
    for drive in &config.storage.drives {
        println!("    {} ({:?}) at {}", drive.id, drive.drive_type, drive.root_path);
    }
    match config.program_root() {
        Some(root) => println!("  Program root: {} on {}", root.path, root.drive_id),
        None => println!("  Program root: none (program creation will fail)"),
    }
    match config.notebook.integration {
        Some(integration) => println!("  Notebook: {integration}"),
        None => println!("  Notebook: disabled"),
    }
    match config.git.service {
        Some(service) => println!("  Git: {service}"),
        None => println!("  Git: disabled"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    match matches.subcommand() {
        Some(("check-config", args)) => {
            let path = args
                .get_one::<std::path::PathBuf>("path")
                .context("missing config path")?;
            check_config(path, args.get_flag("json"))
        }
        Some(("simulate", args)) => {
            let config = SimulationConfig {
                studies: args.get_one::<usize>("studies").copied().unwrap_or(20),
                strategy: args
                    .get_one::<CodeStrategy>("strategy")
                    .copied()
                    .unwrap_or_default(),
                latency: Duration::from_millis(
                    args.get_one::<u64>("latency-ms").copied().unwrap_or(20),
                ),
                program_code: args
                    .get_one::<String>("program")
                    .cloned()
                    .unwrap_or_else(|| "SIM".to_string()),
            };

            let report = run_simulation(config).await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.generate_text());
            }
            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        _ => Ok(()),
    }
}
