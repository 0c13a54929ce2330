use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use log::LevelFilter;

use offer_evaluation::api::scenario_dto::ScenarioDto;
use offer_evaluation::domain::offer::operation::{Operation, OperationKind};
use offer_evaluation::domain::scenario::Scenario;
use offer_evaluation::loader::parser::parse_json_file;
use offer_evaluation::logger;

/// Evaluates a pod instance requirement against a batch of offers.
#[derive(Parser, Debug)]
#[command(name = "offer-eval", version, about)]
struct Args {
    /// Scenario JSON with config, pod, requirement, persisted tasks and offers.
    #[arg(short, long)]
    scenario: String,

    /// Log at debug level regardless of RUST_LOG.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_with_level(args.verbose.then_some(LevelFilter::Debug));

    let dto: ScenarioDto = parse_json_file(&args.scenario).with_context(|| format!("Failed to load scenario '{}'", args.scenario))?;
    let scenario = Scenario::from_dto(dto).context("Failed to build scenario")?;
    let operations = scenario.run().context("Evaluation failed")?;

    if operations.is_empty() {
        println!("{}", format!("No offer satisfies {}", scenario.requirement).yellow());
        return Ok(());
    }

    println!("{} {}", "Accepted".green().bold(), operations[0].offer_id());
    for operation in &operations {
        print_operation(operation);
    }
    Ok(())
}

fn print_operation(operation: &Operation) {
    let kind = format!("{:<13}", operation.kind().to_string());
    let kind = match operation.kind() {
        OperationKind::Reserve | OperationKind::Create => kind.cyan(),
        OperationKind::Unreserve | OperationKind::Destroy => kind.red(),
        OperationKind::Launch | OperationKind::LaunchGroup => kind.green(),
    };

    match (operation.resource(), operation.task()) {
        (Some(resource), _) => println!("  {} {}", kind, resource),
        (None, Some(task)) => {
            let marker = if operation.should_launch() { "" } else { " (metadata only)" };
            println!("  {} {}{}", kind, task.name, marker.dimmed());
        }
        (None, None) => println!("  {}", kind),
    }
}
