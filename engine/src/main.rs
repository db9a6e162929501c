//! Rowframe CLI - run step plans over JSON record files
//!
//! # Commands
//!
//! ```bash
//! rowframe run plan.json input.json -t ages=ages.json   # Execute a plan
//! rowframe check plan.json input.json                   # Check a plan against an input header
//! rowframe validate input.json rules.json               # Validate records against rules
//! rowframe example-plan                                 # Print an example plan
//! ```

use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use rowframe::io::{Extract, JsonFileExtractor, JsonFileLoader, Load};
use rowframe::logs::{log_error, LogEntry, LogLevel, LOG_BROADCASTER};
use rowframe::pipeline::{execute, PipelineSpec};
use rowframe::validation::{validate, RuleSpec};
use rowframe::{Cell, Condition, JoinKind, RuleSet, Step, Table, WindowSpec};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "rowframe")]
#[command(about = "Relational transforms over JSON record files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a plan and write the resulting records
    Run {
        /// Plan JSON file
        plan: PathBuf,

        /// Input JSON file (array of records)
        input: PathBuf,

        /// Named table used by join/set steps, as NAME=PATH
        #[arg(short, long = "table", value_parser = parse_table_arg)]
        tables: Vec<(String, PathBuf)>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check the columns a plan reads against an input file
    Check {
        /// Plan JSON file
        plan: PathBuf,

        /// Input JSON file (array of records)
        input: PathBuf,
    },

    /// Validate records against per-field rules
    Validate {
        /// Input JSON file (array of records)
        input: PathBuf,

        /// Rules JSON file: { "field": [{ "rule": "required" }, ...] }
        rules: PathBuf,
    },

    /// Show an example plan
    ExamplePlan,
}

fn main() {
    let mut events = LOG_BROADCASTER.subscribe();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            plan,
            input,
            tables,
            output,
        } => cmd_run(&plan, &input, &tables, output.as_deref()),
        Commands::Check { plan, input } => cmd_check(&plan, &input),
        Commands::Validate { input, rules } => cmd_validate(&input, &rules),
        Commands::ExamplePlan => cmd_example_plan(),
    };

    if let Err(e) = &result {
        log_error(e.to_string());
    }
    print_events(&mut events);

    match result {
        Ok(true) => {}
        Ok(false) | Err(_) => std::process::exit(1),
    }
}

/// Print every engine event received so far to stderr.
fn print_events(events: &mut broadcast::Receiver<LogEntry>) {
    loop {
        match events.try_recv() {
            Ok(entry) => {
                let marker = match entry.level {
                    LogLevel::Info => "  ",
                    LogLevel::Success => "ok",
                    LogLevel::Warning => "!!",
                    LogLevel::Error => "xx",
                };
                eprintln!("{} {}{}", marker, "  ".repeat(entry.indent as usize), entry.message);
            }
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                eprintln!("   ({} log entries dropped)", skipped);
            }
            Err(_) => break,
        }
    }
}

fn parse_table_arg(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok((name.to_string(), PathBuf::from(path))),
        _ => Err(format!("expected NAME=PATH, got '{}'", arg)),
    }
}

fn read_table(path: &Path) -> CliResult<Table> {
    Ok(JsonFileExtractor::new(path).extract()?)
}

fn read_plan(path: &Path) -> CliResult<PipelineSpec> {
    let content = fs::read_to_string(path)?;
    Ok(PipelineSpec::from_json(&content)?)
}

fn cmd_run(plan: &Path, input: &Path, tables: &[(String, PathBuf)], output: Option<&Path>) -> CliResult<bool> {
    let spec = read_plan(plan)?;
    let table = read_table(input)?;

    let mut named = HashMap::new();
    for (name, path) in tables {
        named.insert(name.clone(), read_table(path)?);
    }

    let run = execute(&table, &spec, &named)?;

    match output {
        Some(path) => {
            let result = JsonFileLoader::new(path).load(&run.table);
            if !result.success {
                return Err(result.errors.join("; ").into());
            }
            eprintln!("Wrote {} record(s) to {}", result.row_count, path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&run.table.to_records())?),
    }
    Ok(run.is_valid())
}

fn cmd_check(plan: &Path, input: &Path) -> CliResult<bool> {
    let spec = read_plan(plan)?;
    let table = read_table(input)?;

    let tables = spec.referenced_tables();
    if !tables.is_empty() {
        eprintln!("Named tables required: {}", tables.join(", "));
    }

    match spec.validate_headers(table.header()) {
        Ok(()) => {
            eprintln!("Plan is compatible with {} ({} step(s))", input.display(), spec.steps.len());
            Ok(true)
        }
        Err(missing) => {
            for m in &missing {
                eprintln!("missing {}", m);
            }
            Ok(false)
        }
    }
}

fn cmd_validate(input: &Path, rules: &Path) -> CliResult<bool> {
    let table = read_table(input)?;
    let specs: IndexMap<String, Vec<RuleSpec>> = serde_json::from_str(&fs::read_to_string(rules)?)?;

    let mut rule_set = RuleSet::new();
    for (field, list) in &specs {
        let built = list.iter().map(RuleSpec::build).collect::<Result<Vec<_>, _>>()?;
        rule_set.insert(field.clone(), built);
    }

    let report = validate(&table, &rule_set)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.valid)
}

fn cmd_example_plan() -> CliResult<bool> {
    let spec = PipelineSpec {
        description: "Adults joined with their orders, ranked by order total".to_string(),
        steps: vec![
            Step::Filter {
                field: "age".to_string(),
                condition: Condition::Gte(Cell::Int(18)),
            },
            Step::Join {
                table: "orders".to_string(),
                keys: vec!["id".to_string()],
                right_keys: vec!["customer_id".to_string()],
                kind: JoinKind::Left,
            },
            Step::Rank {
                target: "spend_rank".to_string(),
                window: WindowSpec::new().order_by("total").descending(true),
            },
        ],
        ..PipelineSpec::new()
    };
    println!("{}", spec.to_json()?);
    eprintln!("{}", json!({ "tables": spec.referenced_tables() }));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table_arg() {
        assert_eq!(
            parse_table_arg("ages=data/ages.json").unwrap(),
            ("ages".to_string(), PathBuf::from("data/ages.json"))
        );
        assert!(parse_table_arg("ages").is_err());
        assert!(parse_table_arg("=x.json").is_err());
    }

    #[test]
    fn test_run_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let plan = dir.path().join("plan.json");
        let input = dir.path().join("input.json");
        let ages = dir.path().join("ages.json");
        let output = dir.path().join("out.json");

        fs::write(
            &plan,
            json!({ "steps": [{ "type": "join", "table": "ages", "keys": ["id"] }] }).to_string(),
        )
        .unwrap();
        fs::write(&input, json!([{ "id": 1, "name": "Alice" }, { "id": 2, "name": "Bob" }]).to_string()).unwrap();
        fs::write(&ages, json!([{ "id": 1, "age": 25 }]).to_string()).unwrap();

        let ok = cmd_run(&plan, &input, &[("ages".to_string(), ages)], Some(&output)).unwrap();
        assert!(ok);

        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written, json!([{ "id": 1, "name": "Alice", "age": 25 }]));
    }
}
