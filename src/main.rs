use log::error;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use recipe_agent::{process_batch_file, process_url, AgentError, OutputFormat, Settings};

const USAGE: &str = "Usage:
  recipe-agent <url> [--format html|latex]
  recipe-agent --batch <file> [--format html|latex]";

enum Command {
    Single(String),
    Batch(PathBuf),
}

fn parse_args(args: &[String]) -> Result<(Command, OutputFormat), String> {
    let mut format = OutputFormat::default();
    let mut url = None;
    let mut batch = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--format" | "-f" => {
                let value = iter.next().ok_or("--format needs a value")?;
                format = value.parse()?;
            }
            "--batch" | "-b" => {
                let value = iter.next().ok_or("--batch needs a file")?;
                batch = Some(PathBuf::from(value));
            }
            "--help" | "-h" => return Err(USAGE.to_string()),
            other if other.starts_with('-') => return Err(format!("Unknown option: {}", other)),
            other => {
                if url.replace(other.to_string()).is_some() {
                    return Err("Only one URL may be given".to_string());
                }
            }
        }
    }

    let command = match (url, batch) {
        (Some(url), None) => Command::Single(url),
        (None, Some(path)) => Command::Batch(path),
        (Some(_), Some(_)) => return Err("Give either a URL or --batch, not both".to_string()),
        (None, None) => return Err(USAGE.to_string()),
    };
    Ok((command, format))
}

async fn run(command: Command, format: OutputFormat, settings: Settings) -> Result<(), AgentError> {
    match command {
        Command::Single(url) => {
            let processed = process_url(&url, &settings, format).await?;
            let outcome = &processed.outcome;
            for warning in &outcome.context.warnings {
                println!("warning [{}]: {}", warning.stage, warning.message);
            }
            println!(
                "{} (score {:.2}) -> {}",
                outcome.url,
                outcome.verdict.as_ref().map_or(0.0, |v| v.score),
                processed.output.display()
            );
            Ok(())
        }
        Command::Batch(path) => {
            let report = process_batch_file(&path, &settings, format).await?;
            for entry in &report.entries {
                match (&entry.stage, &entry.error) {
                    (Some(stage), Some(reason)) => println!(
                        "{:<9} {} [{}: {}]",
                        entry.status.label(),
                        entry.url,
                        stage,
                        reason
                    ),
                    (None, Some(reason)) => println!(
                        "{:<9} {} [{}]",
                        entry.status.label(),
                        entry.url,
                        reason
                    ),
                    _ => println!(
                        "{:<9} {}",
                        entry.status.label(),
                        entry.url
                    ),
                }
            }
            println!(
                "{} accepted, {} rejected, {} failed, {} cancelled",
                report.accepted, report.rejected, report.failed, report.cancelled
            );
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (command, format) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(command, format, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(AgentError::Pipeline(failure)) => {
            eprintln!(
                "Failed at {}: {} ({})",
                failure.stage,
                failure.error,
                failure.error.kind()
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
