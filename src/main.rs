use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use holifest::api::ImmichClient;
use holifest::config::Config;
use holifest::logging;
use holifest::sync::{self, RunState, RunSummary, SyncEvent, SyncPlan};

struct CliArgs {
    config_path: Option<PathBuf>,
    api_key: Option<String>,
    years: Option<(i32, i32)>,
    holidays: Vec<String>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = CliArgs {
        config_path: None,
        api_key: None,
        years: None,
        holidays: Vec::new(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("holifest {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--api-key" => {
                if i + 1 < args.len() {
                    parsed.api_key = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    eprintln!("Error: --api-key requires a value");
                    std::process::exit(1);
                }
            }
            "--years" => {
                if i + 1 < args.len() {
                    match parse_years(&args[i + 1]) {
                        Ok(range) => parsed.years = Some(range),
                        Err(e) => {
                            eprintln!("Error: {e}");
                            std::process::exit(1);
                        }
                    }
                    i += 1;
                } else {
                    eprintln!("Error: --years requires a range argument");
                    std::process::exit(1);
                }
            }
            "--holiday" | "-H" => {
                if i + 1 < args.len() {
                    parsed.holidays.push(args[i + 1].clone());
                    i += 1;
                } else {
                    eprintln!("Error: --holiday requires a name argument");
                    std::process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"holifest - collects photos taken around holidays into Immich albums

USAGE:
    holifest [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --api-key KEY       Immich API key (overrides HOLIFEST_API_KEY)
    --years RANGE       Override the year range, e.g. 2015-2024 or 2024
    --holiday, -H NAME  Only sync the named holiday (repeatable)
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    HOLIFEST_API_KEY    Immich API key
    HOLIFEST_LOG        Log level (trace, debug, info, warn, error)
"#
    );
}

fn parse_years(raw: &str) -> Result<(i32, i32)> {
    let parse_one = |s: &str| -> Result<i32> {
        s.trim()
            .parse()
            .with_context(|| format!("'{s}' is not a year"))
    };

    match raw.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (parse_one(start)?, parse_one(end)?);
            if start > end {
                bail!("year range {start}-{end} is inverted");
            }
            Ok((start, end))
        }
        None => {
            let year = parse_one(raw)?;
            Ok((year, year))
        }
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let args = parse_args();
    logging::init(None)?;

    let mut config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some((start, end)) = args.years {
        config.sync.start_year = start;
        config.sync.end_year = end;
    }
    if !args.holidays.is_empty() {
        for name in &args.holidays {
            if !config.holidays.iter().any(|h| h.name.eq_ignore_ascii_case(name)) {
                bail!("holiday '{name}' is not configured");
            }
        }
        config
            .holidays
            .retain(|h| args.holidays.iter().any(|name| h.name.eq_ignore_ascii_case(name)));
    }
    config.validate()?;

    let api_key = args
        .api_key
        .or_else(|| std::env::var("HOLIFEST_API_KEY").ok())
        .filter(|key| !key.trim().is_empty())
        .context("API key required: pass --api-key or set HOLIFEST_API_KEY")?;

    let client = ImmichClient::new(&config.base_url, &api_key, &config.search, &config.retry);
    let plan = SyncPlan::from_config(&config);

    println!(
        "Syncing {} holiday(s), years {}-{}, against {}",
        plan.holidays.len(),
        plan.start_year,
        plan.end_year,
        client.base_url()
    );

    let handle = sync::spawn(client, plan);
    for event in handle.events.iter() {
        match event {
            SyncEvent::Started { holidays, windows } => {
                println!("Planned {windows} search window(s) across {holidays} holiday(s)");
            }
            SyncEvent::HolidayStarted { holiday } => {
                println!("[{holiday}] searching...");
            }
            SyncEvent::WindowCompleted { holiday, year, matched, error } => match error {
                Some(e) => println!("[{holiday}] {year}: failed ({e})"),
                None => println!("[{holiday}] {year}: {matched} matched"),
            },
            SyncEvent::HolidayCompleted { outcome } => {
                println!(
                    "[{}] done: {} matched, {} added, {} already present",
                    outcome.holiday,
                    outcome.matched_count,
                    outcome.added_count,
                    outcome.already_present_count
                );
            }
            SyncEvent::Completed { .. } | SyncEvent::Cancelled { .. } | SyncEvent::Failed { .. } => {
                break;
            }
        }
    }

    let summary = handle.join();
    print_summary(&summary);

    Ok(match summary.state {
        RunState::Completed => 0,
        RunState::Cancelled => 130,
        _ => 1,
    })
}

fn print_summary(summary: &RunSummary) {
    println!();
    for outcome in summary.outcomes.values() {
        let note = match &outcome.error {
            Some(e) => format!(" [error: {e}]"),
            None => String::new(),
        };
        println!(
            "{}: {} matched, {} added, {} already present{}",
            outcome.holiday,
            outcome.matched_count,
            outcome.added_count,
            outcome.already_present_count,
            note
        );
    }

    match &summary.state {
        RunState::Completed => println!(
            "Completed: added {} asset(s) across {} album(s)",
            summary.total_added(),
            summary.outcomes.len()
        ),
        RunState::Cancelled => println!(
            "Cancelled: added {} asset(s) before stopping",
            summary.total_added()
        ),
        RunState::Failed(e) => println!("Failed: {e}"),
        RunState::Running => {}
    }
}
