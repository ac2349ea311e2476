// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use hearth_app::filter::apply;
use hearth_app::validation::{format_compact_cents, format_date, format_percent};
use hearth_app::{AppState, Goal, GoalCriteria, SearchHit, SortSpec};
use hearth_db::Store;
use hearth_tui::{AppRuntime, UiOptions};
use runtime::{Runtime, resolve_identity};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::{Date, OffsetDateTime};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEMO_SEED: u64 = 2026;
const LOG_ENV: &str = "HEARTH_LOG";

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `hearth --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    init_logging(&log_file_path(&db_path)?, config.log_level())?;

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or HEARTH_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    if options.demo {
        store.seed_demo_data(DEMO_SEED)?;
    }

    let client = match config.api_base_url() {
        Some(base_url) => Some(
            hearth_api::Client::new(base_url, config.api_timeout()?).with_context(|| {
                format!(
                    "invalid [api] config in {}; fix base_url/timeout values",
                    options.config_path.display()
                )
            })?,
        ),
        None => None,
    };

    let ui_options = UiOptions {
        search: config.search_config()?,
        autosave: config.autosave()?,
        ..UiOptions::default()
    };

    if options.check_only {
        if let Some(client) = &client {
            client
                .ping()
                .with_context(|| format!("reach hearth server at {}", client.base_url()))?;
        }
        return Ok(());
    }

    info!(db = %db_path.display(), remote = client.is_some(), "starting hearth");
    let profile = config.profile_email();
    match &client {
        Some(client) => {
            let identity = resolve_identity(client, profile, None)?;
            let state = AppState::for_role(identity.role, identity.is_admin);
            let runtime = Runtime::remote(client, &store, identity);
            execute(&options.command, &runtime, state, ui_options)
        }
        None => {
            let identity = resolve_identity(&store, profile, Some(&store))?;
            let state = AppState::for_role(identity.role, identity.is_admin);
            let runtime = Runtime::local(&store, identity);
            execute(&options.command, &runtime, state, ui_options)
        }
    }
}

fn execute<R: AppRuntime>(
    command: &Command,
    runtime: &R,
    mut state: AppState,
    ui_options: UiOptions,
) -> Result<()> {
    match command {
        Command::Tui => hearth_tui::run_app(&mut state, runtime, ui_options),
        Command::Goals { filter, sort } => {
            let criteria = match filter {
                Some(raw) => GoalCriteria::from_query_string(raw)
                    .with_context(|| format!("parse goal filter {raw:?}"))?,
                None => GoalCriteria::default(),
            };
            let sort = sort.as_deref().map(SortSpec::parse).transpose()?;
            let now = OffsetDateTime::now_utc();
            let goals = runtime.load_goals(&GoalCriteria::default())?;
            let view = apply(&goals, &criteria.as_of(now), sort);
            for line in goal_lines(&view, now.date()) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Search { query } => {
            let hits = runtime.search(query, ui_options.search.max_results)?;
            for line in search_lines(&hits) {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn log_file_path(db_path: &Path) -> Result<PathBuf> {
    if db_path == Path::new(":memory:") {
        return Ok(hearth_db::default_db_path()?.with_file_name("hearth.log"));
    }
    Ok(db_path.with_extension("log"))
}

fn init_logging(log_path: &Path, default_level: &str) -> Result<()> {
    if let Some(parent) = log_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("open log file {}", log_path.display()))?;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .try_init()
        .map_err(|error| anyhow!("install logger: {error}"))
}

fn goal_lines(goals: &[Goal], today: Date) -> Vec<String> {
    if goals.is_empty() {
        return vec!["no goals match".to_owned()];
    }
    goals
        .iter()
        .map(|goal| {
            let overdue = if goal.is_overdue(today) { " overdue" } else { "" };
            format!(
                "{:>4}  {:<28} {:<9} {:>5}  {} / {}  {}{overdue}",
                goal.id.get(),
                goal.title,
                goal.status,
                format_percent(goal.progress_percent()),
                format_compact_cents(goal.current_cents),
                format_compact_cents(goal.target_cents),
                format_date(goal.deadline),
            )
            .trim_end()
            .to_owned()
        })
        .collect()
}

fn search_lines(hits: &[SearchHit]) -> Vec<String> {
    if hits.is_empty() {
        return vec!["no matches".to_owned()];
    }
    hits.iter()
        .map(|hit| {
            format!(
                "{:<11} {}  ({})  {}",
                hit.kind.as_str(),
                hit.title,
                hit.subtitle,
                hit.route().path()
            )
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Tui,
    Goals {
        filter: Option<String>,
        sort: Option<String>,
    },
    Search {
        query: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    command: Command,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
        command: Command::Tui,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            "--sort" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--sort requires a spec like progress:desc"))?;
                match &mut options.command {
                    Command::Goals { sort, .. } => *sort = Some(value.as_ref().to_owned()),
                    _ => {
                        return Err(anyhow!("--sort only applies to the goals command"));
                    }
                }
            }
            "goals" if options.command == Command::Tui => {
                options.command = Command::Goals {
                    filter: None,
                    sort: None,
                };
            }
            "search" if options.command == Command::Tui => {
                let query = iter
                    .next()
                    .ok_or_else(|| anyhow!("search requires a query, for example `hearth search vacation`"))?;
                options.command = Command::Search {
                    query: query.as_ref().to_owned(),
                };
            }
            positional if !positional.starts_with('-') => match &mut options.command {
                Command::Goals { filter, .. } if filter.is_none() => {
                    *filter = Some(positional.to_owned());
                }
                Command::Search { query } => {
                    query.push(' ');
                    query.push_str(positional);
                }
                _ => {
                    return Err(anyhow!(
                        "unexpected argument {positional:?}; run with --help to see supported commands"
                    ));
                }
            },
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("hearth: family goals in your terminal");
    println!();
    println!("usage: hearth [options] [command]");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch with seeded demo data (in-memory)");
    println!("  --check                  Validate config + DB + API reachability");
    println!("  --help                   Show this help");
    println!();
    println!("commands (default opens the terminal UI):");
    println!("  goals [filter] [--sort <field:dir>]");
    println!("                           List goals; filter is a query string such as");
    println!("                           \"status=active&flag.overdue=true\"");
    println!("  search <query>           Search goals, activity, money, members, reminders");
}
