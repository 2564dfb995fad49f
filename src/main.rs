use argh::FromArgs;
use erdesign::config::{self, ConnectionSettings};
use erdesign::dialect::Dialect;
use erdesign::catalog::DriverRegistry;
use erdesign::forward::SqlGenerator;
use erdesign::model::Model;
use erdesign::report::ReportStyle;
use erdesign::reverse::{ReverseEngineeringOptions, TableNaming, TracingNotifier, reverse_engineer};
use erdesign::tracker::{EmptyTracker, HistoryTracker, Journal, ModificationTracker, StatementTracker};
use erdesign::world::HeadlessWorldConnector;
use std::fs;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs, Debug)]
/// Schema model tool: reverse engineer DDL dumps and replay change journals
struct Cli {
    #[argh(subcommand)]
    command: Command,

    #[argh(switch, short = 'v', long = "verbose")]
    /// enable debug logging
    verbose: bool,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Command {
    Reverse(ReverseCommand),
    Replay(ReplayCommand),
    Describe(DescribeCommand),
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "reverse")]
/// Read a DDL dump into a model and print its create script
struct ReverseCommand {
    #[argh(positional)]
    /// DDL dump (default: ERDESIGN_URL)
    input: Option<String>,

    #[argh(option, short = 'd')]
    /// dialect: auto, generic, mysql, postgres, oracle
    dialect: Option<String>,

    #[argh(option)]
    /// schema to read, may be repeated (default: all user schemas)
    schema: Vec<String>,

    #[argh(switch)]
    /// prefix table names with their schema
    include_schema: bool,

    #[argh(switch)]
    /// do not read views
    skip_views: bool,

    #[argh(option)]
    /// write the change journal to this file
    journal: Option<String>,

    #[argh(option, short = 'o')]
    /// output file (default: stdout)
    output: Option<String>,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "replay")]
/// Replay a change journal and print the SQL it amounts to
struct ReplayCommand {
    #[argh(positional)]
    /// journal file
    journal: String,

    #[argh(option, short = 'd')]
    /// dialect of the generated SQL
    dialect: String,

    #[argh(option, short = 'o')]
    /// output file (default: stdout)
    output: Option<String>,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "describe")]
/// Print an aligned summary of a DDL dump
struct DescribeCommand {
    #[argh(positional)]
    /// DDL dump (default: ERDESIGN_URL)
    input: Option<String>,

    #[argh(option, short = 'd')]
    /// dialect: auto, generic, mysql, postgres, oracle
    dialect: Option<String>,
}

fn main() {
    let cli: Cli = argh::from_env();

    // a missing .env file is fine; load it before RUST_LOG is read
    let _ = dotenvy::dotenv();
    let directive = config::log_directive(|key| std::env::var(key).ok(), cli.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_writer(std::io::stderr)
        .init();

    let settings = ConnectionSettings::from_env();

    let result = match cli.command {
        Command::Reverse(cmd) => run_reverse(cmd, &settings),
        Command::Replay(cmd) => run_replay(cmd),
        Command::Describe(cmd) => run_describe(cmd, &settings),
    };
    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1);
    }
}

/// Connection URL for the input file, or the configured one.
fn connection_url(input: Option<&str>, settings: &ConnectionSettings) -> Result<String, String> {
    match input {
        Some(path) => Ok(format!("ddl:{path}")),
        None => settings
            .url
            .clone()
            .ok_or_else(|| "No input file given and ERDESIGN_URL is not set".to_string()),
    }
}

/// Explicit dialect, else the configured one, else detected from the dump.
fn pick_dialect(
    flag: Option<&str>,
    settings: &ConnectionSettings,
    url: &str,
) -> Result<Dialect, String> {
    if flag.is_none() {
        if let Some(dialect) = settings.dialect {
            return Ok(dialect);
        }
    }
    let source = match url.strip_prefix("ddl:") {
        Some(path) if !path.is_empty() && flag.is_none_or(|f| f == "auto") => fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {path}: {e}"))?,
        _ => String::new(),
    };
    erdesign::resolve_dialect(flag, &source)
}

fn read_model(
    input: Option<&str>,
    dialect: Option<&str>,
    settings: &ConnectionSettings,
    tracker: Box<dyn ModificationTracker>,
    options: &ReverseEngineeringOptions,
) -> Result<Model, String> {
    let url = connection_url(input, settings)?;
    let dialect = pick_dialect(dialect, settings, &url)?;

    let mut model = Model::with_tracker(dialect, tracker);
    let settings = ConnectionSettings {
        url: Some(url),
        ..settings.clone()
    };
    settings.apply_to(model.properties_mut());

    let summary = reverse_engineer(
        &mut model,
        &DriverRegistry::default(),
        &HeadlessWorldConnector,
        options,
        &TracingNotifier,
    )
    .map_err(|e| format!("Reverse engineering failed: {e}"))?;
    if summary.warnings > 0 {
        tracing::warn!(warnings = summary.warnings, "catalog read with warnings");
    }
    Ok(model)
}

fn write_output(output: Option<&str>, text: &str) -> Result<(), String> {
    match output {
        Some(path) => fs::write(path, text).map_err(|e| format!("Failed to write {path}: {e}")),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn script(statements: &[String]) -> String {
    statements.iter().map(|s| format!("{s};\n")).collect::<Vec<_>>().join("\n")
}

fn run_reverse(cmd: ReverseCommand, settings: &ConnectionSettings) -> Result<(), String> {
    let options = ReverseEngineeringOptions {
        schemas: cmd.schema,
        table_naming: if cmd.include_schema {
            TableNaming::IncludeSchema
        } else {
            TableNaming::Standard
        },
        skip_views: cmd.skip_views,
        ..Default::default()
    };
    let tracker: Box<dyn ModificationTracker> = if cmd.journal.is_some() {
        Box::new(HistoryTracker::new())
    } else {
        Box::new(EmptyTracker)
    };
    let model = read_model(
        cmd.input.as_deref(),
        cmd.dialect.as_deref(),
        settings,
        tracker,
        &options,
    )?;

    if let Some(path) = &cmd.journal {
        let journal = model.tracker().journal().cloned().unwrap_or_default();
        let json = journal
            .to_json()
            .map_err(|e| format!("Failed to serialize journal: {e}"))?;
        fs::write(path, json).map_err(|e| format!("Failed to write {path}: {e}"))?;
        tracing::info!(path, entries = journal.len(), "journal written");
    }

    let statements = SqlGenerator::new(model.dialect()).create_script(&model);
    write_output(cmd.output.as_deref(), &script(&statements))
}

fn run_replay(cmd: ReplayCommand) -> Result<(), String> {
    let dialect = Dialect::from_str(&cmd.dialect)
        .ok_or_else(|| format!("Unknown dialect: {}", cmd.dialect))?;
    let json = fs::read_to_string(&cmd.journal)
        .map_err(|e| format!("Failed to read {}: {e}", cmd.journal))?;
    let journal = Journal::from_json(&json).map_err(|e| format!("Invalid journal: {e}"))?;

    let mut model = Model::with_tracker(dialect, Box::new(StatementTracker::new(dialect)));
    journal
        .replay(&mut model)
        .map_err(|e| format!("Replay failed: {e}"))?;

    let statements = model.tracker().statements().unwrap_or_default();
    write_output(cmd.output.as_deref(), &script(statements))
}

fn run_describe(cmd: DescribeCommand, settings: &ConnectionSettings) -> Result<(), String> {
    let model = read_model(
        cmd.input.as_deref(),
        cmd.dialect.as_deref(),
        settings,
        Box::new(EmptyTracker),
        &ReverseEngineeringOptions::default(),
    )?;
    print!("{}", ReportStyle::default().describe(&model));
    Ok(())
}
