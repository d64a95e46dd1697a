use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;
use crate::due::{Clock, FixedClock, SystemClock};
use crate::search::parse_date;
use crate::storage;

pub mod commands;

use self::commands::{DueArgs, ListArgs, NewArgs, NoteIdArgs, ScheduleArgs, StatusArgs, TagArgs};

#[derive(Parser, Debug)]
#[command(
    name = "duenote",
    version,
    about = "Tag-driven task and reminder manager with repeating due dates"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over DUENOTE_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over DUENOTE_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Pretend today is this date (YYYY-MM-DD, midnight UTC)
    #[arg(long, value_parser = parse_at)]
    pub at: Option<i64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show pending notes that are approaching their due date (default)
    Due(DueArgs),
    /// Create a new note
    New(NewArgs),
    /// Search notes and print matching titles
    List(ListArgs),
    /// Mark a note as done
    Done(NoteIdArgs),
    /// Set the status of a note
    Status(StatusArgs),
    /// Set or clear the due date of a note
    Schedule(ScheduleArgs),
    /// Manage note tags
    Tag(TagArgs),
    /// List every tag with its group
    Tags,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("DUENOTE_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("DUENOTE_DATA", path);
    }

    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let config = Arc::new(loader.load_or_init()?);
    let mut store = storage::init(&paths, &config.storage)?;

    let clock: Box<dyn Clock> = match cli.at {
        Some(at) => Box::new(
            FixedClock::at_unix(at).with_context(|| format!("invalid --at timestamp {at}"))?,
        ),
        None => Box::new(SystemClock),
    };

    let command = cli
        .command
        .unwrap_or_else(|| Commands::Due(DueArgs::default()));
    match command {
        Commands::Due(args) => commands::show_due(config, &mut store, clock.as_ref(), args),
        Commands::New(args) => commands::new_note(&mut store, args),
        Commands::List(args) => commands::list_notes(config, &store, args),
        Commands::Done(args) => commands::mark_done(&mut store, args),
        Commands::Status(args) => commands::set_status(&mut store, args),
        Commands::Schedule(args) => commands::schedule(&mut store, args),
        Commands::Tag(args) => commands::handle_tag_command(&mut store, args),
        Commands::Tags => commands::list_tags(&store),
    }
}

fn parse_at(s: &str) -> Result<i64, String> {
    parse_date(s).ok_or_else(|| format!("Invalid date '{s}'. Use YYYY-MM-DD format"))
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::due::View;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_due_with_view_and_pinned_date() {
        let cli = Cli::try_parse_from(["duenote", "--at", "2025-06-01", "due", "--view", "long"])
            .expect("valid arguments");
        assert_eq!(cli.at, parse_date("2025-06-01"));
        match cli.command {
            Some(Commands::Due(args)) => {
                assert_eq!(args.view, Some(View::Long));
                assert!(!args.commit);
            }
            other => panic!("expected due command, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_at_date() {
        assert!(Cli::try_parse_from(["duenote", "--at", "06/01/2025"]).is_err());
    }
}
