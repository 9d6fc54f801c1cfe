//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use clap::Subcommand;
use serde_json::Value;

pub mod index;
pub mod read;
pub mod search;
pub mod use_skill;

use crate::app::AppContext;
use crate::compose::Values;
use crate::error::{Result, SwError};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rank skills for a query
    Search(search::SearchArgs),

    /// Pick the best skill for a query and print it resolved
    Use(use_skill::UseArgs),

    /// Resolve a skill by name
    Read(read::ReadArgs),

    /// Build the index and report stats and validation warnings
    Index(index::IndexArgs),
}

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Search(args) => search::run(ctx, args),
        Commands::Use(args) => use_skill::run(ctx, args),
        Commands::Read(args) => read::run(ctx, args),
        Commands::Index(args) => index::run(ctx, args),
    }
}

/// Parse `--var key=value` pairs. Values that read as JSON (numbers,
/// booleans, quoted strings, arrays) keep their type; anything else is a
/// plain string.
pub fn parse_vars(pairs: &[String]) -> Result<Values> {
    let mut values = Values::new();
    for pair in pairs {
        let (key, raw) = pair.split_once('=').ok_or_else(|| {
            SwError::Config(format!("--var expects key=value, got {pair:?}"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(SwError::Config(format!("--var has an empty key: {pair:?}")));
        }
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        values.insert(key.to_string(), value);
    }
    Ok(values)
}
