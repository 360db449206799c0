use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "need",
    about = "Declarative full-text indexes for your records"
)]
pub struct Cli {
    /// Index definitions file (JSON)
    #[arg(short, long, global = true, default_value = "need.json")]
    pub config: PathBuf,

    /// Override the base index directory
    #[arg(long, global = true)]
    pub index_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve every definition, creating missing indexes
    Init,
    /// Show the resolved options of an index
    Schema {
        /// Definition name
        index: String,
    },
    /// Add documents
    Add(WriteArgs),
    /// Replace documents sharing a unique field value, or add them
    Merge(WriteArgs),
    /// Delete the document with the given primary key
    Delete {
        /// Definition name
        index: String,
        /// Primary key value
        key: String,
    },
    /// Delete every document whose field holds the given value
    DeleteWhen {
        /// Definition name
        index: String,
        field: String,
        value: String,
    },
    /// Search an index
    Search(SearchArgs),
    /// Count the documents in an index
    Count {
        /// Definition name
        index: String,
    },
    /// Remove every document from an index
    Clear {
        /// Definition name
        index: String,
    },
    /// Merge an index down to one segment
    Optimize {
        /// Definition name
        index: String,
    },
}

#[derive(Debug, Args)]
pub struct WriteArgs {
    /// Definition name
    pub index: String,

    /// Field value as name=value (repeatable)
    #[arg(short, long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// JSON-lines file of documents, or - for stdin
    #[arg(long, conflicts_with = "set")]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Definition name
    pub index: String,

    /// The search query
    pub query: String,

    /// Fields to search, comma separated
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub fields: Vec<String>,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}
