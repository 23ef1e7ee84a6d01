use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print corpus rows matching a query as JSON lines.
    Search(SearchArgs),
    /// Classify the whole corpus and rewrite the tag cache.
    RebuildTags(RebuildTagsArgs),
    /// Print the tag cache.
    Tags(TagsArgs),
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Directory holding the `.csv` corpus files.
    #[arg(long, default_value = "resources")]
    pub resources: PathBuf,

    /// Free-text query (punctuation and case are ignored).
    #[arg(long, default_value = "")]
    pub query: String,

    /// Print only the deduplicated article links.
    #[arg(long)]
    pub links: bool,
}

#[derive(Debug, Args)]
pub struct RebuildTagsArgs {
    /// Directory holding the `.csv` corpus files.
    #[arg(long, default_value = "resources")]
    pub resources: PathBuf,

    /// Output path of the tag cache.
    #[arg(long, default_value = "resources/cache/tags.json")]
    pub cache: PathBuf,

    /// Titles per classifier call (default: KNOWLEDGE_STATION_BATCH_SIZE or 20).
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Pause between classifier calls in milliseconds.
    #[arg(long)]
    pub batch_delay_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct TagsArgs {
    /// Path of the tag cache.
    #[arg(long, default_value = "resources/cache/tags.json")]
    pub cache: PathBuf,

    /// Print the tag names only, one per line.
    #[arg(long)]
    pub names: bool,
}
