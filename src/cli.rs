use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use notesearch::options::{DEFAULT_FIND_LIMIT, SortField};
use notesearch::retrieval::{DEFAULT_TOP_K, RetrievalMode};

#[derive(Debug, Parser)]
#[command(
    name = "notesearch",
    about = "Search a markdown notebook with a small query language"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

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
    /// Rebuild the index from a notebook directory
    Reindex(ReindexArgs),
    /// Find notes with a query such as `tag:work -archived`
    Find(FindArgs),
    /// Keyword, semantic or hybrid search with field conditions
    Search(SearchArgs),
    /// Show one indexed note
    Get(GetArgs),
    /// Count the notes matching a query
    Count(CountArgs),
    /// Show index statistics
    Stats(StatsArgs),
    /// Check a query for syntax errors
    Validate(ValidateArgs),
    /// Print the query syntax reference
    Syntax,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

#[derive(Debug, Parser)]
pub struct ReindexArgs {
    /// Notebook root directory
    pub notebook: PathBuf,
}

#[derive(Debug, Parser)]
pub struct FindArgs {
    /// The query, e.g. `meeting tag:work created:>2024-01-01`
    #[arg(default_value = "")]
    pub query: String,

    /// Only notes carrying this tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Skip notes carrying this tag (repeatable)
    #[arg(long = "exclude-tag")]
    pub exclude_tags: Vec<String>,

    /// Only notes under this path prefix
    #[arg(long)]
    pub path: Option<String>,

    /// Skip notes under this path prefix (repeatable)
    #[arg(long = "exclude-path")]
    pub exclude_paths: Vec<String>,

    /// Sort order
    #[arg(long, value_enum, default_value_t = SortField::Relevance)]
    pub sort: SortField,

    /// Sort descending (relevance is always descending)
    #[arg(long)]
    pub desc: bool,

    /// Number of results to return
    #[arg(short = 'n', long, default_value_t = DEFAULT_FIND_LIMIT)]
    pub limit: usize,

    /// Number of results to skip
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Free text; may be empty when conditions are given
    #[arg(default_value = "")]
    pub query: String,

    /// Retrieval mode: hybrid, keyword or semantic
    #[arg(long, default_value_t = RetrievalMode::Hybrid)]
    pub mode: RetrievalMode,

    /// Maximum number of results
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Show why each note matched
    #[arg(long)]
    pub explain: bool,

    /// Condition every result must meet, as field=value (repeatable)
    #[arg(long = "and", value_name = "FIELD=VALUE")]
    pub and: Vec<String>,

    /// Condition of which at least one must hold (repeatable)
    #[arg(long = "or", value_name = "FIELD=VALUE")]
    pub or: Vec<String>,

    /// Condition no result may meet (repeatable)
    #[arg(long = "not", value_name = "FIELD=VALUE")]
    pub not: Vec<String>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct GetArgs {
    /// Path of the note relative to the notebook root
    pub path: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct CountArgs {
    /// The query; counts every note when empty
    #[arg(default_value = "")]
    pub query: String,
}

#[derive(Debug, Parser)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct ValidateArgs {
    /// The query to check
    pub query: String,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "notesearch",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_search_defaults() {
        let cli = Cli::parse_from(["notesearch", "search", "meeting"]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query, "meeting");
                assert_eq!(args.mode, RetrievalMode::Hybrid);
                assert_eq!(args.top_k, DEFAULT_TOP_K);
                assert!(!args.explain);
                assert!(args.and.is_empty());
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn parse_search_conditions_and_mode() {
        let cli = Cli::parse_from([
            "notesearch",
            "search",
            "--mode",
            "keyword",
            "--and",
            "data.tag=work",
            "--not",
            "data.status=done",
            "--explain",
        ]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query, "");
                assert_eq!(args.mode, RetrievalMode::Keyword);
                assert_eq!(args.and, vec!["data.tag=work"]);
                assert_eq!(args.not, vec!["data.status=done"]);
                assert!(args.explain);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn rejects_unknown_mode() {
        let parsed =
            Cli::try_parse_from(["notesearch", "search", "--mode", "fuzzy"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn parse_find_options() {
        let cli = Cli::parse_from([
            "notesearch",
            "-vv",
            "find",
            "tag:work",
            "--tag",
            "rust",
            "--sort",
            "modified",
            "--desc",
            "-n",
            "5",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Find(args) => {
                assert_eq!(args.query, "tag:work");
                assert_eq!(args.tags, vec!["rust"]);
                assert_eq!(args.sort, SortField::Modified);
                assert!(args.desc);
                assert_eq!(args.limit, 5);
            }
            _ => panic!("expected find command"),
        }
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
