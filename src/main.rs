use std::process::ExitCode;

use clap::Parser;
use notesearch::conditions;
use notesearch::error::{Error, Result};
use notesearch::{
    CancelToken, DataDir, FindOpts, Index, NoopSemanticIndex, NotebookSource,
    RetrievalMode, Retriever, SearchRequest, SortDirection, SortField,
    TantivyIndex,
};
use tracing_subscriber::EnvFilter;

mod cli;
mod output;

use cli::{
    Cli, Command, CountArgs, FindArgs, GetArgs, ReindexArgs, SearchArgs,
    StatsArgs, ValidateArgs,
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("NOTESEARCH_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let cancel = CancelToken::new();

    // Commands that never touch the index.
    match &cli.command {
        Command::Syntax => {
            print!("{}", notesearch::Parser::new().help());
            return Ok(ExitCode::SUCCESS);
        }
        Command::Validate(args) => return Ok(cmd_validate(args)),
        Command::Completions(args) => {
            args.generate();
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let index = TantivyIndex::open(&data_dir.index_dir()?)?;

    match cli.command {
        Command::Reindex(args) => cmd_reindex(index, &args, &cancel)?,
        Command::Find(args) => cmd_find(&index, &args, &cancel)?,
        Command::Search(args) => cmd_search(&index, &args, &cancel)?,
        Command::Get(args) => cmd_get(&index, &args, &cancel)?,
        Command::Count(args) => cmd_count(&index, &args, &cancel)?,
        Command::Stats(args) => cmd_stats(&index, &args, &cancel)?,
        Command::Syntax | Command::Validate(_) | Command::Completions(_) => {}
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_reindex(
    index: TantivyIndex,
    args: &ReindexArgs,
    cancel: &CancelToken,
) -> Result<()> {
    if !args.notebook.is_dir() {
        return Err(Error::Config(format!(
            "notebook directory not found: {}",
            args.notebook.display()
        )));
    }
    let index = index.with_source(NotebookSource::new(&args.notebook));
    index.reindex(cancel)?;
    let stats = index.stats(cancel)?;
    println!(
        "Indexed {} note(s) from {}",
        stats.document_count,
        args.notebook.display()
    );
    index.close()
}

fn cmd_find(
    index: &TantivyIndex,
    args: &FindArgs,
    cancel: &CancelToken,
) -> Result<()> {
    let query = notesearch::parse(&args.query)?;
    // Relevance only makes sense best-first.
    let direction = if args.sort == SortField::Relevance || args.desc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };

    let mut opts = FindOpts::new()
        .with_query(query)
        .with_tags(args.tags.iter().cloned())
        .excluding_tags(args.exclude_tags.iter().cloned())
        .excluding_paths(args.exclude_paths.iter().cloned())
        .with_sort(args.sort, direction)
        .with_limit(args.limit)
        .with_offset(args.offset);
    if let Some(path) = &args.path {
        opts = opts.with_path(path.clone());
    }

    let results = index.find(&opts, cancel)?;
    if args.json {
        output::print_json(&results)
    } else {
        output::find_human(&results);
        Ok(())
    }
}

fn cmd_search(
    index: &TantivyIndex,
    args: &SearchArgs,
    cancel: &CancelToken,
) -> Result<()> {
    let parsed = conditions::parse_conditions(
        args.and.as_slice(),
        args.or.as_slice(),
        args.not.as_slice(),
    )?;
    let request = SearchRequest::new(args.query.as_str())
        .with_conditions(conditions::build_query(&parsed)?)
        .with_mode(args.mode)
        .with_top_k(args.top_k)
        .with_explain(args.explain);

    let semantic = NoopSemanticIndex;
    let retriever = Retriever::new(index, &semantic);
    let response = match retriever.search(&request, cancel) {
        Ok(response) => response,
        Err(Error::SemanticUnavailable) => {
            println!(
                "Semantic backend unavailable. Try --mode keyword or \
                 --mode hybrid."
            );
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    if response.meta.semantic_fallback {
        eprintln!(
            "Warning: semantic backend unavailable, showing keyword-mode \
             results."
        );
    }
    if args.json {
        return output::print_json(&response);
    }

    if response.hits.is_empty() {
        let query = args.query.trim();
        if args.mode == RetrievalMode::Keyword {
            println!(
                "No keyword-mode results. Try --mode hybrid or --mode \
                 semantic."
            );
        } else if !query.is_empty() {
            println!("No notes found matching '{query}'");
        } else {
            println!("No results found.");
        }
        return Ok(());
    }
    output::search_human(&response);
    Ok(())
}

fn cmd_get(
    index: &TantivyIndex,
    args: &GetArgs,
    cancel: &CancelToken,
) -> Result<()> {
    let doc = index.find_by_path(&args.path, cancel)?;
    if args.json {
        output::print_json(&doc)
    } else {
        output::document_human(&doc);
        Ok(())
    }
}

fn cmd_count(
    index: &TantivyIndex,
    args: &CountArgs,
    cancel: &CancelToken,
) -> Result<()> {
    let query = notesearch::parse(&args.query)?;
    let count = index.count(&FindOpts::new().with_query(query), cancel)?;
    println!("{count}");
    Ok(())
}

fn cmd_stats(
    index: &TantivyIndex,
    args: &StatsArgs,
    cancel: &CancelToken,
) -> Result<()> {
    let stats = index.stats(cancel)?;
    if args.json {
        output::print_json(&stats)
    } else {
        output::stats_human(&stats);
        Ok(())
    }
}

fn cmd_validate(args: &ValidateArgs) -> ExitCode {
    match notesearch::Parser::new().validate(&args.query) {
        Ok(()) => {
            println!("Query is valid.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err.input);
            eprintln!("{}^", " ".repeat(err.column.saturating_sub(1)));
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
