use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use reposcope_analyzer::{AnalyzerOptions, MultiRepoAnalyzer};
use reposcope_core::{EntityKind, OutputFormat, QueryResult, ScopeConfig};
use reposcope_search::SearchFilter;

#[derive(Parser)]
#[command(
    name = "reposcope",
    version,
    about = "Semantic code search across repositories",
    long_about = "Reposcope indexes source repositories into embedding vectors and answers\n\
                   semantic queries and plain-English questions across all of them.\n\n\
                   Examples:\n  \
                     reposcope index ../shop ../blog                      Analyze and index repositories\n  \
                     reposcope search 'password hashing' --repo ../shop   Ranked semantic search\n  \
                     reposcope ask 'How does login work?' --repo ../shop  Ask a question\n  \
                     reposcope summary --repo ../shop                     Languages, dependencies, entities"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .reposcope.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format: text, json or markdown
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Skip embedding; structural analysis only
    #[arg(long, global = true)]
    no_semantic: bool,

    /// Neither read nor write the on-disk caches
    #[arg(long, global = true)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze and index repositories
    Index {
        /// Repository directories
        #[arg(required = true)]
        repos: Vec<PathBuf>,
    },
    /// Semantic search across repositories
    #[command(long_about = "Semantic search across repositories.\n\n\
        Results are ranked by cosine similarity between the query and each code chunk.\n\n\
        Examples:\n  reposcope search 'database connection' --repo .\n  reposcope search 'routes' --repo a --repo b --kind api_endpoint --top-k 5")]
    Search {
        /// Search query
        query: String,

        /// Repository directories (default: current directory)
        #[arg(long = "repo", default_value = ".")]
        repos: Vec<PathBuf>,

        /// Maximum results (default: search.default_top_k)
        #[arg(long)]
        top_k: Option<usize>,

        /// Only return chunks of these kinds
        #[arg(long)]
        kind: Vec<EntityKind>,
    },
    /// Ask a question about the code in plain English
    Ask {
        /// Question, e.g. "How does the login functionality work?"
        question: String,

        /// Repository directories (default: current directory)
        #[arg(long = "repo", default_value = ".")]
        repos: Vec<PathBuf>,
    },
    /// Summarize repositories and their language usage
    Summary {
        /// Repository directories (default: current directory)
        #[arg(long = "repo", default_value = ".")]
        repos: Vec<PathBuf>,
    },
    /// Create a default .reposcope.toml configuration file
    Init,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# Reposcope configuration

[embedding]
# provider = "hash"          # "hash" | "voyage" | "fastembed"
# model = "feature-hash-v1"
# dimensions = 384
# batch_size = 64
# timeout_secs = 30
# api_key = "..."            # voyage only, or set VOYAGE_API_KEY

[cache]
# enabled = true
# dir = ".reposcope/cache"

[search]
# default_top_k = 10
# summary_chars = 200

[analysis]
# max_file_size = 1048576
# exclude = ["**/node_modules/**", "**/dist/**"]
# fallback_chunk_lines = 60
"#;

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ScopeConfig> {
    let config = match path {
        Some(path) => ScopeConfig::from_file(path)?,
        None => {
            let default_path = Path::new(".reposcope.toml");
            if default_path.exists() {
                ScopeConfig::from_file(default_path)?
            } else {
                ScopeConfig::default()
            }
        }
    };
    Ok(config)
}

/// Add every repository, with a spinner on a terminal.
async fn open_repositories(
    cli: &Cli,
    config: ScopeConfig,
    repos: &[PathBuf],
) -> Result<(MultiRepoAnalyzer, Vec<String>)> {
    let options = AnalyzerOptions {
        semantic: !cli.no_semantic,
        cache: !cli.no_cache,
    };
    let mut analyzer = MultiRepoAnalyzer::new(config, options)?;

    let spinner = if std::io::stderr().is_terminal() {
        let pb = indicatif::ProgressBar::new_spinner();
        if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let mut names = Vec::with_capacity(repos.len());
    for repo in repos {
        if let Some(pb) = &spinner {
            pb.set_message(format!("Indexing {}", repo.display()));
        }
        match analyzer.add_repository(repo).await {
            Ok(name) => names.push(name),
            Err(e) => {
                if let Some(pb) = &spinner {
                    pb.finish_and_clear();
                }
                return Err(e.into());
            }
        }
    }
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    Ok((analyzer, names))
}

fn print_results(results: &[QueryResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            if results.is_empty() {
                println!("_No results._");
            }
            for r in results {
                println!(
                    "- **{}** (lines {}-{}, score {:.3})\n\n  ```\n  {}\n  ```\n",
                    r.file.display(),
                    r.start_line,
                    r.end_line,
                    r.score,
                    r.summary.replace('\n', "\n  ")
                );
            }
        }
        OutputFormat::Text => {
            if results.is_empty() {
                println!("No results.");
            }
            for r in results {
                println!(
                    "{:.3}  {}:{}-{}",
                    r.score,
                    r.file.display(),
                    r.start_line,
                    r.end_line
                );
                println!("       {}", r.summary.replace('\n', " "));
            }
        }
    }
    Ok(())
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!("reposcope v{version} - semantic code search across repositories\n");
    println!("Quick start:");
    println!("  reposcope init                          Create a .reposcope.toml config file");
    println!("  reposcope index .                       Analyze and index this repository");
    println!("  reposcope ask 'How does login work?'    Ask a question about the code\n");
    println!("All commands:");
    println!("  index        Analyze and index repositories");
    println!("  search       Semantic search");
    println!("  ask          Plain-English questions");
    println!("  summary      Languages, dependencies and entity counts");
    println!("  init         Create default configuration");
    println!("  completions  Shell completions\n");
    println!("Run 'reposcope <command> --help' for details.");
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    if cli.verbose {
        tracing::debug!(
            provider = %config.embedding.provider,
            cache = %config.cache.dir.display(),
            format = %cli.format,
            "configuration loaded"
        );
    }

    match &cli.command {
        None => print_welcome(),
        Some(Command::Index { repos }) => {
            let (analyzer, names) = open_repositories(&cli, config, repos).await?;
            let mut rows = Vec::with_capacity(names.len());
            for name in &names {
                let entities = analyzer.repository(name).map_or(0, |r| r.entities.len());
                let Some(status) = analyzer.status(name) else {
                    continue;
                };
                match cli.format {
                    OutputFormat::Json => rows.push(serde_json::json!({
                        "repository": name,
                        "entities": entities,
                        "chunks": status.chunks,
                        "analysis_cached": status.analysis_cached,
                        "index": status.index,
                    })),
                    _ => {
                        let index = match &status.index {
                            Some(outcome) if outcome.from_cache => {
                                format!("{} vectors (cache hit)", outcome.entries)
                            }
                            Some(outcome) => format!("{} vectors (indexed)", outcome.entries),
                            None => "not indexed".to_string(),
                        };
                        println!(
                            "{name}: {entities} entities, {} chunks, {index}",
                            status.chunks
                        );
                    }
                }
            }
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&rows).into_diagnostic()?);
            }
        }
        Some(Command::Search {
            query,
            repos,
            top_k,
            kind,
        }) => {
            let top_k = top_k.unwrap_or(config.search.default_top_k);
            let (analyzer, _) = open_repositories(&cli, config, repos).await?;
            let filter = (!kind.is_empty()).then(|| SearchFilter::default().with_kinds(kind.iter().copied()));
            let results = analyzer.semantic_query(query, top_k, filter.as_ref()).await?;
            print_results(&results, cli.format)?;
        }
        Some(Command::Ask { question, repos }) => {
            let (analyzer, _) = open_repositories(&cli, config, repos).await?;
            let answer = analyzer
                .answer(question, cli.format == OutputFormat::Json)
                .await?;
            println!("{}", answer.render()?);
        }
        Some(Command::Summary { repos }) => {
            let (analyzer, names) = open_repositories(&cli, config, repos).await?;
            let summaries = names
                .iter()
                .map(|name| analyzer.repository_summary(name))
                .collect::<Result<Vec<_>, _>>()?;
            let stats = analyzer.language_statistics();

            match cli.format {
                OutputFormat::Json => {
                    let value = serde_json::json!({
                        "repositories": summaries,
                        "statistics": stats,
                    });
                    println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    for s in &summaries {
                        println!("## {}\n", s.name);
                        println!("- Language: {}", s.language);
                        println!("- Entities: {}", s.total_entities);
                        for (kind, count) in &s.entity_counts {
                            println!("  - {kind}: {count}");
                        }
                        println!("- Dependencies: {}", s.dependencies.join(", "));
                        println!("- Semantic index: {}\n", if s.semantic_indexed { "yes" } else { "no" });
                    }
                    println!("## Languages\n");
                    for (language, repos) in &stats.repositories_by_language {
                        let entities = stats.entities_by_language.get(language).copied().unwrap_or(0);
                        println!("- {language}: {} ({entities} entities)", repos.join(", "));
                    }
                }
                OutputFormat::Text => {
                    for s in &summaries {
                        println!("{} ({})", s.name, s.path.display());
                        let languages: Vec<String> = s
                            .languages
                            .iter()
                            .map(|l| format!("{} {}", l.language, l.files))
                            .collect();
                        println!("  languages:    {}", languages.join(", "));
                        println!("  entities:     {}", s.total_entities);
                        for (kind, count) in &s.entity_counts {
                            println!("    {:<14}{count}", kind.as_str());
                        }
                        println!("  dependencies: {}", s.dependencies.join(", "));
                        println!(
                            "  semantic:     {}",
                            if s.semantic_indexed { "indexed" } else { "not indexed" }
                        );
                        println!("  analyzed:     {}\n", s.analyzed_at.format("%Y-%m-%d %H:%M:%S UTC"));
                    }
                    for (language, repos) in &stats.repositories_by_language {
                        let entities = stats.entities_by_language.get(language).copied().unwrap_or(0);
                        println!("{language}: {} ({entities} entities)", repos.join(", "));
                    }
                }
            }
        }
        Some(Command::Init) => {
            let path = Path::new(".reposcope.toml");
            if path.exists() {
                miette::bail!(".reposcope.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .reposcope.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "reposcope", &mut std::io::stdout());
        }
    }

    Ok(())
}
