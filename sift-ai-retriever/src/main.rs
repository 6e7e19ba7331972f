use clap::{Parser, Subcommand};
use serde::Serialize;
use sift_ai_embed::FastEmbedProvider;
use sift_ai_retriever::{
    config::{DEFAULT_CONFIG_FILE, SiftConfig},
    retrieval::{
        AnswerGenerator, Corpus, ExtractiveGenerator, FormattedResult, Retriever, build_prompt,
        prepare,
    },
};
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Build and query a passage retrieval index over crawled documents.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the sift.toml configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk the raw documents, embed them, and save the index and chunk store
    Prepare,
    /// Answer questions interactively from stdin
    Query,
    /// Retrieve passages for a single query
    Search {
        /// The query text
        query: String,
        /// Number of results (defaults to retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Score threshold (defaults to retrieval.score_threshold)
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Fetch twice as many candidates and rerank them
        #[arg(long, overrides_with = "no_rerank")]
        rerank: bool,
        /// Skip reranking even when retrieval.rerank is set
        #[arg(long, overrides_with = "rerank")]
        no_rerank: bool,
        /// Output format (summary, full, json or prompt)
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show corpus statistics without loading the embedding model
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
    /// The chat prompt an answer model would receive
    Prompt,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            "prompt" => Ok(OutputFormat::Prompt),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct RankedOutput<'a> {
    rank: usize,
    #[serde(flatten)]
    result: &'a FormattedResult,
}

/// Log to stderr, honouring `RUST_LOG` and falling back to `default_level`.
fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep logs out of the way of interactive answers.
    init_tracing(match args.command {
        Commands::Query => "warn",
        _ => "info",
    });

    let config = SiftConfig::load(&args.config)?;

    match args.command {
        Commands::Prepare => {
            let embedder = Arc::new(FastEmbedProvider::create(config.embedding.clone()).await?);
            let retriever = Retriever::new(embedder, config.retrieval_options());
            let report = prepare(&config, &retriever).await?;

            println!("Prepared corpus:");
            println!("  Raw files: {}", report.files);
            println!("  Documents: {}", report.documents);
            println!("  Chunks: {}", report.chunks);
            println!("  Sources: {}", report.sources);
            println!("  Index: {}", config.paths.index_path.display());
            println!("  Chunk store: {}", config.paths.chunks_path.display());
            Ok(())
        }
        Commands::Query => {
            let retriever = open_retriever(&config).await?;
            let generator = ExtractiveGenerator::new(config.messages.source_label.clone());
            let mut lines = BufReader::new(tokio::io::stdin()).lines();

            loop {
                print!("{}", config.messages.prompt);
                std::io::stdout().flush()?;

                let Some(line) = lines.next_line().await? else {
                    println!();
                    println!("{}", config.messages.bye);
                    break;
                };
                let query = line.trim();

                if matches!(query.to_lowercase().as_str(), "quit" | "exit" | "q") {
                    println!("{}", config.messages.bye);
                    break;
                }
                if query.is_empty() {
                    continue;
                }

                let results = retriever.retrieve_with_defaults(query).await?;
                if results.is_empty() {
                    println!("{}", config.messages.miss);
                    continue;
                }

                println!("{}", generator.generate(query, &results).await?);
            }
            Ok(())
        }
        Commands::Search {
            query,
            top_k,
            threshold,
            rerank,
            no_rerank,
            format,
        } => {
            let retriever = open_retriever(&config).await?;
            let options = retriever.options();
            let results = retriever
                .retrieve(
                    &query,
                    top_k.unwrap_or(options.top_k),
                    threshold.unwrap_or(options.score_threshold),
                    resolve_rerank(rerank, no_rerank, options.rerank),
                )
                .await?;

            match format {
                OutputFormat::Prompt => {
                    if results.is_empty() {
                        println!("{}", config.messages.miss);
                    } else {
                        println!(
                            "{}",
                            build_prompt(&query, &results, &config.generation.system_prompt)
                        );
                    }
                }
                OutputFormat::Json => {
                    let ranked: Vec<RankedOutput> = results
                        .iter()
                        .enumerate()
                        .map(|(i, result)| RankedOutput { rank: i + 1, result })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&ranked)?);
                }
                OutputFormat::Summary => {
                    if results.is_empty() {
                        println!("{}", config.messages.miss);
                    }
                    for (i, result) in results.iter().enumerate() {
                        println!(
                            "  {}. Score: {:.3} | {} | {}",
                            i + 1,
                            result.score,
                            result.title,
                            result.text.chars().take(80).collect::<String>()
                        );
                    }
                }
                OutputFormat::Full => {
                    if results.is_empty() {
                        println!("{}", config.messages.miss);
                    }
                    for (i, result) in results.iter().enumerate() {
                        println!("Rank: {}", i + 1);
                        println!("Score: {:.3}", result.score);
                        println!("Title: {}", result.title);
                        println!("Source: {}", result.source_url);
                        println!("Text:\n{}", result.text);
                        println!("---");
                    }
                }
            }
            Ok(())
        }
        Commands::Stats { format } => {
            let corpus = match Corpus::load(&config.paths.index_path, &config.paths.chunks_path)
                .await
            {
                Ok(corpus) => corpus,
                Err(e) if e.is_not_found() => {
                    println!("No corpus found ({e}). Run `sift prepare` first.");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            let stats = corpus.stats();

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                }
                OutputFormat::Summary | OutputFormat::Full | OutputFormat::Prompt => {
                    println!("Corpus Statistics:");
                    println!("  Chunks: {}", stats.chunks);
                    println!("  Vectors: {}", stats.vectors);
                    println!("  Dimension: {}", stats.dimension);
                    println!("  Metric: {}", stats.metric);
                    println!("  Precision: {}", stats.precision);
                    println!("  Sources: {}", stats.sources);

                    if format == OutputFormat::Full {
                        let mut titles: Vec<&str> =
                            corpus.chunks().iter().filter_map(|c| c.title()).collect();
                        titles.sort_unstable();
                        titles.dedup();
                        println!("  Titles:");
                        for title in titles.iter().take(10) {
                            println!("    {title}");
                        }
                        if titles.len() > 10 {
                            println!("    ... and {} more", titles.len() - 10);
                        }
                    }
                }
            }
            Ok(())
        }
    }
}

async fn open_retriever(config: &SiftConfig) -> anyhow::Result<Retriever> {
    let embedder = Arc::new(FastEmbedProvider::create(config.embedding.clone()).await?);
    let retriever = Retriever::open(
        embedder,
        config.retrieval_options(),
        &config.paths.index_path,
        &config.paths.chunks_path,
    )
    .await?;
    Ok(retriever)
}

/// `--rerank` and `--no-rerank` override the configured default; the last one
/// given wins.
fn resolve_rerank(rerank: bool, no_rerank: bool, configured: bool) -> bool {
    match (rerank, no_rerank) {
        (true, _) => true,
        (_, true) => false,
        _ => configured,
    }
}
