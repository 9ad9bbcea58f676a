//! silsila CLI: knowledge-network path discovery engine.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use silsila::analyzer::{GeminiAnalyzer, GeminiConfig};
use silsila::consistency::ConsistencyCache;
use silsila::engine::{Engine, EngineConfig};
use silsila::quota::DailyQuota;
use silsila::record::{Book, BookId, OwnerId, RecordFilter};
use silsila::report::PathReport;
use silsila::store::{RecordStore, ingest_knowledge_json};

#[derive(Parser)]
#[command(name = "silsila", version, about = "Knowledge-network path discovery engine")]
struct Cli {
    /// Data directory for persistent storage.
    #[arg(long, global = true, default_value = "./silsila-data")]
    data_dir: PathBuf,

    /// Owner scope applied to every operation.
    #[arg(long, global = true, default_value = "1")]
    owner: u64,

    /// Daily analyzer-call budget (unlimited when omitted).
    #[arg(long, global = true)]
    daily_limit: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new silsila data directory.
    Init,

    /// Register a book and ingest its knowledge JSON.
    Ingest {
        /// Path to the knowledge JSON file.
        #[arg(long)]
        file: PathBuf,

        /// Display title (defaults to the filename).
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        doctrine: Option<String>,
    },

    /// List registered books.
    Books,

    /// Find all shortest paths between two questions.
    Path {
        /// Exact text of the start question.
        #[arg(long)]
        start: String,

        /// Exact text of the end question.
        #[arg(long)]
        end: String,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        doctrine: Option<String>,
    },

    /// Find paths, then check answer consistency along one of them.
    Consistency {
        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        doctrine: Option<String>,

        /// Which of the discovered paths to analyze.
        #[arg(long, default_value = "0")]
        path_index: usize,
    },

    /// Find paths, then generate a narrative analysis of one of them.
    Narrative {
        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        doctrine: Option<String>,

        /// Which of the discovered paths to narrate.
        #[arg(long, default_value = "0")]
        path_index: usize,
    },

    /// Export visualization data as JSON.
    Export {
        #[command(subcommand)]
        action: ExportAction,
    },

    /// Show library statistics.
    Info,
}

#[derive(Subcommand)]
enum ExportAction {
    /// Per-book network (keyword → question → answer → proof).
    Book {
        /// Book id.
        #[arg(long)]
        book: u64,
    },
    /// Global network (category → keyword → question → book).
    Global,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let owner = OwnerId(cli.owner);

    let mut engine = Engine::new(EngineConfig {
        data_dir: Some(cli.data_dir.clone()),
    })?;
    if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
        engine = engine.with_analyzer(Arc::new(GeminiAnalyzer::new(GeminiConfig::new(api_key))));
    }
    if let Some(limit) = cli.daily_limit {
        engine = engine.with_quota(Arc::new(DailyQuota::new(limit)));
    }

    match cli.command {
        Commands::Init => {
            println!("Initialized silsila data directory at {}", cli.data_dir.display());
        }

        Commands::Ingest {
            file,
            title,
            category,
            doctrine,
        } => {
            let text = std::fs::read_to_string(&file).into_diagnostic()?;
            let json: serde_json::Value = serde_json::from_str(&text).into_diagnostic()?;

            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let id = engine.store().allocate_book_id()?;
            let mut book = Book::new(id, owner, filename);
            if let Some(title) = title {
                book = book.with_title(title);
            }
            if let Some(category) = category {
                book = book.with_category(category);
            }
            if let Some(doctrine) = doctrine {
                book = book.with_doctrine(doctrine);
            }
            engine.store().add_book(&book)?;
            let added = ingest_knowledge_json(engine.store(), id, &json)?;
            println!(
                "Registered book {id} (\"{}\") with {added} record(s)",
                book.display_title()
            );
        }

        Commands::Books => {
            let books = engine.store().books(&RecordFilter::for_owner(owner))?;
            if books.is_empty() {
                println!("No books registered for owner {owner}");
            }
            for book in books {
                let questions = engine.store().questions_of(book.id)?.len();
                println!(
                    "{:>4}  {}  [{} / {}]  {} question(s)",
                    book.id,
                    book.display_title(),
                    book.category.as_deref().unwrap_or("-"),
                    book.doctrine.as_deref().unwrap_or("-"),
                    questions
                );
            }
        }

        Commands::Path {
            start,
            end,
            category,
            doctrine,
        } => {
            let filter = build_filter(owner, category, doctrine);
            let report = engine.find_question_path(&filter, &start, &end)?;
            println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
        }

        Commands::Consistency {
            start,
            end,
            category,
            doctrine,
            path_index,
        } => {
            let filter = build_filter(owner, category, doctrine);
            let Some(detailed) = discover(&engine, &filter, &start, &end)? else {
                return Ok(());
            };
            let report = engine.check_consistency(&detailed, path_index, &start, &end)?;
            println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
        }

        Commands::Narrative {
            start,
            end,
            category,
            doctrine,
            path_index,
        } => {
            let filter = build_filter(owner, category, doctrine);
            let Some(detailed) = discover(&engine, &filter, &start, &end)? else {
                return Ok(());
            };
            let report = engine.narrative_analysis(&detailed, path_index, &start, &end)?;
            println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
        }

        Commands::Export { action } => {
            let data = match action {
                ExportAction::Book { book } => engine.book_network(owner, BookId(book))?,
                ExportAction::Global => {
                    engine.global_network(&RecordFilter::for_owner(owner))?
                }
            };
            println!("{}", serde_json::to_string_pretty(&data).into_diagnostic()?);
        }

        Commands::Info => {
            let books = engine.store().books(&RecordFilter::for_owner(owner))?;
            let records: usize = books
                .iter()
                .map(|b| engine.store().records_of(b.id).map(|r| r.len()))
                .sum::<Result<usize, _>>()?;
            println!("Owner:            {owner}");
            println!("Books:            {}", books.len());
            println!("Records:          {records}");
            println!("Cached verdicts:  {}", engine.cache().len()?);
        }
    }

    Ok(())
}

fn build_filter(owner: OwnerId, category: Option<String>, doctrine: Option<String>) -> RecordFilter {
    let mut filter = RecordFilter::for_owner(owner);
    if let Some(category) = category {
        filter = filter.with_category(category);
    }
    if let Some(doctrine) = doctrine {
        filter = filter.with_doctrine(doctrine);
    }
    filter
}

/// Run a path search and hand back the detailed paths, or print the miss
/// report and return `None`.
fn discover(
    engine: &Engine,
    filter: &RecordFilter,
    start: &str,
    end: &str,
) -> Result<Option<Vec<silsila::graph::detail::DetailedPath>>> {
    let report: PathReport = engine.find_question_path(filter, start, end)?;
    if !report.found {
        println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
        return Ok(None);
    }
    Ok(report.detailed_paths.filter(|d| !d.is_empty()))
}
