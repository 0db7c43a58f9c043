use clap::{Parser, Subcommand};
use stack_core::{
    evidence::{canonicalize, EvidenceResolver},
    parser::parse_items,
    validate, CoreConfig, SqliteStore, StackItem, StackRepository, StackService, Submission,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "stack")]
#[command(about = "Supplement stack generation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a submission from a JSON file (development only)
    Import {
        /// Path to the submission JSON
        path: PathBuf,
    },
    /// Generate the stack for a stored submission
    Generate {
        submission_id: String,
        /// Print the assembled document instead of the item summary
        #[arg(long)]
        document: bool,
    },
    /// Show the stored stack for a submission
    Show {
        submission_id: String,
        /// Print the stored document instead of the items
        #[arg(long)]
        document: bool,
    },
    /// Run the structural validator over a markdown file
    Validate {
        path: PathBuf,
    },
    /// Parse a markdown file into stack items and print them as JSON
    Parse {
        path: PathBuf,
    },
    /// Look up the canonical name and citations for a supplement
    Resolve {
        name: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Import { path }) => {
            let cfg = CoreConfig::from_env()?;
            let raw = std::fs::read_to_string(&path)?;
            let submission: Submission = serde_json::from_str(&raw)?;
            let store = SqliteStore::open(cfg.database_path())?;
            store.save_submission(&submission)?;
            println!("Imported submission: {}", submission.id);
        }
        Some(Commands::Generate {
            submission_id,
            document,
        }) => {
            let cfg = CoreConfig::from_env()?;
            let store = Arc::new(SqliteStore::open(cfg.database_path())?);
            let service = StackService::from_config(&cfg, store)?;
            let runtime = tokio::runtime::Runtime::new()?;
            let result = runtime.block_on(service.generate(&submission_id))?;

            if document {
                println!("{}", result.document);
            } else {
                println!(
                    "Generated stack for {} (status: {}, validated: {}, saved: {}, items: {}, monthly cost: ${:.2}, tokens: {})",
                    result.submission_id,
                    result.safety_status,
                    result.validated,
                    result.saved,
                    result.items_inserted,
                    result.monthly_cost,
                    result.usage.total_tokens
                );
                print_items(&result.items);
            }
        }
        Some(Commands::Show {
            submission_id,
            document,
        }) => {
            let cfg = CoreConfig::from_env()?;
            let store = SqliteStore::open(cfg.database_path())?;
            match store.load_stack(&submission_id)? {
                None => println!("No stack found for submission: {}", submission_id),
                Some(stored) if document => println!("{}", stored.record.narrative),
                Some(stored) => {
                    println!(
                        "Stack {} for {} (status: {}, updated: {})",
                        stored.stack_id,
                        submission_id,
                        stored.record.safety_status,
                        stored.updated_at
                    );
                    print_items(&stored.items);
                }
            }
        }
        Some(Commands::Validate { path }) => {
            let cfg = CoreConfig::from_env()?;
            let text = std::fs::read_to_string(&path)?;
            let report = validate(&text, cfg.validation());
            if report.passed {
                println!(
                    "Passed ({} words, {} table rows, {} citations)",
                    report.word_count, report.table_rows, report.citation_count
                );
            } else {
                println!("Failed:");
                for failure in report.failures() {
                    println!("  - {}", failure);
                }
            }
        }
        Some(Commands::Parse { path }) => {
            let text = std::fs::read_to_string(&path)?;
            let items = parse_items(&text);
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        Some(Commands::Resolve { name }) => {
            let cfg = CoreConfig::from_env()?;
            let resolver = EvidenceResolver::new(Arc::new(cfg.load_evidence_index()?));
            let canonical = canonicalize(&name);
            println!("Canonical name: {}", canonical.unwrap_or(name.as_str()));
            match resolver.citations_for(&name, canonical) {
                Some(urls) => {
                    for url in urls {
                        println!("  - {}", url);
                    }
                }
                None => println!("No citations in index {}", resolver.index_version()),
            }
        }
        None => {
            println!("No command given. Use --help for usage.");
        }
    }

    Ok(())
}

fn print_items(items: &[StackItem]) {
    if items.is_empty() {
        println!("No items.");
        return;
    }
    for item in items {
        println!(
            "- {} | {} | {} | {}",
            item.name,
            item.dose.as_deref().unwrap_or("-"),
            item.timing.as_ref().map(|t| t.as_str()).unwrap_or("-"),
            item.chosen_links.primary_marketplace.as_deref().unwrap_or("-")
        );
    }
}
