//! linkdigest CLI - structured digests of links
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use clap::{Parser, Subcommand};
use colored::Colorize;
use linkdigest::{Config, ContentRecord, FetchOutcome, Pipeline, StoreOutcome, Storage};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "linkdigest")]
#[command(author, version, about = "Structured LLM digests of web pages and tweets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, summarise and store one link
    Process {
        /// URL to process
        url: String,
        /// Show the extracted content instead of summarising it
        #[arg(long)]
        raw: bool,
        /// Do not persist the record
        #[arg(long)]
        no_store: bool,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Process several links; pages are fetched concurrently
    Batch {
        /// URLs to process
        #[arg(required = true)]
        urls: Vec<String>,
        /// Do not persist the records
        #[arg(long)]
        no_store: bool,
    },
    /// List stored records
    List,
    /// Delete a stored record by URL
    Delete {
        url: String,
    },
    /// Show which acquisition channels are configured
    Check {
        /// Also send a tiny request to the LLM endpoint
        #[arg(long)]
        probe: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("linkdigest=info,warn")),
        )
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    config.log_redacted();

    match cli.command {
        Commands::Process {
            url,
            raw,
            no_store,
            json,
        } => {
            let pipeline = Pipeline::from_config(&config)?;
            if raw {
                print_raw(&pipeline.fetcher().fetch(&url).await);
                return Ok(());
            }

            let record = pipeline.process(&url).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
            if !no_store {
                persist(&config, std::slice::from_ref(&record))?;
            }
        }
        Commands::Batch { urls, no_store } => {
            let pipeline = Pipeline::from_config(&config)?;
            let records = pipeline.process_many(&urls).await;
            for record in &records {
                print_record(record);
            }
            let failed = records.iter().filter(|r| r.is_failure()).count();
            println!(
                "{} processed, {} failed",
                records.len().to_string().bold(),
                failed.to_string().red()
            );
            if !no_store {
                persist(&config, &records)?;
            }
        }
        Commands::List => {
            let storage = Storage::open(&config.storage.path)?;
            let records = storage.list_all()?;

            if records.is_empty() {
                println!("No stored records found.");
            } else {
                println!("Stored records ({}):\n", records.len());
                for stored in records {
                    println!(
                        "📄 {} ({})",
                        stored.record.title.bold(),
                        stored.created_at.format("%Y-%m-%d %H:%M")
                    );
                    println!("   {}", stored.record.original_url.dimmed());
                    println!("   {}\n", stored.record.tags.join(", "));
                }
            }
        }
        Commands::Delete { url } => {
            let storage = Storage::open(&config.storage.path)?;
            if storage.delete(&url)? {
                println!("{} {}", "Deleted".green(), url);
            } else {
                println!("{} {}", "Not found:".yellow(), url);
            }
        }
        Commands::Check { probe } => {
            let pipeline = Pipeline::from_config(&config)?;
            let channels = pipeline.fetcher().channel_names();
            if channels.is_empty() {
                println!("{}", "No social-post channels configured".yellow());
            } else {
                println!("Social-post channels, in order: {}", channels.join(" -> ").green());
            }
            let key = if config.llm_api_key().is_some() {
                "set".green()
            } else {
                "missing".red()
            };
            println!("LLM endpoint: {} (model {}, API key {})", config.llm.endpoint, config.llm.model, key);

            if probe {
                match pipeline.summarizer().probe().await {
                    Ok(()) => println!("{}", "LLM connection OK".green()),
                    Err(e) => println!("{} {}", "LLM connection failed:".red(), e),
                }
            }
        }
    }

    Ok(())
}

/// Store successful records; failure records are never persisted
fn persist(config: &Config, records: &[ContentRecord]) -> anyhow::Result<()> {
    let storage = Storage::open(&config.storage.path)?;
    for record in records {
        if record.is_failure() {
            warn!(url = %record.original_url, "not storing failure record");
            continue;
        }
        match storage.store(record)? {
            StoreOutcome::Inserted => info!(url = %record.original_url, "record stored"),
            StoreOutcome::Duplicate => println!(
                "{} {}",
                "Already stored:".yellow(),
                record.original_url
            ),
        }
    }
    Ok(())
}

fn print_raw(outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Content(content) => {
            println!("\n=== {} ===\n", content.title.bold());
            println!("{}", content.body);
            if !content.special_tags.is_empty() {
                println!("\nSpecial tags: {}", content.special_tags.join(" "));
            }
            if let Some(meta) = &content.platform_meta {
                println!("Via: {}", meta.via);
            }
            println!(
                "\n--- Extracted {} characters from {} ---",
                content.body_len(),
                content.source_label
            );
        }
        FetchOutcome::Unusable(marker) => {
            println!("{} {}", "Fetch failed:".red(), marker.reason);
        }
    }
}

fn print_record(record: &ContentRecord) {
    let title = if record.is_failure() {
        record.title.red().bold()
    } else {
        record.title.bold()
    };
    println!("=== {} ===\n", title);
    println!("{}\n", record.summary);

    println!("📌 Key Points:");
    for point in &record.key_points {
        println!("  • {}", point);
    }

    println!("\n🏷️  Tags: {}", record.tags.join(", "));

    if !record.related_links.is_empty() {
        println!("\n🔗 Related:");
        for link in &record.related_links {
            if link.description.is_empty() {
                println!("  • {}", link.url);
            } else {
                println!("  • {} - {}", link.description, link.url);
            }
        }
    }

    println!("\nSource: {} ({})\n", record.source, record.original_url.dimmed());
}
