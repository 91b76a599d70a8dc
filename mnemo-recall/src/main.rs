use anyhow::Result;
use clap::{Parser, Subcommand};
use mnemo_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
use mnemo_recall::indexer::{Indexer, tag_set};
use mnemo_recall::pipeline::{self, IngestOptions};
use mnemo_recall::search::SearchEngine;
use mnemo_recall::store::{JsonStore, Layer, StoreConfig};
use mnemo_segment::Segmenter;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// A layered, persistent note store with adaptive segmentation and hybrid
/// semantic/keyword search.
#[derive(Parser, Debug)]
#[command(name = "mnemo", author, version, about, long_about = None)]
struct Args {
    /// Storage directory. Defaults to $MNEMO_DATA_DIR, then ~/.mnemo.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Disable the embedding model; search falls back to keyword matching.
    #[arg(long, global = true)]
    no_embed: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a note; structured content is segmented into multiple memories
    Add {
        content: String,
        #[arg(short, long, default_value_t = Layer::Cognitive)]
        layer: Layer,
        /// Tags to attach, comma-separated
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Origin of the note (free-form, usually a path or URL)
        #[arg(long)]
        source: Option<String>,
    },
    /// Print a memory's content by key
    Get {
        key: String,
        #[arg(short, long)]
        layer: Option<Layer>,
    },
    /// List memories, per layer or as a census
    List {
        #[arg(short, long)]
        layer: Option<Layer>,
    },
    /// Search memories (semantic when a model is available, else keyword)
    Search {
        query: String,
        /// Maximum number of results
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,
    },
    /// Delete a memory by key
    Delete {
        key: String,
        #[arg(short, long)]
        layer: Option<Layer>,
    },
    /// Delete every memory
    DeleteAll {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Extract one or more files and store their fragments as memories
    Process {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long, default_value_t = Layer::Cognitive)]
        layer: Layer,
        /// Minimum fragments per file (default: derived from richness)
        #[arg(long)]
        min: Option<usize>,
        /// Maximum fragments per file (default: derived from richness)
        #[arg(long)]
        max: Option<usize>,
    },
    /// Add tags to an existing memory
    Index {
        key: String,
        #[arg(short, long, default_value_t = Layer::Cognitive)]
        layer: Layer,
        #[arg(long, required = true, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Replace a memory's content
    Update {
        key: String,
        #[arg(short, long, default_value_t = Layer::Cognitive)]
        layer: Layer,
        #[arg(long)]
        content: String,
    },
    /// Regenerate embeddings for all memories (after a model change)
    Reindex,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_target(false)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let store = JsonStore::new(StoreConfig::resolve(args.data_dir.clone()));
    let embedder = if args.no_embed {
        None
    } else {
        init_embedder().await
    };
    let segmenter = Segmenter::new();

    match args.command {
        Commands::Add {
            content,
            layer,
            tags,
            source,
        } => {
            let keys = pipeline::ingest_note(
                &store,
                embedder.as_ref(),
                &segmenter,
                &content,
                layer,
                &tag_set(&tags),
                source.as_deref(),
            )
            .await?;
            if keys.is_empty() {
                println!("No meaningful content to store");
            } else {
                for key in keys {
                    println!("[{}] {key}", short_layer(layer));
                }
            }
        }

        Commands::Get { key, layer } => {
            let record = store.get(&key, layer)?;
            println!("{}", record.content);
        }

        Commands::List { layer } => {
            let doc = store.snapshot()?;
            match layer {
                Some(layer) => {
                    let entries = doc.layer(layer);
                    let count = entries.map_or(0, |e| e.len());
                    println!("[{}] {count} items", layer.to_string().to_uppercase());
                    if let Some(entries) = entries {
                        for (key, record) in entries {
                            println!("  - {key}: {}", preview(&record.content, 50));
                        }
                    }
                }
                None => {
                    println!("{:12} | items", "layer");
                    println!("{}", "-".repeat(22));
                    for (layer, count) in doc.layer_counts() {
                        println!("{:12} | {count:5}", layer.to_string());
                    }
                    println!("{:12} | {:5}", "total", doc.len());
                }
            }
        }

        Commands::Search { query, top_k } => {
            let engine = SearchEngine::new(&store, embedder.clone());
            let mode = if engine.has_semantic() {
                "semantic"
            } else {
                "keyword"
            };
            let hits = engine.search(&query, top_k).await?;
            println!("[Search] '{query}' ({mode}): {} results", hits.len());
            for (i, hit) in hits.iter().enumerate() {
                match hit.score {
                    Some(score) => println!(
                        "  {}. [{}] {} (score: {score:.2})",
                        i + 1,
                        hit.layer,
                        hit.key
                    ),
                    None => println!("  {}. [{}] {}", i + 1, hit.layer, hit.key),
                }
                println!("     {}", preview(&hit.record.content, 80));
            }
        }

        Commands::Delete { key, layer } => {
            let deleted_from = store.delete(&key, layer)?;
            println!("Deleted '{key}' from layer '{deleted_from}'");
        }

        Commands::DeleteAll { yes } => {
            store.delete_all(yes)?;
            println!("All memories deleted");
        }

        Commands::Process {
            files,
            layer,
            min,
            max,
        } => {
            let options = IngestOptions {
                min_fragments: min,
                max_fragments: max,
            };
            let mut total = 0;
            for file in &files {
                match pipeline::process_file(
                    &store,
                    embedder.as_ref(),
                    &segmenter,
                    file,
                    layer,
                    options,
                )
                .await
                {
                    Ok(created) => {
                        println!("Created {created} memories from {}", file.display());
                        total += created;
                    }
                    Err(err) => {
                        tracing::error!("skipping {}: {err}", file.display());
                    }
                }
            }
            if files.len() > 1 {
                println!("Total: {total} memories from {} files", files.len());
            }
        }

        Commands::Index { key, layer, tags } => {
            let indexer = Indexer::new(&store, embedder.clone());
            let added = indexer.add_tags(&key, layer, &tags)?;
            println!("Tagged '{key}': {added} new tags");
        }

        Commands::Update {
            key,
            layer,
            content,
        } => {
            let indexer = Indexer::new(&store, embedder.clone());
            indexer.update_content(&key, layer, &content).await?;
            println!("Updated '{key}'");
        }

        Commands::Reindex => {
            let indexer = Indexer::new(&store, embedder.clone());
            let report = indexer.reindex_all().await?;
            println!(
                "Reindex complete: updated {}/{} memories",
                report.updated, report.total
            );
        }
    }

    Ok(())
}

/// Try to bring up the embedding model; absence degrades to keyword-only
/// behavior instead of failing the command.
async fn init_embedder() -> Option<Arc<dyn EmbeddingProvider>> {
    match FastEmbedProvider::create(EmbedConfig::default()).await {
        Ok(provider) => Some(Arc::new(provider)),
        Err(err) => {
            tracing::warn!("embedding model unavailable, semantic search disabled: {err}");
            None
        }
    }
}

fn short_layer(layer: Layer) -> String {
    layer.as_str()[..3].to_uppercase()
}

fn preview(content: &str, max_chars: usize) -> String {
    let flattened: String = content
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .take(max_chars)
        .collect();
    if content.chars().count() > max_chars {
        format!("{flattened}...")
    } else {
        flattened
    }
}
