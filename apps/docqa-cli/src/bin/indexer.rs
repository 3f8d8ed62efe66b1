use std::{env, fs, path::PathBuf, sync::Arc};

use docqa_cli::setup::{build_chunker, build_embedder, init_tracing, load_settings, open_index};
use docqa_core::loader::{load_documents, load_documents_limited};
use docqa_rag::IndexBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("docqa=info");
    let (_config, settings) = load_settings()?;
    let args: Vec<String> = env::args().skip(1).collect();
    let mut data_dir = None;
    let mut limit = None;
    let mut rebuild = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--rebuild" | "-r" => rebuild = true,
            "--limit" => {
                match args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) {
                    Some(n) => limit = Some(n),
                    None => {
                        eprintln!("Error: --limit requires a number");
                        std::process::exit(1);
                    }
                }
                i += 1;
            }
            "--help" | "-h" => {
                println!("Usage: docqa-indexer [data_dir] [--limit N] [--rebuild]");
                return Ok(());
            }
            a if !a.starts_with('-') => data_dir = Some(PathBuf::from(a)),
            other => eprintln!("Ignoring unknown flag {}", other),
        }
        i += 1;
    }
    let data_dir = data_dir.unwrap_or_else(|| settings.data.raw_dir_path());

    println!("docqa indexer\n=============");
    println!("Data directory: {}", data_dir.display());
    let documents = match limit {
        Some(n) => {
            println!("Limiting to {} files", n);
            load_documents_limited(&data_dir, n)?
        }
        None => load_documents(&data_dir)?,
    };
    println!("Loaded {} documents", documents.len());

    let db_path = settings.index.db_path();
    if rebuild && db_path.exists() {
        println!("Removing existing index at {}", db_path.display());
        fs::remove_dir_all(&db_path)?;
    }
    fs::create_dir_all(&db_path)?;

    let embedder = build_embedder(&settings)?;
    let index = open_index(&settings, embedder.as_ref()).await?;
    let builder = IndexBuilder::new(build_chunker(&settings)?, Arc::clone(&embedder), Arc::clone(&index))
        .batch_size(settings.embedding.batch_size)
        .show_progress(true);
    let report = builder.build_index(&documents).await?;

    println!("\nIndexing completed");
    println!("Documents: {}", report.documents);
    println!("Chunks:    {} ({} documents without text)", report.chunks, report.empty_documents);
    println!("Upserted:  {} into '{}' at {}", report.upserted, settings.index.table, db_path.display());
    println!("Rows now:  {}", index.count().await?);
    println!("\nTo ask a question, use: cargo run --bin docqa-ask '<question>'");
    Ok(())
}
