use std::env;

use docqa_cli::setup::{build_pipeline, init_tracing, load_settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("docqa=warn");
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <question>", args[0]);
        eprintln!("Example: {} 'What is the refund window?'", args[0]);
        std::process::exit(1);
    }
    let question = args[1..].join(" ");
    let (_config, settings) = load_settings()?;
    let pipeline = build_pipeline(&settings).await?;

    let response = pipeline.ask(&question).await?;
    println!("{}\n", response.answer);
    if response.sources.is_empty() {
        println!("(no sources)");
    }
    for (i, s) in response.sources.iter().enumerate() {
        println!("  {}. {}  {}", i + 1, s.citation_tag(), s.source_path);
        println!("     {}", s.snippet.replace('\n', " "));
    }
    Ok(())
}
