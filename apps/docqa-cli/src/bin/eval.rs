use std::{env, path::PathBuf};

use docqa_cli::setup::{build_pipeline, init_tracing, load_settings};
use docqa_core::config::expand_path;
use docqa_rag::eval::{evaluate, read_dataset};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("docqa=warn");
    let (config, settings) = load_settings()?;
    let dataset = env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| {
        let path: String = config.get("eval.dataset").unwrap_or_else(|_| "data/eval/dataset.jsonl".to_string());
        expand_path(path)
    });
    let examples = read_dataset(&dataset)?;
    println!("Evaluating {} questions from {}", examples.len(), dataset.display());

    let pipeline = build_pipeline(&settings).await?;
    let summary = evaluate(&pipeline, &examples).await?;
    println!("{}", summary);
    Ok(())
}
