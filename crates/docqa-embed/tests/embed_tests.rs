use docqa_core::config::{EmbeddingProvider, EmbeddingSettings};
use docqa_core::traits::Embedder;
use docqa_embed::{get_default_embedder, FakeEmbedder};

#[tokio::test]
async fn fake_embedder_shapes_and_determinism() {
    // Force fake embedder to avoid loading large model
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let settings = EmbeddingSettings { provider: EmbeddingProvider::Local, ..EmbeddingSettings::default() };

    let embedder = get_default_embedder(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).await.expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");
    assert!(embedder.embedder_id().starts_with("fake:"));

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[tokio::test]
async fn fake_embedder_single_text_matches_batch() {
    let embedder = FakeEmbedder::new(64);
    let one = embedder.embed("refund policy").await.expect("embed");
    let batch = embedder.embed_batch(&["refund policy".to_string()]).await.expect("batch");
    assert_eq!(one, batch[0]);
    assert_eq!(one.len(), 64);
}

#[test]
fn fake_embedder_prefers_shared_words() {
    let embedder = FakeEmbedder::new(256);
    let cos = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    let q = embedder.embed_text("refund window days");
    let near = embedder.embed_text("the refund window is thirty days");
    let far = embedder.embed_text("shipping takes a week by boat");
    assert!(cos(&q, &near) > cos(&q, &far));
}
