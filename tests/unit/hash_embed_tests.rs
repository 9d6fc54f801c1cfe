use skillweave::search::{Embedder, HashEmbedder};
use skillweave::test_utils::{TestCase, run_table_tests};

#[test]
fn hash_embedding_dimensions_table() -> Result<(), String> {
    let cases = vec![
        TestCase::new("dims_32", (32usize, "git commit workflow"), 32usize),
        TestCase::new("dims_384", (384usize, "skill search"), 384usize),
        TestCase::new("dims_zero_clamps", (0usize, "anything"), 1usize),
    ];

    run_table_tests(cases, |(dim, text)| {
        let embedder = HashEmbedder::new(dim);
        embedder.embed_text(text).len()
    })?;
    Ok(())
}

#[test]
fn hash_embedding_is_unit_length() {
    let embedder = HashEmbedder::new(128);
    let vector = embedder.embed_text("debug python memory leak");
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[test]
fn empty_text_embeds_to_zero_vector() {
    let embedder = HashEmbedder::new(16);
    assert!(embedder.embed_text("").iter().all(|x| *x == 0.0));
}

#[test]
fn trait_embedding_matches_inherent() {
    let embedder = HashEmbedder::new(64);
    let via_trait = embedder.embed("Rust error handling").unwrap();
    assert_eq!(via_trait, embedder.embed_text("Rust error handling"));
    assert_eq!(embedder.dims(), 64);
}

#[test]
fn similar_texts_score_higher() {
    let embedder = HashEmbedder::new(384);
    let query = embedder.embed_text("python memory leak");
    let close = embedder.embed_text("finding a memory leak in python");
    let far = embedder.embed_text("kubernetes ingress certificates");
    assert!(embedder.similarity(&query, &close) > embedder.similarity(&query, &far));
}

#[test]
fn case_is_ignored() {
    let embedder = HashEmbedder::new(64);
    assert_eq!(embedder.embed_text("Python Debugging"), embedder.embed_text("python debugging"));
}
