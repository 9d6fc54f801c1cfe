use proptest::prelude::*;
use serde_json::json;

use skillweave::compose::{Values, render_with};
use skillweave::config::Config;
use skillweave::engine::default_embedder;
use skillweave::search::{Embedder, HashEmbedder, QueryContext};
use skillweave::SkillEngine;

use crate::strategies::{arb_registry, arb_text};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_hash_embedding_deterministic(text in ".*") {
        let embedder = HashEmbedder::new(64);
        let first = embedder.embed(&text).unwrap();
        let second = embedder.embed(&text).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_hash_embedding_length(text in ".*", dim in 1usize..256usize) {
        let embedder = HashEmbedder::new(dim);
        prop_assert_eq!(embedder.embed_text(&text).len(), dim);
    }

    #[test]
    fn test_ranking_deterministic(registry in arb_registry(6), query in arb_text(4)) {
        let mut config = Config::default();
        config.cache.enabled = false;
        let engine = SkillEngine::from_registry(registry, &config, default_embedder(&config)).unwrap();
        let ctx = QueryContext::new(query);

        prop_assert_eq!(engine.rank(&ctx), engine.rank(&ctx));
    }

    #[test]
    fn test_ranking_independent_of_cache(registry in arb_registry(6), query in arb_text(4)) {
        let mut uncached = Config::default();
        uncached.cache.enabled = false;
        let cached = Config::default();
        let plain = SkillEngine::from_registry(registry.clone(), &uncached, default_embedder(&uncached)).unwrap();
        let warm = SkillEngine::from_registry(registry, &cached, default_embedder(&cached)).unwrap();
        let ctx = QueryContext::new(query);

        let _ = warm.rank(&ctx);
        prop_assert_eq!(plain.rank(&ctx), warm.rank(&ctx));
    }

    #[test]
    fn test_resolution_deterministic(registry in arb_registry(6), value in 0i64..1000) {
        let names: Vec<String> = registry.names().map(str::to_string).collect();
        let config = Config::default();
        let engine = SkillEngine::from_registry(registry, &config, default_embedder(&config)).unwrap();
        let mut vars = Values::new();
        vars.insert("n".to_string(), json!(value));

        for name in &names {
            let first = engine.read(name, &vars).unwrap();
            let second = engine.read(name, &vars).unwrap();
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn test_substitution_does_not_rescan(value in "[a-z{} %]{0,20}") {
        let mut values = Values::new();
        values.insert("x".to_string(), json!(value.clone()));
        prop_assert_eq!(render_with("{{ x }}", &values).unwrap(), value);
    }
}
