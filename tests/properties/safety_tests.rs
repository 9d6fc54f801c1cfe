use std::path::Path;

use proptest::prelude::*;

use skillweave::compose::{CompositionResolver, Values, render_with};
use skillweave::config::Config;
use skillweave::core::frontmatter::{parse_override, parse_skill};
use skillweave::core::{Precedence, merge};
use skillweave::engine::default_embedder;
use skillweave::search::QueryContext;
use skillweave::{SkillEngine, SwError};

use crate::strategies::{arb_include_graph, arb_override, arb_registry, arb_skill, arb_text};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // =========================================================================
    // Parser Safety Tests
    // =========================================================================

    #[test]
    fn test_parse_skill_never_panics(input in ".*") {
        let _ = parse_skill(&input, Path::new("SKILL.md"), Precedence::Project);
        let _ = parse_override(&input, Path::new("SKILL.local.md"));
    }

    #[test]
    fn test_render_never_panics(input in ".*") {
        let _ = render_with(&input, &Values::new());
    }

    // =========================================================================
    // Composition Safety Tests
    // =========================================================================

    #[test]
    fn test_include_graphs_terminate(graph in arb_include_graph(6)) {
        let resolver = CompositionResolver::new(&graph);
        for name in graph.keys() {
            match resolver.resolve_named(name) {
                Ok(doc) => prop_assert!(doc.text.starts_with("node ")),
                Err(err @ (SwError::Cycle { .. } | SwError::DepthExceeded { .. })) => {
                    prop_assert!(err.is_structural());
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }
    }

    #[test]
    fn test_override_merge_idempotent(skill in arb_skill(0), local in arb_override()) {
        let once = merge(&skill, &local).unwrap();
        let twice = merge(&once, &local).unwrap();
        prop_assert_eq!(once, twice);
    }

    // =========================================================================
    // Search Safety Tests
    // =========================================================================

    #[test]
    fn test_search_returns_only_known_skills(
        registry in arb_registry(8),
        query in arb_text(5),
        limit in 0usize..10,
    ) {
        let names: Vec<String> = registry.names().map(str::to_string).collect();
        let config = Config::default();
        let engine = SkillEngine::from_registry(registry, &config, default_embedder(&config)).unwrap();

        let results = engine.search(&QueryContext::new(query).with_limit(limit));
        prop_assert!(results.hits.len() <= limit);
        for hit in &results.hits {
            prop_assert!(names.contains(&hit.name), "unknown skill {}", hit.name);
            prop_assert!((0.0..=1.0).contains(&hit.score));
        }
    }
}
