//! Shared helpers: on-disk skill trees and engines over them.

use std::sync::Arc;

use skillweave::SkillEngine;
use skillweave::config::{Config, SkillPathsConfig};
use skillweave::search::{FnEmbedder, SharedEmbedder};
use skillweave::test_utils::fixtures::UnitTestFixture;

/// Config whose only skill root is the fixture's `skills/` directory.
pub fn config_for(fixture: &UnitTestFixture) -> Config {
    Config {
        skill_paths: SkillPathsConfig {
            organization: Vec::new(),
            repository: Vec::new(),
            project: vec![fixture.data_path.join("skills").display().to_string()],
            user: Vec::new(),
            local: Vec::new(),
        },
        ..Config::default()
    }
}

/// Engine with the built-in hash embedder.
pub fn engine_for(fixture: &UnitTestFixture) -> SkillEngine {
    let config = config_for(fixture);
    SkillEngine::open(&config, &fixture.data_path).expect("engine opens")
}

pub fn engine_with(fixture: &UnitTestFixture, embedder: Option<SharedEmbedder>) -> SkillEngine {
    let config = config_for(fixture);
    SkillEngine::open_with_embedder(&config, &fixture.data_path, embedder).expect("engine opens")
}

/// Unit vector whose cosine with `[1, 0]` is exactly `similarity`.
pub fn at_similarity(similarity: f32) -> Vec<f32> {
    vec![similarity, (1.0 - similarity * similarity).sqrt()]
}

/// Two-dimensional embedder: the query maps to `[1, 0]`, documents whose
/// embedding text contains a marker map to the paired vector.
pub fn marker_embedder(markers: Vec<(&'static str, f32)>) -> SharedEmbedder {
    Arc::new(FnEmbedder::new(2, move |text: &str| {
        let vector = markers
            .iter()
            .find(|(marker, _)| text.contains(marker))
            .map_or_else(|| vec![1.0, 0.0], |(_, sim)| at_similarity(*sim));
        Ok(vector)
    }))
}
