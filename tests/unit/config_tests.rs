use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use skillweave::SwError;
use skillweave::config::Config;
use skillweave::test_utils::{TestCase, run_table_tests};

fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

fn load_fixture(relative: &str) -> Config {
    let content = fs::read_to_string(fixture_path(relative)).expect("read fixture");
    Config::from_toml(&content).expect("parse config")
}

#[test]
fn default_fixture_matches_builtin_defaults() {
    assert_eq!(load_fixture("tests/fixtures/configs/default.toml"), Config::default());
}

#[test]
fn config_search_from_fixture() -> Result<(), String> {
    let cases = vec![
        TestCase::new(
            "default",
            "tests/fixtures/configs/default.toml",
            (60.0f32, 20usize, true, Duration::from_secs(3), 500usize),
        ),
        TestCase::new(
            "custom",
            "tests/fixtures/configs/custom.toml",
            (30.0f32, 40usize, false, Duration::from_millis(750), 200usize),
        ),
    ];

    run_table_tests(cases, |relative_path| {
        let config = load_fixture(relative_path);
        (
            config.search.rrf_k,
            config.search.candidate_pool,
            config.search.use_embeddings,
            config.search.embedding_timeout,
            config.search.excerpt_chars,
        )
    })?;
    Ok(())
}

#[test]
fn custom_fixture_sections() {
    let config = load_fixture("tests/fixtures/configs/custom.toml");

    // patch entries come first, defaults are kept
    assert_eq!(config.skill_paths.project, vec!["skills", ".skillweave/skills"]);
    assert_eq!(config.skill_paths.organization, vec!["/srv/org-skills"]);
    assert_eq!(config.skill_paths.local, vec!["/tmp/local-skills"]);

    let weights = config.search.ranker_config().weights;
    assert!((weights.rrf - 0.5).abs() < f32::EPSILON);
    assert!((weights.scope - 0.3).abs() < f32::EPSILON);
    assert!((weights.priority - 0.2).abs() < f32::EPSILON);

    let detector = config.ambiguity.detector();
    assert!((detector.delta - 0.05).abs() < f32::EPSILON);
    assert_eq!(detector.max_candidates, 3);
    assert_eq!(config.composition.max_depth, 3);
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.query_capacity, 16);
    assert_eq!(config.cache.embedding_capacity, 1024);
}

#[test]
fn unknown_keys_are_rejected() {
    let err = Config::from_toml("[search]\nbm25_weight = 0.4\n").unwrap_err();
    assert!(matches!(err, SwError::Config(_)), "{err:?}");
}

#[test]
fn invalid_values_fail_validation() {
    for raw in [
        "[search]\nrrf_k = 0.0\n",
        "[search]\nbm25_b = 1.5\n",
        "[ambiguity]\ndelta = 2.0\n",
        "[search.weights]\nscope = -1.0\n",
    ] {
        assert!(Config::from_toml(raw).is_err(), "accepted {raw:?}");
    }
}

#[test]
fn env_overrides_apply_on_top_of_file() {
    let mut config = load_fixture("tests/fixtures/configs/custom.toml");
    config
        .apply_overrides(&|key| match key {
            "SW_SEARCH_USE_EMBEDDINGS" => Some("true".to_string()),
            "SW_SEARCH_EMBEDDING_TIMEOUT" => Some("2s".to_string()),
            "SW_COMPOSITION_MAX_DEPTH" => Some("7".to_string()),
            "SW_SKILL_PATHS_USER" => Some("/a,/b".to_string()),
            _ => None,
        })
        .unwrap();

    assert!(config.search.use_embeddings);
    assert_eq!(config.search.embedding_timeout, Duration::from_secs(2));
    assert_eq!(config.composition.max_depth, 7);
    assert_eq!(config.skill_paths.user[..2], ["/a".to_string(), "/b".to_string()]);
}

#[test]
fn bad_env_value_names_the_variable() {
    let mut config = Config::default();
    let err = config
        .apply_overrides(&|key| (key == "SW_SEARCH_CANDIDATE_POOL").then(|| "many".to_string()))
        .unwrap_err();
    assert!(err.to_string().contains("SW_SEARCH_CANDIDATE_POOL"), "{err}");
}
