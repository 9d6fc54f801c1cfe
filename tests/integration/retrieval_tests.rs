//! Ranking, ambiguity and degraded-mode behavior through the engine.

use std::sync::Arc;

use skillweave::search::{FnEmbedder, QueryContext, SharedEmbedder};
use skillweave::test_utils::fixtures::{UnitTestFixture, skill_markdown};
use skillweave::test_utils::logging::{init_test_logging, logs_contain_at};
use skillweave::{SwError, UseOutcome, UseRequest};

use crate::support::{engine_for, engine_with, marker_embedder};

fn debugging_skills(fixture: &UnitTestFixture) {
    let _ = fixture.create_skill(
        "python-debugging",
        &skill_markdown(
            "python-debugging",
            "Debug Python programs",
            "tags: [python, debugging]\nscope:\n  triggers: [\"memory leak\"]\n  languages: [python]",
            "# Python debugging\n\nUse tracemalloc to find leaks.\n",
        ),
    );
    let _ = fixture.create_skill(
        "javascript-debugging",
        &skill_markdown(
            "javascript-debugging",
            "Debug JavaScript programs",
            "tags: [javascript, debugging]",
            "# JavaScript debugging\n\nUse the devtools memory panel.\n",
        ),
    );
}

#[test]
fn trigger_match_ranks_python_first_with_hash_embedder() {
    let fixture = UnitTestFixture::new();
    debugging_skills(&fixture);
    let engine = engine_for(&fixture);

    let results = engine.search(&QueryContext::new("debug python memory leak"));
    assert_eq!(results.hits[0].name, "python-debugging");
    assert!(!results.degraded);
    for hit in &results.hits {
        assert!((0.0..=1.0).contains(&hit.score), "score {} out of range", hit.score);
    }
}

#[test]
fn trigger_match_beats_adversarial_embeddings() {
    let fixture = UnitTestFixture::new();
    debugging_skills(&fixture);
    // JavaScript looks like a perfect semantic match, Python a poor one.
    let embedder = marker_embedder(vec![("JavaScript", 0.99), ("Python", 0.2)]);
    let engine = engine_with(&fixture, Some(embedder));

    let ranking = engine.rank(&QueryContext::new("debug python memory leak"));
    assert_eq!(ranking.results[0].name, "python-debugging");
    assert!((ranking.results[0].scope_boost - 1.0).abs() < f32::EPSILON);
    assert!((ranking.results[1].scope_boost - 0.5).abs() < f32::EPSILON);
}

fn pair(fixture: &UnitTestFixture) {
    let _ = fixture.create_skill(
        "alpha",
        &skill_markdown("alpha", "alpha marker skill", "tags: [one]", "Alpha body.\n"),
    );
    let _ = fixture.create_skill(
        "beta",
        &skill_markdown("beta", "beta marker skill", "tags: [two]", "Beta body.\n"),
    );
}

#[test]
fn close_semantic_scores_are_ambiguous() {
    let fixture = UnitTestFixture::new();
    pair(&fixture);
    let engine = engine_with(
        &fixture,
        Some(marker_embedder(vec![("alpha marker", 0.91), ("beta marker", 0.90)])),
    );

    match engine.use_skill(&UseRequest::new("zzz unmatched query")).unwrap() {
        UseOutcome::Ambiguous(result) => {
            assert!(result.ambiguous);
            let names: Vec<&str> = result.candidates.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names, vec!["alpha", "beta"]);
            assert!((result.candidates[0].score - 0.91).abs() < 1e-4);
            assert!((result.candidates[1].score - 0.90).abs() < 1e-4);
            assert!(result.hint.contains("alpha"));
        }
        UseOutcome::Resolved(skill) => panic!("expected ambiguity, resolved {}", skill.name),
    }
}

#[test]
fn distant_semantic_scores_resolve_single() {
    let fixture = UnitTestFixture::new();
    pair(&fixture);
    let engine = engine_with(
        &fixture,
        Some(marker_embedder(vec![("alpha marker", 0.91), ("beta marker", 0.50)])),
    );

    match engine.use_skill(&UseRequest::new("zzz unmatched query")).unwrap() {
        UseOutcome::Resolved(skill) => {
            assert_eq!(skill.name, "alpha");
            assert_eq!(skill.content, "Alpha body.\n");
            let score = skill.metadata.score.unwrap();
            assert!((score - 0.91).abs() < 1e-4);
        }
        UseOutcome::Ambiguous(result) => panic!("unexpected ambiguity: {result:?}"),
    }
}

#[test]
fn unrelated_embeddings_are_not_candidates() {
    let fixture = UnitTestFixture::new();
    pair(&fixture);
    let engine = engine_with(
        &fixture,
        Some(marker_embedder(vec![("alpha marker", 0.0), ("beta marker", -0.5)])),
    );

    assert!(engine.search(&QueryContext::new("zzz unmatched query")).hits.is_empty());
    let err = engine
        .use_skill(&UseRequest::new("zzz unmatched query"))
        .unwrap_err();
    assert!(matches!(err, SwError::SkillNotFound(_)), "{err:?}");
}

#[test]
fn auto_select_takes_top_candidate() {
    let fixture = UnitTestFixture::new();
    pair(&fixture);
    let engine = engine_with(
        &fixture,
        Some(marker_embedder(vec![("alpha marker", 0.91), ("beta marker", 0.90)])),
    );

    let request = UseRequest::new("zzz unmatched query").with_auto_select(true);
    let UseOutcome::Resolved(skill) = engine.use_skill(&request).unwrap() else {
        panic!("auto_select must resolve");
    };
    assert_eq!(skill.name, "alpha");
}

#[test]
fn force_single_reports_candidates_in_error() {
    let fixture = UnitTestFixture::new();
    pair(&fixture);
    let engine = engine_with(
        &fixture,
        Some(marker_embedder(vec![("alpha marker", 0.91), ("beta marker", 0.90)])),
    );

    let request = UseRequest::new("zzz unmatched query").with_force_single(true);
    match engine.use_skill(&request) {
        Err(SwError::AmbiguousSelection { candidates }) => {
            assert_eq!(candidates, vec!["alpha", "beta"]);
        }
        other => panic!("expected AmbiguousSelection, got {other:?}"),
    }
}

#[test]
fn failing_embedder_degrades_to_lexical() {
    init_test_logging("skillweave=debug");
    let fixture = UnitTestFixture::new();
    debugging_skills(&fixture);
    let broken: SharedEmbedder = Arc::new(FnEmbedder::new(8, |_text: &str| {
        Err(anyhow::anyhow!("model offline"))
    }));
    let engine = engine_with(&fixture, Some(broken));

    let results = engine.search(&QueryContext::new("python tracemalloc"));
    assert!(results.degraded);
    assert_eq!(results.hits.len(), 1);
    assert_eq!(results.hits[0].name, "python-debugging");
    assert!((results.hits[0].score - 1.0).abs() < f32::EPSILON);
    assert!(engine.stats().semantic_error.is_some());
    assert!(logs_contain_at(tracing::Level::WARN, "semantic index unavailable"));
}

#[test]
fn no_embedder_still_answers_use() {
    let fixture = UnitTestFixture::new();
    debugging_skills(&fixture);
    let engine = engine_with(&fixture, None);

    let request = UseRequest::new("tracemalloc");
    let UseOutcome::Resolved(skill) = engine.use_skill(&request).unwrap() else {
        panic!("single lexical hit must resolve");
    };
    assert_eq!(skill.name, "python-debugging");
    assert_eq!(skill.metadata.degraded, Some(true));
}

#[test]
fn unmatched_query_without_semantics_is_not_found() {
    let fixture = UnitTestFixture::new();
    debugging_skills(&fixture);
    let engine = engine_with(&fixture, None);

    let err = engine.use_skill(&UseRequest::new("kubernetes")).unwrap_err();
    assert!(matches!(err, SwError::SkillNotFound(_)));
}

#[test]
fn search_respects_limit() {
    let fixture = UnitTestFixture::new();
    debugging_skills(&fixture);
    let engine = engine_for(&fixture);

    let all = engine.search(&QueryContext::new("debugging"));
    assert_eq!(all.hits.len(), 2);
    let one = engine.search(&QueryContext::new("debugging").with_limit(1));
    assert_eq!(one.hits.len(), 1);
    assert_eq!(one.hits[0].name, all.hits[0].name);
}

#[test]
fn empty_query_returns_nothing() {
    let fixture = UnitTestFixture::new();
    debugging_skills(&fixture);
    let engine = engine_for(&fixture);

    assert!(engine.search(&QueryContext::new("   ")).hits.is_empty());
}
