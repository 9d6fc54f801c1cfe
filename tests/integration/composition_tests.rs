//! Include expansion, variable rendering and snippet confinement on disk.

use serde_json::json;

use skillweave::compose::Values;
use skillweave::test_utils::fixtures::{UnitTestFixture, skill_markdown};
use skillweave::SwError;

use crate::support::engine_for;

const RELEASE: &str = r#"---
name: release-checklist
description: Steps for shipping a release
tags: [release, deploy]
variables:
  target:
    type: string
    enum: [staging, production]
    default: staging
  retries:
    type: integer
    min: 1
    max: 10
    default: 3
---
# Release to {{ target }}

@include skill:base-setup

{% if target == "production" %}
Page the on-call engineer before deploying.
{% else %}
Deploy freely; staging resets nightly.
{% endif %}
Retry failed steps {{ retries }} times.
@include notes/rollback.md
"#;

fn release_tree(fixture: &UnitTestFixture) {
    let _ = fixture.create_skill("release-checklist", RELEASE);
    let _ = fixture.create_skill(
        "base-setup",
        &skill_markdown(
            "base-setup",
            "Shared setup",
            "tags: [setup]",
            "## Setup\n\nInstall the toolchain.\n",
        ),
    );
    let _ = fixture.create_file(
        "skills/release-checklist/notes/rollback.md",
        "Rollback: `git revert` the release tag.\n",
    );
    let _ = fixture.create_override("release-checklist", "Local note: ping #releases.\n");
}

#[test]
fn composed_release_document() {
    let fixture = UnitTestFixture::new();
    release_tree(&fixture);
    let engine = engine_for(&fixture);

    let mut vars = Values::new();
    vars.insert("target".to_string(), json!("production"));
    let resolved = engine.read("release-checklist", &vars).unwrap();

    insta::assert_snapshot!(resolved.content, @r"
    # Release to production

    ## Setup

    Install the toolchain.

    Page the on-call engineer before deploying.
    Retry failed steps 3 times.
    Rollback: `git revert` the release tag.

    Local note: ping #releases.
    ");
    assert_eq!(resolved.metadata.included, vec!["base-setup"]);
    assert_eq!(resolved.metadata.snippets.len(), 1);
    assert_eq!(resolved.metadata.variables["retries"], json!(3));
}

#[test]
fn default_branch_renders_without_variables() {
    let fixture = UnitTestFixture::new();
    release_tree(&fixture);
    let engine = engine_for(&fixture);

    let resolved = engine.read("release-checklist", &Values::new()).unwrap();
    assert!(resolved.content.starts_with("# Release to staging\n"));
    assert!(resolved.content.contains("Deploy freely; staging resets nightly.\n"));
    assert!(!resolved.content.contains("on-call"));
    assert!(!resolved.content.contains("{%"));
}

#[test]
fn out_of_range_variable_is_rejected() {
    let fixture = UnitTestFixture::new();
    release_tree(&fixture);
    let engine = engine_for(&fixture);

    let mut vars = Values::new();
    vars.insert("retries".to_string(), json!(99));
    match engine.read("release-checklist", &vars) {
        Err(SwError::VariableValidation { variable, reason }) => {
            assert_eq!(variable, "retries");
            assert!(reason.contains("maximum"), "{reason}");
        }
        other => panic!("expected VariableValidation, got {other:?}"),
    }
}

#[test]
fn enum_violation_is_rejected() {
    let fixture = UnitTestFixture::new();
    release_tree(&fixture);
    let engine = engine_for(&fixture);

    let mut vars = Values::new();
    vars.insert("target".to_string(), json!("moon"));
    let err = engine.read("release-checklist", &vars).unwrap_err();
    assert!(matches!(err, SwError::VariableValidation { ref variable, .. } if variable == "target"));
}

#[test]
fn resolution_is_deterministic() {
    let fixture = UnitTestFixture::new();
    release_tree(&fixture);
    let engine = engine_for(&fixture);

    let first = engine.read("release-checklist", &Values::new()).unwrap();
    let second = engine.read("release-checklist", &Values::new()).unwrap();
    assert_eq!(first.content, second.content);
    assert_eq!(first, second);
}

#[test]
fn plain_skill_round_trips_body() {
    let fixture = UnitTestFixture::new();
    let body = "# Notes\n\nHello {{ who }}, this stays {{ unknown }}.\n";
    let _ = fixture.create_skill(
        "greeting",
        &skill_markdown(
            "greeting",
            "Say hello",
            "tags: [demo]\nvariables:\n  who:\n    type: string\n    default: world",
            body,
        ),
    );
    let engine = engine_for(&fixture);

    let resolved = engine.read("greeting", &Values::new()).unwrap();
    assert_eq!(resolved.content, "# Notes\n\nHello world, this stays {{ unknown }}.\n");
}

#[test]
fn fenced_template_examples_survive_rendering() {
    let fixture = UnitTestFixture::new();
    let body = "# Jinja loops\n\nRender for {{ audience }}:\n\n```jinja\n{% for item in items %}\n- {{ item }}\n{% endfor %}\n```\n";
    let _ = fixture.create_skill(
        "jinja-guide",
        &skill_markdown(
            "jinja-guide",
            "Writing Jinja templates",
            "tags: [jinja, templates]\nvariables:\n  audience:\n    type: string\n    default: operators",
            body,
        ),
    );
    let engine = engine_for(&fixture);

    let resolved = engine.read("jinja-guide", &Values::new()).unwrap();
    assert_eq!(
        resolved.content,
        "# Jinja loops\n\nRender for operators:\n\n```jinja\n{% for item in items %}\n- {{ item }}\n{% endfor %}\n```\n"
    );
}

fn chain(fixture: &UnitTestFixture, links: usize) {
    for i in 0..=links {
        let body = if i < links {
            format!("level {i}\n@include skill:s{}\n", i + 1)
        } else {
            format!("level {i}\n")
        };
        let _ = fixture.create_skill(
            &format!("s{i}"),
            &skill_markdown(&format!("s{i}"), "chain link", "tags: [chain]", &body),
        );
    }
}

#[test]
fn five_nested_includes_resolve() {
    let fixture = UnitTestFixture::new();
    chain(&fixture, 5);
    let engine = engine_for(&fixture);

    let resolved = engine.read("s0", &Values::new()).unwrap();
    assert_eq!(
        resolved.content,
        "level 0\nlevel 1\nlevel 2\nlevel 3\nlevel 4\nlevel 5\n"
    );
    assert_eq!(resolved.metadata.included, vec!["s1", "s2", "s3", "s4", "s5"]);
}

#[test]
fn six_nested_includes_exceed_depth() {
    let fixture = UnitTestFixture::new();
    chain(&fixture, 6);
    let engine = engine_for(&fixture);

    match engine.read("s0", &Values::new()) {
        Err(SwError::DepthExceeded { skill, depth, limit }) => {
            assert_eq!(skill, "s5");
            assert_eq!(depth, 6);
            assert_eq!(limit, 5);
        }
        other => panic!("expected DepthExceeded, got {other:?}"),
    }
}

#[test]
fn self_include_is_a_cycle() {
    let fixture = UnitTestFixture::new();
    let _ = fixture.create_skill(
        "loop",
        &skill_markdown("loop", "Includes itself", "tags: [x]", "@include skill:loop\n"),
    );
    let engine = engine_for(&fixture);

    match engine.read("loop", &Values::new()) {
        Err(SwError::Cycle { chain }) => assert_eq!(chain, vec!["loop", "loop"]),
        other => panic!("expected Cycle, got {other:?}"),
    }
}

#[test]
fn mutual_include_is_a_cycle() {
    let fixture = UnitTestFixture::new();
    let _ = fixture.create_skill(
        "ping",
        &skill_markdown("ping", "ping", "tags: [x]", "ping\n@include skill:pong\n"),
    );
    let _ = fixture.create_skill(
        "pong",
        &skill_markdown("pong", "pong", "tags: [x]", "pong\n@include skill:ping\n"),
    );
    let engine = engine_for(&fixture);

    let err = engine.read("ping", &Values::new()).unwrap_err();
    assert_eq!(err.to_string(), "include cycle detected: ping -> pong -> ping");
    assert!(err.is_structural());
}

#[test]
fn missing_include_names_both_sides() {
    let fixture = UnitTestFixture::new();
    let _ = fixture.create_skill(
        "parent",
        &skill_markdown("parent", "parent", "tags: [x]", "@include skill:ghost\n"),
    );
    let engine = engine_for(&fixture);

    match engine.read("parent", &Values::new()) {
        Err(SwError::IncludeNotFound { reference, including }) => {
            assert_eq!(reference, "skill:ghost");
            assert_eq!(including, "parent");
        }
        other => panic!("expected IncludeNotFound, got {other:?}"),
    }
}

#[test]
fn snippet_escaping_the_root_is_rejected() {
    let fixture = UnitTestFixture::new();
    let _ = fixture.create_file("secret.txt", "top secret\n");
    let _ = fixture.create_skill(
        "sneaky",
        &skill_markdown("sneaky", "sneaky", "tags: [x]", "@include ../../secret.txt\n"),
    );
    let engine = engine_for(&fixture);

    let err = engine.read("sneaky", &Values::new()).unwrap_err();
    assert!(matches!(err, SwError::SecurityViolation(_)), "{err:?}");
}

#[test]
fn unknown_skill_is_not_found() {
    let fixture = UnitTestFixture::new();
    release_tree(&fixture);
    let engine = engine_for(&fixture);

    assert!(matches!(
        engine.read("nope", &Values::new()),
        Err(SwError::SkillNotFound(name)) if name == "nope"
    ));
}
