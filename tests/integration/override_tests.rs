//! Local overrides and layer shadowing through the on-disk store.

use serde_json::json;

use skillweave::{SkillEngine, SwError};
use skillweave::compose::Values;
use skillweave::config::{Config, SkillPathsConfig};
use skillweave::core::{Precedence, SkillRegistry, merge};
use skillweave::test_utils::fixtures::{UnitTestFixture, skill_markdown};

use crate::support::{config_for, engine_for};

fn lint_skill(fixture: &UnitTestFixture) {
    let _ = fixture.create_skill(
        "lint-rules",
        &skill_markdown(
            "lint-rules",
            "Shared lint rules",
            "tags: [lint]\npriority: 40\nvariables:\n  strictness:\n    type: integer\n    min: 1\n    max: 5\n    default: 2",
            "Run the linter at level {{ strictness }}.\n",
        ),
    );
    let _ = fixture.create_override(
        "lint-rules",
        "---\ndescription: Team lint rules\ntags: [team, lint]\npriority: 80\nvariables:\n  strictness:\n    default: 4\n---\nAlso run the formatter.\n",
    );
}

#[test]
fn override_merges_into_resolved_skill() {
    let fixture = UnitTestFixture::new();
    lint_skill(&fixture);
    let engine = engine_for(&fixture);

    let resolved = engine.read("lint-rules", &Values::new()).unwrap();
    assert_eq!(
        resolved.content,
        "Run the linter at level 4.\n\nAlso run the formatter."
    );
    let meta = &resolved.metadata;
    assert_eq!(meta.description, "Team lint rules");
    assert_eq!(meta.tags, vec!["lint", "team"]);
    assert_eq!(meta.priority, 80);
    assert_eq!(meta.variables["strictness"], json!(4));
}

#[test]
fn merged_variable_keeps_base_constraints() {
    let fixture = UnitTestFixture::new();
    lint_skill(&fixture);
    let engine = engine_for(&fixture);

    let mut vars = Values::new();
    vars.insert("strictness".to_string(), json!(9));
    assert!(engine.read("lint-rules", &vars).is_err());
}

#[test]
fn override_merge_is_idempotent() {
    let fixture = UnitTestFixture::new();
    lint_skill(&fixture);
    let registry = SkillRegistry::load(&[fixture.skills_root()]).unwrap();

    let base = registry.get("lint-rules").unwrap();
    let local = registry.override_for("lint-rules").unwrap();
    let once = merge(base, local).unwrap();
    let twice = merge(&once, local).unwrap();
    assert_eq!(once, twice);
    assert_eq!(registry.effective("lint-rules").unwrap(), once);
}

#[test]
fn more_specific_layer_shadows() {
    let fixture = UnitTestFixture::new();
    let _ = fixture.create_layer_skill(
        "org",
        "style",
        &skill_markdown("style", "Org style", "tags: [style]", "Org style guide.\n"),
    );
    let _ = fixture.create_layer_skill(
        "mine",
        "style",
        &skill_markdown("style", "My style", "tags: [style]", "My style guide.\n"),
    );
    let config = Config {
        skill_paths: SkillPathsConfig {
            organization: vec![fixture.data_path.join("org").display().to_string()],
            repository: Vec::new(),
            project: Vec::new(),
            user: vec![fixture.data_path.join("mine").display().to_string()],
            local: Vec::new(),
        },
        ..Config::default()
    };
    let engine = SkillEngine::open(&config, &fixture.data_path).unwrap();

    let resolved = engine.read("style", &Values::new()).unwrap();
    assert_eq!(resolved.content, "My style guide.\n");
    assert_eq!(resolved.metadata.precedence, Precedence::User);
    assert_eq!(engine.stats().skills, 1);
}

#[test]
fn duplicate_names_in_one_layer_fail_to_load() {
    let fixture = UnitTestFixture::new();
    let _ = fixture.create_file(
        "skills/a/SKILL.md",
        &skill_markdown("twin", "first", "tags: [x]", "one\n"),
    );
    let _ = fixture.create_file(
        "skills/b/SKILL.md",
        &skill_markdown("twin", "second", "tags: [x]", "two\n"),
    );

    let err = SkillRegistry::load(&[fixture.skills_root()]).unwrap_err();
    assert!(err.to_string().contains("duplicate skill name twin"), "{err}");
}

fn deploy_skill(fixture: &UnitTestFixture, local: &str) {
    let _ = fixture.create_skill(
        "deploy",
        &skill_markdown(
            "deploy",
            "Deploy the service",
            "tags: [deploy]\nvariables:\n  retries:\n    type: integer\n    min: 1\n    max: 10\n    default: 3",
            "Retry {{ retries }} times.\n",
        ),
    );
    let _ = fixture.create_override("deploy", local);
}

#[test]
fn override_that_breaks_inherited_default_fails_to_load() {
    let fixture = UnitTestFixture::new();
    deploy_skill(&fixture, "---\nvariables:\n  retries:\n    max: 2\n---\n");

    let err = SkillRegistry::load(&[fixture.skills_root()]).unwrap_err();
    assert!(matches!(err, SwError::InvalidSkill(_)), "{err:?}");
    let message = err.to_string();
    assert!(message.contains("SKILL.local.md"), "{message}");
    assert!(message.contains("retries"), "{message}");

    let config = config_for(&fixture);
    assert!(SkillEngine::open(&config, &fixture.data_path).is_err());
}

#[test]
fn override_with_inverted_bounds_fails_to_load() {
    let fixture = UnitTestFixture::new();
    deploy_skill(&fixture, "---\nvariables:\n  retries:\n    min: 8\n    max: 4\n    default: 4\n---\n");

    let err = SkillRegistry::load(&[fixture.skills_root()]).unwrap_err();
    assert!(err.to_string().contains("min 8 > max 4"), "{err}");
}

#[test]
fn override_narrowing_bounds_with_valid_default_loads() {
    let fixture = UnitTestFixture::new();
    deploy_skill(&fixture, "---\nvariables:\n  retries:\n    max: 5\n---\n");
    let engine = engine_for(&fixture);

    let resolved = engine.read("deploy", &Values::new()).unwrap();
    assert_eq!(resolved.content, "Retry 3 times.\n");
    let mut vars = Values::new();
    vars.insert("retries".to_string(), json!(6));
    assert!(engine.read("deploy", &vars).is_err());
}
