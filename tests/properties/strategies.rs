//! Proptest strategies for skills, overrides and include graphs.

use std::collections::BTreeMap;

use proptest::prelude::*;

use skillweave::core::{LocalOverride, SkillDefinition, SkillRegistry};

const WORDS: &[&str] = &[
    "python", "rust", "debug", "memory", "leak", "deploy", "release", "lint", "docker", "git",
    "test", "cache", "index", "query", "async",
];

pub fn arb_word() -> impl Strategy<Value = String> {
    prop::sample::select(WORDS).prop_map(str::to_string)
}

pub fn arb_text(max_words: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(arb_word(), 0..=max_words).prop_map(|words| words.join(" "))
}

pub fn arb_skill(index: usize) -> impl Strategy<Value = SkillDefinition> {
    (
        arb_text(6),
        prop::collection::vec(arb_word(), 0..4),
        arb_text(20),
        0u8..=100,
    )
        .prop_map(move |(description, tags, body, priority)| {
            SkillDefinition::new(format!("skill-{index}"), description)
                .with_tags(tags)
                .with_body(body)
                .with_priority(priority)
        })
}

/// A registry of up to `max` uniquely named skills.
pub fn arb_registry(max: usize) -> impl Strategy<Value = SkillRegistry> {
    (1..=max)
        .prop_flat_map(|n| (0..n).map(arb_skill).collect::<Vec<_>>())
        .prop_map(|skills| SkillRegistry::from_parts(skills, Vec::new()).expect("valid skills"))
}

pub fn arb_override() -> impl Strategy<Value = LocalOverride> {
    (
        prop::option::of(arb_text(4)),
        prop::collection::vec(arb_word(), 0..4),
        prop::option::of(0u8..=100),
        prop::option::of(arb_text(8)),
    )
        .prop_map(|(description, tags, priority, append)| LocalOverride {
            description,
            tags,
            priority,
            append,
            ..LocalOverride::default()
        })
}

/// `n` skills named `g0..`, each body including an arbitrary subset of the
/// others (self-includes allowed).
pub fn arb_include_graph(max: usize) -> impl Strategy<Value = BTreeMap<String, SkillDefinition>> {
    (1..=max)
        .prop_flat_map(|n| prop::collection::vec(prop::collection::vec(0..n, 0..3), n))
        .prop_map(|edges| {
            edges
                .into_iter()
                .enumerate()
                .map(|(i, targets)| {
                    let mut body = format!("node {i}\n");
                    for t in targets {
                        body.push_str(&format!("@include skill:g{t}\n"));
                    }
                    let name = format!("g{i}");
                    (name.clone(), SkillDefinition::new(name, "graph node").with_body(body))
                })
                .collect()
        })
}
