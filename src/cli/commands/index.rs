//! skillweave index - Build the index and report its state

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_robot, robot_ok};
use crate::core::ValidationWarning;
use crate::error::{Result, SwError};
use crate::search::SnapshotStats;

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Rebuild on a worker thread and wait for the new snapshot
    #[arg(long)]
    pub rebuild: bool,
}

#[derive(Serialize)]
struct IndexReport {
    stats: SnapshotStats,
    roots: Vec<String>,
    warnings: Vec<WarningEntry>,
}

#[derive(Serialize)]
struct WarningEntry {
    skill: String,
    #[serde(flatten)]
    warning: ValidationWarning,
}

pub fn run(ctx: &AppContext, args: &IndexArgs) -> Result<()> {
    if args.rebuild {
        let handle = ctx.engine.rebuild_in_background()?;
        let generation = handle
            .join()
            .map_err(|_| SwError::IndexUnavailable("rebuild worker panicked".to_string()))??;
        info!(generation, "index rebuilt");
    }

    let report = IndexReport {
        stats: ctx.engine.stats(),
        roots: ctx
            .config
            .skill_paths
            .roots(&ctx.base)
            .iter()
            .map(|r| format!("{} ({})", r.path.display(), r.layer))
            .collect(),
        warnings: ctx
            .engine
            .warnings()
            .into_iter()
            .map(|(skill, warning)| WarningEntry { skill, warning })
            .collect(),
    };

    if ctx.robot() {
        return emit_robot(&robot_ok(&report));
    }

    let stats = &report.stats;
    let mut layout = HumanLayout::new();
    layout.title("Skill index");
    layout
        .kv("generation", &stats.generation.to_string())
        .kv("built", &stats.built_at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .kv("skills", &stats.skills.to_string())
        .kv("overrides", &stats.overrides.to_string())
        .kv("terms", &stats.terms.to_string())
        .kv("embedded", &stats.embedded.to_string());
    if let Some(embedder) = &stats.embedder {
        layout.kv("embedder", embedder);
    }
    if let Some(reason) = &stats.semantic_error {
        layout.kv("semantic", &format!("unavailable ({reason})"));
    }
    layout.blank().section("Roots");
    for root in &report.roots {
        layout.bullet(root);
    }
    if !report.warnings.is_empty() {
        layout.blank().section("Warnings");
        for entry in &report.warnings {
            layout.bullet(&format!(
                "{}: {} ({})",
                entry.skill, entry.warning.message, entry.warning.field
            ));
        }
    }
    println!("{}", layout.build());
    Ok(())
}
