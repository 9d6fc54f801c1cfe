//! skillweave read - Resolve a skill by name

use clap::Args;

use crate::app::AppContext;
use crate::cli::commands::parse_vars;
use crate::cli::output::{HumanLayout, emit_robot, robot_ok, styled_score};
use crate::core::skill::display_value;
use crate::engine::ResolvedSkill;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Skill name
    pub name: String,

    /// Variable value as key=value (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Print only the rendered content
    #[arg(long)]
    pub raw: bool,
}

pub fn run(ctx: &AppContext, args: &ReadArgs) -> Result<()> {
    let variables = parse_vars(&args.vars)?;
    let skill = ctx.engine.read(&args.name, &variables)?;

    if ctx.robot() {
        return emit_robot(&robot_ok(&skill));
    }
    if args.raw {
        print!("{}", skill.content);
        return Ok(());
    }
    print_resolved(&skill);
    Ok(())
}

/// Metadata header followed by the rendered document.
pub(crate) fn print_resolved(skill: &ResolvedSkill) {
    let meta = &skill.metadata;
    let mut layout = HumanLayout::new();
    layout.title(&skill.name);
    if !meta.description.is_empty() {
        layout.kv("description", &meta.description);
    }
    layout
        .kv("category", &meta.category)
        .kv("version", &meta.version)
        .kv("layer", meta.precedence.as_str())
        .kv("priority", &meta.priority.to_string());
    if !meta.tags.is_empty() {
        layout.kv("tags", &meta.tags.join(", "));
    }
    if !meta.included.is_empty() {
        layout.kv("includes", &meta.included.join(", "));
    }
    if !meta.variables.is_empty() {
        let vars: Vec<String> = meta
            .variables
            .iter()
            .map(|(k, v)| format!("{k}={}", display_value(v)))
            .collect();
        layout.kv("variables", &vars.join(" "));
    }
    if let Some(score) = meta.score {
        layout.kv("score", &styled_score(score));
    }
    if meta.degraded == Some(true) {
        layout.kv("degraded", "semantic search unavailable");
    }
    layout.blank().push_line(skill.content.trim_end());
    println!("{}", layout.build());
}
