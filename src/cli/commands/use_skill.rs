//! skillweave use - Select the best skill for a query and resolve it

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::commands::parse_vars;
use crate::cli::commands::read::print_resolved;
use crate::cli::output::{HumanLayout, emit_robot, robot_ambiguous, robot_ok, styled_score};
use crate::engine::{ResolvedSkill, UseOutcome, UseRequest};
use crate::error::Result;
use crate::search::QueryContext;

#[derive(Args, Debug)]
pub struct UseArgs {
    /// What the skill should help with
    pub query: String,

    /// Variable value as key=value (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Files the caller is working on
    #[arg(long = "path", value_name = "PATH")]
    pub paths: Vec<String>,

    /// Languages in use
    #[arg(long = "lang", value_name = "LANG")]
    pub languages: Vec<String>,

    /// Take the top match even when others score closely
    #[arg(long)]
    pub auto_select: bool,

    /// Fail instead of listing candidates when the match is ambiguous
    #[arg(long, conflicts_with = "auto_select")]
    pub force_single: bool,
}

#[derive(Serialize)]
struct ResolvedPayload<'a> {
    ambiguous: bool,
    skill: &'a ResolvedSkill,
}

pub fn run(ctx: &AppContext, args: &UseArgs) -> Result<()> {
    let request = UseRequest::new(&args.query)
        .with_context(
            QueryContext::new(&args.query)
                .with_paths(&args.paths)
                .with_languages(&args.languages)
                .with_auto_select(args.auto_select),
        )
        .with_variables(parse_vars(&args.vars)?)
        .with_force_single(args.force_single);

    match ctx.engine.use_skill(&request)? {
        UseOutcome::Resolved(skill) => {
            if ctx.robot() {
                return emit_robot(&robot_ok(ResolvedPayload {
                    ambiguous: false,
                    skill: &skill,
                }));
            }
            print_resolved(&skill);
            Ok(())
        }
        UseOutcome::Ambiguous(result) => {
            if ctx.robot() {
                return emit_robot(&robot_ambiguous(&result));
            }
            let mut layout = HumanLayout::new();
            layout.title(&format!("Several skills match {:?}", args.query));
            for candidate in &result.candidates {
                layout.bullet(&format!(
                    "{}  {}  {}",
                    styled_score(candidate.score),
                    console::style(&candidate.name).bold(),
                    candidate.description
                ));
            }
            layout.blank().push_line(result.hint.clone());
            println!("{}", layout.build());
            Ok(())
        }
    }
}
