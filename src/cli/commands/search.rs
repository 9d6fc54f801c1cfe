//! skillweave search - Rank skills for a query

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_robot, robot_ok, styled_score};
use crate::error::Result;
use crate::search::QueryContext;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Files the caller is working on (drives path and language scope)
    #[arg(long = "path", value_name = "PATH")]
    pub paths: Vec<String>,

    /// Languages in use
    #[arg(long = "lang", value_name = "LANG")]
    pub languages: Vec<String>,

    /// Maximum number of results
    #[arg(long, short, default_value = "5")]
    pub limit: usize,

    /// Show per-signal ranking diagnostics
    #[arg(long)]
    pub explain: bool,
}

impl SearchArgs {
    pub(crate) fn context(&self) -> QueryContext {
        QueryContext::new(&self.query)
            .with_paths(&self.paths)
            .with_languages(&self.languages)
            .with_limit(self.limit)
    }
}

pub fn run(ctx: &AppContext, args: &SearchArgs) -> Result<()> {
    let query = args.context();

    if args.explain {
        let ranking = ctx.engine.rank(&query);
        if ctx.robot() {
            return emit_robot(&robot_ok(&ranking));
        }
        let mut layout = HumanLayout::new();
        layout.title(&format!("Ranking for {:?}", args.query));
        for (i, r) in ranking.results.iter().enumerate() {
            layout.section(&format!("{}. {}", i + 1, r.name));
            layout
                .kv("score", &styled_score(r.score))
                .kv("composite", &format!("{:.4}", r.composite))
                .kv("rrf", &format!("{:.5} ({:.3})", r.rrf, r.rrf_normalized))
                .kv("scope boost", &format!("{:.2}", r.scope_boost))
                .kv("priority", &r.priority.to_string())
                .kv("bm25 rank", &rank_label(r.bm25_rank))
                .kv("semantic rank", &rank_label(r.semantic_rank))
                .blank();
        }
        if let Some(reason) = &ranking.degraded_reason {
            layout.push_line(format!("degraded: {reason}"));
        }
        println!("{}", layout.build());
        return Ok(());
    }

    let results = ctx.engine.search(&query);
    if ctx.robot() {
        return emit_robot(&robot_ok(&results));
    }

    if results.hits.is_empty() {
        println!("No skills match {:?}", args.query);
        return Ok(());
    }
    let mut layout = HumanLayout::new();
    layout.title(&format!("{} result(s) for {:?}", results.hits.len(), args.query));
    for hit in &results.hits {
        layout.push_line(format!(
            "{}  {}  [{}]",
            styled_score(hit.score),
            console::style(&hit.name).bold(),
            hit.category
        ));
        if !hit.description.is_empty() {
            layout.push_line(format!("       {}", hit.description));
        }
    }
    if results.degraded {
        layout.blank().push_line("(semantic search unavailable; lexical scores shown)");
    }
    println!("{}", layout.build());
    Ok(())
}

fn rank_label(rank: Option<usize>) -> String {
    rank.map_or_else(|| "-".to_string(), |r| r.to_string())
}
