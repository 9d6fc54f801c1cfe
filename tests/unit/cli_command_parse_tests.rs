use clap::Parser;

use skillweave::cli::{Cli, Commands};

fn parse(args: &[&str]) -> Commands {
    let mut argv = vec!["skillweave"];
    argv.extend_from_slice(args);
    Cli::parse_from(argv).command
}

#[test]
fn parse_search_with_scope() {
    match parse(&[
        "search",
        "debug python",
        "--path",
        "src/app.py",
        "--lang",
        "python",
        "--limit",
        "3",
        "--explain",
    ]) {
        Commands::Search(args) => {
            assert_eq!(args.query, "debug python");
            assert_eq!(args.paths, vec!["src/app.py"]);
            assert_eq!(args.languages, vec!["python"]);
            assert_eq!(args.limit, 3);
            assert!(args.explain);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_search_defaults() {
    match parse(&["search", "git"]) {
        Commands::Search(args) => {
            assert_eq!(args.limit, 5);
            assert!(args.paths.is_empty());
            assert!(!args.explain);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_use_flags() {
    match parse(&[
        "use",
        "release",
        "--var",
        "target=production",
        "--var",
        "retries=4",
        "--auto-select",
    ]) {
        Commands::Use(args) => {
            assert_eq!(args.query, "release");
            assert_eq!(args.vars, vec!["target=production", "retries=4"]);
            assert!(args.auto_select);
            assert!(!args.force_single);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn auto_select_conflicts_with_force_single() {
    let result = Cli::try_parse_from(["skillweave", "use", "q", "--auto-select", "--force-single"]);
    assert!(result.is_err());
}

#[test]
fn parse_read_and_index() {
    match parse(&["read", "lint-rules", "--var", "strictness=3", "--raw"]) {
        Commands::Read(args) => {
            assert_eq!(args.name, "lint-rules");
            assert_eq!(args.vars, vec!["strictness=3"]);
            assert!(args.raw);
        }
        other => panic!("unexpected command: {other:?}"),
    }
    match parse(&["index", "--rebuild"]) {
        Commands::Index(args) => assert!(args.rebuild),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn global_flags_anywhere() {
    let cli = Cli::parse_from(["skillweave", "--robot", "read", "x", "--config", "/tmp/c.toml", "-q"]);
    assert!(cli.robot);
    assert!(cli.quiet);
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/c.toml")));
}
