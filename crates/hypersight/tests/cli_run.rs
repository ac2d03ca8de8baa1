use std::fs;

use clap::Parser;
use hypersight::cli::Cli;
use tempfile::tempdir;

const ROWS: &str = r#"[
  {"id": 1, "category": "Batterier", "issue": "Range loss", "created_at": "2024-03-01"},
  {"id": 2, "category": "Elnät", "issue": "Grid outage", "created_at": "2024-03-02"}
]"#;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("parse cli")
}

#[test]
fn json_workspace_runs_read_only_commands() {
    let temp = tempdir().expect("tempdir");
    fs::create_dir_all(temp.path().join(".hypersight")).expect("create dir");
    fs::write(temp.path().join(".hypersight/tickets.json"), ROWS).expect("write rows");
    let workspace = temp.path().to_str().expect("utf-8 path");

    for command in [
        vec!["table", "--category", "Batterier"],
        vec!["options"],
        vec!["categories", "--limit", "3"],
        vec!["distribution", "--output", "json"],
    ] {
        let mut args = vec!["hypersight", "--workspace", workspace, "--store-backend", "json"];
        args.extend(command.iter().copied());
        hypersight::run(parse(&args)).expect("command succeeds");
    }

    assert!(temp.path().join(".hypersight/config.toml").exists());
}

#[test]
fn missing_rows_file_is_reported() {
    let temp = tempdir().expect("tempdir");
    let workspace = temp.path().to_str().expect("utf-8 path");

    let err = hypersight::run(parse(&[
        "hypersight",
        "--workspace",
        workspace,
        "--store-backend",
        "json",
        "distribution",
    ]))
    .expect_err("missing rows file");

    assert!(format!("{err:#}").contains("failed to open json ticket store"));
}

#[test]
fn context_free_questions_do_not_need_a_configured_store() {
    let temp = tempdir().expect("tempdir");
    let workspace = temp.path().to_str().expect("utf-8 path");

    for question in [
        vec!["ask", "--no-context", "Which category grows?"],
        vec!["ask", "--mode", "charts", "Which category grows?"],
    ] {
        let mut args = vec![
            "hypersight",
            "--workspace",
            workspace,
            "--assistant-provider",
            "mock",
        ];
        args.extend(question.iter().copied());
        hypersight::run(parse(&args)).expect("question answered without a store");
    }
}

#[test]
fn insights_with_context_still_reads_the_store() {
    let temp = tempdir().expect("tempdir");
    let workspace = temp.path().to_str().expect("utf-8 path");

    let err = hypersight::run(parse(&[
        "hypersight",
        "--workspace",
        workspace,
        "--assistant-provider",
        "mock",
        "ask",
        "Which category grows?",
    ]))
    .expect_err("unconfigured store");

    assert!(format!("{err:#}").contains("failed to open postgrest ticket store"));
}
