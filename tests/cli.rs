use std::path::{Path, PathBuf};
use std::process::{Command, Output};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn notesearch_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_notesearch"))
}

fn run(data_dir: &Path, args: &[&str]) -> std::io::Result<Output> {
    Command::new(notesearch_bin())
        .args(args)
        .env("NOTESEARCH_DATA_DIR", data_dir)
        .env_remove("NOTESEARCH_LOG")
        .arg("--quiet")
        .output()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// A notebook with two work notes (one archived) and a personal note,
/// indexed into a fresh data directory.
fn indexed_notebook() -> Result<tempfile::TempDir, Box<dyn std::error::Error>>
{
    let tmp = tempfile::tempdir()?;
    let notes = tmp.path().join("notes");
    std::fs::create_dir_all(notes.join("projects"))?;
    std::fs::write(
        notes.join("projects/roadmap.md"),
        "---\ntitle: Roadmap\ntags: [work]\nstatus: active\n---\n\
         The meeting covered the roadmap.\n",
    )?;
    std::fs::write(
        notes.join("projects/old.md"),
        "---\ntags: [work, archived]\n---\n# Old Plan\n\nA meeting long ago.\n",
    )?;
    std::fs::write(
        notes.join("groceries.md"),
        "---\ntags: personal\n---\nMilk and eggs.\n",
    )?;

    let data = tmp.path().join("data");
    let output = run(&data, &["reindex", notes.to_str().unwrap_or_default()])?;
    assert!(output.status.success(), "reindex failed: {}", stderr(&output));
    assert!(stdout(&output).contains("Indexed 3 note(s)"));
    Ok(tmp)
}

#[test]
fn find_excludes_archived_notes() -> TestResult {
    let tmp = indexed_notebook()?;
    let data = tmp.path().join("data");

    let output = run(&data, &["find", "meeting tag:work -tag:archived"])?;
    assert!(output.status.success(), "find failed: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("projects/roadmap.md"));
    assert!(!out.contains("projects/old.md"));
    assert!(out.contains("1 result(s)"));
    Ok(())
}

#[test]
fn find_json_output() -> TestResult {
    let tmp = indexed_notebook()?;
    let data = tmp.path().join("data");

    let output = run(&data, &["find", "status:active", "--json"])?;
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["total"], 1);
    assert_eq!(json["items"][0]["document"]["title"], "Roadmap");
    Ok(())
}

#[test]
fn count_and_get() -> TestResult {
    let tmp = indexed_notebook()?;
    let data = tmp.path().join("data");

    let output = run(&data, &["count", "tag:work"])?;
    assert_eq!(stdout(&output).trim(), "2");

    let output = run(&data, &["get", "projects/old.md"])?;
    assert!(output.status.success());
    assert!(stdout(&output).contains("Title: Old Plan"));

    let output = run(&data, &["get", "missing.md"])?;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("document not found: missing.md"));
    Ok(())
}

#[test]
fn hybrid_search_warns_and_falls_back() -> TestResult {
    let tmp = indexed_notebook()?;
    let data = tmp.path().join("data");

    let output =
        run(&data, &["search", "meeting", "--and", "data.tag=work"])?;
    assert!(output.status.success(), "search failed: {}", stderr(&output));
    assert!(stderr(&output).contains(
        "Warning: semantic backend unavailable, showing keyword-mode results."
    ));
    let out = stdout(&output);
    assert!(out.contains("projects/roadmap.md"));
    assert!(out.contains("projects/old.md"));
    assert!(out.contains("(Exact match)"));
    Ok(())
}

#[test]
fn semantic_search_prints_a_hint() -> TestResult {
    let tmp = indexed_notebook()?;
    let data = tmp.path().join("data");

    let output = run(&data, &["search", "meeting", "--mode", "semantic"])?;
    assert!(output.status.success());
    assert!(stdout(&output).contains("Semantic backend unavailable."));
    Ok(())
}

#[test]
fn bad_condition_fails() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let output = run(tmp.path(), &["search", "--and", "owner=me"])?;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid condition"));
    Ok(())
}

#[test]
fn validate_reports_suggestions() -> TestResult {
    let tmp = tempfile::tempdir()?;

    let output = run(tmp.path(), &["validate", "tag:work OR title:x"])?;
    assert!(output.status.success());
    assert!(stdout(&output).contains("Query is valid."));

    let output = run(tmp.path(), &["validate", "tga:work"])?;
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("tga:work"));
    assert!(err.contains("Did you mean: tag"), "unexpected: {err}");
    Ok(())
}

#[test]
fn syntax_prints_help() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let output = run(tmp.path(), &["syntax"])?;
    assert!(output.status.success());
    assert!(stdout(&output).contains("Query Syntax"));
    Ok(())
}
