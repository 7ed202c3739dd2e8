use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

use geoscreen::core::AnalysisResult;

fn geoscreen_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_geoscreen"));
    cmd.env("HOME", home);
    cmd.env_remove("GEOSCREEN_CONFIG");
    cmd.env_remove("GEOSCREEN_CLIENT_MODE");
    cmd.env_remove("GEOSCREEN_CLIENT_BASE_URL");
    cmd.env_remove("GEOSCREEN_UI_COLOR");
    cmd.env_remove("GEOSCREEN_UI_PAGE_SIZE");
    cmd.env_remove("GEOSCREEN_UI_MAX_TABLE_ROWS");
    cmd.env_remove("GEOSCREEN_UI_TRUNCATE_CHARS");
    cmd.env_remove("GEOSCREEN_HISTORY_KEEP");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    geoscreen_cmd(home)
        .args(args)
        .output()
        .expect("run geoscreen")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home =
        std::env::temp_dir().join(format!("geoscreen-analyze-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

#[test]
fn mock_analyze_json_satisfies_summary_invariant() {
    let home = make_temp_home();
    let out = run(&home, &["--mock", "--json", "analyze", "--text", "a minors feed"]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let result: AnalysisResult = serde_json::from_slice(&out.stdout).expect("parse result json");
    assert!(!result.findings.is_empty());
    assert!(result.summary_matches_findings());
    for finding in &result.findings {
        assert!(finding.confidence <= 100);
        assert!(result.detected_geos.contains(&finding.geo));
    }
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn mock_analyze_writes_history_entry() {
    let home = make_temp_home();
    let out = run(&home, &["--mock", "--json", "analyze", "--text", "a minors feed"]);
    assert!(out.status.success());

    let dir = home.join(".config/geoscreen/history");
    let entries: Vec<_> = std::fs::read_dir(&dir)
        .expect("history dir")
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(entries.len(), 1);
    let name = entries[0].file_name();
    let name = name.to_string_lossy();
    assert!(name.starts_with("analysis-") && name.ends_with(".json"));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn history_command_lists_saved_analysis() {
    let home = make_temp_home();
    let out = run(&home, &["--mock", "--json", "analyze", "--text", "a minors feed"]);
    assert!(out.status.success());

    let out = run(&home, &["--json", "history"]);
    assert!(out.status.success());
    let items: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse history");
    let items = items.as_array().expect("array");
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0].get("mode").and_then(|m| m.as_str()),
        Some("mock")
    );
    assert_eq!(
        items[0].get("prompt_excerpt").and_then(|p| p.as_str()),
        Some("a minors feed")
    );
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn mock_export_csv_has_contract_header_and_all_rows() {
    let home = make_temp_home();
    let out = run(&home, &["--mock", "export", "csv"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let mut lines = stdout.lines();
    assert_eq!(
        lines.next(),
        Some(
            "\"Geo\",\"Law\",\"Label\",\"Severity\",\"Confidence\",\"Controls\",\"Reasoning\",\"Evidence\",\"Citations\""
        )
    );

    let result_json = run(&home, &["--mock", "export", "json"]);
    assert!(result_json.status.success());
    let result: AnalysisResult =
        serde_json::from_slice(&result_json.stdout).expect("parse exported json");
    assert_eq!(lines.count(), result.findings.len());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn export_output_flag_writes_file() {
    let home = make_temp_home();
    let target = home.join("out.json");
    let out = run(
        &home,
        &[
            "--mock",
            "export",
            "json",
            "--output",
            target.to_str().expect("utf8 path"),
        ],
    );
    assert!(out.status.success());
    let content = std::fs::read_to_string(&target).expect("read output");
    let result: AnalysisResult = serde_json::from_str(&content).expect("parse output");
    assert!(result.summary_matches_findings());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn plain_analyze_renders_summary_and_table() {
    let home = make_temp_home();
    let out = run(&home, &["--mock", "analyze", "--text", "a minors feed"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("summary:"), "stdout={stdout}");
    assert!(stdout.contains("detected geos:"), "stdout={stdout}");
    assert!(stdout.contains("findings ("), "stdout={stdout}");
    // Not a TTY, so no ANSI color codes in the table.
    assert!(!stdout.contains("\x1b["), "stdout={stdout}");
    let _ = std::fs::remove_dir_all(&home);
}
