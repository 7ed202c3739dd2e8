use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

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
        std::env::temp_dir().join(format!("geoscreen-config-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

#[test]
fn defaults_apply_without_config_file() {
    let home = make_temp_home();
    let out = run(&home, &["config", "--show"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("mode = \"live\""), "stdout={stdout}");
    assert!(
        stdout.contains("base_url = \"http://127.0.0.1:8000\""),
        "stdout={stdout}"
    );
    assert!(stdout.contains("page_size = 10"), "stdout={stdout}");
    assert!(!stdout.contains("config_path"), "stdout={stdout}");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_file_overrides_defaults() {
    let home = make_temp_home();
    write_file(
        home.join(".config/geoscreen/config.toml").as_path(),
        br#"
[client]
mode = "mock"

[ui]
page_size = 5
max_table_rows = 3
"#,
    );

    let out = run(&home, &["config", "--show"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("mode = \"mock\""), "stdout={stdout}");
    assert!(stdout.contains("page_size = 5"), "stdout={stdout}");
    assert!(stdout.contains("max_table_rows = 3"), "stdout={stdout}");
    assert!(stdout.contains("config_path"), "stdout={stdout}");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_mode_mock_makes_analyze_offline() {
    let home = make_temp_home();
    write_file(
        home.join(".config/geoscreen/config.toml").as_path(),
        br#"
[client]
mode = "mock"
base_url = "http://127.0.0.1:9"
"#,
    );

    let out = run(&home, &["--json", "analyze", "--text", "a feature"]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert!(v.get("feature_id").is_some());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn cli_config_path_overrides_env_config_path() {
    let home = make_temp_home();
    let cfg_env = home.join("env-config.toml");
    let cfg_cli = home.join("cli-config.toml");
    write_file(
        cfg_env.as_path(),
        br#"
[ui]
page_size = 7
"#,
    );
    write_file(
        cfg_cli.as_path(),
        br#"
[ui]
page_size = 4
"#,
    );

    let out = {
        let mut cmd = geoscreen_cmd(&home);
        cmd.env("GEOSCREEN_CONFIG", &cfg_env);
        cmd.args(["config", "--show", "--config"]);
        cmd.arg(&cfg_cli);
        cmd.output().expect("run geoscreen")
    };
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("page_size = 4"), "stdout={stdout}");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn mock_flag_overrides_config_mode() {
    let home = make_temp_home();
    write_file(
        home.join(".config/geoscreen/config.toml").as_path(),
        br#"
[client]
mode = "live"
base_url = "http://127.0.0.1:9"
"#,
    );

    let out = run(&home, &["--mock", "--json", "analyze", "--text", "x"]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let _ = std::fs::remove_dir_all(&home);
}
