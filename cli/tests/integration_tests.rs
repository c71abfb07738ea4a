use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;

/// A scratch directory holding a config file and its database.
struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn db(&self) -> PathBuf {
        self.join("data/riskcheck.db")
    }

    /// Writes `riskcheck.yml` with the database inside the workspace.
    fn write_config(&self, extra: &str) -> PathBuf {
        let yaml = format!(
            "database:\n  path: {}\nlogging:\n  filter: warn\n{extra}",
            self.db().display()
        );
        let path = self.join("riskcheck.yml");
        std::fs::write(&path, yaml).expect("failed to write config");
        path
    }

    fn run(&self, config: &Path, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_riskcheck"))
            .arg("--config")
            .arg(config)
            .args(args)
            .env_remove("RUST_LOG")
            .current_dir(self.dir.path())
            .output()
            .expect("failed to run riskcheck")
    }

    fn json(&self, config: &Path, args: &[&str]) -> Value {
        let mut full = vec!["--format", "json"];
        full.extend_from_slice(args);
        let output = self.run(config, &full);
        assert!(
            output.status.success(),
            "riskcheck {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
    }
}

#[cfg(unix)]
const SCRIPTED_PROBES: &str = r#"scan:
  global_timeout_secs: 10
probes:
  antivirus:
    program: sh
    args: ["-c", "echo '{\"RealTimeProtectionEnabled\":true}'"]
  updates:
    program: sh
    args: ["-c", "echo '{\"pending_count\":2}'"]
  firewall:
    program: sh
    args: ["-c", "echo 'Status: active'"]
  backup:
    program: sh
    args: ["-c", "echo '{\"checks\":[{\"name\":\"file_history\",\"data\":{}}]}'"]
  encryption:
    program: sh
    args: ["-c", "echo 'access denied' >&2; exit 1"]
  network:
    program: sh
    args: ["-c", "exec sleep 30"]
    timeout_secs: 1
"#;

// ---------------------------------------------------------------------------
// Questionnaire flow
// ---------------------------------------------------------------------------

#[test]
fn questionnaire_flow_produces_risk_score() {
    let ws = Workspace::new();
    let config = ws.write_config("");

    let company = ws.json(&config, &["company", "add", "Acme", "--industry", "Retail"]);
    let company_id = company["id"].as_i64().unwrap();

    let seeded = ws.json(&config, &["questions", "seed"]);
    assert_eq!(seeded["inserted"], 14);
    let reseeded = ws.json(&config, &["questions", "seed"]);
    assert_eq!(reseeded["inserted"], 0);
    assert_eq!(reseeded["existing"], 14);

    let questions = ws.json(&config, &["questions", "list"]);
    let questions = questions.as_array().unwrap();
    let first = questions[0]["id"].as_i64().unwrap().to_string();

    let assessment = ws.json(
        &config,
        &["assessment", "start", "--company", &company_id.to_string()],
    );
    let assessment_id = assessment["id"].as_i64().unwrap().to_string();

    ws.json(
        &config,
        &["answer", "--assessment", &assessment_id, "--question", &first, "--no"],
    );
    let results = ws.json(&config, &["results", "--assessment", &assessment_id]);
    assert_eq!(results["company"]["name"], "Acme");
    assert_eq!(results["risk"]["percentage"], 100.0);
    assert_eq!(results["risk"]["level"], "critical");
    assert_eq!(results["recommendations"].as_array().unwrap().len(), 1);

    // Changing the answer replaces the earlier one.
    ws.json(
        &config,
        &["answer", "--assessment", &assessment_id, "--question", &first, "--yes"],
    );
    let results = ws.json(&config, &["results", "--assessment", &assessment_id]);
    assert_eq!(results["risk"]["percentage"], 0.0);
    assert_eq!(results["risk"]["level"], "low");
    assert_eq!(results["assessment"]["answers"].as_array().unwrap().len(), 1);
}

#[test]
fn answer_to_unknown_question_fails() {
    let ws = Workspace::new();
    let config = ws.write_config("");
    let company = ws.json(&config, &["company", "add", "Acme"]);
    let assessment = ws.json(
        &config,
        &["assessment", "start", "--company", &company["id"].to_string()],
    );

    let output = ws.run(
        &config,
        &[
            "answer",
            "--assessment",
            &assessment["id"].to_string(),
            "--question",
            "999",
            "--yes",
        ],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error: question 999 not found"));
}

#[test]
fn assessment_for_unknown_company_fails() {
    let ws = Workspace::new();
    let config = ws.write_config("");
    let output = ws.run(&config, &["assessment", "start", "--company", "42"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("company not found: 42"));
}

// ---------------------------------------------------------------------------
// Configuration and migrations
// ---------------------------------------------------------------------------

#[test]
fn invalid_config_is_rejected() {
    let ws = Workspace::new();
    let config = ws.write_config("scan:\n  probe_timeout_secs: 0\n");
    let output = ws.run(&config, &["company", "list"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("probe_timeout_secs"));
    assert!(!ws.db().exists());
}

#[test]
fn missing_explicit_config_is_an_error() {
    let ws = Workspace::new();
    let output = ws.run(&ws.join("absent.yml"), &["company", "list"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load config"));
}

#[test]
fn log_directory_receives_full_and_error_logs() {
    let ws = Workspace::new();
    let logs = ws.join("logs");
    let config = ws.join("riskcheck.yml");
    let yaml = format!(
        "database:\n  path: {}\nlogging:\n  filter: info\n  directory: {}\n",
        ws.db().display(),
        logs.display()
    );
    std::fs::write(&config, yaml).unwrap();

    assert!(ws.run(&config, &["company", "add", "Acme"]).status.success());
    let output = ws.run(&config, &["assessment", "start", "--company", "42"]);
    assert_eq!(output.status.code(), Some(1));

    let full = std::fs::read_to_string(logs.join("riskcheck.log")).unwrap();
    assert!(full.contains("company created"));
    assert!(full.contains("company not found: 42"));

    let errors = std::fs::read_to_string(logs.join("error.log")).unwrap();
    assert!(errors.contains("company not found: 42"));
    assert!(!errors.contains("company created"));
}

#[test]
fn migrate_up_and_status() {
    let ws = Workspace::new();
    let config = ws.write_config("");

    let before = ws.json(&config, &["migrate", "status"]);
    assert_eq!(before["tables_exist"], false);

    let output = ws.run(&config, &["migrate", "up"]);
    assert!(output.status.success());
    let after = ws.json(&config, &["migrate", "status"]);
    assert_eq!(after["tables_exist"], true);
    assert_eq!(after["scan_count"], 0);
}

#[test]
fn db_flag_overrides_config() {
    let ws = Workspace::new();
    let config = ws.write_config("");
    let other = ws.join("other.db");
    let output = ws.run(
        &config,
        &["--db", other.to_str().unwrap(), "company", "add", "Beta"],
    );
    assert!(output.status.success());
    assert!(other.exists());
    assert!(!ws.db().exists());
}

#[test]
fn status_without_scans() {
    let ws = Workspace::new();
    let config = ws.write_config("");
    assert_eq!(ws.json(&config, &["status"]), Value::Null);
    let output = ws.run(&config, &["status"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("No scan has been stored yet."));
}

// ---------------------------------------------------------------------------
// System scan
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn scan_persists_every_check_and_status_reads_it_back() {
    let ws = Workspace::new();
    let config = ws.write_config(SCRIPTED_PROBES);

    let report = ws.json(&config, &["scan", "--assessment", "5"]);
    assert_eq!(report["overall_status"], "partial");
    let per_check = report["per_check"].as_object().unwrap();
    assert_eq!(per_check.len(), 6);
    assert_eq!(per_check["antivirus"]["status"], "success");
    assert_eq!(per_check["updates"]["status"], "warning");
    assert_eq!(per_check["updates"]["message"], "2 pending updates");
    assert_eq!(per_check["firewall"]["status"], "success");
    assert_eq!(per_check["encryption"]["status"], "error");
    assert_eq!(per_check["network"]["status"], "timeout");

    let status = ws.json(&config, &["status", "--assessment", "5"]);
    assert_eq!(status["scan_id"], report["scan_id"]);

    let conn = rusqlite::Connection::open(ws.db()).unwrap();
    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM scan_results WHERE scan_id = ?1",
            [report["scan_id"].as_str().unwrap()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 6);

    // A retry is a fresh scan; the latest one wins.
    let retry = ws.json(
        &config,
        &["retry", "--assessment", "5", "--checks", "updates,firewall"],
    );
    assert_ne!(retry["scan_id"], report["scan_id"]);
    assert_eq!(retry["overall_status"], "partial");
    let status = ws.json(&config, &["status"]);
    assert_eq!(status["scan_id"], retry["scan_id"]);
}

#[cfg(unix)]
#[test]
fn failed_persistence_exits_with_error_after_showing_results() {
    let ws = Workspace::new();
    let config = ws.write_config(SCRIPTED_PROBES);
    assert!(ws.run(&config, &["migrate", "up"]).status.success());

    let conn = rusqlite::Connection::open(ws.db()).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_summary BEFORE INSERT ON scans \
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
    )
    .unwrap();
    drop(conn);

    let output = ws.run(&config, &["scan", "--assessment", "1", "--checks", "firewall"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("firewall"));
    assert!(stderr.contains("error: Failed to save scan results for assessment 1"));
    assert!(stderr.contains("riskcheck retry --assessment 1"));

    let conn = rusqlite::Connection::open(ws.db()).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM scan_results", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn diagnose_reports_database_entry() {
    let ws = Workspace::new();
    let config = ws.write_config("");
    assert!(ws.run(&config, &["migrate", "up"]).status.success());

    let entries = ws.json(&config, &["diagnose"]);
    let entries = entries.as_array().unwrap();
    let names: Vec<_> = entries.iter().map(|e| e["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["shell", "admin_rights", "disk_access", "database"]);
    assert_eq!(entries[3]["status"], "success");
    assert_eq!(entries[2]["status"], "success");
}
