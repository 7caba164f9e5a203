// End-to-end tests for the qtyaudit binary: exit codes, report files and
// the --json stdout contract.
//
// Run with: cargo test -p qtyaudit-cli --test cli_tests -- --nocapture

use std::path::Path;
use std::process::{Command, Output};

use rust_xlsxwriter::{Formula, Workbook};

const RULES: &str = r#"
name = "cli test"
material_keywords_any = ["강관"]
installation_keywords_any = ["식재"]

[allowance_multiplier_map]
"4%" = 1.04
"#;

fn qtyaudit() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_qtyaudit"));
    cmd.env_remove("QTYAUDIT_LOG");
    cmd
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Quantity sheet with one rounding mistake (row 3) and one clean row.
fn write_workbook(path: &Path, clean: bool) {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet().set_name("시설물산출").unwrap();
    for (col, label) in ["공종", "규격", "산출근거", "수량", "단위", "비고"].iter().enumerate() {
        ws.write_string(0, col as u16 + 1, *label).unwrap();
    }
    ws.write_string(1, 1, "벤치").unwrap();
    ws.write_string(1, 3, "2*3").unwrap();
    ws.write_formula(1, 4, Formula::new("=ROUND(2*3,3)").set_result("6")).unwrap();
    ws.write_string(1, 5, "EA").unwrap();

    ws.write_string(2, 1, "벤치").unwrap();
    ws.write_string(2, 3, "2*3").unwrap();
    ws.write_number(2, 4, if clean { 6.0 } else { 6.5 }).unwrap();
    ws.write_string(2, 5, "EA").unwrap();
    wb.save(path).unwrap();
}

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new(clean: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_workbook(&dir.path().join("boq.xlsx"), clean);
        std::fs::write(dir.path().join("rules.toml"), RULES).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_str().unwrap().to_string()
    }

    fn run(&self, extra: &[&str]) -> Output {
        let mut args = vec![
            "run".to_string(),
            self.path("boq.xlsx"),
            "--rules".into(),
            self.path("rules.toml"),
            "--outdir".into(),
            self.path("out"),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        qtyaudit().args(&args).output().expect("qtyaudit run")
    }
}

// ===========================================================================
// qtyaudit run
// ===========================================================================

#[test]
fn run_writes_reports_and_summary() {
    let fx = Fixture::new(false);
    let output = fx.run(&[]);

    assert!(output.status.success(), "exit: {:?}\nstderr: {}", output.status, stderr(&output));
    assert!(output.stdout.is_empty(), "stdout is reserved for --json");

    let err = stderr(&output);
    assert!(err.contains("sheet=시설물산출, header_row=1, rows_checked=2"), "{err}");
    assert!(err.contains("discrepancies=1"), "{err}");

    assert!(fx.dir.path().join("out/report.csv").exists());
    assert!(fx.dir.path().join("out/report.xlsx").exists());
}

#[test]
fn run_json_is_a_single_value() {
    let fx = Fixture::new(false);
    let output = fx.run(&["--json", "--no-xlsx"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let val: serde_json::Value = serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be valid JSON: {e}\n{stdout}"));

    assert_eq!(val["meta"]["config_name"], "cli test");
    assert_eq!(val["meta"]["policy"], "percent_gated");
    assert_eq!(val["summary"]["total"], 1);
    let d = &val["discrepancies"][0];
    assert_eq!(d["row"], 3);
    assert_eq!(d["cell"], "D3/E3");
    assert_eq!(d["check_kind"], "computed_value");
    assert_eq!(d["severity"], "HIGH");

    assert!(!fx.dir.path().join("out/report.xlsx").exists());
}

#[test]
fn findings_do_not_fail_by_default() {
    let fx = Fixture::new(false);
    assert_eq!(fx.run(&[]).status.code(), Some(0));
}

#[test]
fn fail_on_findings_exits_43() {
    let fx = Fixture::new(false);
    let output = fx.run(&["--fail-on-findings"]);
    assert_eq!(output.status.code(), Some(43), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("error: 1 discrepancies found"));
    // Reports are still written before failing.
    assert!(fx.dir.path().join("out/report.csv").exists());
}

#[test]
fn fail_on_findings_passes_clean_workbook() {
    let fx = Fixture::new(true);
    let output = fx.run(&["--fail-on-findings"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
}

#[test]
fn missing_rules_file_exits_40_with_hint() {
    let fx = Fixture::new(false);
    let output = qtyaudit()
        .args(["run", &fx.path("boq.xlsx"), "--rules", &fx.path("nope.toml")])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(40));
    let err = stderr(&output);
    assert!(err.contains("cannot read") && err.contains("nope.toml"), "{err}");
    assert!(err.contains("hint:"), "{err}");
}

#[test]
fn invalid_rules_exit_40() {
    let fx = Fixture::new(false);
    std::fs::write(fx.dir.path().join("rules.toml"), "allowance_percent_extract_regex = '\\d+%'\n").unwrap();
    let output = fx.run(&[]);
    assert_eq!(output.status.code(), Some(40));
    assert!(stderr(&output).contains("config validation error"), "{}", stderr(&output));
}

#[test]
fn unreadable_workbook_exits_41() {
    let fx = Fixture::new(false);
    std::fs::write(fx.dir.path().join("boq.xlsx"), b"not a workbook").unwrap();
    let output = fx.run(&[]);
    assert_eq!(output.status.code(), Some(41), "stderr: {}", stderr(&output));
}

#[test]
fn headerless_sheet_exits_41() {
    let fx = Fixture::new(false);
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.write_string(0, 1, "벤치").unwrap();
    ws.write_string(0, 3, "2*3").unwrap();
    ws.write_number(0, 4, 6.0).unwrap();
    wb.save(fx.dir.path().join("boq.xlsx")).unwrap();

    let output = fx.run(&[]);
    assert_eq!(output.status.code(), Some(41), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("no header row"), "{}", stderr(&output));
    assert!(!fx.dir.path().join("out").exists(), "no reports on a malformed table");
}

#[test]
fn unknown_sheet_exits_41_with_hint() {
    let fx = Fixture::new(false);
    let output = fx.run(&["--sheet", "없는시트"]);
    assert_eq!(output.status.code(), Some(41));
    assert!(stderr(&output).contains("hint:  omit --sheet"));
}

#[test]
fn unwritable_outdir_exits_42() {
    let fx = Fixture::new(false);
    // A file where the output directory should be.
    std::fs::write(fx.dir.path().join("out"), "").unwrap();
    let output = fx.run(&[]);
    assert_eq!(output.status.code(), Some(42), "stderr: {}", stderr(&output));
}

#[test]
fn missing_argument_is_usage_error() {
    let output = qtyaudit().arg("run").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ===========================================================================
// qtyaudit validate
// ===========================================================================

#[test]
fn validate_accepts_root_rules_file() {
    let rules = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../rules.toml");
    let output = qtyaudit().arg("validate").arg(&rules).output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).starts_with("ok: "));
}

#[test]
fn validate_rejects_unknown_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "materail_keywords_any = [\"steel\"]\n").unwrap();
    let output = qtyaudit().arg("validate").arg(&path).output().unwrap();
    assert_eq!(output.status.code(), Some(40));
    assert!(stderr(&output).contains("config parse error"));
}
