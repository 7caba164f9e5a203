//! `qtyaudit run` and `qtyaudit validate`.

use std::path::{Path, PathBuf};

use qtyaudit_recon::config::PolicyKind;
use qtyaudit_recon::{AuditConfig, AuditError};

use crate::exit_codes::{EXIT_FINDINGS, EXIT_INVALID_CONFIG};
use crate::CliError;

pub struct RunArgs {
    pub xlsx: PathBuf,
    pub rules: PathBuf,
    pub outdir: PathBuf,
    pub sheet: Option<String>,
    pub json: bool,
    pub no_xlsx: bool,
    pub fail_on_findings: bool,
}

fn load_config(path: &Path) -> Result<AuditConfig, CliError> {
    AuditConfig::from_file(path).map_err(|e| match e {
        AuditError::Io(_) => CliError::new(EXIT_INVALID_CONFIG, e.to_string())
            .with_hint("pass --rules <file>, or copy rules.toml from the project root"),
        AuditError::ConfigParse(_) => {
            CliError::from(e).with_hint("check TOML syntax and key names (unknown keys are rejected)")
        }
        _ => CliError::from(e).with_hint("run `qtyaudit validate` after editing the rules file"),
    })
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(&args.rules)?;

    let input = qtyaudit_io::load_input(&args.xlsx, args.sheet.as_deref(), &config.columns)
        .map_err(|e| match e {
            AuditError::MalformedTable(_) if args.sheet.is_some() => {
                CliError::from(e).with_hint("omit --sheet to let the sheet be chosen by name")
            }
            _ => CliError::from(e),
        })?;

    let report = qtyaudit_recon::run(&config, &input)?;

    let written = qtyaudit_io::write_reports(&report, &args.outdir, args.no_xlsx)?;

    if args.json {
        let json = report.to_json_pretty()?;
        println!("{json}");
    }

    // Human summary to stderr
    let s = &report.summary;
    eprintln!(
        "sheet={}, header_row={}, rows_checked={}, discrepancies={} ({} high, {} medium, {} low)",
        report.meta.sheet_name, report.meta.header_row, s.rows_checked, s.total, s.high, s.medium, s.low,
    );
    eprintln!("wrote {}", written.csv.display());
    if let Some(ref xlsx) = written.xlsx {
        eprintln!("wrote {}", xlsx.display());
    }

    if args.fail_on_findings && s.total > 0 {
        return Err(CliError::new(EXIT_FINDINGS, format!("{} discrepancies found", s.total)));
    }
    Ok(())
}

pub fn cmd_validate(rules: PathBuf) -> Result<(), CliError> {
    let config = load_config(&rules)?;

    let mut line = format!(
        "ok: '{}' ({} material / {} installation keywords, {} percentages, {} standard rules, policy {})",
        config.name,
        config.material_keywords_any.len(),
        config.installation_keywords_any.len(),
        config.allowance_multiplier_map.len(),
        config.standard_rules.len(),
        config.policy.kind,
    );
    if config.policy.kind == PolicyKind::FixedNameExclusion {
        line.push_str(&format!(", {} excluded work names", config.policy.excluded_work_names.len()));
    }
    eprintln!("{line}");
    Ok(())
}
