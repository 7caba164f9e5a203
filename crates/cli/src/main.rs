// qtyaudit CLI - headless bill-of-quantities audits

mod audit;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "qtyaudit")]
#[command(about = "Audit quantity take-off workbooks for rounding, surcharge and unit mistakes")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit one workbook and write report.csv / report.xlsx
    #[command(after_help = "\
Examples:
  qtyaudit run takeoff.xlsx
  qtyaudit run takeoff.xlsx --rules site.rules.toml --outdir audit/
  qtyaudit run takeoff.xlsx --sheet '포장산출' --json --no-xlsx
  qtyaudit run takeoff.xlsx --fail-on-findings   # exit 43 on any discrepancy")]
    Run {
        /// Workbook to audit (.xlsx, .xlsm, .xls, .ods)
        xlsx: PathBuf,

        /// Rules file
        #[arg(long, default_value = "rules.toml")]
        rules: PathBuf,

        /// Directory for report.csv and report.xlsx (created if missing)
        #[arg(long, default_value = "output")]
        outdir: PathBuf,

        /// Sheet to audit (default: chosen by name)
        #[arg(long)]
        sheet: Option<String>,

        /// Print the full report as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Skip report.xlsx
        #[arg(long)]
        no_xlsx: bool,

        /// Exit 43 when any discrepancy is found
        #[arg(long)]
        fail_on_findings: bool,
    },

    /// Parse and validate a rules file without running an audit
    #[command(after_help = "\
Examples:
  qtyaudit validate rules.toml")]
    Validate {
        /// Rules file
        rules: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ntarget:  ", env!("TARGET"),
    )
}

/// Logs go to stderr. `QTYAUDIT_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("QTYAUDIT_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            xlsx,
            rules,
            outdir,
            sheet,
            json,
            no_xlsx,
            fail_on_findings,
        } => audit::cmd_run(audit::RunArgs {
            xlsx,
            rules,
            outdir,
            sheet,
            json,
            no_xlsx,
            fail_on_findings,
        }),
        Commands::Validate { rules } => audit::cmd_validate(rules),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<qtyaudit_recon::AuditError> for CliError {
    fn from(e: qtyaudit_recon::AuditError) -> Self {
        Self::new(exit_codes::audit_exit_code(&e), e.to_string())
    }
}
