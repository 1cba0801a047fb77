//! Operator CLI for bulk enrolment and purge against the registry database.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cap_std::{ambient_authority, fs::Dir};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use mockable::{DefaultEnv, Env};
use tokio::runtime::Builder;

use registrar::domain::enrolment::{BulkEnrolmentConfig, BulkEnrolmentService, EnrolmentStatus};
use registrar::domain::ports::{
    BulkEnrolmentCommand, BulkEnrolmentRequest, PurgeCommand, PurgeRequest, PurgeSelection,
};
use registrar::domain::purge::{PurgeConfig, PurgeService};
use registrar::outbound::persistence::{
    DbPool, DieselActivityLog, DieselEnrolmentRepository, DieselPurgeStore,
    DieselStudentLookupRepository, PoolConfig,
};

const DATABASE_URL_ENV: [&str; 2] = ["REGISTRAR_DATABASE_URL", "DATABASE_URL"];

/// `registrar-cli` arguments.
#[derive(Debug, Parser)]
#[command(
    name = "registrar-cli",
    about = "Bulk enrolment and purge operations for the registry database",
    version
)]
struct CliArgs {
    /// Database connection URL. Falls back to `REGISTRAR_DATABASE_URL`, then `DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url", global = true)]
    database_url: Option<String>,
    /// Operator recorded in the activity log.
    #[arg(long, default_value = "cli", global = true)]
    actor: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Enrol students on a course by registration number.
    Enrol(EnrolArgs),
    /// Empty catalogued tables in dependency order.
    Purge(PurgeArgs),
}

#[derive(Debug, Args)]
struct EnrolArgs {
    /// Target course id.
    #[arg(long)]
    course: i64,
    /// File with one registration number per line (commas also separate).
    #[arg(long, value_name = "path", conflicts_with = "ids", required_unless_present = "ids")]
    file: Option<PathBuf>,
    /// Comma-separated registration numbers.
    #[arg(long, value_name = "A100,A101")]
    ids: Option<String>,
    /// Enrolment status written for every pair.
    #[arg(long, default_value = "active")]
    status: EnrolmentStatus,
    /// Rows per upsert transaction.
    #[arg(long, default_value_t = 500)]
    batch_size: usize,
}

#[derive(Debug, Args)]
struct PurgeArgs {
    /// Table to empty; repeat for several.
    #[arg(long = "table", value_name = "name", required_unless_present = "all")]
    tables: Vec<String>,
    /// Empty every catalogued table.
    #[arg(long, conflicts_with = "tables")]
    all: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = CliArgs::parse();
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("create Tokio runtime")?;
    runtime.block_on(run(args))
}

async fn run(args: CliArgs) -> Result<()> {
    let database_url = resolve_database_url(args.database_url, &DefaultEnv::new())?;
    let pool = DbPool::new(PoolConfig::new(database_url).with_max_size(2))
        .await
        .wrap_err("create database pool")?;
    let activity = Arc::new(DieselActivityLog::new(pool.clone()));

    let report = match args.command {
        Command::Enrol(enrol) => {
            let identifiers = match (&enrol.file, &enrol.ids) {
                (Some(path), _) => parse_identifiers(&read_file(path)?),
                (None, Some(ids)) => parse_identifiers(ids),
                (None, None) => return Err(eyre!("supply --file or --ids")),
            };
            let defaults = BulkEnrolmentConfig::default();
            let config = BulkEnrolmentConfig::new(
                enrol.batch_size,
                defaults.lookup_chunk_size().get(),
                defaults.batch_timeout(),
            )?;
            let service = BulkEnrolmentService::new(
                Arc::new(DieselStudentLookupRepository::new(pool.clone())),
                Arc::new(
                    DieselEnrolmentRepository::new(pool)
                        .with_statement_timeout(config.batch_timeout()),
                ),
                activity,
                config,
            );
            let report = service
                .enrol(BulkEnrolmentRequest {
                    target_key: enrol.course,
                    identifiers,
                    status: enrol.status,
                    actor: args.actor,
                })
                .await
                .map_err(|err| eyre!("enrolment failed: {err}"))?;
            serde_json::to_string_pretty(&report)?
        }
        Command::Purge(purge) => {
            let config = PurgeConfig::default();
            let service = PurgeService::new(
                Arc::new(DieselPurgeStore::new(pool).with_statement_timeout(config.table_timeout)),
                activity,
                config,
            );
            let selection = if purge.all {
                PurgeSelection::All
            } else {
                PurgeSelection::Tables(purge.tables)
            };
            let report = service
                .purge(PurgeRequest {
                    selection,
                    actor: args.actor,
                })
                .await
                .map_err(|err| eyre!("purge failed: {err}"))?;
            serde_json::to_string_pretty(&report)?
        }
    };

    println!("{report}");
    Ok(())
}

/// Split on newlines and commas; blanks and duplicates are left to the resolver.
fn parse_identifiers(raw: &str) -> Vec<String> {
    raw.split(['\n', ','])
        .map(|value| value.trim_end_matches('\r').to_owned())
        .collect()
}

fn read_file(path: &Path) -> Result<String> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("identifier path must be a file: {}", path.display()))?;
    let directory = Dir::open_ambient_dir(parent, ambient_authority())
        .wrap_err_with(|| format!("open directory '{}'", parent.display()))?;
    let mut file = directory
        .open(Path::new(file_name))
        .wrap_err_with(|| format!("open identifier file '{}'", path.display()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .wrap_err_with(|| format!("read identifier file '{}'", path.display()))?;
    Ok(contents)
}

fn resolve_database_url(explicit: Option<String>, env: &impl Env) -> Result<String> {
    if let Some(value) = explicit {
        if value.trim().is_empty() {
            return Err(eyre!("--database-url must not be empty when provided"));
        }
        return Ok(value);
    }
    DATABASE_URL_ENV
        .iter()
        .find_map(|name| env.string(name).filter(|value| !value.trim().is_empty()))
        .ok_or_else(|| eyre!("database URL missing: set --database-url or DATABASE_URL"))
}

#[cfg(test)]
mod tests {
    //! Unit tests for CLI parsing helpers.

    use std::collections::HashMap;
    use std::io::Write;

    use mockable::MockEnv;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    use super::*;

    fn mock_env(vars: &[(&str, &str)]) -> MockEnv {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        let mut env = MockEnv::new();
        env.expect_string()
            .times(0..)
            .returning(move |key| vars.get(key).cloned());
        env
    }

    #[rstest]
    fn explicit_database_url_wins() {
        let env = mock_env(&[("DATABASE_URL", "postgres://env/db")]);
        let url = resolve_database_url(Some("postgres://flag/db".to_owned()), &env)
            .expect("explicit url");
        assert_eq!(url, "postgres://flag/db");
    }

    #[rstest]
    #[case(&[("REGISTRAR_DATABASE_URL", "postgres://a/db"), ("DATABASE_URL", "postgres://b/db")], "postgres://a/db")]
    #[case(&[("REGISTRAR_DATABASE_URL", " "), ("DATABASE_URL", "postgres://b/db")], "postgres://b/db")]
    fn environment_fallback_order(#[case] vars: &[(&str, &str)], #[case] expected: &str) {
        let url = resolve_database_url(None, &mock_env(vars)).expect("env url");
        assert_eq!(url, expected);
    }

    #[rstest]
    fn missing_database_url_is_an_error() {
        let error = resolve_database_url(None, &mock_env(&[])).expect_err("no url");
        assert!(error.to_string().contains("database URL missing"));
    }

    #[rstest]
    fn identifiers_split_on_lines_and_commas() {
        assert_eq!(
            parse_identifiers("A100\r\nA101,A102\n"),
            vec!["A100", "A101", "A102", ""]
        );
    }

    #[rstest]
    fn identifier_file_is_read() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "A100\nA101").expect("write ids");
        let contents = read_file(file.path()).expect("read ids");
        assert_eq!(parse_identifiers(&contents), vec!["A100", "A101", ""]);
    }

    #[rstest]
    fn purge_requires_tables_or_all() {
        assert!(CliArgs::try_parse_from(["registrar-cli", "purge"]).is_err());
        let args = CliArgs::try_parse_from([
            "registrar-cli",
            "purge",
            "--table",
            "students",
            "--table",
            "courses",
        ])
        .expect("tables parse");
        match args.command {
            Command::Purge(purge) => assert_eq!(purge.tables, vec!["students", "courses"]),
            Command::Enrol(_) => panic!("expected purge"),
        }
    }

    #[rstest]
    fn enrol_parses_status() {
        let args = CliArgs::try_parse_from([
            "registrar-cli",
            "enrol",
            "--course",
            "12",
            "--ids",
            "A100,A101",
            "--status",
            "pending",
        ])
        .expect("enrol parses");
        match args.command {
            Command::Enrol(enrol) => {
                assert_eq!(enrol.course, 12);
                assert_eq!(enrol.status, EnrolmentStatus::Pending);
            }
            Command::Purge(_) => panic!("expected enrol"),
        }
    }
}
