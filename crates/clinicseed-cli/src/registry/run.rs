use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use clinicseed_core::RedactedEndpoint;
use clinicseed_report::{RunMode, SeedReport};

use super::{RegistryError, RegistryResult};

/// What a run was asked to do, captured before it starts.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub run_dir: PathBuf,
    pub variant: String,
    pub tenants: Vec<String>,
    pub mode: RunMode,
    pub dry_run: bool,
    pub clear: bool,
    pub data_dir: PathBuf,
    pub batch_size: usize,
    pub backend: String,
    pub endpoint: RedactedEndpoint,
    /// Already masked.
    pub service_key: String,
}

/// `config.json` of a run directory.
#[derive(Debug, Serialize)]
struct RunConfig<'a> {
    run_id: &'a str,
    started_at: String,
    variant: &'a str,
    tenants: &'a [String],
    mode: RunMode,
    dry_run: bool,
    clear: bool,
    data_dir: String,
    batch_size: usize,
    backend: &'a str,
    endpoint: &'a RedactedEndpoint,
    service_key: &'a str,
    git: GitInfo,
}

#[derive(Debug, Serialize)]
struct GitInfo {
    commit: Option<String>,
    dirty: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub logs_path: PathBuf,
    pub report_path: PathBuf,
}

/// Create `<run_dir>/<timestamp>__run_<id>/` with its `config.json` and an
/// empty `logs.ndjson`.
pub fn start_run(info: &RunInfo) -> RegistryResult<RunPaths> {
    let timestamp = info.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = info.run_dir.join(format!("{timestamp}__run_{}", info.run_id));
    create_dir_all(&root)?;

    let config = RunConfig {
        run_id: &info.run_id,
        started_at: info.started_at.to_rfc3339(),
        variant: &info.variant,
        tenants: &info.tenants,
        mode: info.mode,
        dry_run: info.dry_run,
        clear: info.clear,
        data_dir: info.data_dir.display().to_string(),
        batch_size: info.batch_size,
        backend: &info.backend,
        endpoint: &info.endpoint,
        service_key: &info.service_key,
        git: collect_git_info(),
    };
    write_json(&root.join("config.json"), &config)?;

    let logs_path = root.join("logs.ndjson");
    OpenOptions::new().create(true).append(true).open(&logs_path)?;

    Ok(RunPaths {
        report_path: root.join("report.json"),
        logs_path,
        root,
    })
}

pub fn write_report(paths: &RunPaths, report: &SeedReport) -> RegistryResult<()> {
    write_json(&paths.report_path, report)
}

fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new().create(true).truncate(true).write(true).open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinicseed_core::{mask_secret, redact_endpoint};
    use clinicseed_report::{RunHeader, create_report};

    fn info(run_dir: &Path) -> RunInfo {
        RunInfo {
            run_id: "3f2b".into(),
            started_at: DateTime::parse_from_rfc3339("2026-03-15T09:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            run_dir: run_dir.to_path_buf(),
            variant: "demo".into(),
            tenants: vec!["adris".into()],
            mode: RunMode::Seed,
            dry_run: false,
            clear: true,
            data_dir: PathBuf::from("data"),
            batch_size: 100,
            backend: "postgres".into(),
            endpoint: redact_endpoint("postgres://seed:pg-secret@db:5432/clinic"),
            service_key: mask_secret("service-role-key-123456"),
        }
    }

    #[test]
    fn run_directory_holds_redacted_config_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let info = info(dir.path());
        let paths = start_run(&info).unwrap();

        assert_eq!(
            paths.root.file_name().and_then(|name| name.to_str()),
            Some("2026-03-15T09-30-00Z__run_3f2b")
        );
        assert!(paths.logs_path.exists());

        let config = std::fs::read_to_string(paths.root.join("config.json")).unwrap();
        assert!(!config.contains("pg-secret"));
        assert!(!config.contains("service-role-key-123456"));
        let config: serde_json::Value = serde_json::from_str(&config).unwrap();
        assert_eq!(config["variant"], "demo");
        assert_eq!(config["mode"], "seed");
        assert_eq!(config["endpoint"]["host"], "db");

        let header = RunHeader::start("demo", info.tenants.clone(), RunMode::Seed, false);
        write_report(&paths, &create_report(header, Vec::new(), Vec::new())).unwrap();
        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.report_path).unwrap()).unwrap();
        assert_eq!(report["summary"]["success_rate_percent"], 100.0);
    }
}
