//! Defaults file, environment files and store credentials.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use clinicseed_core::{RedactedEndpoint, mask_secret, redact_endpoint};

pub const DEFAULT_CONFIG_FILE: &str = "clinicseed.toml";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_RUN_DIR: &str = "runs";
pub const DEFAULT_VARIANT: &str = "basic";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const STORE_URL_VAR: &str = "SEED_STORE_URL";
pub const SERVICE_KEY_VAR: &str = "SEED_SERVICE_KEY";

/// Environment files read before the credentials are looked up. Variables
/// already set win, so the first file wins over the second.
const ENV_FILES: &[&str] = &[".env.local", ".env"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("{0} is not set")]
    MissingEnv(&'static str),
    #[error("unsupported store URL '{0}' (expected http(s):// or postgres(ql)://)")]
    UnsupportedStore(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Optional `clinicseed.toml`; every field falls back to a built-in default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub data_dir: Option<PathBuf>,
    pub run_dir: Option<PathBuf>,
    pub variant: Option<String>,
    pub tenants: Vec<String>,
    pub batch_size: Option<usize>,
    pub http_timeout_secs: Option<u64>,
    /// Pins generated timelines to a fixed day.
    pub reference_date: Option<NaiveDate>,
}

impl Settings {
    /// Read `path`, or `clinicseed.toml` in the working directory when no
    /// path is given. Only an explicitly named file has to exist.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let display = path.display().to_string();
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: display,
            source,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS))
    }
}

/// Load `.env.local` then `.env` from the working directory when present.
pub fn load_env_files() {
    for file in ENV_FILES {
        if let Ok(path) = dotenvy::from_filename(file) {
            tracing::debug!(event = "env_file_loaded", path = %path.display());
        }
    }
}

/// Tenants from repeated `--tenant` flags and the `--tenants` list, in
/// order; the defaults file is used only when neither was given.
pub fn resolve_tenants(flags: &[String], csv: Option<&str>, settings: &Settings) -> Vec<String> {
    let mut tenants: Vec<String> = flags.to_vec();
    if let Some(csv) = csv {
        tenants.extend(csv.split(',').map(str::to_string));
    }
    tenants.retain(|tenant| !tenant.trim().is_empty());
    if tenants.is_empty() {
        return settings.tenants.clone();
    }
    tenants
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Rest,
    Postgres,
}

impl StoreKind {
    pub fn detect(url: &str) -> ConfigResult<Self> {
        let lowered = url.trim().to_ascii_lowercase();
        if lowered.starts_with("https://") || lowered.starts_with("http://") {
            Ok(Self::Rest)
        } else if lowered.starts_with("postgres://") || lowered.starts_with("postgresql://") {
            Ok(Self::Postgres)
        } else {
            Err(ConfigError::UnsupportedStore(redact_endpoint(url).redacted))
        }
    }
}

/// Store location and privileged credential.
#[derive(Clone)]
pub struct StoreEnv {
    pub url: String,
    pub service_key: String,
    pub kind: StoreKind,
}

impl std::fmt::Debug for StoreEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEnv")
            .field("url", &redact_endpoint(&self.url).redacted)
            .field("service_key", &mask_secret(&self.service_key))
            .field("kind", &self.kind)
            .finish()
    }
}

impl StoreEnv {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Both variables are required; blank counts as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let read = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        };
        let url = read(STORE_URL_VAR)?;
        let service_key = read(SERVICE_KEY_VAR)?;
        let kind = StoreKind::detect(&url)?;
        Ok(Self {
            url,
            service_key,
            kind,
        })
    }

    pub fn redacted(&self) -> RedactedEndpoint {
        redact_endpoint(&self.url)
    }
}
