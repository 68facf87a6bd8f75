//! Command line configuration file.
//!
//! The file lives at `<config dir>/deckhand/config.yaml` unless `--config` or
//! `DECKHAND_CONFIG` points elsewhere. Every setting can also be given as a
//! flag; flags win over the file, and `DECKHAND_STEP_DELAY_MS` wins over the
//! file's step delay.
//!
//! ```yaml
//! step_delay_ms: 500
//! artifacts: build/contracts
//! dump_paths: [$deployed, $outputs.crowdsaleTx]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use deckhand_engine::RunOptions;
use dirs_next::config_dir;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "DECKHAND_CONFIG";

pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// State selected for dumping when neither flags nor the file choose any.
pub const DEFAULT_DUMP_PATH: &str = "$deployed";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    #[serde(flatten)]
    pub run: RunOptions,
    /// Directory of compiled contract artifacts.
    pub artifacts: Option<PathBuf>,
    /// State references written by `--dump-state`.
    pub dump_paths: Vec<String>,
}

/// Effective settings after layering flags over the configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub run: RunOptions,
    pub artifacts: Option<PathBuf>,
    pub dump_paths: Vec<String>,
}

impl CliConfig {
    /// Layers command line flags over the file values.
    pub fn with_flags(self, step_delay_ms: Option<u64>, artifacts: Option<PathBuf>, dump_paths: Vec<String>) -> Settings {
        let mut run = self.run;
        if let Some(delay) = step_delay_ms {
            run.step_delay_ms = delay;
        }
        let mut dump_paths = if dump_paths.is_empty() { self.dump_paths } else { dump_paths };
        if dump_paths.is_empty() {
            dump_paths.push(DEFAULT_DUMP_PATH.to_string());
        }
        Settings {
            run,
            artifacts: artifacts.or(self.artifacts),
            dump_paths,
        }
    }
}

/// Loads the configuration file.
///
/// An explicit path must exist. The default path is optional and a missing
/// file yields the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig, ConfigError> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (default_config_path(), false),
    };
    let mut config = match fs::read_to_string(&path) {
        Ok(content) if content.trim().is_empty() => CliConfig::default(),
        Ok(content) => serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound && !required => {
            debug!(path = %path.display(), "no config file, using defaults");
            CliConfig::default()
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };
    config.run.apply_env_overrides();
    Ok(config)
}

fn default_config_path() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deckhand")
        .join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_engine::options::STEP_DELAY_ENV;

    #[test]
    fn test_load_explicit_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        fs::write(&path, "step_delay_ms: 250\nartifacts: build/contracts\ndump_paths: [$deployed, $outputs.tx]\n")
            .expect("write config");

        let config = temp_env::with_var_unset(STEP_DELAY_ENV, || load_config(Some(&path))).expect("config");
        assert_eq!(config.run.step_delay_ms, 250);
        assert_eq!(config.artifacts, Some(PathBuf::from("build/contracts")));
        assert_eq!(config.dump_paths, vec!["$deployed", "$outputs.tx"]);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_config(Some(&dir.path().join("absent.yaml"))).expect_err("missing file");
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_invalid_config_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        fs::write(&path, "step_delay_ms: [oops").expect("write config");
        let err = load_config(Some(&path)).expect_err("bad yaml");
        assert!(err.to_string().contains("config.yaml"), "{err}");
    }

    #[test]
    fn test_env_overrides_file_delay() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        fs::write(&path, "step_delay_ms: 250\n").expect("write config");

        let config = temp_env::with_var(STEP_DELAY_ENV, Some("10"), || load_config(Some(&path))).expect("config");
        assert_eq!(config.run.step_delay_ms, 10);
    }

    #[test]
    fn test_flags_win_over_file() {
        let config = CliConfig {
            run: RunOptions::default().with_step_delay_ms(250),
            artifacts: Some(PathBuf::from("from-file")),
            dump_paths: vec!["$outputs".into()],
        };

        let settings = config.clone().with_flags(Some(0), Some(PathBuf::from("from-flag")), vec![]);
        assert_eq!(settings.run.step_delay_ms, 0);
        assert_eq!(settings.artifacts, Some(PathBuf::from("from-flag")));
        assert_eq!(settings.dump_paths, vec!["$outputs"]);

        let settings = CliConfig::default().with_flags(None, None, vec![]);
        assert_eq!(settings.dump_paths, vec![DEFAULT_DUMP_PATH]);
        assert_eq!(settings.artifacts, None);
    }
}
