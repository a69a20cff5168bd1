use serde::Deserialize;
use sombra_procs::host::memory::MemoryHostOptions;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Default)]
pub struct ProcsConfig {
    data: RawConfig,
}

impl ProcsConfig {
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = if let Some(config_path) = path.as_ref() {
            if config_path.exists() {
                read_file(config_path)?
            } else {
                RawConfig::default()
            }
        } else {
            RawConfig::default()
        };
        validate(&data)?;
        Ok(Self { data })
    }

    pub fn log_level(&self) -> &str {
        self.data.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn host_options(&self) -> MemoryHostOptions {
        let defaults = MemoryHostOptions::default();
        MemoryHostOptions {
            max_vertices: self.data.host.max_vertices.unwrap_or(defaults.max_vertices),
            max_path_length: self
                .data
                .host
                .max_path_length
                .unwrap_or(defaults.max_path_length),
        }
    }

    pub fn read_only(&self) -> bool {
        self.data.host.read_only
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn validate(data: &RawConfig) -> Result<(), ConfigError> {
    if data.host.max_vertices == Some(0) {
        return Err(ConfigError::Invalid {
            key: "host.max_vertices",
            reason: "must be at least 1".into(),
        });
    }
    if let Some(level) = data.log_level.as_deref() {
        if level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "log_level",
                reason: "must not be empty".into(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default)]
    host: HostSection,
}

#[derive(Debug, Default, Deserialize)]
struct HostSection {
    max_vertices: Option<usize>,
    max_path_length: Option<usize>,
    #[serde(default)]
    read_only: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config key '{key}' {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("sombra-procs").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProcsConfig::load(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.log_level(), "warn");
        assert!(!config.read_only());
        assert_eq!(
            config.host_options().max_vertices,
            MemoryHostOptions::default().max_vertices
        );
    }

    #[test]
    fn host_section_overrides_limits() {
        let file = write_config(
            "log_level = \"debug\"\n[host]\nmax_vertices = 10\nmax_path_length = 2\nread_only = true\n",
        );
        let config = ProcsConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.log_level(), "debug");
        assert!(config.read_only());
        let options = config.host_options();
        assert_eq!(options.max_vertices, 10);
        assert_eq!(options.max_path_length, 2);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let file = write_config("[host\nmax_vertices = ");
        let err = ProcsConfig::load(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn zero_vertex_limit_is_rejected() {
        let file = write_config("[host]\nmax_vertices = 0\n");
        let err = ProcsConfig::load(Some(file.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("host.max_vertices"));
    }
}
