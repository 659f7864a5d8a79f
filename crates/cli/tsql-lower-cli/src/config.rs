//! Configuration file loading

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tsql_lower::LowerOptions;

/// Contents of a `tsql-lower.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Engine options
    pub lowering: LowerOptions,

    /// How the AST is written
    pub output: OutputConfig,

    /// Logging
    pub log: LogConfig,
}

/// `[output]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Indented JSON
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

/// `[log]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub filter: Option<String>,
}

impl Config {
    /// Load a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Config from `path`, or the defaults when no file was given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }
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
    fn test_defaults_without_file() {
        let config = Config::load(None).unwrap();
        assert!(config.output.pretty);
        assert!(config.log.filter.is_none());
        assert_eq!(config.lowering, LowerOptions::default());
    }

    #[test]
    fn test_full_config() {
        let file = write_config(
            r#"
[lowering]
ignored_variables = ["@RowCount"]
default_parameter_type = "NVARCHAR(MAX)"

[output]
pretty = false

[log]
filter = "tsql_lower=debug"
"#,
        );
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.lowering.ignored_variables, ["@RowCount"]);
        assert_eq!(config.lowering.default_parameter_type, "NVARCHAR(MAX)");
        assert!(!config.output.pretty);
        assert_eq!(config.log.filter.as_deref(), Some("tsql_lower=debug"));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let file = write_config("[output]\npretty = false\n");
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.lowering.default_parameter_type, "SQL_VARIANT");
        assert!(!config.output.pretty);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let file = write_config("[lowering]\nignored = []\n");
        let error = Config::from_file(file.path()).unwrap_err();
        assert!(error.to_string().starts_with("Failed to parse config file"));
    }

    #[test]
    fn test_missing_file() {
        let error = Config::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(error.to_string().starts_with("Failed to read config file"));
    }
}
