//! Optional TOML settings for the `devtools` binary.

use crate::Result;
use crate::render::Language;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding the storage file and backups.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Language for `query` when `--lang` is not given.
    #[serde(default = "default_language")]
    pub language: String,

    /// Pretty-print JSON output.
    #[serde(default = "default_pretty")]
    pub pretty: bool,

    /// Level used when neither `--log-level` nor `RUST_LOG` is set.
    #[serde(default)]
    pub log_level: Option<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".devtools")
}

fn default_language() -> String {
    "shell".to_string()
}

fn default_pretty() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            language: default_language(),
            pretty: default_pretty(),
            log_level: None,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.language()?;
        config.log_level()?;
        Ok(config)
    }

    /// Defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn language(&self) -> Result<Language> {
        self.language.parse().map_err(anyhow::Error::msg)
    }

    pub fn log_level(&self) -> Result<Option<Level>> {
        self.log_level
            .as_deref()
            .map(|l| l.parse::<Level>().with_context(|| format!("invalid log_level '{}'", l)))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.language().unwrap(), Language::Shell);
    }

    #[test]
    fn overrides() {
        let config = Config::from_toml(
            "data_dir = \"/tmp/dt\"\nlanguage = \"python\"\npretty = false\nlog_level = \"debug\"\n",
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/dt"));
        assert_eq!(config.language().unwrap(), Language::Python);
        assert!(!config.pretty);
        assert_eq!(config.log_level().unwrap(), Some(Level::DEBUG));
    }

    #[test]
    fn rejects_unknown_keys_and_languages() {
        assert!(Config::from_toml("colour = true").is_err());
        assert!(Config::from_toml("language = \"cobol\"").is_err());
        assert!(Config::from_toml("log_level = \"loud\"").is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "language = \"nodejs\"").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.language().unwrap(), Language::Nodejs);
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }
}
