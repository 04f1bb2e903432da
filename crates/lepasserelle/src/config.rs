// Project Configuration
//
// *La Configuration* (The Configuration) - Run settings for LeSerie scripts

use anyhow::{Context, Result};
use indexmap::IndexMap;
use lecatalogue::commands::PROGRAM_TIMEOUT_PROPERTY;
use lecommande::datetime::parse_literal;
use lecommande::Severity;
use leprocesseur::RunConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration directory, relative to the script directory
pub const CONFIG_DIR: &str = ".leserie";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = ".leserie/config.toml";

/// Project configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    /// Run policy
    pub run: RunSection,

    /// External program settings
    pub program: ProgramSection,

    /// Initial output window
    pub output: OutputSection,

    /// Logging settings
    pub logging: LoggingSection,

    /// Properties defined before the first command
    pub properties: IndexMap<String, String>,
}

impl ProjectConfig {
    /// Load configuration from a directory
    ///
    /// Looks for `.leserie/config.toml` in `dir`.
    /// If not found, returns default configuration.
    ///
    /// # Returns
    ///
    /// `Result<ProjectConfig>` - Loaded or default configuration
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_FILE);

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        Self::load_file(&config_path)
    }

    /// Load configuration from an explicit file, which must exist
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a directory
    ///
    /// Creates `.leserie` directory if it doesn't exist.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let config_dir = dir.as_ref().join(CONFIG_DIR);
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;

        let config_path = config_dir.join("config.toml");

        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(&config_path, toml_string)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        self.output.period()?;
        if !matches!(
            self.logging.level.to_ascii_lowercase().as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            anyhow::bail!(
                "Invalid logging level {:?} (expected error, warn, info, debug, or trace)",
                self.logging.level
            );
        }
        Ok(())
    }

    /// Build the orchestrator configuration rooted at `working_dir`
    pub fn to_run_config(&self, working_dir: PathBuf) -> Result<RunConfig> {
        let (output_start, output_end) = self.output.period()?;
        let mut properties = self.properties.clone();
        if let Some(secs) = self.program.default_timeout_secs {
            properties
                .entry(PROGRAM_TIMEOUT_PROPERTY.to_string())
                .or_insert_with(|| secs.to_string());
        }

        Ok(RunConfig {
            strict: self.run.strict,
            unparsed_severity: self.run.unparsed_severity,
            keep_state: self.run.keep_state,
            working_dir,
            output_start,
            output_end,
            properties,
        })
    }
}

/// `[run]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    /// Stop after the first command that fails at run time
    pub strict: bool,

    /// Severity recorded for lines that do not parse
    pub unparsed_severity: Severity,

    /// Keep results between runs in one session
    pub keep_state: bool,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            strict: false,
            unparsed_severity: Severity::Failure,
            keep_state: false,
        }
    }
}

/// `[program]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramSection {
    /// Timeout for RunProgram when the command gives none (0 = unlimited)
    pub default_timeout_secs: Option<u64>,
}

/// `[output]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Output window start (`YYYY[-MM[-DD[ hh[:mm[:ss]]]]]`)
    pub start: Option<String>,

    /// Output window end
    pub end: Option<String>,
}

impl OutputSection {
    fn period(
        &self,
    ) -> Result<(Option<chrono::NaiveDateTime>, Option<chrono::NaiveDateTime>)> {
        let parse = |value: &Option<String>, key: &str| -> Result<_> {
            value
                .as_deref()
                .map(|text| {
                    parse_literal(text)
                        .map_err(|message| anyhow::anyhow!("[output] {key}: {message}"))
                })
                .transpose()
        };
        Ok((parse(&self.start, "start")?, parse(&self.end, "end")?))
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default level when `LESERIE_LOG`/`RUST_LOG` are unset
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ProjectConfig::default();
        assert!(!config.run.strict);
        assert_eq!(config.run.unparsed_severity, Severity::Failure);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "[run]\nstrict = true\nunparsed_severity = \"WARNING\"\n\n\
             [output]\nstart = \"2024-01-01\"\n\n[properties]\nRegion = \"North\"\n",
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap();
        assert!(config.run.strict);
        assert_eq!(config.run.unparsed_severity, Severity::Warning);
        assert_eq!(config.properties.get("Region").map(String::as_str), Some("North"));

        let run = config.to_run_config(dir.path().to_path_buf()).unwrap();
        assert!(run.strict);
        assert!(run.output_start.is_some());
        assert!(run.output_end.is_none());
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[output]\nend = \"soon\"\n").unwrap();
        let err = ProjectConfig::load_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("[output] end"));
    }

    #[test]
    fn test_timeout_becomes_property() {
        let mut config = ProjectConfig::default();
        config.program.default_timeout_secs = Some(45);
        let run = config.to_run_config(PathBuf::from(".")).unwrap();
        assert_eq!(
            run.properties.get(PROGRAM_TIMEOUT_PROPERTY).map(String::as_str),
            Some("45")
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let mut config = ProjectConfig::default();
        config.run.keep_state = true;
        config.output.end = Some("2024-12-31".to_string());
        config.save(dir.path()).unwrap();

        let loaded = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
