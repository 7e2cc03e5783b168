use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Values applied to every extraction unless overridden
    pub defaults: DefaultsConfig,

    /// Named extraction jobs executed by `run`
    pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Output file name used when no output path is given
    pub output_file_name: String,

    /// Call-graph expansion depth (0 disables expansion)
    pub recursion_depth: i64,

    /// Ignore patterns prepended to every extraction
    pub ignore_patterns: Vec<String>,

    /// Treat an empty selection as an error instead of a warning
    pub fail_on_empty: bool,

    /// Above this many ignored names per pattern the list is only logged at debug level
    pub ignored_names_log_limit: usize,
}

/// One extraction described in the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub name: String,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub functions: Vec<String>,
    pub function_patterns: Vec<String>,
    pub line_patterns: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub recursion_depth: Option<i64>,
    pub fail_on_empty: Option<bool>,
    pub report: Option<PathBuf>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_file_name: "extracted-bitcode.ll".to_string(),
            recursion_depth: 0,
            ignore_patterns: Vec::new(),
            fail_on_empty: false,
            ignored_names_log_limit: 10,
        }
    }
}

impl DefaultsConfig {
    /// Output path next to `input` using the configured file name
    pub fn default_output_for(&self, input: &Path) -> PathBuf {
        match input.parent() {
            Some(parent) => parent.join(&self.output_file_name),
            None => PathBuf::from(&self.output_file_name),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ExtractError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ExtractError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Err(ExtractError::Config(format!(
                        "configuration file {} does not exist",
                        p.as_ref().display()
                    )))
                }
            }
            None => {
                let candidates = [
                    "llextract.toml",
                    "Llextract.toml",
                    ".llextract.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    /// Find a job by name
    pub fn job(&self, name: &str) -> Option<&JobConfig> {
        self.jobs.iter().find(|job| job.name == name)
    }

    fn validate(&self) -> Result<()> {
        depth_from_int(self.defaults.recursion_depth)?;
        if self.defaults.output_file_name.trim().is_empty() {
            return Err(ExtractError::Config(
                "`defaults.output_file_name` must not be empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for job in &self.jobs {
            if job.name.is_empty() {
                return Err(ExtractError::Config("every job needs a `name`".to_string()));
            }
            if !seen.insert(job.name.as_str()) {
                return Err(ExtractError::Config(format!("duplicate job name '{}'", job.name)));
            }
            if let Some(depth) = job.recursion_depth {
                depth_from_int(depth)?;
            }
        }
        Ok(())
    }
}

/// Parse a recursion depth given as text
pub fn parse_recursion_depth(value: &str) -> Result<usize> {
    value.trim().parse::<usize>().map_err(|_| {
        ExtractError::Config(format!(
            "`recursion depth` must be a non-negative integer, got '{}'",
            value
        ))
    })
}

/// Validate a recursion depth read from configuration
pub fn depth_from_int(value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        ExtractError::Config(format!(
            "`recursion depth` must be a non-negative integer, got {}",
            value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.defaults.output_file_name, "extracted-bitcode.ll");
        assert_eq!(config.defaults.recursion_depth, 0);
        assert_eq!(config.defaults.ignored_names_log_limit, 10);
        assert!(!config.defaults.fail_on_empty);
        assert!(config.jobs.is_empty());
    }

    #[test]
    fn test_parse_recursion_depth() {
        assert_eq!(parse_recursion_depth("0").unwrap(), 0);
        assert_eq!(parse_recursion_depth(" 7 ").unwrap(), 7);
        assert!(matches!(parse_recursion_depth("-1"), Err(ExtractError::Config(_))));
        assert!(matches!(parse_recursion_depth("two"), Err(ExtractError::Config(_))));
        assert!(matches!(depth_from_int(-3), Err(ExtractError::Config(_))));
    }

    #[test]
    fn test_load_jobs_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llextract.toml");
        std::fs::write(
            &path,
            r#"
[defaults]
recursion_depth = 2
ignore_patterns = ["^llvm\\."]

[[jobs]]
name = "release"
input = "build/release.ll"
functions = ["main"]

[[jobs]]
name = "debug"
input = "build/debug.ll"
function_patterns = ["kfun:"]
recursion_depth = 1
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.defaults.recursion_depth, 2);
        assert_eq!(config.defaults.output_file_name, "extracted-bitcode.ll");
        assert_eq!(config.jobs.len(), 2);
        assert_eq!(config.job("debug").unwrap().recursion_depth, Some(1));
        assert!(config.job("missing").is_none());
    }

    #[test]
    fn test_negative_depth_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llextract.toml");
        std::fs::write(&path, "[defaults]\nrecursion_depth = -1\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ExtractError::Config(_))));
    }

    #[test]
    fn test_duplicate_job_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llextract.toml");
        std::fs::write(
            &path,
            "[[jobs]]\nname = \"a\"\ninput = \"x.ll\"\n\n[[jobs]]\nname = \"a\"\ninput = \"y.ll\"\n",
        )
        .unwrap();
        assert!(matches!(Config::load(&path), Err(ExtractError::Config(_))));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.toml");
        let mut config = Config::default();
        config.defaults.fail_on_empty = true;
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert!(loaded.defaults.fail_on_empty);
    }

    #[test]
    fn test_default_output_next_to_input() {
        let defaults = DefaultsConfig::default();
        assert_eq!(
            defaults.default_output_for(Path::new("build/app.ll")),
            PathBuf::from("build/extracted-bitcode.ll")
        );
    }
}
