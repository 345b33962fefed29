//! Merge configuration
//!
//! Options can be loaded from a TOML file:
//!
//! ```toml
//! internalize = true
//! exclude_internalize_matches = ['^MyLib\.Public\..*$']
//! exclude_file = "internalize-exclude.txt"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::OptionsError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Master switch; when off nothing is ever internalized
    pub internalize: bool,

    /// Regular expressions naming types that stay public, evaluated in order
    pub exclude_internalize_matches: Vec<String>,

    /// File with one exclusion pattern per line, appended after the inline ones
    pub exclude_file: Option<PathBuf>,
}

impl MergeOptions {
    pub fn new(internalize: bool) -> Self {
        Self {
            internalize,
            ..Default::default()
        }
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_internalize_matches.push(pattern.into());
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(content)?)
    }

    /// Load options from a TOML file. A relative `exclude_file` is resolved
    /// against the configuration file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref();
        let content = read(path)?;
        let mut options = Self::from_toml_str(&content)?;

        if let (Some(exclude), Some(dir)) = (options.exclude_file.as_mut(), path.parent()) {
            if exclude.is_relative() {
                *exclude = dir.join(&*exclude);
            }
        }

        Ok(options)
    }

    /// Every configured exclusion pattern: inline patterns first, then the
    /// exclude file's lines
    pub fn exclusion_patterns(&self) -> Result<Vec<String>, OptionsError> {
        let mut patterns = self.exclude_internalize_matches.clone();
        if let Some(path) = &self.exclude_file {
            patterns.extend(parse_exclude_file(&read(path)?));
        }
        Ok(patterns)
    }
}

/// Blank lines and `#` comments are skipped; everything else is a pattern
pub fn parse_exclude_file(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn read(path: &Path) -> Result<String, OptionsError> {
    std::fs::read_to_string(path).map_err(|source| OptionsError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let options = MergeOptions::from_toml_str("").unwrap();
        assert!(!options.internalize);
        assert!(options.exclude_internalize_matches.is_empty());
        assert!(options.exclude_file.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let options = MergeOptions::from_toml_str(
            r#"
internalize = true
exclude_internalize_matches = ['^MyLib\.Public\..*$', 'Generated']
"#,
        )
        .unwrap();

        assert!(options.internalize);
        assert_eq!(
            options.exclude_internalize_matches,
            vec![r"^MyLib\.Public\..*$".to_string(), "Generated".to_string()]
        );
    }

    #[test]
    fn test_rejects_unknown_value_types() {
        assert!(matches!(
            MergeOptions::from_toml_str("internalize = \"yes\""),
            Err(OptionsError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_exclude_file() {
        let patterns = parse_exclude_file("# keep these public\n^Api\\.\n\n   \n  Contracts$  \n");
        assert_eq!(patterns, vec!["^Api\\.".to_string(), "Contracts$".to_string()]);
    }

    #[test]
    fn test_exclude_file_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("exclude.txt"), "^Lib\\.Public\\.\n").unwrap();
        fs::write(
            dir.path().join("merge.toml"),
            "internalize = true\nexclude_internalize_matches = ['^Inline$']\nexclude_file = \"exclude.txt\"\n",
        )
        .unwrap();

        let options = MergeOptions::from_file(dir.path().join("merge.toml")).unwrap();
        assert_eq!(options.exclude_file, Some(dir.path().join("exclude.txt")));
        assert_eq!(
            options.exclusion_patterns().unwrap(),
            vec!["^Inline$".to_string(), "^Lib\\.Public\\.".to_string()]
        );
    }

    #[test]
    fn test_missing_exclude_file() {
        let options = MergeOptions {
            exclude_file: Some(PathBuf::from("/nonexistent/amalgam/exclude.txt")),
            ..MergeOptions::new(true)
        };
        assert!(matches!(options.exclusion_patterns(), Err(OptionsError::Io { .. })));
    }
}
