//! Service configuration
//!
//! Options can be built in code, parsed from JSON/TOML strings, loaded from a
//! file (format picked by extension) or discovered by walking upward from a
//! directory.

use crate::error::ApiError;
use crate::result::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File names searched by [`ServiceOptions::discover`], in priority order
pub const CONFIG_FILE_NAMES: &[&str] = &[
    "annotation.json",
    "annotation.toml",
    "annotation.yaml",
    "annotation.yml",
];

/// Options of one annotation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceOptions {
    /// Commit the editor after every successful save
    pub commit_on_save: bool,
    /// Merge annotations of one target spread over several files
    pub split_annotation_support: bool,
    pub xml: XmlFormatOptions,
}

/// Formatting used for text inserted into XML files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XmlFormatOptions {
    /// One indentation level
    pub indent: String,
    pub line_ending: LineEnding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Use whatever the edited document uses
    #[default]
    Auto,
    Lf,
    Crlf,
}

/// Options of a single save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveOptions {
    /// Rebuild the compiled service from the saved text
    pub resync_after_save: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            commit_on_save: true,
            split_annotation_support: false,
            xml: XmlFormatOptions::default(),
        }
    }
}

impl Default for XmlFormatOptions {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
            line_ending: LineEnding::Auto,
        }
    }
}

impl LineEnding {
    /// Concrete line break for a document
    pub fn resolve(self, document: &str) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
            LineEnding::Auto if document.contains("\r\n") => "\r\n",
            LineEnding::Auto => "\n",
        }
    }
}

impl ServiceOptions {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ApiError::config_error(format!("Invalid JSON options: {e}")))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ApiError::config_error(format!("Invalid TOML options: {e}")))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| ApiError::config_error(format!("Invalid YAML options: {e}")))
    }

    /// Load options from a file; `.json`, `.toml`, `.yaml` and `.yml` are supported
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ApiError::io_error(path, e))?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let options = match extension.as_str() {
            "json" => Self::from_json_str(&text),
            "toml" => Self::from_toml_str(&text),
            "yaml" | "yml" => Self::from_yaml_str(&text),
            other => Err(ApiError::config_error(format!(
                "Unsupported options format '{other}' for '{}'",
                path.display()
            ))),
        }?;
        options.validate()?;
        Ok(options)
    }

    /// Find the nearest options file, starting at `start_dir` and moving up
    pub fn discover(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current = start_dir
            .canonicalize()
            .map_err(|e| ApiError::config_error(format!("Invalid path: {e}")))?;
        loop {
            for name in CONFIG_FILE_NAMES {
                let candidate = current.join(name);
                if candidate.is_file() {
                    tracing::debug!("Found options: {}", candidate.display());
                    return Ok(Some(candidate));
                }
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok(None),
            }
        }
    }

    /// Discover and load options, falling back to defaults
    pub fn discover_or_default(start_dir: &Path) -> Result<Self> {
        match Self::discover(start_dir)? {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.xml.indent.chars().all(|ch| ch == ' ' || ch == '\t') {
            return Err(ApiError::config_error(
                "xml.indent must only contain spaces or tabs",
            ));
        }
        Ok(())
    }
}
