//! YM-002: Cookbook discovery, parsing and validation.
//!
//! A cookbook is TOML, YAML or JSON. The format comes from the file
//! extension unless overridden. Validation checks the minimum version
//! declared in `$globals` and reports legacy settings as warnings.

use super::error::{Error, Result};
use super::types::{Cookbook, Version};
use std::fmt;
use std::path::{Path, PathBuf};

/// Extensions probed, in order, when no cookbook is named.
pub const SUPPORTED_FILE_EXTENSIONS: [&str; 4] = ["toml", "yml", "yaml", "json"];

/// Serialization format of a cookbook file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CookbookFormat {
    Toml,
    Yaml,
    Json,
}

impl CookbookFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("yml") | Some("yaml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(Error::Parse {
                path: path.to_path_buf(),
                reason: "unknown cookbook type, use --cookbook-type".to_string(),
            }),
        }
    }
}

impl fmt::Display for CookbookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toml => write!(f, "toml"),
            Self::Yaml => write!(f, "yaml"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Absolute cookbook path: `directory/cookbook` if given, otherwise the
/// first existing `directory/cookbook.<ext>`.
pub fn find_cookbook(directory: &Path, cookbook: Option<&Path>) -> Result<PathBuf> {
    let absolute = std::path::absolute(directory).map_err(|e| Error::io(directory, e))?;
    if let Some(cookbook) = cookbook {
        return Ok(absolute.join(cookbook));
    }

    SUPPORTED_FILE_EXTENSIONS
        .iter()
        .map(|ext| absolute.join("cookbook").with_extension(ext))
        .find(|candidate| candidate.exists())
        .ok_or_else(|| {
            Error::Config(format!(
                "No candidate cookbook found in {}",
                directory.display()
            ))
        })
}

/// Read and parse a cookbook file.
pub fn parse_cookbook_file(path: &Path, format: Option<CookbookFormat>) -> Result<Cookbook> {
    let format = match format {
        Some(format) => format,
        None => CookbookFormat::from_path(path)?,
    };
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_cookbook(&content, format).map_err(|reason| Error::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parse cookbook text in the given format.
pub fn parse_cookbook(content: &str, format: CookbookFormat) -> std::result::Result<Cookbook, String> {
    match format {
        CookbookFormat::Toml => {
            toml::from_str(content).map_err(|e| format!("TOML parse error: {}", e))
        }
        CookbookFormat::Yaml => {
            serde_yaml_ng::from_str(content).map_err(|e| format!("YAML parse error: {}", e))
        }
        CookbookFormat::Json => {
            serde_json::from_str(content).map_err(|e| format!("JSON parse error: {}", e))
        }
    }
}

/// Validate a parsed cookbook against the running tool.
///
/// Hard errors are returned as `Err`; soft findings come back as warnings.
pub fn validate_cookbook(cookbook: &Cookbook) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if let Some(ref raw) = cookbook.globals.version {
        let required = Version::from_string(raw)?;
        if required > Version::current()? {
            return Err(Error::VersionTooOld {
                required: required.to_string(),
            });
        }
    }

    if cookbook.globals.new_order.is_some() {
        warnings.push(
            "`new_order` in $globals is deprecated and has no effect; remove it".to_string(),
        );
    }

    Ok(warnings)
}
