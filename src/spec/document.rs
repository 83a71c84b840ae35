//! Reading YAML/JSON documents into untyped values

use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

/// Serialization format of a document, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => Ok(DocumentFormat::Yaml),
            "json" => Ok(DocumentFormat::Json),
            _ => Err(LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

/// Read a document from disk. The root must be a mapping.
pub fn read_document(path: &Path) -> Result<Value, LoadError> {
    let format = DocumentFormat::from_path(path)?;
    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            LoadError::NotFound(path.to_path_buf())
        } else {
            LoadError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    parse_document(&content, format, &path.display().to_string())
}

/// Parse document text. `origin` names the source in error messages.
pub fn parse_document(content: &str, format: DocumentFormat, origin: &str) -> Result<Value, LoadError> {
    let value: Value = match format {
        DocumentFormat::Yaml => serde_yaml::from_str(content).map_err(|source| LoadError::Yaml {
            origin: origin.to_string(),
            source,
        })?,
        DocumentFormat::Json => serde_json::from_str(content).map_err(|source| LoadError::Json {
            origin: origin.to_string(),
            source,
        })?,
    };
    if !value.is_object() {
        return Err(LoadError::NotAMapping(origin.to_string()));
    }
    Ok(value)
}

/// Resolve `target` against the directory containing `base_file` unless it
/// is already absolute.
pub fn resolve_relative(base_file: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    base_file
        .parent()
        .map(|dir| dir.join(target))
        .unwrap_or_else(|| target.to_path_buf())
}
