//! Shared types for noteproj.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Flat key/value metadata map, as extracted from frontmatter or a config
/// file. Values keep their scalar JSON representation.
pub type MetaMap = serde_json::Map<String, serde_json::Value>;

/// Provenance of a resolved project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    /// Matched a path mapping.
    Path,
    /// Derived from frontmatter (direct key, tag or link detection).
    Metadata,
    /// Declared by a project config file.
    Config,
    /// Produced by the default naming strategy.
    Default,
}

impl std::fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectKind::Path => write!(f, "path"),
            ProjectKind::Metadata => write!(f, "metadata"),
            ProjectKind::Config => write!(f, "config"),
            ProjectKind::Default => write!(f, "default"),
        }
    }
}

/// A resolved project label with its provenance.
///
/// Every resolved project is read-only: the label is derived, not stored,
/// so callers must not write it back anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TgProject {
    /// Which resolution stage produced this project.
    #[serde(rename = "type")]
    pub kind: ProjectKind,

    /// The project name (normalized to forward slashes).
    pub name: String,

    /// The rule or key that matched (pattern, frontmatter key, config file
    /// name, or naming strategy).
    pub source: String,

    /// Always true; resolved projects are derived values.
    pub readonly: bool,
}

impl TgProject {
    pub fn new(kind: ProjectKind, name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            source: source.into(),
            readonly: true,
        }
    }
}

/// Maps a path pattern to a fixed project name. First enabled match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    /// Substring to match, or a glob-style pattern when it contains `*`.
    pub path_pattern: String,

    /// Project name to assign on match.
    pub project_name: String,

    pub enabled: bool,
}

/// Renames a source metadata key to a target key during enhancement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataMapping {
    pub source_key: String,
    pub target_key: String,
    pub enabled: bool,
}

/// Kind of a custom detection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    Metadata,
    Tag,
    Link,
}

/// A user-ordered detection rule, evaluated between path mappings and the
/// plain frontmatter lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionMethod {
    pub kind: DetectionKind,

    /// Frontmatter key (metadata/link kinds) or tag name (tag kind).
    pub property_key: String,

    /// For link detection: match any outgoing link containing this substring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_filter: Option<String>,

    pub enabled: bool,
}

/// Strategy for naming a project when nothing else matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingStrategy {
    Filename,
    Foldername,
    Metadata,
}

impl std::fmt::Display for NamingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NamingStrategy::Filename => write!(f, "filename"),
            NamingStrategy::Foldername => write!(f, "foldername"),
            NamingStrategy::Metadata => write!(f, "metadata"),
        }
    }
}

/// Fallback naming configuration (lowest resolution priority).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultProjectNaming {
    pub strategy: NamingStrategy,

    /// Frontmatter key to read for the `Metadata` strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_key: Option<String>,

    /// Strip the file extension for the `Filename` strategy.
    pub strip_extension: bool,

    pub enabled: bool,
}

impl Default for DefaultProjectNaming {
    fn default() -> Self {
        Self {
            strategy: NamingStrategy::Filename,
            metadata_key: None,
            strip_extension: true,
            enabled: false,
        }
    }
}

/// Diagnostic snapshot of the resolver's caches.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub config_cache: ConfigCacheStats,
    pub file_metadata_cache: CacheSize,
    pub enhanced_metadata_cache: CacheSize,
    pub total_memory: MemoryEstimate,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigCacheStats {
    pub size: usize,
    pub keys: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheSize {
    pub size: usize,
}

/// Rough memory estimate computed by JSON-serializing cached values and
/// summing string lengths.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryEstimate {
    pub estimated_bytes: usize,
}
