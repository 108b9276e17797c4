//! Config file discovery and content parsing.
//!
//! A project config file is a uniquely-named document (e.g. `project.md`)
//! discovered by walking ancestor folders of a target file. Its parsed
//! content can supply a project label and extra metadata for every file
//! beneath it.

use crate::store::FileStore;
use crate::types::MetaMap;
use std::path::{Path, PathBuf};

/// A located config file with the stat needed for cache validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFileRef {
    /// Path of the config file, relative to the store root.
    pub path: PathBuf,
    /// Modification time in epoch milliseconds.
    pub mtime_ms: i64,
}

/// Find the nearest config file for a target file.
///
/// Starts at the target's parent folder and looks for a direct child named
/// `config_name` that is a file. With `recursive` set, continues through
/// ancestor folders up to the store root; otherwise only the immediate
/// parent is checked. Returns `None` if the target file itself is missing.
pub fn find_config_file(
    store: &dyn FileStore,
    file_path: &Path,
    config_name: &str,
    recursive: bool,
) -> Option<ConfigFileRef> {
    // The target must exist as a file for a config lookup to make sense.
    store.file_stat(file_path)?;

    let mut folder = file_path.parent();

    while let Some(current) = folder {
        let candidate = current.join(config_name);
        if let Some(stat) = store.file_stat(&candidate) {
            return Some(ConfigFileRef {
                path: candidate,
                mtime_ms: stat.mtime_ms,
            });
        }

        if !recursive {
            break;
        }

        folder = current.parent();
    }

    None
}

/// Parse config file content into a flat mapping.
///
/// Line-oriented `key: value` format: blank lines and lines starting with
/// `#` or `//` are skipped, each remaining line splits at the first `:`,
/// both sides are trimmed, and surrounding single/double quotes are
/// stripped from the value. Lines that don't split cleanly are ignored, so
/// malformed files degrade to a partial or empty mapping.
pub fn parse_config_content(content: &str) -> MetaMap {
    let mut config = MetaMap::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            continue;
        }

        let Some(colon) = trimmed.find(':') else {
            continue;
        };
        if colon == 0 {
            continue;
        }

        let key = trimmed[..colon].trim();
        let value = trimmed[colon + 1..].trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }

        let clean = strip_quotes(value);
        config.insert(key.to_string(), serde_json::Value::String(clean.to_string()));
    }

    config
}

/// Strip one surrounding single or double quote from each end, if present.
fn strip_quotes(value: &str) -> &str {
    let value = value
        .strip_prefix('"')
        .or_else(|| value.strip_prefix('\''))
        .unwrap_or(value);
    value
        .strip_suffix('"')
        .or_else(|| value.strip_suffix('\''))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Entry, FileStat};
    use std::collections::HashMap;

    /// Minimal in-memory store: paths mapped to (kind, mtime).
    struct MemStore {
        entries: HashMap<PathBuf, Entry>,
    }

    impl MemStore {
        fn new() -> Self {
            Self {
                entries: HashMap::new(),
            }
        }

        fn file(mut self, path: &str, mtime_ms: i64) -> Self {
            self.entries.insert(
                PathBuf::from(path),
                Entry::File(FileStat { mtime_ms, size: 0 }),
            );
            self
        }

        fn folder(mut self, path: &str) -> Self {
            self.entries.insert(PathBuf::from(path), Entry::Folder);
            self
        }
    }

    impl FileStore for MemStore {
        fn entry(&self, path: &Path) -> Option<Entry> {
            self.entries.get(path).copied()
        }

        fn read(&self, _path: &Path) -> crate::error::Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_finds_config_in_same_folder() {
        let store = MemStore::new()
            .file("proj/task.md", 10)
            .file("proj/project.md", 20);

        let found =
            find_config_file(&store, Path::new("proj/task.md"), "project.md", false).unwrap();
        assert_eq!(found.path, PathBuf::from("proj/project.md"));
        assert_eq!(found.mtime_ms, 20);
    }

    #[test]
    fn test_recursive_walks_ancestors() {
        let store = MemStore::new()
            .file("a/b/c/task.md", 10)
            .file("a/project.md", 30);

        let found =
            find_config_file(&store, Path::new("a/b/c/task.md"), "project.md", true).unwrap();
        assert_eq!(found.path, PathBuf::from("a/project.md"));
    }

    #[test]
    fn test_non_recursive_stops_at_parent() {
        let store = MemStore::new()
            .file("a/b/task.md", 10)
            .file("a/project.md", 30);

        let found = find_config_file(&store, Path::new("a/b/task.md"), "project.md", false);
        assert!(found.is_none());
    }

    #[test]
    fn test_nearest_config_wins() {
        let store = MemStore::new()
            .file("a/b/task.md", 10)
            .file("a/b/project.md", 20)
            .file("a/project.md", 30);

        let found =
            find_config_file(&store, Path::new("a/b/task.md"), "project.md", true).unwrap();
        assert_eq!(found.path, PathBuf::from("a/b/project.md"));
    }

    #[test]
    fn test_folder_named_like_config_is_skipped() {
        let store = MemStore::new()
            .file("a/task.md", 10)
            .folder("a/project.md")
            .file("project.md", 40);

        let found = find_config_file(&store, Path::new("a/task.md"), "project.md", true).unwrap();
        assert_eq!(found.path, PathBuf::from("project.md"));
    }

    #[test]
    fn test_missing_target_file_yields_none() {
        let store = MemStore::new().file("a/project.md", 30);
        let found = find_config_file(&store, Path::new("a/task.md"), "project.md", true);
        assert!(found.is_none());
    }

    #[test]
    fn test_parse_key_value_lines() {
        let content = "project: My Project\nowner: 'Alice'\ncolor: \"blue\"\n";
        let config = parse_config_content(content);
        assert_eq!(config["project"], "My Project");
        assert_eq!(config["owner"], "Alice");
        assert_eq!(config["color"], "blue");
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let content = "# a comment\n// another\n\nproject: X\n";
        let config = parse_config_content(content);
        assert_eq!(config.len(), 1);
        assert_eq!(config["project"], "X");
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let content = "no colon here\n: leading colon\nempty:\nvalid: ok\n";
        let config = parse_config_content(content);
        assert_eq!(config.len(), 1);
        assert_eq!(config["valid"], "ok");
    }

    #[test]
    fn test_value_splits_at_first_colon() {
        let config = parse_config_content("url: https://example.com\n");
        assert_eq!(config["url"], "https://example.com");
    }
}
