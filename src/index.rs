//! Metadata index boundary.
//!
//! The resolver consumes three per-file facts: frontmatter, inline body
//! tags, and outgoing wikilink targets. [`MetadataIndex`] is the handle for
//! whatever index provides them; [`VaultIndex`] derives them by parsing
//! markdown read through a [`FileStore`].

use crate::store::FileStore;
use crate::types::MetaMap;
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, LazyLock};

/// Read-only metadata index handle.
pub trait MetadataIndex {
    /// Frontmatter for a file, or `None` if the file has none (or cannot
    /// be read/parsed).
    fn frontmatter(&self, path: &Path) -> Option<MetaMap>;

    /// Inline body tags, each including the leading `#`.
    fn tags(&self, path: &Path) -> Vec<String>;

    /// Outgoing wikilink targets in the file body.
    fn links(&self, path: &Path) -> Vec<String>;
}

// Tag: # followed by a letter or underscore, then word chars, / or -.
// Must not be preceded by a word character or & (HTML entity).
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w&])#([a-zA-Z_][\w/-]*)").unwrap());

// Wikilink or embed: [[target]], [[target|alias]], [[target#heading]].
static WIKILINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[\[([^\]\|#]+)(?:#[^\]\|]*)?(?:\|[^\]]*)?\]\]").unwrap());

/// Metadata index that parses markdown files from a [`FileStore`].
pub struct VaultIndex {
    store: Arc<dyn FileStore>,
}

impl VaultIndex {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    fn read(&self, path: &Path) -> Option<String> {
        self.store.read(path).ok()
    }
}

impl MetadataIndex for VaultIndex {
    fn frontmatter(&self, path: &Path) -> Option<MetaMap> {
        let content = self.read(path)?;
        let yaml = extract_frontmatter(&content)?;
        parse_yaml_map(yaml)
    }

    fn tags(&self, path: &Path) -> Vec<String> {
        let content = match self.read(path) {
            Some(c) => c,
            None => return Vec::new(),
        };
        let body = body_after_frontmatter(&content);

        TAG.captures_iter(body)
            .map(|cap| format!("#{}", &cap[1]))
            .collect()
    }

    fn links(&self, path: &Path) -> Vec<String> {
        let content = match self.read(path) {
            Some(c) => c,
            None => return Vec::new(),
        };
        let body = body_after_frontmatter(&content);

        WIKILINK
            .captures_iter(body)
            .map(|cap| cap[1].trim().to_string())
            .collect()
    }
}

/// Extract the raw YAML between `---` delimiters at the start of content.
pub fn extract_frontmatter(content: &str) -> Option<&str> {
    let rest = content.strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;

    // The closing delimiter must be on its own line.
    let end = rest
        .find("\n---\n")
        .or_else(|| rest.find("\n---\r\n"))
        .or_else(|| rest.ends_with("\n---").then(|| rest.len() - 4))?;

    Some(&rest[..end])
}

/// Content after the frontmatter block, or the whole content if none.
pub fn body_after_frontmatter(content: &str) -> &str {
    match extract_frontmatter(content) {
        Some(yaml) => {
            // Skip past: opening ---, newline, yaml, newline, closing ---.
            let newline = if content[3..].starts_with("\r\n") { 2 } else { 1 };
            let offset = 3 + newline + yaml.len() + 4;
            content.get(offset..).unwrap_or("")
        }
        None => content,
    }
}

/// Parse a YAML mapping into a flat [`MetaMap`]. Non-mapping frontmatter
/// and malformed YAML both yield `None`.
pub fn parse_yaml_map(yaml: &str) -> Option<MetaMap> {
    match serde_yaml::from_str::<serde_json::Value>(yaml) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Vault;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn index_over(content: &str) -> (TempDir, VaultIndex, PathBuf) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("note.md"), content).unwrap();
        let vault = Vault::new(dir.path()).unwrap();
        let index = VaultIndex::new(Arc::new(vault));
        (dir, index, PathBuf::from("note.md"))
    }

    #[test]
    fn test_extract_frontmatter() {
        let content = "---\ntitle: Test\n---\n\nBody";
        assert_eq!(extract_frontmatter(content), Some("title: Test"));
        assert_eq!(extract_frontmatter("no frontmatter"), None);
        assert_eq!(extract_frontmatter("---\nunclosed: yes\n"), None);
    }

    #[test]
    fn test_frontmatter_at_eof() {
        let content = "---\ntitle: Test\n---";
        assert_eq!(extract_frontmatter(content), Some("title: Test"));
    }

    #[test]
    fn test_frontmatter_parsed_as_map() {
        let (_dir, index, path) = index_over("---\nproject: Alpha\npriority: 3\n---\nBody");
        let fm = index.frontmatter(&path).unwrap();
        assert_eq!(fm["project"], "Alpha");
        assert_eq!(fm["priority"], 3);
    }

    #[test]
    fn test_malformed_frontmatter_is_none() {
        let (_dir, index, path) = index_over("---\nbad: yaml: here:\n---\nBody");
        assert!(index.frontmatter(&path).is_none());
    }

    #[test]
    fn test_inline_tags_exclude_frontmatter() {
        let (_dir, index, path) =
            index_over("---\ntags: [meta]\n---\nBody with #project/web and #work.");
        let tags = index.tags(&path);
        assert_eq!(tags, vec!["#project/web", "#work"]);
    }

    #[test]
    fn test_tags_ignore_html_entities_and_midword_hashes() {
        let (_dir, index, path) = index_over("&#39; and word#notag but #real");
        assert_eq!(index.tags(&path), vec!["#real"]);
    }

    #[test]
    fn test_links_capture_targets() {
        let (_dir, index, path) = index_over(
            "See [[Project Alpha]] and [[Other|alias]] and ![[embed.png]] and [[Note#Heading]].",
        );
        let links = index.links(&path);
        assert_eq!(links, vec!["Project Alpha", "Other", "embed.png", "Note"]);
    }

    #[test]
    fn test_missing_file_yields_empty() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::new(dir.path()).unwrap();
        let index = VaultIndex::new(Arc::new(vault));
        let path = PathBuf::from("missing.md");

        assert!(index.frontmatter(&path).is_none());
        assert!(index.tags(&path).is_empty());
        assert!(index.links(&path).is_empty());
    }
}
