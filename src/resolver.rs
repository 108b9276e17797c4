//! Project resolution and caching engine.
//!
//! [`ProjectResolver`] combines several partially-overlapping signals into
//! one owning-project label per file, in strict priority order:
//!
//! 1. Path mappings (substring or glob-style pattern against the file path)
//! 2. Custom detection methods (metadata / tag / link rules, user-ordered)
//! 3. A configured frontmatter key
//! 4. The `project` field of an inherited config file found by ancestor walk
//! 5. A default naming strategy (filename / foldername / metadata)
//!
//! Every expensive derivation is cached behind modification timestamps:
//! config files per config path, frontmatter per file, and enhanced
//! (merged + mapped) metadata under a composite `file_config` key that
//! invalidates when either source changes.

use crate::config_file::{ConfigFileRef, find_config_file, parse_config_content};
use crate::index::MetadataIndex;
use crate::mapper::MetadataMapper;
use crate::store::FileStore;
use crate::types::{
    CacheSize, CacheStats, ConfigCacheStats, DefaultProjectNaming, DetectionKind, DetectionMethod,
    MemoryEstimate, MetaMap, MetadataMapping, NamingStrategy, PathMapping, ProjectKind, TgProject,
};
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Construction options for [`ProjectResolver`].
pub struct ResolverOptions {
    /// File storage handle.
    pub store: Arc<dyn FileStore>,
    /// Metadata index handle.
    pub index: Arc<dyn MetadataIndex>,
    /// Name of the config file looked up by ancestor walk (e.g. `project.md`).
    pub config_file_name: String,
    /// Walk all ancestor folders instead of just the immediate parent.
    pub search_recursively: bool,
    /// Frontmatter key consulted by the metadata resolution step.
    pub metadata_key: String,
    /// Ordered path mappings; first enabled match wins.
    pub path_mappings: Vec<PathMapping>,
    /// Metadata key mappings applied during enhancement.
    pub metadata_mappings: Vec<MetadataMapping>,
    /// Fallback naming strategy (lowest priority).
    pub default_naming: DefaultProjectNaming,
    /// Master switch; when false every operation short-circuits to its
    /// empty result.
    pub enhanced_project_enabled: bool,
    /// Enables the frontmatter-key resolution step.
    pub metadata_config_enabled: bool,
    /// Enables the config-file resolution step.
    pub config_file_enabled: bool,
    /// Custom detection rules, evaluated in order between path mappings and
    /// the frontmatter key.
    pub detection_methods: Vec<DetectionMethod>,
}

impl ResolverOptions {
    /// Options with conventional defaults: `project.md` config file,
    /// recursive search, `project` metadata key, no mappings or detection
    /// methods, enhanced features on, both optional steps off.
    pub fn new(store: Arc<dyn FileStore>, index: Arc<dyn MetadataIndex>) -> Self {
        Self {
            store,
            index,
            config_file_name: "project.md".to_string(),
            search_recursively: true,
            metadata_key: "project".to_string(),
            path_mappings: Vec::new(),
            metadata_mappings: Vec::new(),
            default_naming: DefaultProjectNaming::default(),
            enhanced_project_enabled: true,
            metadata_config_enabled: false,
            config_file_enabled: false,
            detection_methods: Vec::new(),
        }
    }
}

/// Partial options for [`ProjectResolver::update_options`]. Every `Some`
/// field replaces the current value; applying an update clears all caches.
#[derive(Default)]
pub struct ResolverOptionsUpdate {
    pub config_file_name: Option<String>,
    pub search_recursively: Option<bool>,
    pub metadata_key: Option<String>,
    pub path_mappings: Option<Vec<PathMapping>>,
    pub metadata_mappings: Option<Vec<MetadataMapping>>,
    pub default_naming: Option<DefaultProjectNaming>,
    pub enhanced_project_enabled: Option<bool>,
    pub metadata_config_enabled: Option<bool>,
    pub config_file_enabled: Option<bool>,
    pub detection_methods: Option<Vec<DetectionMethod>>,
}

/// The project resolution and caching engine.
///
/// One instance owns all cache state; the caches live exactly as long as
/// the resolver and are only mutated through its methods.
pub struct ProjectResolver {
    store: Arc<dyn FileStore>,
    index: Arc<dyn MetadataIndex>,
    config_file_name: String,
    search_recursively: bool,
    metadata_key: String,
    path_mappings: Vec<PathMapping>,
    mapper: MetadataMapper,
    default_naming: DefaultProjectNaming,
    enhanced_project_enabled: bool,
    metadata_config_enabled: bool,
    config_file_enabled: bool,
    detection_methods: Vec<DetectionMethod>,

    // Config cache: config path -> parsed data + source mtime.
    config_cache: HashMap<PathBuf, Arc<MetaMap>>,
    config_mtimes: HashMap<PathBuf, i64>,
    // File metadata cache: file path -> frontmatter + source mtime.
    file_meta_cache: HashMap<PathBuf, Arc<MetaMap>>,
    file_meta_mtimes: HashMap<PathBuf, i64>,
    // Enhanced metadata cache: file path -> merged data + composite key.
    enhanced_cache: HashMap<PathBuf, Arc<MetaMap>>,
    enhanced_keys: HashMap<PathBuf, String>,
}

impl ProjectResolver {
    pub fn new(options: ResolverOptions) -> Self {
        Self {
            store: options.store,
            index: options.index,
            config_file_name: options.config_file_name,
            search_recursively: options.search_recursively,
            metadata_key: options.metadata_key,
            path_mappings: options.path_mappings,
            mapper: MetadataMapper::new(options.metadata_mappings),
            default_naming: options.default_naming,
            enhanced_project_enabled: options.enhanced_project_enabled,
            metadata_config_enabled: options.metadata_config_enabled,
            config_file_enabled: options.config_file_enabled,
            detection_methods: options.detection_methods,
            config_cache: HashMap::new(),
            config_mtimes: HashMap::new(),
            file_meta_cache: HashMap::new(),
            file_meta_mtimes: HashMap::new(),
            enhanced_cache: HashMap::new(),
            enhanced_keys: HashMap::new(),
        }
    }

    pub fn is_enhanced_project_enabled(&self) -> bool {
        self.enhanced_project_enabled
    }

    /// Toggle the master switch. Disabling clears all caches so stale data
    /// can never be served after a re-enable.
    pub fn set_enhanced_project_enabled(&mut self, enabled: bool) {
        self.enhanced_project_enabled = enabled;
        if !enabled {
            self.clear_cache(None);
        }
    }

    /// The configured detection methods, in evaluation order.
    pub fn detection_methods(&self) -> &[DetectionMethod] {
        &self.detection_methods
    }

    /// Resolve the owning project for a file.
    ///
    /// Deterministic and side-effect-free apart from cache writes. Returns
    /// `None` when no rule matches or the feature is disabled. Lookup
    /// failures degrade to `None` as well; callers cannot distinguish
    /// "no project" from "lookup failed" by design.
    pub fn resolve(&mut self, file_path: &Path) -> Option<TgProject> {
        if !self.enhanced_project_enabled {
            return None;
        }

        let path_str = path_to_string(file_path);

        // 1. Path mappings (highest priority).
        for mapping in &self.path_mappings {
            if !mapping.enabled {
                continue;
            }
            if matches_path_pattern(&path_str, &mapping.path_pattern) {
                return Some(TgProject::new(
                    ProjectKind::Path,
                    normalize_project_name(&mapping.project_name),
                    mapping.path_pattern.clone(),
                ));
            }
        }

        // 2. Custom detection methods.
        if !self.detection_methods.is_empty() {
            if let Some(project) = self.run_detection_methods(file_path, &path_str) {
                return Some(project);
            }
        }

        // 3. Frontmatter metadata key.
        if self.metadata_config_enabled {
            if let Some(metadata) = self.get_file_metadata(file_path) {
                if let Some(Value::String(s)) = metadata.get(&self.metadata_key) {
                    let trimmed = s.trim();
                    if !trimmed.is_empty() {
                        return Some(TgProject::new(
                            ProjectKind::Metadata,
                            trimmed,
                            self.metadata_key.clone(),
                        ));
                    }
                }
            }
        }

        // 4. Config file project field.
        if self.config_file_enabled {
            if let Some(config) = self.get_project_config(file_path) {
                if let Some(Value::String(s)) = config.get("project") {
                    let trimmed = s.trim();
                    if !trimmed.is_empty() {
                        return Some(TgProject::new(
                            ProjectKind::Config,
                            trimmed,
                            self.config_file_name.clone(),
                        ));
                    }
                }
            }
        }

        // 5. Default naming strategy (lowest priority).
        if self.default_naming.enabled {
            if let Some(name) = self.default_project_name(file_path, &path_str) {
                if !name.is_empty() {
                    return Some(TgProject::new(
                        ProjectKind::Default,
                        normalize_project_name(&name),
                        self.default_naming.strategy.to_string(),
                    ));
                }
            }
        }

        None
    }

    /// Evaluate the custom detection methods in order. The file must exist;
    /// tag and link matches carry `metadata` provenance because the project
    /// name ultimately comes from the file's own metadata or name.
    fn run_detection_methods(&mut self, file_path: &Path, path_str: &str) -> Option<TgProject> {
        self.store.file_stat(file_path)?;

        let file_md = self.get_file_metadata(file_path);
        let methods = self.detection_methods.clone();

        for method in methods.iter().filter(|m| m.enabled) {
            match method.kind {
                DetectionKind::Metadata => {
                    if let Some(value) = file_md.as_ref().and_then(|md| md.get(&method.property_key))
                    {
                        if is_truthy(value) {
                            return Some(TgProject::new(
                                ProjectKind::Metadata,
                                value_to_string(value),
                                method.property_key.clone(),
                            ));
                        }
                    }
                }
                DetectionKind::Tag => {
                    let target_tag = if method.property_key.starts_with('#') {
                        method.property_key.clone()
                    } else {
                        format!("#{}", method.property_key)
                    };
                    let target_lower = target_tag.to_lowercase();

                    let mut all_tags: Vec<String> = self
                        .index
                        .tags(file_path)
                        .iter()
                        .map(|t| t.to_lowercase())
                        .collect();
                    if let Some(fm_tags) = file_md.as_ref().and_then(|md| md.get("tags")) {
                        let raw: Vec<&Value> = match fm_tags {
                            Value::Array(items) => items.iter().collect(),
                            other => vec![other],
                        };
                        for tag in raw {
                            let s = value_to_string(tag);
                            let with_hash = if s.starts_with('#') { s } else { format!("#{}", s) };
                            all_tags.push(with_hash.to_lowercase());
                        }
                    }

                    // Exact match only: '#project/foo' never satisfies a rule
                    // configured for '#project'.
                    if all_tags.iter().any(|t| t == &target_lower) {
                        return Some(self.project_from_file_name(
                            file_md.as_deref(),
                            path_str,
                            "tag",
                            &format!("tag:{}", target_tag),
                        ));
                    }
                }
                DetectionKind::Link => {
                    for link in self.index.links(file_path) {
                        let matched = if let Some(filter) = &method.link_filter {
                            link.contains(filter.as_str())
                        } else if !method.property_key.is_empty() {
                            // Only links textually embedded in the property's
                            // string value count.
                            file_md
                                .as_ref()
                                .and_then(|md| md.get(&method.property_key))
                                .filter(|v| is_truthy(v))
                                .map(|v| value_to_string(v).contains(&format!("[[{}]]", link)))
                                .unwrap_or(false)
                        } else {
                            false
                        };

                        if matched {
                            return Some(self.project_from_file_name(
                                file_md.as_deref(),
                                path_str,
                                "link",
                                &format!("link:{}", link),
                            ));
                        }
                    }
                }
            }
        }

        None
    }

    /// Name a tag/link-detected project: frontmatter `title`, then `name`,
    /// then the file's base name with the `.md` extension stripped.
    fn project_from_file_name(
        &self,
        file_md: Option<&MetaMap>,
        path_str: &str,
        via: &str,
        fallback_source: &str,
    ) -> TgProject {
        for key in ["title", "name"] {
            if let Some(value) = file_md.and_then(|md| md.get(key)) {
                if is_truthy(value) {
                    return TgProject::new(
                        ProjectKind::Metadata,
                        value_to_string(value),
                        format!("{} (via {})", key, via),
                    );
                }
            }
        }

        let base = base_name(path_str);
        let name = strip_md_extension(base);
        TgProject::new(ProjectKind::Metadata, name, fallback_source)
    }

    /// Frontmatter for a file, cached per mtime. Repeated calls without a
    /// file change return the same `Arc`. Returns `None` for missing files
    /// or when the feature is disabled.
    pub fn get_file_metadata(&mut self, file_path: &Path) -> Option<Arc<MetaMap>> {
        if !self.enhanced_project_enabled {
            return None;
        }

        let stat = self.store.file_stat(file_path)?;

        if self.file_meta_mtimes.get(file_path) == Some(&stat.mtime_ms) {
            if let Some(cached) = self.file_meta_cache.get(file_path) {
                return Some(Arc::clone(cached));
            }
        }

        let frontmatter = Arc::new(self.index.frontmatter(file_path).unwrap_or_default());
        self.file_meta_cache
            .insert(file_path.to_path_buf(), Arc::clone(&frontmatter));
        self.file_meta_mtimes
            .insert(file_path.to_path_buf(), stat.mtime_ms);
        Some(frontmatter)
    }

    /// Parsed config data for the nearest config file above `file_path`,
    /// cached per config-file mtime. Content-parsed keys override
    /// frontmatter keys on collision.
    pub fn get_project_config(&mut self, file_path: &Path) -> Option<Arc<MetaMap>> {
        if !self.enhanced_project_enabled {
            return None;
        }

        let ConfigFileRef {
            path: config_path,
            mtime_ms,
        } = self.find_config(file_path)?;

        if self.config_mtimes.get(&config_path) == Some(&mtime_ms) {
            if let Some(cached) = self.config_cache.get(&config_path) {
                return Some(Arc::clone(cached));
            }
        }

        let content = match self.store.read(&config_path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!(
                    "Warning: failed to read project config for {}: {}",
                    file_path.display(),
                    e
                );
                return None;
            }
        };

        let mut config_data = self.index.frontmatter(&config_path).unwrap_or_default();
        for (key, value) in parse_config_content(&content) {
            config_data.insert(key, value);
        }

        let config_data = Arc::new(config_data);
        self.config_cache
            .insert(config_path.clone(), Arc::clone(&config_data));
        self.config_mtimes.insert(config_path, mtime_ms);
        Some(config_data)
    }

    /// Merged metadata for a file: config data overlaid by frontmatter
    /// (frontmatter wins), then run through the metadata mapper. Cached
    /// under a composite `fileMtime_configMtime` key so a change to either
    /// source invalidates the entry. Never fails: disabled features and
    /// missing files yield an empty map.
    pub fn get_enhanced_metadata(&mut self, file_path: &Path) -> Arc<MetaMap> {
        if !self.enhanced_project_enabled {
            return Arc::new(MetaMap::new());
        }

        let Some(stat) = self.store.file_stat(file_path) else {
            return Arc::new(MetaMap::new());
        };

        // A missing config file contributes timestamp 0.
        let config_mtime = self
            .find_config(file_path)
            .map(|c| c.mtime_ms)
            .unwrap_or(0);
        let cache_key = format!("{}_{}", stat.mtime_ms, config_mtime);

        if self.enhanced_keys.get(file_path) == Some(&cache_key) {
            if let Some(cached) = self.enhanced_cache.get(file_path) {
                return Arc::clone(cached);
            }
        }

        let file_metadata = self.get_file_metadata(file_path);
        let config_data = self.get_project_config(file_path);

        let mut merged = config_data.map(|c| (*c).clone()).unwrap_or_default();
        if let Some(fm) = file_metadata {
            for (key, value) in fm.iter() {
                merged.insert(key.clone(), value.clone());
            }
        }

        let merged = Arc::new(self.mapper.apply(&merged));
        self.enhanced_cache
            .insert(file_path.to_path_buf(), Arc::clone(&merged));
        self.enhanced_keys
            .insert(file_path.to_path_buf(), cache_key);
        merged
    }

    /// Run the metadata mapper over an arbitrary metadata map.
    pub fn apply_mappings(&self, metadata: &MetaMap) -> MetaMap {
        self.mapper.apply(metadata)
    }

    fn find_config(&self, file_path: &Path) -> Option<ConfigFileRef> {
        find_config_file(
            self.store.as_ref(),
            file_path,
            &self.config_file_name,
            self.search_recursively,
        )
    }

    /// Generate a name from the default naming strategy. May be empty
    /// (e.g. a root-level file under the foldername strategy); empty names
    /// are treated as "no project" by the caller.
    fn default_project_name(&mut self, file_path: &Path, path_str: &str) -> Option<String> {
        match self.default_naming.strategy {
            NamingStrategy::Filename => {
                let name = base_name(path_str);
                if self.default_naming.strip_extension {
                    Some(strip_any_extension(name).to_string())
                } else {
                    Some(name.to_string())
                }
            }
            NamingStrategy::Foldername => {
                let parts: Vec<&str> = path_str.split('/').collect();
                if parts.len() < 2 {
                    return Some(String::new());
                }

                // A segment literally named "projects"/"project" that is not
                // the immediate parent roots a nested project path, e.g.
                // Projects/Web/Frontend/file.md -> Web/Frontend.
                let root = parts.iter().position(|part| {
                    part.eq_ignore_ascii_case("projects") || part.eq_ignore_ascii_case("project")
                });
                if let Some(idx) = root {
                    if idx + 2 < parts.len() {
                        return Some(parts[idx + 1..parts.len() - 1].join("/"));
                    }
                }

                Some(parts[parts.len() - 2].to_string())
            }
            NamingStrategy::Metadata => {
                let key = self.default_naming.metadata_key.clone()?;
                let metadata = self.get_file_metadata(file_path)?;
                let value = metadata.get(&key)?;
                if !is_truthy(value) {
                    return None;
                }
                Some(match value {
                    Value::String(s) => s.trim().to_string(),
                    other => value_to_string(other),
                })
            }
        }
    }

    /// Clear cached data for one file across all three caches, or
    /// everything when no path is given.
    pub fn clear_cache(&mut self, file_path: Option<&Path>) {
        match file_path {
            Some(path) => {
                if let Some(config) = self.find_config(path) {
                    self.config_cache.remove(&config.path);
                    self.config_mtimes.remove(&config.path);
                }
                self.file_meta_cache.remove(path);
                self.file_meta_mtimes.remove(path);
                self.enhanced_cache.remove(path);
                self.enhanced_keys.remove(path);
            }
            None => {
                self.config_cache.clear();
                self.config_mtimes.clear();
                self.file_meta_cache.clear();
                self.file_meta_mtimes.clear();
                self.enhanced_cache.clear();
                self.enhanced_keys.clear();
            }
        }
    }

    /// Sweep the file-metadata cache: remove entries whose file no longer
    /// exists or whose mtime changed, cascading removal to the enhanced
    /// cache. Returns the number of removed entries.
    pub fn clear_stale_entries(&mut self) -> usize {
        let stale: Vec<PathBuf> = self
            .file_meta_mtimes
            .iter()
            .filter(|(path, cached_mtime)| {
                self.store
                    .file_stat(path)
                    .map(|stat| stat.mtime_ms != **cached_mtime)
                    .unwrap_or(true)
            })
            .map(|(path, _)| path.clone())
            .collect();

        for path in &stale {
            self.file_meta_cache.remove(path);
            self.file_meta_mtimes.remove(path);
            self.enhanced_cache.remove(path);
            self.enhanced_keys.remove(path);
        }

        stale.len()
    }

    /// Merge a partial options update and clear all caches unconditionally,
    /// so no entry derived under the old configuration survives.
    pub fn update_options(&mut self, update: ResolverOptionsUpdate) {
        if let Some(name) = update.config_file_name {
            self.config_file_name = name;
        }
        if let Some(recursive) = update.search_recursively {
            self.search_recursively = recursive;
        }
        if let Some(key) = update.metadata_key {
            self.metadata_key = key;
        }
        if let Some(mappings) = update.path_mappings {
            self.path_mappings = mappings;
        }
        if let Some(mappings) = update.metadata_mappings {
            self.mapper = MetadataMapper::new(mappings);
        }
        if let Some(naming) = update.default_naming {
            self.default_naming = naming;
        }
        if let Some(enabled) = update.enhanced_project_enabled {
            self.set_enhanced_project_enabled(enabled);
        }
        if let Some(enabled) = update.metadata_config_enabled {
            self.metadata_config_enabled = enabled;
        }
        if let Some(enabled) = update.config_file_enabled {
            self.config_file_enabled = enabled;
        }
        if let Some(methods) = update.detection_methods {
            self.detection_methods = methods;
        }

        self.clear_cache(None);
    }

    /// Diagnostic snapshot: per-cache entry counts and a rough memory
    /// estimate from JSON-serialized value lengths.
    pub fn cache_stats(&self) -> CacheStats {
        let estimated_bytes = serialized_size(self.config_cache.values())
            + serialized_size(self.file_meta_cache.values())
            + serialized_size(self.enhanced_cache.values());

        CacheStats {
            config_cache: ConfigCacheStats {
                size: self.config_cache.len(),
                keys: self.config_cache.keys().cloned().collect(),
            },
            file_metadata_cache: CacheSize {
                size: self.file_meta_cache.len(),
            },
            enhanced_metadata_cache: CacheSize {
                size: self.enhanced_cache.len(),
            },
            total_memory: MemoryEstimate { estimated_bytes },
        }
    }
}

fn serialized_size<'a>(values: impl Iterator<Item = &'a Arc<MetaMap>>) -> usize {
    values
        .map(|map| {
            serde_json::to_string(map.as_ref())
                .map(|s| s.len())
                .unwrap_or(0)
        })
        .sum()
}

static MULTI_SLASH: LazyLock<Regex> = LazyLock::new(|| Regex::new("/+").unwrap());

/// Normalize a project name: backslashes to slashes, repeated slashes
/// collapsed, leading and trailing slashes stripped. Idempotent.
pub fn normalize_project_name(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    let normalized = name.replace('\\', "/");
    let normalized = MULTI_SLASH.replace_all(&normalized, "/");
    normalized.trim_matches('/').to_string()
}

/// Test a file path against a path pattern: glob-style when the pattern
/// contains `*` (with `?` matching one character), plain substring match
/// otherwise. Backslashes on both sides normalize to forward slashes.
fn matches_path_pattern(file_path: &str, pattern: &str) -> bool {
    let normalized_path = file_path.replace('\\', "/");
    let normalized_pattern = pattern.replace('\\', "/");

    if normalized_pattern.contains('*') {
        let mut source = String::from("^");
        for ch in normalized_pattern.chars() {
            match ch {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                other => source.push_str(&regex::escape(&other.to_string())),
            }
        }
        source.push('$');

        return RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(&normalized_path))
            .unwrap_or(false);
    }

    normalized_path.contains(&normalized_pattern)
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn base_name(path_str: &str) -> &str {
    path_str.rsplit('/').next().unwrap_or(path_str)
}

fn strip_md_extension(name: &str) -> &str {
    if name.to_lowercase().ends_with(".md") {
        &name[..name.len() - 3]
    } else {
        name
    }
}

fn strip_any_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => &name[..idx],
        _ => name,
    }
}

/// Whether a metadata value counts as present, mirroring the loose
/// truthiness the match points rely on: null, false, 0 and "" are absent;
/// arrays and objects always count.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Stringify a metadata value for use as a project name.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
