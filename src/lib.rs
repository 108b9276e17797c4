//! # noteproj
//!
//! Project resolution and metadata enrichment for Obsidian-style document
//! vaults.
//!
//! Files in a vault belong to projects, but projects are declared in many
//! partially-overlapping ways: explicit path mappings, frontmatter keys,
//! tags, wikilinks, per-folder config files and filename conventions.
//! [`ProjectResolver`] combines these signals deterministically and serves
//! repeated lookups from modification-time-validated caches.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use noteproj::{ProjectResolver, ResolverOptions, Vault, VaultIndex};
//!
//! # fn main() -> noteproj::Result<()> {
//! let vault = Arc::new(Vault::new("/path/to/vault")?);
//! let index = Arc::new(VaultIndex::new(vault.clone()));
//!
//! let mut options = ResolverOptions::new(vault, index);
//! options.metadata_config_enabled = true;
//! options.config_file_enabled = true;
//!
//! let mut resolver = ProjectResolver::new(options);
//! if let Some(project) = resolver.resolve(Path::new("Projects/Work/task.md")) {
//!     println!("{} (from {})", project.name, project.source);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config_file;
pub mod error;
pub mod index;
pub mod mapper;
pub mod resolver;
pub mod store;
pub mod types;

pub use error::{ProjectError, Result};
pub use index::{MetadataIndex, VaultIndex};
pub use mapper::MetadataMapper;
pub use resolver::{ProjectResolver, ResolverOptions, ResolverOptionsUpdate, normalize_project_name};
pub use store::{Entry, FileStat, FileStore, Vault};
pub use types::{
    CacheStats, DefaultProjectNaming, DetectionKind, DetectionMethod, MetaMap, MetadataMapping,
    NamingStrategy, PathMapping, ProjectKind, TgProject,
};
