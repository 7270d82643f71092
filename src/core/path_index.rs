//! Index of display files across source trees, used to turn a bare reference
//! such as `motor.opi` into a relative path valid in the mirrored project.
//!
//! Each indexed directory belongs to one module. Its files are keyed by their
//! path relative to that directory (legacy `.edl` names already renamed to
//! `.opi`) and map to the owning module plus the directory's path inside
//! the module. The first directory to claim a key keeps it.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::coordinate::{ModuleCoordinate, locate_module_root, segment_count};
use crate::core::error::{Error, Result};
use crate::infra::utils::PathUtils;
use crate::infra::walk::FileWalker;

pub const LEGACY_EXT: &str = "edl";
pub const NEW_EXT: &str = "opi";
pub const IMAGE_EXT: &str = "png";

/// Walk depth used when recursion is off: direct children plus one level of
/// module-local subdirectories.
const SHALLOW_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub module: String,
    pub path_in_module: String,
}

impl IndexEntry {
    pub fn new(module: impl Into<String>, path_in_module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            path_in_module: path_in_module.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct PathIndex {
    entries: IndexMap<String, IndexEntry>,
}

/// An indexed directory and the module it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoot {
    pub dir: PathBuf,
    pub module: String,
    pub path_in_module: String,
}

/// Per-directory bookkeeping used to work out how deep a file sits in the
/// mirrored project.
#[derive(Debug, Clone, Default)]
pub struct SourceRoots {
    roots: Vec<SourceRoot>,
}

impl SourceRoots {
    pub fn push(&mut self, root: SourceRoot) {
        self.roots.push(root);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceRoot> {
        self.roots.iter()
    }

    /// The most specific indexed directory containing `file`.
    pub fn root_for(&self, file: &Path) -> Option<&SourceRoot> {
        self.roots
            .iter()
            .filter(|r| file.starts_with(&r.dir))
            .max_by_key(|r| r.dir.components().count())
    }

    /// Directory levels between the project root and `file`'s directory:
    /// the module's segments, the path-within-module when it is kept, and
    /// the subdirectories below the matched source root.
    pub fn depth_of(&self, file: &Path, use_relative_subpath: bool) -> Option<usize> {
        let root = self.root_for(file)?;
        let below = file
            .parent()
            .and_then(|p| p.strip_prefix(&root.dir).ok())
            .map_or(0, |p| p.components().count());

        let subpath = if use_relative_subpath {
            segment_count(&root.path_in_module)
        } else {
            0
        };
        Some(segment_count(&root.module) + subpath + below)
    }
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.entries.iter()
    }

    /// Insert unless the key is taken. A different existing entry is a
    /// collision: it is kept and a warning logged. Returns whether `entry`
    /// was stored.
    pub fn insert(&mut self, key: String, entry: IndexEntry) -> bool {
        match self.entries.get(&key) {
            Some(existing) => {
                if existing != &entry {
                    warn!(
                        file = %key,
                        kept = %format!("{}/{}", existing.module, existing.path_in_module),
                        dropped = %format!("{}/{}", entry.module, entry.path_in_module),
                        "path collision, keeping first"
                    );
                }
                false
            }
            None => {
                self.entries.insert(key, entry);
                true
            }
        }
    }

    /// Merge `other` after this index; existing keys win.
    pub fn merge(&mut self, other: PathIndex) {
        for (key, entry) in other.entries {
            self.insert(key, entry);
        }
    }

    /// Index `dirs` in order, returning the merged index and the source-root
    /// table for depth bookkeeping.
    #[instrument(skip(dirs, walker), fields(dirs = dirs.len()))]
    pub fn build(
        dirs: &[PathBuf],
        recurse: bool,
        walker: &FileWalker,
    ) -> Result<(Self, SourceRoots)> {
        let mut index = Self::new();
        let mut roots = SourceRoots::default();

        for dir in dirs {
            if !dir.is_dir() {
                warn!(dir = %dir.display(), "source directory missing, not indexed");
                continue;
            }
            let (dir_index, root) = index_directory(dir, recurse, walker)?;
            debug!(dir = %dir.display(), files = dir_index.len(), module = %root.module, "indexed directory");
            index.merge(dir_index);
            roots.push(root);
        }

        info!(entries = index.len(), "path index built");
        Ok((index, roots))
    }

    /// Rewrite `filename` into a path relative to a document sitting `depth`
    /// levels below the project root.
    ///
    /// Unknown names come back unchanged. References into `current_module`
    /// skip the ascent out of, and descent into, the module itself.
    pub fn update_opi_path(
        &self,
        filename: &str,
        depth: usize,
        current_module: &str,
        use_relative_subpath: bool,
    ) -> String {
        let Some(entry) = self.image_entry(filename).or_else(|| self.get(filename)) else {
            return filename.to_string();
        };

        let path_in_module = if use_relative_subpath {
            entry.path_in_module.as_str()
        } else {
            ""
        };

        let (module, depth) = if entry.module == current_module {
            ("", depth.saturating_sub(segment_count(current_module)))
        } else {
            (entry.module.as_str(), depth)
        };

        let ascent = if depth == 0 {
            ".".to_string()
        } else {
            vec![".."; depth].join("/")
        };

        [ascent.as_str(), module, path_in_module, filename]
            .into_iter()
            .filter(|s| !s.is_empty())
            .join("/")
    }

    /// One symbol display can fan out into several `name-<n>.png` images;
    /// they share the entry of `name.opi`.
    fn image_entry(&self, filename: &str) -> Option<&IndexEntry> {
        let stem = filename.strip_suffix(IMAGE_EXT)?.strip_suffix('.')?;
        let (dir, name) = stem.rsplit_once('/').unwrap_or(("", stem));
        let base = name.rsplit_once('-').map_or(name, |(base, _)| base);
        if dir.is_empty() {
            self.get(&format!("{base}.{NEW_EXT}"))
        } else {
            self.get(&format!("{dir}/{base}.{NEW_EXT}"))
        }
    }
}

impl FromIterator<(String, IndexEntry)> for PathIndex {
    fn from_iter<T: IntoIterator<Item = (String, IndexEntry)>>(iter: T) -> Self {
        let mut index = Self::new();
        for (key, entry) in iter {
            index.insert(key, entry);
        }
        index
    }
}

/// The module owning `dir` and `dir`'s path inside that module.
pub fn owning_module(dir: &Path) -> Result<(ModuleCoordinate, String)> {
    let module_root = locate_module_root(dir).ok_or_else(|| {
        Error::invalid_path(dir, "directory is not inside a module version directory")
    })?;
    let coord = ModuleCoordinate::from_path(&module_root)?;

    let inner = dir
        .strip_prefix(&module_root)
        .map(PathUtils::to_slash)
        .unwrap_or_default();
    Ok((coord, inner))
}

/// Files under `dir` that take part in indexing and conversion. Without
/// recursion only the first two levels are visited.
pub fn source_files(dir: &Path, recurse: bool, walker: &FileWalker) -> Vec<PathBuf> {
    walker.walk_with_filter(dir, |file| {
        recurse
            || file
                .strip_prefix(dir)
                .is_ok_and(|rel| rel.components().count() <= SHALLOW_DEPTH)
    })
}

fn index_directory(
    dir: &Path,
    recurse: bool,
    walker: &FileWalker,
) -> Result<(PathIndex, SourceRoot)> {
    let (coord, path_in_module) = owning_module(dir)?;
    let entry = IndexEntry::new(coord.module.clone(), path_in_module.clone());

    let mut index = PathIndex::new();
    for file in source_files(dir, recurse, walker) {
        let Ok(rel) = file.strip_prefix(dir) else {
            continue;
        };
        let key = PathUtils::replace_extension(&PathUtils::to_slash(rel), LEGACY_EXT, NEW_EXT);
        index.insert(key, entry.clone());
    }

    let root = SourceRoot {
        dir: dir.to_path_buf(),
        module: coord.module,
        path_in_module,
    };
    Ok((index, root))
}
