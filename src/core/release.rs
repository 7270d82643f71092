//! EPICS `configure/RELEASE` manifests.
//!
//! A manifest is a list of `NAME = value` macro definitions, with `$(NAME)`
//! and `${NAME}` expansion and `include` / `-include` directives. Every
//! definition becomes a [`ReleaseRecord`]; records that point at another
//! versioned module pull in that module's own manifest as children, so the
//! whole tree can be flattened into the transitive dependency list.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::core::coordinate::ModuleCoordinate;
use crate::core::error::{Error, Result};

/// Manifest location inside a module version directory
pub const RELEASE_FILE: &str = "configure/RELEASE";

/// One macro definition from a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub macro_name: String,
    /// Expanded value; `None` when a macro reference stayed unresolved
    pub path: Option<PathBuf>,
    /// Module name when `path` is a versioned module directory
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReleaseNode {
    pub record: ReleaseRecord,
    pub children: Vec<ReleaseNode>,
}

#[derive(Debug, Clone)]
pub struct ReleaseTree {
    pub manifest: PathBuf,
    pub nodes: Vec<ReleaseNode>,
}

impl ReleaseTree {
    /// Parse `manifest` and, recursively, the manifests of every module it
    /// names. Nested manifests on the `known_bad` list that fail to parse are
    /// skipped with a warning.
    pub fn parse(manifest: &Path, known_bad: &[PathBuf]) -> Result<Self> {
        let mut visited = HashSet::new();
        visited.insert(manifest.to_path_buf());

        let records = parse_release_file(manifest)?;
        let nodes = build_nodes(records, known_bad, &mut visited)?;

        Ok(Self {
            manifest: manifest.to_path_buf(),
            nodes,
        })
    }

    /// Depth-first, pre-order list of every record in the tree.
    pub fn flatten(&self) -> Vec<&ReleaseRecord> {
        fn visit<'a>(nodes: &'a [ReleaseNode], out: &mut Vec<&'a ReleaseRecord>) {
            for node in nodes {
                out.push(&node.record);
                visit(&node.children, out);
            }
        }

        let mut out = Vec::new();
        visit(&self.nodes, &mut out);
        out
    }
}

fn build_nodes(
    records: Vec<ReleaseRecord>,
    known_bad: &[PathBuf],
    visited: &mut HashSet<PathBuf>,
) -> Result<Vec<ReleaseNode>> {
    let mut nodes = Vec::with_capacity(records.len());

    for record in records {
        let mut children = Vec::new();

        if let (Some(path), Some(_)) = (&record.path, &record.name) {
            let child = path.join(RELEASE_FILE);
            if child.is_file() && visited.insert(child.clone()) {
                match parse_release_file(&child) {
                    Ok(child_records) => {
                        children = build_nodes(child_records, known_bad, visited)?;
                    }
                    Err(err @ Error::Manifest { .. }) if is_known_bad(&child, known_bad) => {
                        warn!(manifest = %child.display(), error = %err, "skipping known-bad manifest");
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        nodes.push(ReleaseNode { record, children });
    }

    Ok(nodes)
}

/// True when `manifest` is on the allow-list of unparseable manifests.
pub fn is_known_bad(manifest: &Path, known_bad: &[PathBuf]) -> bool {
    let canonical = dunce::canonicalize(manifest).ok();
    known_bad.iter().any(|bad| {
        bad == manifest
            || canonical
                .as_ref()
                .is_some_and(|c| dunce::canonicalize(bad).is_ok_and(|b| &b == c))
    })
}

/// Parse one manifest (following includes) into its records, in file order.
pub fn parse_release_file(manifest: &Path) -> Result<Vec<ReleaseRecord>> {
    if !manifest.is_file() {
        return Err(Error::config(manifest, "release manifest not found"));
    }

    let mut parser = ReleaseParser::new(manifest);
    parser.parse_file(manifest, 0)?;
    debug!(manifest = %manifest.display(), records = parser.records.len(), "parsed manifest");
    Ok(parser.records)
}

const MAX_INCLUDE_DEPTH: usize = 16;

struct ReleaseParser {
    macros: IndexMap<String, String>,
    records: Vec<ReleaseRecord>,
}

impl ReleaseParser {
    fn new(manifest: &Path) -> Self {
        let mut macros = IndexMap::new();
        // TOP is the module version directory, two levels above configure/RELEASE
        if let Some(top) = manifest.parent().and_then(Path::parent) {
            macros.insert("TOP".to_string(), top.to_string_lossy().into_owned());
        }
        Self {
            macros,
            records: Vec::new(),
        }
    }

    fn parse_file(&mut self, path: &Path, depth: usize) -> Result<()> {
        let text = fs::read_to_string(path)?;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let (optional, include) = if let Some(rest) = line.strip_prefix("-include") {
                (true, Some(rest))
            } else {
                (false, line.strip_prefix("include"))
            };
            if let Some(rest) = include.filter(|r| r.starts_with(char::is_whitespace)) {
                self.include(path, line_no, rest.trim(), optional, depth)?;
                continue;
            }

            self.define(path, line_no, line)?;
        }

        Ok(())
    }

    fn include(
        &mut self,
        from: &Path,
        line: usize,
        target: &str,
        optional: bool,
        depth: usize,
    ) -> Result<()> {
        let manifest_error = |reason: String| Error::Manifest {
            path: from.to_path_buf(),
            line,
            reason,
        };

        if depth >= MAX_INCLUDE_DEPTH {
            return Err(manifest_error("include nesting too deep".into()));
        }

        let (expanded, resolved) = self.expand(target).map_err(manifest_error)?;
        let mut file = PathBuf::from(&expanded);
        if file.is_relative() {
            if let Some(dir) = from.parent() {
                file = dir.join(file);
            }
        }

        if resolved && file.is_file() {
            return self.parse_file(&file, depth + 1);
        }
        if optional {
            debug!(include = %file.display(), "optional include not found");
            return Ok(());
        }
        Err(manifest_error(format!("cannot include '{target}'")))
    }

    fn define(&mut self, path: &Path, line: usize, text: &str) -> Result<()> {
        let manifest_error = |reason: String| Error::Manifest {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let (lhs, rhs) = text
            .split_once('=')
            .ok_or_else(|| manifest_error(format!("expected NAME = value, found '{text}'")))?;

        let (name, append) = match lhs.trim_end() {
            l if l.ends_with('+') => (l.trim_end_matches('+').trim(), true),
            l => (l.trim_end_matches([':', '?']).trim(), false),
        };
        if !is_macro_name(name) {
            return Err(manifest_error(format!("invalid macro name '{name}'")));
        }

        let (mut value, resolved) = self.expand(rhs.trim()).map_err(manifest_error)?;
        if append {
            if let Some(prev) = self.macros.get(name) {
                value = format!("{prev} {value}");
            }
        }

        self.macros.insert(name.to_string(), value.clone());
        self.records.push(record_for(name, &value, resolved));
        Ok(())
    }

    /// Expand macro references. The flag is false when any reference could
    /// not be resolved; those references are kept verbatim.
    fn expand(&self, value: &str) -> std::result::Result<(String, bool), String> {
        let mut out = String::with_capacity(value.len());
        let mut resolved = true;
        let mut rest = value;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            let close = match after.chars().next() {
                Some('(') => ')',
                Some('{') => '}',
                _ => {
                    out.push('$');
                    rest = after;
                    continue;
                }
            };

            let end = after
                .find(close)
                .ok_or_else(|| format!("unterminated macro reference in '{value}'"))?;
            let name = &after[1..end];

            match self
                .macros
                .get(name)
                .cloned()
                .or_else(|| std::env::var(name).ok())
            {
                Some(v) => out.push_str(&v),
                None => {
                    resolved = false;
                    out.push_str(&rest[pos..pos + 1 + end + 1]);
                }
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Ok((out, resolved))
    }
}

fn is_macro_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn record_for(macro_name: &str, value: &str, resolved: bool) -> ReleaseRecord {
    let path = (resolved && !value.is_empty()).then(|| PathBuf::from(value));
    let name = path
        .as_deref()
        .and_then(|p| ModuleCoordinate::from_path(p).ok())
        .filter(|c| c.version.is_some())
        .map(|c| c.module);

    ReleaseRecord {
        macro_name: macro_name.to_string(),
        path,
        name,
    }
}
