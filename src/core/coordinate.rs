//! Module coordinates: `(root, area, module, version)` locations in the
//! versioned release tree `<root>/<area>/<module>/<version>/...`.
//!
//! Coordinates are immutable values; `update_*` derive new ones.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::core::version::is_version_segment;

/// Top-level category of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Ioc,
    Support,
}

impl Area {
    pub fn as_str(self) -> &'static str {
        match self {
            Area::Ioc => "ioc",
            Area::Support => "support",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Area {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ioc" => Ok(Area::Ioc),
            "support" => Ok(Area::Support),
            other => Err(Error::invalid_path(other, "area must be 'ioc' or 'support'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModuleCoordinate {
    /// Root of the releases tree; `None` for rootless coordinates
    pub root: Option<PathBuf>,
    pub area: Area,
    /// Slash-delimited module name, e.g. `motor` or `CS/CS-TI-IOC-01`
    pub module: String,
    /// `None` means unspecified (latest)
    pub version: Option<String>,
}

impl ModuleCoordinate {
    pub fn new(
        root: impl Into<PathBuf>,
        area: Area,
        module: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        Self {
            root: Some(root.into()),
            area,
            module: module.into(),
            version,
        }
    }

    /// A coordinate waiting for a root to be attached.
    pub fn rootless(area: Area, module: impl Into<String>, version: Option<String>) -> Self {
        Self {
            root: None,
            area,
            module: module.into(),
            version,
        }
    }

    /// Split a filesystem path into a coordinate.
    ///
    /// An existing file is first replaced by its enclosing module-version
    /// directory. The area is searched from the right; `ioc` modules may span
    /// several segments, `support` modules are exactly one.
    pub fn from_path(path: &Path) -> Result<Self> {
        if path.is_file() {
            let root = locate_module_root(path).ok_or_else(|| {
                Error::invalid_path(path, "file is not inside a module version directory")
            })?;
            return split_coordinate(&root);
        }
        split_coordinate(path)
    }

    /// `<root>/<area>/<module>/<version>`; the version is left out when unset.
    pub fn as_path(&self) -> Result<PathBuf> {
        let mut path = self.module_dir()?;
        if let Some(version) = &self.version {
            path.push(version);
        }
        Ok(path)
    }

    /// `<root>/<area>/<module>`, the directory holding every version.
    pub fn module_dir(&self) -> Result<PathBuf> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| Error::Rootless(self.to_string()))?;

        let mut path = root.join(self.area.as_str());
        for segment in self.module.split('/') {
            path.push(segment);
        }
        Ok(path)
    }

    pub fn update_version(&self, version: Option<String>) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    pub fn update_root(&self, root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..self.clone()
        }
    }

    pub fn is_rootless(&self) -> bool {
        self.root.is_none()
    }

    /// Last module segment; names the `<App>App` directories.
    pub fn app_name(&self) -> &str {
        self.module.rsplit('/').next().unwrap_or(&self.module)
    }

    pub fn module_segments(&self) -> usize {
        segment_count(&self.module)
    }
}

impl fmt::Display for ModuleCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(root) = &self.root {
            write!(f, "{}/", root.display())?;
        }
        write!(f, "{}/{}", self.area, self.module)?;
        if let Some(version) = &self.version {
            write!(f, "/{version}")?;
        }
        Ok(())
    }
}

/// Number of non-empty `/`-separated segments.
pub fn segment_count(s: &str) -> usize {
    s.split('/').filter(|p| !p.is_empty()).count()
}

fn split_coordinate(path: &Path) -> Result<ModuleCoordinate> {
    let components: Vec<Component<'_>> = path.components().collect();

    for (i, component) in components.iter().enumerate().rev() {
        let Component::Normal(name) = component else {
            continue;
        };
        let Some(area) = name.to_str().and_then(|s| s.parse::<Area>().ok()) else {
            continue;
        };

        let tail: Option<Vec<&str>> = components[i + 1..]
            .iter()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();
        let Some(tail) = tail else {
            continue;
        };
        if tail.is_empty() {
            continue;
        }

        let (module_parts, version) = match tail.split_last() {
            Some((last, rest)) if !rest.is_empty() && is_version_segment(last) => {
                (rest, Some((*last).to_string()))
            }
            _ => (tail.as_slice(), None),
        };

        let valid = match area {
            Area::Support => module_parts.len() == 1,
            Area::Ioc => !module_parts.iter().any(|p| is_version_segment(p)),
        };
        if !valid {
            continue;
        }

        let root: PathBuf = components[..i].iter().collect();
        return Ok(ModuleCoordinate {
            root: Some(root),
            area,
            module: module_parts.join("/"),
            version,
        });
    }

    Err(Error::invalid_path(
        path,
        "no <area>/<module>[/<version>] section found",
    ))
}

/// Nearest module version directory enclosing `path`; a directory may be
/// its own module root.
pub fn locate_module_root(path: &Path) -> Option<PathBuf> {
    let skip = usize::from(!path.is_dir());
    path.ancestors()
        .skip(skip)
        .find(|dir| {
            dir.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_version_segment)
                && split_coordinate(dir).is_ok_and(|c| c.version.is_some())
        })
        .map(Path::to_path_buf)
}

/// Split a `;`-separated INI value into trimmed, non-empty items.
pub fn split_value_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `module/version` items into rootless support coordinates.
///
/// The version is the text after the last `/` when it reads as a version;
/// otherwise the whole item is the module name and the version is unset.
pub fn parse_dependency_list<S: AsRef<str>>(items: &[S]) -> Vec<ModuleCoordinate> {
    items
        .iter()
        .map(|item| {
            let item = item.as_ref().trim();
            match item.rsplit_once('/') {
                Some((module, version)) if !module.is_empty() && is_version_segment(version) => {
                    ModuleCoordinate::rootless(
                        Area::Support,
                        module,
                        Some(version.to_string()),
                    )
                }
                _ => ModuleCoordinate::rootless(Area::Support, item, None),
            }
        })
        .collect()
}

/// Inverse of [`parse_dependency_list`] over a joined value list.
pub fn dependency_list_to_string(deps: &[ModuleCoordinate]) -> String {
    deps.iter()
        .map(|d| match &d.version {
            Some(v) => format!("{}/{}", d.module, v),
            None => d.module.clone(),
        })
        .join(";")
}
