//! CS-Studio launcher script written at the top of a mirrored module.
//!
//! The script links every dependency's display directory into the
//! workspace project so relative references between modules resolve.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use itertools::Itertools;
use regex::{Captures, Regex};

use crate::core::error::Result;
use crate::infra::utils::FsUtils;

/// `$name`, `${name}`, or `$$` for a literal dollar
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(?:(\$)|\{(\w+)\}|(\w+))").unwrap());

pub const DEFAULT_TEMPLATE: &str = r#"#!/bin/bash
# Launch CS-Studio with the converted displays of $module linked into
# the workspace project "$project".

css_links="${links}"

exec css -share_link "$$css_links" "$$@"
"#;

/// One workspace link: a display directory on disk shown under
/// `/<project>/<module>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub opi_dir: PathBuf,
    pub module: String,
}

impl Link {
    pub fn new(opi_dir: impl Into<PathBuf>, module: impl Into<String>) -> Self {
        Self {
            opi_dir: opi_dir.into(),
            module: module.into(),
        }
    }

    pub fn render(&self, prefix: &str, project: &str) -> String {
        format!("{prefix}{}=/{project}/{}", self.opi_dir.display(), self.module)
    }
}

/// Join the links the way the launcher expects: `",\n"` between entries.
pub fn links_string(links: &[Link], prefix: &str, project: &str) -> String {
    links.iter().map(|l| l.render(prefix, project)).join(",\n")
}

/// Substitute `$name` / `${name}` from `vars`. Unknown names stay as written.
pub fn render_template(template: &str, vars: &HashMap<&str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let name = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            match vars.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Everything the launcher template needs.
#[derive(Debug, Clone)]
pub struct RunScript {
    pub project: String,
    pub module: String,
    pub links: Vec<Link>,
    pub link_prefix: String,
}

impl RunScript {
    pub fn render(&self, template: &str) -> String {
        let vars = HashMap::from([
            ("project", self.project.clone()),
            ("module", self.module.clone()),
            ("links", links_string(&self.links, &self.link_prefix, &self.project)),
        ]);
        render_template(template, &vars)
    }

    /// Render into `path` and mark it executable.
    pub fn write(&self, template: &str, path: &Path) -> Result<()> {
        FsUtils::write_text(path, &self.render(template))?;
        FsUtils::make_executable(path)?;
        Ok(())
    }
}
