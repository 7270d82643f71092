//! Dependency resolution: which other modules a module needs, fully
//! qualified with their versions.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, error, instrument, warn};

use crate::core::coordinate::ModuleCoordinate;
use crate::core::error::{Error, Result};
use crate::core::module_ini::ModuleIni;
use crate::core::release::{RELEASE_FILE, ReleaseRecord, ReleaseTree, is_known_bad};
use crate::core::version::latest_version;
use crate::infra::config::ResolveConfig;

/// Dependency name to resolved coordinate, in discovery order
pub type DependencySet = IndexMap<String, ModuleCoordinate>;

#[derive(Debug, Clone, Default)]
pub struct Resolver {
    /// Base-library trees never treated as dependencies
    base_trees: Vec<PathBuf>,
    /// Manifests known to be unparseable
    known_bad: Vec<PathBuf>,
}

impl Resolver {
    pub fn new(base_trees: Vec<PathBuf>, known_bad: Vec<PathBuf>) -> Self {
        Self {
            base_trees,
            known_bad,
        }
    }

    pub fn from_config(cfg: &ResolveConfig) -> Self {
        Self::new(cfg.base_trees.clone(), cfg.known_bad_manifests.clone())
    }

    /// Resolve the dependencies of `module`.
    ///
    /// Records from the manifest tree are keyed by the dependency's declared
    /// name (last one wins); `extra` coordinates are applied afterwards and
    /// override them. Rootless extras get the module's root, and extras
    /// without a version get the newest one on disk.
    #[instrument(skip(self, module, extra), fields(module = %module))]
    pub fn find_dependencies(
        &self,
        module: &ModuleCoordinate,
        extra: &[ModuleCoordinate],
    ) -> Result<DependencySet> {
        if module.version.is_none() {
            return Err(Error::UnspecifiedVersion(module.to_string()));
        }

        let module_path = module.as_path()?;
        let manifest = module_path.join(RELEASE_FILE);
        let mut deps = DependencySet::new();

        match self.manifest_records(&manifest)? {
            Some(tree) => {
                for record in tree.flatten() {
                    let Some(path) = self.valid_path(record, &module_path) else {
                        continue;
                    };

                    let name = ModuleIni::read(path)
                        .ok()
                        .and_then(|ini| ini.name)
                        .or_else(|| record.name.clone())
                        .unwrap_or_else(|| record.macro_name.clone());

                    let coord = ModuleCoordinate::from_path(path)?;
                    debug!(dependency = %name, coordinate = %coord, "resolved manifest entry");
                    deps.insert(name, coord);
                }
            }
            None => debug!(manifest = %manifest.display(), "no manifest contribution"),
        }

        for dep in extra {
            let mut coord = match (&dep.root, &module.root) {
                (None, Some(root)) => dep.update_root(root),
                _ => dep.clone(),
            };
            if coord.version.is_none() && coord.root.is_some() {
                match latest_version(&coord.module_dir()?) {
                    Some(latest) => coord = coord.update_version(Some(latest)),
                    None => warn!(dependency = %coord, "no version of extra dependency on disk"),
                }
            }
            deps.insert(dep.module.clone(), coord);
        }

        deps.shift_remove(&module.module);
        Ok(deps)
    }

    /// Parse the manifest tree; `None` when there is nothing to contribute.
    fn manifest_records(&self, manifest: &Path) -> Result<Option<ReleaseTree>> {
        if !manifest.is_file() {
            warn!(manifest = %manifest.display(), "module has no release manifest");
            return Ok(None);
        }

        match ReleaseTree::parse(manifest, &self.known_bad) {
            Ok(tree) => Ok(Some(tree)),
            Err(err @ Error::Manifest { .. }) if is_known_bad(manifest, &self.known_bad) => {
                warn!(manifest = %manifest.display(), error = %err, "ignoring known-bad manifest");
                Ok(None)
            }
            Err(err) => {
                error!(manifest = %manifest.display(), error = %err, "failed to parse manifest");
                Err(err)
            }
        }
    }

    fn valid_path<'a>(&self, record: &'a ReleaseRecord, module_path: &Path) -> Option<&'a Path> {
        let path = record.path.as_deref()?;
        record.name.as_ref()?;

        if self.base_trees.iter().any(|base| path.starts_with(base)) {
            return None;
        }
        if path == module_path {
            return None;
        }
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::core::coordinate::Area;

    fn write(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn motor(root: &Path) -> ModuleCoordinate {
        ModuleCoordinate::new(root, Area::Support, "motor", Some("6-7-1dls8".into()))
    }

    #[test]
    fn resolves_manifest_dependencies() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(
            &root.join("support/motor/6-7-1dls8/configure/RELEASE"),
            &format!(
                "SUPPORT={}/support\nVXSTATS=$(SUPPORT)/vxStats/1-14-1\nMOTOR=$(SUPPORT)/motor/6-7-1dls8\nEPICS_BASE=/base/R3.14\nTEMPLATE_TOP=$(EPICS_BASE)/templates\n",
                root.display()
            ),
        );

        let resolver = Resolver::new(vec![PathBuf::from("/base")], vec![]);
        let deps = resolver.find_dependencies(&motor(root), &[]).unwrap();

        assert_eq!(deps.len(), 1);
        assert_eq!(
            deps["vxStats"],
            ModuleCoordinate::new(root, Area::Support, "vxStats", Some("1-14-1".into()))
        );
        assert!(!deps.contains_key("motor"));
    }

    #[test]
    fn declared_name_wins_over_path_name() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(
            &root.join("support/motor/6-7-1dls8/configure/RELEASE"),
            &format!("STREAM={}/support/streamDevice/2-5\n", root.display()),
        );
        write(
            &root.join("support/streamDevice/2-5/configure/module.ini"),
            "[general]\nname = stream\n",
        );

        let deps = Resolver::default().find_dependencies(&motor(root), &[]).unwrap();
        assert_eq!(deps.keys().collect::<Vec<_>>(), vec!["stream"]);
    }

    #[test]
    fn extras_override_and_get_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(
            &root.join("support/motor/6-7-1dls8/configure/RELEASE"),
            &format!("ASYN={}/support/asyn/4-21\n", root.display()),
        );

        let extra = [
            ModuleCoordinate::rootless(Area::Support, "asyn", Some("4-26".into())),
            ModuleCoordinate::rootless(Area::Support, "busy", Some("1-6".into())),
        ];
        let deps = Resolver::default().find_dependencies(&motor(root), &extra).unwrap();

        assert_eq!(deps["asyn"].version.as_deref(), Some("4-26"));
        assert_eq!(deps["busy"].root.as_deref(), Some(root));
    }

    #[test]
    fn unversioned_extra_takes_latest_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("support/motor/6-7-1dls8")).unwrap();
        for v in ["1-6", "1-7", "1-10"] {
            fs::create_dir_all(root.join("support/busy").join(v)).unwrap();
        }

        let extra = crate::core::coordinate::parse_dependency_list(&["busy", "calc"]);
        let deps = Resolver::default().find_dependencies(&motor(root), &extra).unwrap();

        assert_eq!(deps["busy"].version.as_deref(), Some("1-10"));
        assert_eq!(deps["busy"].root.as_deref(), Some(root));
        assert_eq!(deps["calc"].version, None);
    }

    #[test]
    fn unspecified_version_is_rejected() {
        let c = ModuleCoordinate::new("/r", Area::Support, "motor", None);
        assert!(matches!(
            Resolver::default().find_dependencies(&c, &[]),
            Err(Error::UnspecifiedVersion(_))
        ));
    }

    #[test]
    fn known_bad_manifest_degrades_to_extras() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let manifest = root.join("support/motor/6-7-1dls8/configure/RELEASE");
        write(&manifest, "not a release file\n");

        let extra = [ModuleCoordinate::rootless(Area::Support, "busy", Some("1-6".into()))];

        assert!(matches!(
            Resolver::default().find_dependencies(&motor(root), &extra),
            Err(Error::Manifest { .. })
        ));

        let resolver = Resolver::new(vec![], vec![manifest]);
        let deps = resolver.find_dependencies(&motor(root), &extra).unwrap();
        assert_eq!(deps.keys().collect::<Vec<_>>(), vec!["busy"]);
    }

    #[test]
    fn missing_manifest_yields_only_extras() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("support/motor/6-7-1dls8")).unwrap();

        let deps = Resolver::default().find_dependencies(&motor(tmp.path()), &[]).unwrap();
        assert!(deps.is_empty());
    }
}
