//! Module-local `configure/module.ini` declarations.
//!
//! ```ini
//! [general]
//! name = motor
//! opi-location = motorApp/opi/opi
//! opi-depends = asyn/4-21;busy/1-6
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::coordinate::{ModuleCoordinate, parse_dependency_list, split_value_list};
use crate::core::error::{Error, Result};
use crate::infra::utils::FsUtils;

pub const MODULE_INI: &str = "configure/module.ini";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleIni {
    /// Canonical module name
    pub name: Option<String>,

    /// Converted display directory, relative to the module version dir
    #[serde(rename = "opi-location")]
    pub opi_location: Option<String>,

    /// `;`-separated `module/version` list of extra dependencies
    #[serde(rename = "opi-depends")]
    pub opi_depends: Option<String>,
}

#[derive(Deserialize)]
struct IniFile {
    #[serde(default)]
    general: ModuleIni,
}

impl ModuleIni {
    pub fn path_in(module_dir: &Path) -> PathBuf {
        module_dir.join(MODULE_INI)
    }

    /// Read the INI file of the module version directory `module_dir`.
    pub fn read(module_dir: &Path) -> Result<Self> {
        let path = Self::path_in(module_dir);
        if !path.is_file() {
            return Err(Error::config(&path, "module.ini not found"));
        }

        let parsed: IniFile = config::Config::builder()
            .add_source(config::File::from(path.as_path()).format(config::FileFormat::Ini))
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| Error::config(&path, e.to_string()))?;

        Ok(parsed.general)
    }

    /// Declared extra dependencies as rootless coordinates.
    pub fn dependencies(&self) -> Vec<ModuleCoordinate> {
        self.opi_depends
            .as_deref()
            .map(|v| parse_dependency_list(&split_value_list(v)))
            .unwrap_or_default()
    }

    pub fn to_ini_string(&self) -> String {
        let mut out = String::from("[general]\n");
        let fields = [
            ("name", &self.name),
            ("opi-location", &self.opi_location),
            ("opi-depends", &self.opi_depends),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                out.push_str(&format!("{key} = {value}\n"));
            }
        }
        out
    }

    /// Write into `module_dir`, replacing any read-only copy.
    pub fn write(&self, module_dir: &Path) -> Result<PathBuf> {
        let path = Self::path_in(module_dir);
        FsUtils::write_text(&path, &self.to_ini_string())?;
        Ok(path)
    }
}
