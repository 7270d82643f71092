use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

/// Config file names searched in the working directory, in priority order
const CONFIG_FILES: [&str; 4] = ["edmconv.toml", "edmconv.yaml", "edmconv.json", ".edmconv.toml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Ignore patterns applied while walking legacy trees
    pub ignore_patterns: Vec<String>,

    /// Releases tree holding the legacy modules
    pub source_root: PathBuf,

    /// Output tree for mirrored, version-bumped modules
    pub mirror_root: PathBuf,

    /// Module-internal directory layout
    pub layout: LayoutConfig,

    /// Dependency resolution settings
    pub resolve: ResolveConfig,

    /// External EDL→OPI converter
    pub converter: ConverterConfig,

    /// Generated CS-Studio run-script
    pub script: ScriptConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig
{
    /// Legacy display dir; `{app}` expands to the last module segment
    pub edl_location: String,
    /// Converted display dir; overridden by a module's `opi-location`
    pub opi_location: String,
    pub recurse: bool,
    /// Keep the path-within-module in rewritten references
    pub use_relative_subpath: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig
{
    pub base_trees: Vec<PathBuf>,
    pub known_bad_manifests: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig
{
    pub program: String,
    /// `{input}` and `{output}` are replaced per file
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig
{
    /// Template file; the built-in template is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    /// Script name, written at the top of the mirrored module
    pub file_name: String,
    /// CS-Studio project name; defaults to the module name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub link_prefix: String,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            ignore_patterns: vec![
                "**/CVS".to_string(),
                "**/O.*".to_string(),
                "**/*~".to_string(),
                "**/*.bak".to_string(),
            ],
            source_root: PathBuf::from("/dls_sw/prod/R3.14.12.3"),
            mirror_root: PathBuf::from("/dls_sw/work/R3.14.12.3"),
            layout: LayoutConfig::default(),
            resolve: ResolveConfig::default(),
            converter: ConverterConfig::default(),
            script: ScriptConfig::default(),
        }
    }
}

impl Default for LayoutConfig
{
    fn default() -> Self
    {
        Self {
            edl_location: "{app}App/opi/edl".to_string(),
            opi_location: "{app}App/opi/opi".to_string(),
            recurse: true,
            use_relative_subpath: false,
        }
    }
}

impl LayoutConfig
{
    pub fn edl_dir(
        &self,
        app: &str,
    ) -> String
    {
        self.edl_location
            .replace("{app}", app)
    }

    pub fn opi_dir(
        &self,
        app: &str,
    ) -> String
    {
        self.opi_location
            .replace("{app}", app)
    }
}

impl Default for ResolveConfig
{
    fn default() -> Self
    {
        Self {
            base_trees: vec![
                PathBuf::from("/dls_sw/epics/R3.14.12.3/base"),
                PathBuf::from("/dls_sw/epics/R3.14.12.3/extensions"),
            ],
            known_bad_manifests: Vec::new(),
        }
    }
}

impl Default for ConverterConfig
{
    fn default() -> Self
    {
        Self {
            program: "edl2opi".to_string(),
            args: vec!["{input}".to_string(), "{output}".to_string()],
        }
    }
}

impl Default for ScriptConfig
{
    fn default() -> Self
    {
        Self {
            template: None,
            file_name: "runcss.sh".to_string(),
            project: None,
            link_prefix: String::new(),
        }
    }
}

impl Config
{
    /// Expand `~` and `$VAR` in every configured path.
    pub fn expanded(mut self) -> Self
    {
        self.source_root = expand_path(&self.source_root);
        self.mirror_root = expand_path(&self.mirror_root);
        self.script.template = self
            .script
            .template
            .map(|p| expand_path(&p));
        for p in self
            .resolve
            .base_trees
            .iter_mut()
            .chain(self.resolve.known_bad_manifests.iter_mut())
        {
            *p = expand_path(p);
        }
        self
    }
}

/// Expand `~` and environment variables; unknown variables leave the path as is.
pub fn expand_path(path: &Path) -> PathBuf
{
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw)
    {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).into_owned()),
    }
}

/// Load configuration from `explicit`, or the first config file found in the
/// working directory, then `EDMCONV__*` environment overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<Config>
{
    let mut builder = config::Config::builder();

    match explicit
    {
        Some(path) =>
        {
            builder = builder.add_source(config::File::from(path));
        }
        None =>
        {
            if let Some(path) = CONFIG_FILES
                .iter()
                .find(|p| Path::new(p).exists())
            {
                builder = builder.add_source(config::File::with_name(path));
            }
        }
    }

    // e.g. EDMCONV__MIRROR_ROOT, EDMCONV__CONVERTER__PROGRAM
    builder = builder.add_source(
        config::Environment::with_prefix("EDMCONV")
            .prefix_separator("__")
            .separator("__"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed.expanded())
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("edmconv.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        println!("{toml_string}");
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml()
    {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.layout.opi_location, "{app}App/opi/opi");
        assert_eq!(back.script.file_name, "runcss.sh");
        assert_eq!(back.resolve.base_trees.len(), 2);
    }

    #[test]
    fn partial_file_keeps_defaults()
    {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp
            .path()
            .join("edmconv.toml");
        std::fs::write(
            &path,
            "mirror_root = \"/tmp/mirror\"\n[converter]\nprogram = \"java\"\n",
        )
        .unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.mirror_root, PathBuf::from("/tmp/mirror"));
        assert_eq!(cfg.converter.program, "java");
        assert_eq!(cfg.converter.args, vec!["{input}", "{output}"]);
        assert!(cfg.layout.recurse);
    }

    #[test]
    fn layout_expands_app_name()
    {
        let layout = LayoutConfig::default();
        assert_eq!(layout.edl_dir("motor"), "motorApp/opi/edl");
        assert_eq!(layout.opi_dir("CS-TI-IOC-01"), "CS-TI-IOC-01App/opi/opi");
    }
}
