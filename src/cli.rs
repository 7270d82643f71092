use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli_ext::inspect_cmd::{DepsArgs, IndexArgs, LocateArgs};
use crate::core::coordinate::{Area, ModuleCoordinate, parse_dependency_list};

/// Shared application context for global flags
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
    pub config: Option<PathBuf>, // global --config
}

#[derive(Parser)]
#[command(name = "edmconv")]
#[command(about = "Convert EDM display modules into mirrored CS-Studio OPI modules")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: ./edmconv.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without executing
    #[arg(long, global = true)]
    pub dry_run: bool,
}

impl Cli {
    pub fn context(&self) -> AppContext {
        AppContext {
            quiet: self.quiet,
            no_color: self.no_color,
            dry_run: self.dry_run,
            config: self.config.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a module's displays into a mirrored, version-bumped module
    Module(ModuleArgs),

    /// Show the resolved dependencies of a module
    Deps(DepsArgs),

    /// Show the display path index built over directories
    Index(IndexArgs),

    /// Show the module coordinate of a path
    Locate(LocateArgs),

    /// Initialize an edmconv.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Selects one module in the source tree
#[derive(Args, Debug, Clone)]
pub struct ModuleSpec {
    /// Module area
    #[arg(value_enum)]
    pub area: Area,

    /// Module name, e.g. `motor` or `BL01I/BL01I-MO-IOC-01`
    pub module: String,

    /// Module version (default: newest on disk)
    #[arg(long = "module-version", value_name = "VERSION")]
    pub module_version: Option<String>,

    /// Releases tree to read from (overrides config `source_root`)
    #[arg(long)]
    pub source_root: Option<PathBuf>,

    /// Extra dependency as `module/version` (repeatable)
    #[arg(long = "extra-dep", value_name = "MODULE/VERSION")]
    pub extra_dep: Vec<String>,
}

impl ModuleSpec {
    pub fn extra_dependencies(&self) -> Vec<ModuleCoordinate> {
        parse_dependency_list(&self.extra_dep)
    }
}

#[derive(Args, Debug)]
pub struct ModuleArgs {
    #[command(flatten)]
    pub spec: ModuleSpec,

    /// Output tree (overrides config `mirror_root`)
    #[arg(long)]
    pub mirror_root: Option<PathBuf>,

    /// Legacy display directory inside the module (repeatable)
    #[arg(long, value_name = "DIR")]
    pub source_dir: Vec<PathBuf>,

    /// Only index and convert the top two directory levels
    #[arg(long)]
    pub no_recurse: bool,

    /// Keep the path-within-module in rewritten references
    #[arg(long)]
    pub relative_subpath: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
