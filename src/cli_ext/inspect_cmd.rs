//! Read-only inspection commands: `deps`, `index` and `locate`.
//!
//! Each prints human-readable text by default and JSON on request, so the
//! results can be fed to other tooling.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;
use ptree::TreeBuilder;
use serde_json::json;
use tabled::{Table, Tabled};
use tracing::instrument;

use crate::cli::{AppContext, ModuleSpec};
use crate::core::coordinate::ModuleCoordinate;
use crate::core::dependency::Resolver;
use crate::core::module_ini::ModuleIni;
use crate::core::path_index::{PathIndex, owning_module};
use crate::core::version::latest_version;
use crate::infra::config::load_config;
use crate::infra::walk::FileWalker;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat
{
    Text,
    Json,
    Table,
}

#[derive(Debug, Args)]
pub struct DepsArgs
{
    #[command(flatten)]
    pub spec: ModuleSpec,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct IndexArgs
{
    /// Display directories, each inside a module version directory
    #[arg(required = true)]
    pub dirs: Vec<PathBuf>,

    /// Only index the top two directory levels
    #[arg(long)]
    pub no_recurse: bool,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct LocateArgs
{
    /// File or directory inside a releases tree
    pub path: PathBuf,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,
}

#[derive(Tabled)]
struct DependencyRow
{
    name: String,
    area: String,
    module: String,
    version: String,
    path: String,
}

#[derive(Tabled)]
struct IndexRow
{
    file: String,
    module: String,
    path_in_module: String,
}

fn version_label(coord: &ModuleCoordinate) -> String
{
    coord
        .version
        .clone()
        .unwrap_or_else(|| "-".to_string())
}

/// Resolve and print the dependency set of one module.
#[instrument(skip_all, fields(module = %args.spec.module))]
pub fn deps_run(
    args: DepsArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = load_config(ctx.config.as_deref())?;
    let root = args
        .spec
        .source_root
        .clone()
        .unwrap_or_else(|| config.source_root.clone());

    let mut module = ModuleCoordinate::new(
        root,
        args.spec.area,
        &args.spec.module,
        args.spec.module_version.clone(),
    );
    if module.version.is_none()
    {
        let latest = latest_version(&module.module_dir()?)
            .with_context(|| format!("No versions of {module} found"))?;
        module = module.update_version(Some(latest));
    }

    let mut extras = ModuleIni::read(&module.as_path()?)
        .map(|ini| ini.dependencies())
        .unwrap_or_default();
    extras.extend(args.spec.extra_dependencies());

    let deps = Resolver::from_config(&config.resolve)
        .find_dependencies(&module, &extras)
        .with_context(|| format!("Failed to resolve dependencies of {module}"))?;

    match args.format
    {
        OutputFormat::Json =>
        {
            let output = json!({
                "module": module,
                "dependencies": deps,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table =>
        {
            let rows: Vec<DependencyRow> = deps
                .iter()
                .map(|(name, coord)| DependencyRow {
                    name: name.clone(),
                    area: coord
                        .area
                        .to_string(),
                    module: coord
                        .module
                        .clone(),
                    version: version_label(coord),
                    path: coord
                        .as_path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
        OutputFormat::Text =>
        {
            let label = if ctx.no_color
            {
                module.to_string()
            }
            else
            {
                module
                    .to_string()
                    .bold()
                    .to_string()
            };
            let mut builder = TreeBuilder::new(label);
            for (name, coord) in &deps
            {
                let version = version_label(coord);
                let entry = if ctx.no_color
                {
                    format!("{name} {version}")
                }
                else
                {
                    format!("{} {}", name.cyan(), version.green())
                };
                builder.begin_child(entry);
                if let Ok(path) = coord.as_path()
                {
                    builder.add_empty_child(path.display().to_string());
                }
                builder.end_child();
            }
            ptree::print_tree(&builder.build())?;
        }
    }
    Ok(())
}

/// Build and print the path index over the given directories.
#[instrument(skip_all, fields(dirs = args.dirs.len()))]
pub fn index_run(
    args: IndexArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = load_config(ctx.config.as_deref())?;
    let walker = FileWalker::new(&config.ignore_patterns)?;
    let recurse = config.layout.recurse && !args.no_recurse;

    let dirs: Vec<PathBuf> = args
        .dirs
        .iter()
        .map(|d| dunce::canonicalize(d).unwrap_or_else(|_| d.clone()))
        .collect();
    let (index, roots) = PathIndex::build(&dirs, recurse, &walker)?;

    match args.format
    {
        OutputFormat::Json =>
        {
            println!("{}", serde_json::to_string_pretty(&index)?);
        }
        OutputFormat::Table =>
        {
            let rows: Vec<IndexRow> = index
                .iter()
                .map(|(file, entry)| IndexRow {
                    file: file.clone(),
                    module: entry
                        .module
                        .clone(),
                    path_in_module: entry
                        .path_in_module
                        .clone(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
        OutputFormat::Text =>
        {
            for (file, entry) in index.iter()
            {
                println!("{file} -> {}/{}", entry.module, entry.path_in_module);
            }
        }
    }

    if !ctx.quiet
    {
        let summary = format!("{} files from {} directories", index.len(), roots.iter().count());
        if ctx.no_color
        {
            eprintln!("{summary}");
        }
        else
        {
            eprintln!("{}", summary.dimmed());
        }
    }
    Ok(())
}

/// Print the coordinate and owning module directory of a path.
pub fn locate_run(
    args: LocateArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let path = dunce::canonicalize(&args.path).unwrap_or_else(|_| args.path.clone());
    let coord = ModuleCoordinate::from_path(&path)
        .with_context(|| format!("Cannot locate module of {}", args.path.display()))?;
    let inner = if path.is_dir()
    {
        owning_module(&path)
            .map(|(_, inner)| inner)
            .unwrap_or_default()
    }
    else
    {
        String::new()
    };

    match args.format
    {
        OutputFormat::Json =>
        {
            let module_path = coord.as_path()?;
            let output = json!({
                "coordinate": coord,
                "path": module_path,
                "path_in_module": inner,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table =>
        {
            let row = DependencyRow {
                name: coord
                    .app_name()
                    .to_string(),
                area: coord
                    .area
                    .to_string(),
                module: coord
                    .module
                    .clone(),
                version: version_label(&coord),
                path: coord
                    .as_path()?
                    .display()
                    .to_string(),
            };
            println!("{}", Table::new(vec![row]));
        }
        OutputFormat::Text =>
        {
            if ctx.no_color
            {
                println!("{coord}");
            }
            else
            {
                println!("{}", coord.to_string().green());
            }
            if !ctx.quiet
            {
                println!("  area:    {}", coord.area);
                println!("  module:  {}", coord.module);
                println!("  version: {}", version_label(&coord));
                if !inner.is_empty()
                {
                    println!("  inside:  {inner}");
                }
            }
        }
    }
    Ok(())
}
