//! Whole-module conversion: plan what to convert and where, then mirror the
//! module, convert its displays and fix up their references.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::cli::{AppContext, ModuleArgs};
use crate::core::convert::{Converter, ExternalConverter};
use crate::core::coordinate::{Area, ModuleCoordinate, dependency_list_to_string};
use crate::core::dependency::{DependencySet, Resolver};
use crate::core::document::Document;
use crate::core::module_ini::ModuleIni;
use crate::core::path_index::{LEGACY_EXT, NEW_EXT, PathIndex, source_files};
use crate::core::rewrite::update_document;
use crate::core::runscript::{DEFAULT_TEMPLATE, Link, RunScript};
use crate::core::version::{increment_version, latest_version};
use crate::infra::config::{Config, LayoutConfig, load_config};
use crate::infra::utils::{FsUtils, PathUtils};
use crate::infra::walk::FileWalker;

/// Which module to convert and what to add to its declared dependencies.
#[derive(Debug, Clone)]
pub struct ModuleRequest {
    pub area: Area,
    pub module: String,
    /// Newest version on disk when unset
    pub version: Option<String>,
    pub extra_deps: Vec<ModuleCoordinate>,
    /// Replaces the layout's legacy display dir; relative to the module
    pub source_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionPlan {
    pub source: ModuleCoordinate,
    pub target: ModuleCoordinate,
    /// Display dir inside the module, e.g. `motorApp/opi/opi`
    pub opi_location: String,
    pub ini: ModuleIni,
    pub data_dirs: Vec<PathBuf>,
    pub dependencies: DependencySet,
    /// Display dirs of the dependencies that exist on disk
    pub dependency_dirs: Vec<PathBuf>,
    #[serde(skip)]
    pub links: Vec<Link>,
}

impl ConversionPlan {
    pub fn target_dir(&self) -> Result<PathBuf> {
        Ok(self.target.as_path()?)
    }

    pub fn target_opi_dir(&self) -> Result<PathBuf> {
        Ok(self.target_dir()?.join(&self.opi_location))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionReport {
    pub converted: usize,
    pub copied: usize,
    /// References rewritten across all converted displays
    pub rewritten: usize,
    pub failed: Vec<FailedFile>,
    pub module_ini: Option<PathBuf>,
    pub script: Option<PathBuf>,
}

impl ConversionReport {
    fn fail(&mut self, path: &Path, reason: impl ToString) {
        let reason = reason.to_string();
        warn!(file = %path.display(), %reason, "skipping file");
        self.failed.push(FailedFile {
            path: path.to_path_buf(),
            reason,
        });
    }
}

/// Display directories of a module version dir: the legacy one and the
/// converted one, honouring the module's own `opi-location`.
pub fn display_dirs(module_path: &Path, app: &str, ini: &ModuleIni, layout: &LayoutConfig) -> (PathBuf, String) {
    let opi_location = ini
        .opi_location
        .clone()
        .unwrap_or_else(|| layout.opi_dir(app));
    (module_path.join(layout.edl_dir(app)), opi_location)
}

/// Work out source, target, dependencies and directories for one module.
#[instrument(skip(request, config), fields(module = %request.module))]
pub fn plan_module(request: &ModuleRequest, config: &Config) -> Result<ConversionPlan> {
    let mut source = ModuleCoordinate::new(
        &config.source_root,
        request.area,
        &request.module,
        request.version.clone(),
    );
    if source.version.is_none() {
        let module_dir = source.module_dir()?;
        let Some(latest) = latest_version(&module_dir) else {
            bail!("No versions of {} found under {}", source.module, module_dir.display());
        };
        info!(version = %latest, "using latest version");
        source = source.update_version(Some(latest));
    }

    let source_path = source.as_path()?;
    if !source_path.is_dir() {
        bail!("Module directory {} does not exist", source_path.display());
    }

    let ini = ModuleIni::read(&source_path).unwrap_or_else(|err| {
        debug!(error = %err, "no module.ini, using layout defaults");
        ModuleIni::default()
    });

    let mut extras = ini.dependencies();
    extras.extend(request.extra_deps.iter().cloned());

    let resolver = Resolver::from_config(&config.resolve);
    let dependencies = resolver
        .find_dependencies(&source, &extras)
        .with_context(|| format!("Failed to resolve dependencies of {source}"))?;

    let version = source.version.as_deref().unwrap_or_default();
    let target = source
        .update_version(Some(increment_version(version)))
        .update_root(&config.mirror_root);

    let (edl_dir, opi_location) = display_dirs(&source_path, source.app_name(), &ini, &config.layout);
    let data_dirs = if request.source_dirs.is_empty() {
        vec![edl_dir]
    } else {
        request.source_dirs.iter().map(|d| source_path.join(d)).collect()
    };

    // Full module name: `depth_of` counts every module segment
    let mut links = vec![Link::new(target.as_path()?.join(&opi_location), source.module.clone())];
    let mut dependency_dirs = Vec::new();
    for (name, dep) in &dependencies {
        let dep_path = match dep.as_path() {
            Ok(path) if dep.version.is_some() => path,
            _ => {
                warn!(dependency = %name, coordinate = %dep, "dependency has no usable version, not indexed");
                continue;
            }
        };
        let dep_ini = ModuleIni::read(&dep_path).unwrap_or_default();
        let (dep_edl, dep_opi) = display_dirs(&dep_path, dep.app_name(), &dep_ini, &config.layout);
        let dep_opi = dep_path.join(dep_opi);

        if dep_opi.is_dir() {
            links.push(Link::new(&dep_opi, dep.module.clone()));
            dependency_dirs.push(dep_opi);
        }
        if dep_edl.is_dir() {
            dependency_dirs.push(dep_edl);
        }
    }

    Ok(ConversionPlan {
        source,
        target,
        opi_location,
        ini,
        data_dirs,
        dependencies,
        dependency_dirs,
        links,
    })
}

fn progress_bar(len: usize, ctx: &AppContext) -> Result<ProgressBar> {
    if ctx.quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Mirror, convert and rewrite the planned module.
#[instrument(skip_all, fields(module = %plan.source))]
pub fn run_module(
    plan: &ConversionPlan,
    converter: &dyn Converter,
    config: &Config,
    ctx: &AppContext,
) -> Result<ConversionReport> {
    let walker = FileWalker::new(&config.ignore_patterns)?;
    let layout = &config.layout;
    let source_dir = plan.source.as_path()?;
    let target_dir = plan.target_dir()?;
    let opi_dir = plan.target_opi_dir()?;
    let mut report = ConversionReport::default();

    // Mirror everything but the legacy displays
    for file in walker.walk_files(&source_dir) {
        if PathUtils::has_extension(&file, LEGACY_EXT) {
            continue;
        }
        let Ok(rel) = file.strip_prefix(&source_dir) else {
            continue;
        };
        match FsUtils::copy_file(&file, &target_dir.join(rel)) {
            Ok(()) => report.copied += 1,
            Err(err) => report.fail(&file, err),
        }
    }

    let mut index_dirs = plan.data_dirs.clone();
    index_dirs.extend(plan.dependency_dirs.iter().cloned());
    let (index, roots) = PathIndex::build(&index_dirs, layout.recurse, &walker)?;

    let mut work = Vec::new();
    for data_dir in &plan.data_dirs {
        for file in source_files(data_dir, layout.recurse, &walker) {
            if let Ok(rel) = file.strip_prefix(data_dir) {
                let rel = rel.to_path_buf();
                work.push((file, rel));
            }
        }
    }

    let pb = progress_bar(work.len(), ctx)?;
    for (file, rel) in &work {
        pb.set_message(PathUtils::to_slash(rel));
        pb.inc(1);

        if !PathUtils::has_extension(file, LEGACY_EXT) {
            match FsUtils::copy_file(file, &opi_dir.join(rel)) {
                Ok(()) => report.copied += 1,
                Err(err) => report.fail(file, err),
            }
            continue;
        }

        let output = opi_dir.join(rel).with_extension(NEW_EXT);
        if let Err(err) = converter.convert(file, &output) {
            report.fail(file, err);
            continue;
        }

        let depth = roots
            .depth_of(file, layout.use_relative_subpath)
            .unwrap_or_else(|| plan.source.module_segments());
        let rewritten = Document::read(&output).and_then(|mut doc| {
            let n = update_document(&mut doc, depth, &index, &plan.source.module, layout.use_relative_subpath);
            doc.write(&output).map(|()| n)
        });
        match rewritten {
            Ok(n) => {
                report.converted += 1;
                report.rewritten += n;
            }
            Err(err) => report.fail(&output, err),
        }
    }
    pb.finish_with_message("Conversion complete");

    let deps: Vec<ModuleCoordinate> = plan.dependencies.values().cloned().collect();
    let mirrored_ini = ModuleIni {
        name: plan.ini.name.clone().or_else(|| Some(plan.source.module.clone())),
        opi_location: Some(plan.opi_location.clone()),
        opi_depends: (!deps.is_empty()).then(|| dependency_list_to_string(&deps)),
    };
    report.module_ini = Some(
        mirrored_ini
            .write(&target_dir)
            .context("Failed to write mirrored module.ini")?,
    );

    let template = match &config.script.template {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script template {}", path.display()))?,
        None => DEFAULT_TEMPLATE.to_string(),
    };
    let script = RunScript {
        project: config
            .script
            .project
            .clone()
            .unwrap_or_else(|| plan.source.app_name().to_string()),
        module: plan.source.module.clone(),
        links: plan.links.clone(),
        link_prefix: config.script.link_prefix.clone(),
    };
    let script_path = target_dir.join(&config.script.file_name);
    script
        .write(&template, &script_path)
        .context("Failed to write run script")?;
    report.script = Some(script_path);

    info!(
        converted = report.converted,
        copied = report.copied,
        rewritten = report.rewritten,
        failed = report.failed.len(),
        "module converted"
    );
    Ok(report)
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(mut config: Config, args: &ModuleArgs) -> Config {
    if let Some(root) = &args.spec.source_root {
        config.source_root = root.clone();
    }
    if let Some(root) = &args.mirror_root {
        config.mirror_root = root.clone();
    }
    if args.no_recurse {
        config.layout.recurse = false;
    }
    if args.relative_subpath {
        config.layout.use_relative_subpath = true;
    }
    config
}

pub fn run(args: ModuleArgs, ctx: &AppContext) -> Result<()> {
    let config = apply_overrides(load_config(ctx.config.as_deref())?, &args);

    let request = ModuleRequest {
        area: args.spec.area,
        module: args.spec.module.clone(),
        version: args.spec.module_version.clone(),
        extra_deps: args.spec.extra_dependencies(),
        source_dirs: args.source_dir.clone(),
    };
    let plan = plan_module(&request, &config)?;

    if ctx.dry_run {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let converter = ExternalConverter::from_config(&config.converter);
    let report = run_module(&plan, &converter, &config, ctx)?;

    if !ctx.quiet {
        print_report(&plan, &report, ctx);
    }
    if !report.failed.is_empty() {
        bail!("{} file(s) failed to convert", report.failed.len());
    }
    Ok(())
}

fn print_report(plan: &ConversionPlan, report: &ConversionReport, ctx: &AppContext) {
    let target = plan.target.to_string();
    if ctx.no_color {
        println!("Converted {} -> {}", plan.source, target);
    } else {
        println!("Converted {} -> {}", plan.source, target.green());
    }
    println!(
        "  {} displays, {} files copied, {} references rewritten",
        report.converted, report.copied, report.rewritten
    );
    for failed in &report.failed {
        if ctx.no_color {
            println!("  failed: {} ({})", failed.path.display(), failed.reason);
        } else {
            println!("  {} {} ({})", "failed:".red(), failed.path.display(), failed.reason);
        }
    }
}
