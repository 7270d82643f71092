//! **edm-convert** - Mirror EPICS modules while converting their EDM displays to CS-Studio OPI
//!
//! Module coordinates and version arithmetic, release-manifest dependency resolution,
//! a display path index and the reference rewriter that keeps converted displays linked.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core model and conversion pipeline
pub mod core {
    /// Domain error taxonomy
    pub mod error;
    pub use error::{Error, Result};

    /// Version strings: parse, compare, bump
    pub mod version;

    /// `(root, area, module, version)` coordinates and dependency-list strings
    pub mod coordinate;
    pub use coordinate::{Area, ModuleCoordinate};

    /// EPICS `configure/RELEASE` manifests
    pub mod release;

    /// Module-local `configure/module.ini`
    pub mod module_ini;
    pub use module_ini::ModuleIni;

    /// Dependency resolution over manifests and declared extras
    pub mod dependency;
    pub use dependency::{DependencySet, Resolver};

    /// Filename to owning-module index with relative-path correction
    pub mod path_index;
    pub use path_index::{PathIndex, SourceRoots};

    /// quick-xml element tree for displays
    pub mod document;
    pub use document::{Document, Element};

    /// Reference rewriting inside converted displays
    pub mod rewrite;
    pub use rewrite::{ReferenceRewriter, update_document};

    /// External legacy-to-new converter
    pub mod convert;
    pub use convert::{Converter, ExternalConverter};

    /// CS-Studio launcher script
    pub mod runscript;

    /// Plan and run a whole-module conversion
    pub mod pipeline;
    pub use pipeline::{ConversionPlan, ConversionReport, ModuleRequest, run as module_run};
}

/// CLI subcommand handlers that only inspect
pub mod cli_ext {
    /// `deps`, `index` and `locate`
    pub mod inspect_cmd;
    pub use inspect_cmd::{deps_run, index_run, locate_run};
}

/// Infrastructure - Configuration, walking and filesystem helpers
pub mod infra {
    /// Layered configuration (file + environment)
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Ignore-aware, sorted directory walking
    pub mod walk;
    pub use walk::FileWalker;

    /// Path and filesystem helpers
    pub mod utils;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use cli_ext::{deps_run, index_run, locate_run};
pub use crate::core::module_run;
pub use infra::{Config, FileWalker, load_config};

// Core types for external consumers
pub use crate::core::{DependencySet, Document, Error, ModuleCoordinate, PathIndex};
