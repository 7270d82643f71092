use anyhow::Result;
use clap::Parser;
use edm_convert::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays clean; RUST_LOG overrides
    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .init();

    // Build a context once, pass everywhere
    let ctx = cli.context();

    match cli.command {
        Commands::Module(args) => edm_convert::module_run(args, &ctx),
        Commands::Deps(args) => edm_convert::deps_run(args, &ctx),
        Commands::Index(args) => edm_convert::index_run(args, &ctx),
        Commands::Locate(args) => edm_convert::locate_run(args, &ctx),
        Commands::Init(args) => edm_convert::infra::config::init(args, &ctx),
        Commands::Completions(args) => edm_convert::completion::run(args, &ctx),
    }
}
