//! Legacy-to-new display conversion.
//!
//! The actual format translation is delegated to an external program; this
//! module only runs it and checks that it produced something.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::core::error::{Error, Result};
use crate::infra::config::ConverterConfig;
use crate::infra::utils::FsUtils;

/// Turns one legacy display into one new-format display.
pub trait Converter {
    fn convert(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Runs `program args...` with `{input}` and `{output}` substituted.
#[derive(Debug, Clone)]
pub struct ExternalConverter {
    program: String,
    args: Vec<String>,
}

impl ExternalConverter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(cfg: &ConverterConfig) -> Self {
        Self::new(cfg.program.clone(), cfg.args.clone())
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();

        let mut cmd = Command::new(&self.program);
        for arg in &self.args {
            cmd.arg(arg.replace("{input}", &input).replace("{output}", &output));
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

impl Converter for ExternalConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let failed = |reason: String| Error::Conversion {
            path: input.to_path_buf(),
            reason,
        };

        // The converter overwrites in place; a read-only leftover would fail it
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        FsUtils::make_writable(output)?;

        debug!(program = %self.program, input = %input.display(), output = %output.display(), "running converter");
        let result = self
            .command(input, output)
            .output()
            .map_err(|e| failed(format!("cannot run {}: {e}", self.program)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(failed(format!("{} exited with {}: {}", self.program, result.status, stderr.trim())));
        }
        if !output.is_file() {
            return Err(failed(format!("{} produced no {}", self.program, output.display())));
        }
        Ok(())
    }
}
