//! Shared test utilities for integration tests
//!
//! Builds small release trees (`<root>/<area>/<module>/<version>/...`)
//! inside an `assert_fs` temp dir.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;

/// A temporary releases tree under `<tmp>/prod` with a mirror at `<tmp>/work`
pub struct ReleaseFixture
{
    pub tmp: assert_fs::TempDir,
}

impl ReleaseFixture
{
    pub fn new() -> Self
    {
        Self {
            tmp: assert_fs::TempDir::new().expect("tempdir"),
        }
    }

    pub fn prod(&self) -> PathBuf
    {
        self.tmp
            .path()
            .join("prod")
    }

    pub fn work(&self) -> PathBuf
    {
        self.tmp
            .path()
            .join("work")
    }

    /// Write `contents` at `rel` below the releases tree
    pub fn file(
        &self,
        rel: &str,
        contents: &str,
    ) -> PathBuf
    {
        let child = self
            .tmp
            .child("prod")
            .child(rel);
        child
            .write_str(contents)
            .expect("write fixture file");
        child.to_path_buf()
    }

    pub fn dir(
        &self,
        rel: &str,
    ) -> PathBuf
    {
        let child = self
            .tmp
            .child("prod")
            .child(rel);
        child
            .create_dir_all()
            .expect("create fixture dir");
        child.to_path_buf()
    }

    /// A motor support module with one converted display and a module.ini
    pub fn motor_module(&self) -> PathBuf
    {
        self.file(
            "support/motor/6-7/configure/module.ini",
            "[general]\nname = motor\n",
        );
        self.file(
            "support/motor/6-7/motorApp/opi/opi/motor.opi",
            "<display/>\n",
        );
        self.prod()
            .join("support/motor/6-7")
    }

    /// An IOC module depending on motor through its RELEASE file
    pub fn ioc_module(&self) -> PathBuf
    {
        let release = format!(
            "SUPPORT={}/support\nMOTOR=$(SUPPORT)/motor/6-7\nEPICS_BASE=/dls_sw/epics/R3.14.12.3/base\n",
            self.prod()
                .display()
        );
        let base = "ioc/BL01I/BL01I-MO-IOC-01/1-0";
        self.file(&format!("{base}/configure/RELEASE"), &release);

        let edl = format!("{base}/BL01I-MO-IOC-01App/opi/edl");
        self.file(&format!("{edl}/main.edl"), "motor.opi\nsub/detail.opi\n");
        self.file(&format!("{edl}/sub/detail.edl"), "motor.opi\nmain.opi\n");
        self.file(&format!("{edl}/broken.edl"), "FAIL\n");
        self.file(&format!("{edl}/icon.png"), "png");

        self.prod()
            .join(base)
    }
}

/// Read a file to string, panicking with the path on failure
pub fn read(path: &Path) -> String
{
    std::fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}
