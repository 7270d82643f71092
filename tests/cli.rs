mod util;

use assert_cmd::Command;
use clap::Parser;
use edm_convert::cli::{Cli, Commands};
use edm_convert::core::coordinate::Area;
use predicates::prelude::*;
use util::ReleaseFixture;

fn edmconv(fx: &ReleaseFixture) -> Command {
    let mut cmd = Command::cargo_bin("edmconv").unwrap();
    cmd.current_dir(fx.tmp.path())
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

#[test]
fn deps_flag_parsing() {
    // Given
    let argv = vec![
        "edmconv",
        "deps",
        "ioc",
        "BL01I/BL01I-MO-IOC-01",
        "--module-version",
        "1-0",
        "--format",
        "json",
    ];

    // When
    let cli = Cli::parse_from(argv);

    // Then
    match cli.command {
        Commands::Deps(args) => {
            assert_eq!(args.spec.area, Area::Ioc);
            assert_eq!(args.spec.module, "BL01I/BL01I-MO-IOC-01");
            assert_eq!(args.spec.module_version.as_deref(), Some("1-0"));
        }
        _ => panic!("expected Deps command"),
    }
}

#[test]
fn locate_prints_coordinate() {
    let fx = ReleaseFixture::new();
    let motor = fx.motor_module();

    edmconv(&fx)
        .arg("locate")
        .arg(motor.join("motorApp/opi/opi/motor.opi"))
        .assert()
        .success()
        .stdout(predicate::str::contains("support/motor/6-7"))
        .stdout(predicate::str::contains("version: 6-7"));
}

#[test]
fn locate_rejects_paths_outside_a_tree() {
    let fx = ReleaseFixture::new();
    let stray = fx.tmp.path().join("stray");
    std::fs::create_dir_all(&stray).unwrap();

    edmconv(&fx)
        .arg("locate")
        .arg(&stray)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot locate module"));
}

#[test]
fn deps_json_lists_manifest_dependencies() {
    let fx = ReleaseFixture::new();
    fx.motor_module();
    fx.ioc_module();

    edmconv(&fx)
        .args(["--quiet", "deps", "ioc", "BL01I/BL01I-MO-IOC-01", "--format", "json"])
        .arg("--source-root")
        .arg(fx.prod())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dependencies\""))
        .stdout(predicate::str::contains("\"motor\""))
        .stdout(predicate::str::contains("\"6-7\""));
}

#[test]
fn index_json_maps_legacy_names() {
    let fx = ReleaseFixture::new();
    let ioc = fx.ioc_module();

    edmconv(&fx)
        .args(["--quiet", "index", "--format", "json"])
        .arg(ioc.join("BL01I-MO-IOC-01App/opi/edl"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"main.opi\""))
        .stdout(predicate::str::contains("\"sub/detail.opi\""))
        .stdout(predicate::str::contains("BL01I/BL01I-MO-IOC-01"));
}

#[test]
fn module_dry_run_prints_plan_without_writing() {
    let fx = ReleaseFixture::new();
    fx.motor_module();
    fx.ioc_module();

    edmconv(&fx)
        .args(["--dry-run", "module", "ioc", "BL01I/BL01I-MO-IOC-01"])
        .arg("--source-root")
        .arg(fx.prod())
        .arg("--mirror-root")
        .arg(fx.work())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"1-1\""))
        .stdout(predicate::str::contains("BL01I-MO-IOC-01App/opi/opi"));

    assert!(!fx.work().exists());
}

#[test]
fn init_dry_run_prints_default_config() {
    let fx = ReleaseFixture::new();

    edmconv(&fx)
        .args(["--dry-run", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mirror_root"))
        .stdout(predicate::str::contains("[converter]"));

    assert!(!fx.tmp.path().join("edmconv.toml").exists());
}

#[test]
fn init_refuses_to_overwrite() {
    let fx = ReleaseFixture::new();

    edmconv(&fx).arg("init").assert().success();
    assert!(fx.tmp.path().join("edmconv.toml").is_file());

    edmconv(&fx)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn config_file_supplies_roots() {
    let fx = ReleaseFixture::new();
    fx.motor_module();
    fx.ioc_module();
    std::fs::write(
        fx.tmp.path().join("edmconv.toml"),
        format!("source_root = \"{}\"\n", fx.prod().display()),
    )
    .unwrap();

    edmconv(&fx)
        .args(["--quiet", "deps", "ioc", "BL01I/BL01I-MO-IOC-01", "--format", "table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("motor"));
}

#[test]
fn completions_to_stdout() {
    let fx = ReleaseFixture::new();

    edmconv(&fx)
        .args(["completions", "bash", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("edmconv"));
}
