//! CLI integration tests for buildchain.
//!
//! These tests run the binary in a scratch directory with `--no-tool-check`
//! so they do not depend on the host having a toolchain installed.

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the buildchain binary command, isolated from the user's global config.
fn buildchain(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("buildchain").unwrap();
    cmd.current_dir(home.path()).env("HOME", home.path());
    cmd
}

fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn position(contents: &str, step: &str) -> usize {
    let needle = format!("build $build_targets_dir/{}:", step);
    contents
        .find(&needle)
        .unwrap_or_else(|| panic!("missing build statement for {}", step))
}

// ============================================================================
// buildchain configure
// ============================================================================

#[test]
fn test_configure_musl_static() {
    let tmp = temp_dir();

    buildchain(&tmp)
        .args([
            "configure",
            "--target",
            "x86_64-linux-musl",
            "--cc-flags",
            "-static -Os",
            "--no-tool-check",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("musl 1.2.4"));

    let contents = fs::read_to_string(tmp.path().join("build.ninja")).unwrap();
    assert!(contents.starts_with("# this file is generated by buildchain"));
    assert!(contents.contains("target = x86_64-linux-musl"));
    assert!(contents.contains("cc_flags = -static -Os"));
    assert!(
        position(&contents, "install-musl-headers-sysroot") < position(&contents, "build-gcc")
    );
    assert!(contents.contains("default $build_targets_dir/build-gcc"));
}

#[test]
fn test_configure_is_deterministic() {
    let tmp = temp_dir();
    let args = [
        "configure",
        "--target",
        "aarch64-linux-gnu",
        "--jobs",
        "4",
        "--no-tool-check",
    ];

    buildchain(&tmp).args(args).assert().success();
    let first = fs::read(tmp.path().join("build.ninja")).unwrap();

    buildchain(&tmp)
        .args(args)
        .assert()
        .success()
        .stderr(predicate::str::contains("up to date"));
    let second = fs::read(tmp.path().join("build.ninja")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_configure_custom_output() {
    let tmp = temp_dir();

    buildchain(&tmp)
        .args([
            "configure",
            "--target",
            "x86_64-w64-mingw32",
            "--no-tool-check",
            "-o",
            "out/mingw.ninja",
        ])
        .assert()
        .success();

    let contents = fs::read_to_string(tmp.path().join("out/mingw.ninja")).unwrap();
    assert!(
        position(&contents, "install-mingw-w64-headers-sysroot")
            < position(&contents, "build-gcc-all-gcc")
    );
    assert!(contents.contains("install-mingw-w64-threads"));
    assert!(!tmp.path().join("build.ninja").exists());
}

#[test]
fn test_configure_unknown_triple_fails() {
    let tmp = temp_dir();

    buildchain(&tmp)
        .args(["configure", "--target", "vax-ultrix", "--no-tool-check"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unrecognized target triple"))
        .stderr(predicate::str::contains("help:"));

    assert!(!tmp.path().join("build.ninja").exists());
}

#[test]
fn test_configure_undetermined_libc() {
    let tmp = temp_dir();

    buildchain(&tmp)
        .args(["configure", "--target", "x86_64-elf", "--no-tool-check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot determine which libc"))
        .stderr(predicate::str::contains("--libc"));
}

#[test]
fn test_configure_glibc_requires_headers() {
    let tmp = temp_dir();

    buildchain(&tmp)
        .args([
            "configure",
            "--target",
            "x86_64-linux-gnu",
            "--linux-headers",
            "disabled",
            "--no-tool-check",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("linux headers cannot be disabled"));
}

#[test]
fn test_configure_rejects_quoted_flags() {
    let tmp = temp_dir();

    buildchain(&tmp)
        .args([
            "configure",
            "--target",
            "x86_64-linux-musl",
            "--cc-flags",
            "-DNAME=\"x\"",
            "--no-tool-check",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed flag `-DNAME=\"x\"` in cc flags"));
}

#[test]
fn test_configure_escapes_dollar_in_flags() {
    let tmp = temp_dir();

    buildchain(&tmp)
        .args([
            "configure",
            "--target",
            "x86_64-linux-musl",
            "--ld-flags",
            "-Wl,-rpath,$ORIGIN",
            "--gcc-flags=--with-pkgversion=custom$",
            "--no-tool-check",
        ])
        .assert()
        .success();

    let contents = fs::read_to_string(tmp.path().join("build.ninja")).unwrap();
    assert!(contents.contains("ld_flags = -Wl,-rpath,$$ORIGIN\n"));
    assert!(contents.contains("--with-pkgversion=custom$$"));
}

#[test]
fn test_configure_rejects_quoted_compiler() {
    let tmp = temp_dir();

    buildchain(&tmp)
        .args([
            "configure",
            "--target",
            "x86_64-linux-musl",
            "--cc-build",
            "gcc\" && touch pwned && \"",
            "--no-tool-check",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed compiler"))
        .stderr(predicate::str::contains("--cc-build"));

    assert!(!tmp.path().join("build.ninja").exists());
}

#[test]
fn test_configure_rejects_root_dir_with_space() {
    let tmp = temp_dir();
    fs::create_dir_all(tmp.path().join("my toolchains")).unwrap();

    buildchain(&tmp)
        .args([
            "configure",
            "--target",
            "x86_64-linux-musl",
            "--root-dir",
            "my toolchains",
            "--no-tool-check",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used in a build file"));

    assert!(!tmp.path().join("my toolchains/build.ninja").exists());
}

#[test]
fn test_configure_cygwin_needs_prepared_root() {
    let tmp = temp_dir();
    let args = ["configure", "--target", "x86_64-pc-cygwin", "--no-tool-check"];

    buildchain(&tmp)
        .args(args)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "prepare/cygwin-3.4.7-x86_64-pc-cygwin.tar.xz",
        ))
        .stderr(predicate::str::contains("--cygwin-version"));
    assert!(!tmp.path().join("build.ninja").exists());

    fs::create_dir_all(tmp.path().join("prepare")).unwrap();
    fs::write(tmp.path().join("prepare/cygwin-3.4.7-x86_64-pc-cygwin.tar.xz"), "").unwrap();

    buildchain(&tmp)
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains("cygwin 3.4.7"));
}

#[test]
fn test_configure_malformed_project_config_fails() {
    let tmp = temp_dir();
    fs::write(tmp.path().join("buildchain.toml"), "[flags]\ncc = \"-static -Os\"\n").unwrap();

    buildchain(&tmp)
        .args(["configure", "--target", "x86_64-linux-musl", "--no-tool-check"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to parse config file"));

    assert!(!tmp.path().join("build.ninja").exists());
}

#[test]
fn test_configure_reads_project_config() {
    let tmp = temp_dir();
    fs::write(
        tmp.path().join("buildchain.toml"),
        "[versions]\nmusl = \"1.2.5\"\n\n[flags]\nld = [\"-static\"]\n",
    )
    .unwrap();

    buildchain(&tmp)
        .args(["configure", "--target", "riscv64-linux-musl", "--no-tool-check"])
        .assert()
        .success();

    let contents = fs::read_to_string(tmp.path().join("build.ninja")).unwrap();
    assert!(contents.contains("musl_version = 1.2.5"));
    assert!(contents.contains("ld_flags = -static"));
}

#[test]
fn test_configure_applies_patches() {
    let tmp = temp_dir();
    let patch_dir = tmp.path().join("patches/binutils-2.40");
    fs::create_dir_all(&patch_dir).unwrap();
    fs::write(patch_dir.join("0002-second.patch"), "").unwrap();
    fs::write(patch_dir.join("0001-first.patch"), "").unwrap();

    buildchain(&tmp)
        .args(["configure", "--target", "x86_64-linux-musl", "--no-tool-check"])
        .assert()
        .success();

    let contents = fs::read_to_string(tmp.path().join("build.ninja")).unwrap();
    let first = contents
        .find("../../patches/binutils-2.40/0001-first.patch")
        .unwrap();
    let second = contents
        .find("../../patches/binutils-2.40/0002-second.patch")
        .unwrap();
    assert!(first < second);
}

// ============================================================================
// buildchain plan
// ============================================================================

#[test]
fn test_plan_json() {
    let tmp = temp_dir();

    let output = buildchain(&tmp)
        .args([
            "plan",
            "--target",
            "x86_64-linux-musl",
            "--format",
            "json",
            "--no-tool-check",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = plan["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();

    let pos = |name: &str| names.iter().position(|n| *n == name).unwrap();
    assert!(pos("install-musl-headers-sysroot") < pos("build-gcc"));
    assert!(pos("download-binutils") < pos("extract-binutils"));
    assert_eq!(plan["libc"], "musl");

    assert!(!tmp.path().join("build.ninja").exists());
}

#[test]
fn test_plan_text() {
    let tmp = temp_dir();

    buildchain(&tmp)
        .args(["plan", "--target", "i686-w64-mingw32", "--libc", "msvcrt", "--no-tool-check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Build plan for i686-w64-mingw32 (msvcrt)"))
        .stdout(predicate::str::contains("install-mingw-w64-crt"));
}

#[test]
fn test_plan_unknown_libc() {
    let tmp = temp_dir();

    buildchain(&tmp)
        .args(["plan", "--target", "x86_64-linux-musl", "--libc", "bionic", "--no-tool-check"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("invalid value 'bionic'"))
        .stderr(predicate::str::contains("newlib-cygwin"));
}

// ============================================================================
// misc
// ============================================================================

#[test]
fn test_completions() {
    let tmp = temp_dir();

    buildchain(&tmp)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("buildchain"));
}

#[test]
fn test_help() {
    let tmp = temp_dir();

    buildchain(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("configure"))
        .stdout(predicate::str::contains("doctor"));
}
