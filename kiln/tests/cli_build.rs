//! Runs the `kiln` binary end to end.

use std::{fs, process::Command};

use tempfile::TempDir;

const PACKAGE: &str = "[[Package]]\nid = \"Widget\"\nname = \"Widget\"\nversion = \"$(var.Version)\"\n";

fn kiln() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_kiln"));
    command.env_remove("KILN_LOG");
    command
}

#[test]
fn test_build_package_from_command_line() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("product.kiln"), PACKAGE).unwrap();

    let output = kiln()
        .current_dir(temp.path())
        .args([
            "build",
            "product.kiln",
            "-o",
            "out/widget.kilnpkg",
            "-d",
            "Version=1.0.0",
            "--intermediate-folder",
            "obj",
        ])
        .output()
        .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "{}", stderr);
    assert!(stderr.contains("built package 'out/widget.kilnpkg'"));
    assert!(temp.path().join("out/widget.kilnpkg").is_file());
    assert!(temp.path().join("out/widget.kilnpdb").is_file());
}

#[test]
fn test_exit_status_is_last_error_code() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("product.kiln"), PACKAGE).unwrap();

    // Version is never defined
    let output = kiln()
        .current_dir(temp.path())
        .args(["build", "product.kiln", "-o", "out/widget.kilnpkg"])
        .output()
        .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(101), "{}", stderr);
    assert!(stderr.contains("error[KILN0101]"));
    assert!(stderr.contains("product.kiln:4"));
    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_project_file_supplies_defaults() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("project/src")).unwrap();
    fs::write(temp.path().join("project/src/product.kiln"), PACKAGE).unwrap();
    fs::write(
        temp.path().join("project/kiln.toml"),
        "[build]\nsources = [\"src/product.kiln\"]\noutput = \"out/widget.kilnout\"\ntype = \"intermediate\"\n\n[define]\nVersion = \"3.0.0\"\n",
    )
    .unwrap();

    let output = kiln()
        .current_dir(temp.path())
        .args(["build", "--config", "project/kiln.toml"])
        .output()
        .unwrap();

    assert_eq!(
        output.status.code(),
        Some(0),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(temp.path().join("project/out/widget.kilnout").is_file());
}

#[test]
fn test_verbose_logging_reports_configuration() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("product.kiln"), PACKAGE).unwrap();
    fs::write(
        temp.path().join("kiln.toml"),
        "[build]\nsources = [\"product.kiln\"]\noutput = \"out/widget.kilnout\"\ntype = \"intermediate\"\n\n[define]\nVersion = \"1.0.0\"\n",
    )
    .unwrap();

    let quiet = kiln().current_dir(temp.path()).arg("build").output().unwrap();
    let verbose = kiln().current_dir(temp.path()).args(["build", "-vv"]).output().unwrap();

    let quiet = String::from_utf8_lossy(&quiet.stderr);
    let verbose = String::from_utf8_lossy(&verbose.stderr);
    assert!(!quiet.contains("loaded project configuration"), "{}", quiet);
    assert!(verbose.contains("loaded project configuration"), "{}", verbose);
    assert!(verbose.contains("resolved build options"), "{}", verbose);
}
