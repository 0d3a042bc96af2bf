use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dooi"))
}

fn write(root: &Path, relative: &str, body: &str) -> Result<(), std::io::Error> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)
}

fn make_stage() -> Result<TempDir, Box<dyn std::error::Error>> {
    let stage = TempDir::new()?;
    write(stage.path(), "components/ui/button.tsx", "export const Button = () => null;\n")?;
    write(stage.path(), "assets/logo.svg", "<svg />\n")?;
    write(stage.path(), ".dooi/meta.json", "{}\n")?;
    Ok(stage)
}

#[test]
fn install_maps_files_with_a_strategy() -> Result<(), Box<dyn std::error::Error>> {
    let stage = make_stage()?;
    let app = TempDir::new()?;

    cli()
        .arg("install")
        .arg(stage.path())
        .arg("--dest")
        .arg(app.path())
        .args(["--strategy", "next-app"])
        .assert()
        .success()
        .stdout(contains("Copied 2 file(s)"));

    assert!(app.path().join("src/components/ui/button.tsx").is_file());
    assert!(app.path().join("public/assets/logo.svg").is_file());
    assert!(!app.path().join(".dooi").exists());
    Ok(())
}

#[test]
fn install_dry_run_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let stage = make_stage()?;
    let app = TempDir::new()?;

    cli()
        .arg("install")
        .arg(stage.path())
        .arg("--dest")
        .arg(app.path())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(contains("Would copy 2 file(s)"));

    assert!(!app.path().join("components").exists());
    Ok(())
}

#[test]
fn install_json_reports_outcome() -> Result<(), Box<dyn std::error::Error>> {
    let stage = make_stage()?;
    let app = TempDir::new()?;
    write(app.path(), "components/ui/button.tsx", "// mine\n")?;

    let output = cli()
        .arg("--json")
        .arg("install")
        .arg(stage.path())
        .arg("--dest")
        .arg(app.path())
        .output()?;
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["type"], "installed");
    assert_eq!(value["outcome"]["skipped"].as_array().map(Vec::len), Some(1));
    assert_eq!(value["outcome"]["installed"].as_array().map(Vec::len), Some(1));
    assert_eq!(
        fs::read_to_string(app.path().join("components/ui/button.tsx"))?,
        "// mine\n"
    );
    Ok(())
}

#[test]
fn missing_stage_is_a_data_error() -> Result<(), Box<dyn std::error::Error>> {
    let app = TempDir::new()?;
    let missing = app.path().join("no-such-stage");

    cli()
        .arg("install")
        .arg(&missing)
        .arg("--dest")
        .arg(app.path())
        .assert()
        .failure()
        .code(65)
        .stderr(contains("E_STAGE_MISSING"));
    Ok(())
}

#[test]
fn unknown_strategy_is_a_usage_error() -> Result<(), Box<dyn std::error::Error>> {
    let stage = make_stage()?;
    let app = TempDir::new()?;

    cli()
        .arg("install")
        .arg(stage.path())
        .arg("--dest")
        .arg(app.path())
        .args(["--strategy", "remix"])
        .assert()
        .failure()
        .code(64)
        .stderr(contains("E_INVALID_INPUT"));
    Ok(())
}
