use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dooi"))
}

fn make_project() -> Result<TempDir, Box<dyn std::error::Error>> {
    let project = TempDir::new()?;
    fs::create_dir_all(project.path().join("components"))?;
    fs::write(
        project.path().join("components/hero.tsx"),
        "export const Hero = () => <h1>Dooi UI</h1>;\n",
    )?;
    fs::write(project.path().join("components/notes.md"), "Dooi\n")?;
    Ok(project)
}

#[test]
fn edit_dry_run_previews_without_writing() -> Result<(), Box<dyn std::error::Error>> {
    let project = make_project()?;

    cli()
        .arg("edit")
        .arg(project.path())
        .args(["--include", "**/*.tsx", "--replace", "Dooi", "Acme", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("Would change 1 file(s)"))
        .stdout(contains("components/hero.tsx"));

    let content = fs::read_to_string(project.path().join("components/hero.tsx"))?;
    assert!(content.contains("Dooi UI"));
    Ok(())
}

#[test]
fn edit_writes_matching_files_only() -> Result<(), Box<dyn std::error::Error>> {
    let project = make_project()?;

    cli()
        .arg("edit")
        .arg(project.path())
        .args(["--include", "**/*.tsx", "--regex", r"Dooi (\w+)", "Acme $1"])
        .assert()
        .success()
        .stdout(contains("Changed 1 file(s)"));

    let hero = fs::read_to_string(project.path().join("components/hero.tsx"))?;
    assert!(hero.contains("<h1>Acme UI</h1>"));
    assert_eq!(fs::read_to_string(project.path().join("components/notes.md"))?, "Dooi\n");
    Ok(())
}

#[test]
fn edit_rejects_regexes_that_match_everything() -> Result<(), Box<dyn std::error::Error>> {
    let project = make_project()?;

    cli()
        .arg("edit")
        .arg(project.path())
        .args(["--include", "**/*", "--regex", ".*", "x"])
        .assert()
        .failure()
        .code(64)
        .stderr(contains("E_INVALID_REGEX"));
    Ok(())
}

#[test]
fn edit_requires_a_replacement() -> Result<(), Box<dyn std::error::Error>> {
    let project = make_project()?;

    cli()
        .arg("edit")
        .arg(project.path())
        .args(["--include", "**/*.tsx"])
        .assert()
        .failure()
        .code(64);
    Ok(())
}
