//! End-to-end tests for the romfs binary.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::{tempdir, TempDir};

/// Runs romfs inside `cwd` with an isolated home directory.
fn romfs(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_romfs"))
        .args(args)
        .current_dir(cwd)
        .env("HOME", cwd)
        .env_remove("ROMFS_LOG")
        .env_remove("ROMFS_LOG_LEVEL")
        .env_remove("ROMFS_DIR_BUCKETS")
        .env_remove("ROMFS_FILE_BUCKETS")
        .output()
        .expect("Failed to execute romfs")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// A host tree plus a built `app.romfs` next to it.
fn built_image() -> TempDir {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src");
    std::fs::create_dir_all(src.join("assets/icons")).unwrap();
    std::fs::create_dir_all(src.join("empty")).unwrap();
    std::fs::write(src.join("readme.txt"), b"hello romfs\n").unwrap();
    std::fs::write(src.join("assets/logo.bin"), vec![0xAB; 300]).unwrap();
    std::fs::write(src.join("assets/icons/a.ico"), b"ico").unwrap();

    let output = romfs(temp.path(), &["build", "src", "-o", "app.romfs"]);
    assert!(
        output.status.success(),
        "build failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout(&output).contains("4 directories, 3 files"));
    temp
}

// ==================== Build + Inspect ====================

#[test]
fn test_ls_root() {
    let temp = built_image();
    let output = romfs(temp.path(), &["ls", "app.romfs"]);
    assert!(output.status.success());
    let listing = stdout(&output);
    let lines: Vec<&str> = listing.lines().collect();
    assert!(lines.contains(&"assets/"));
    assert!(lines.contains(&"empty/"));
    assert!(lines.contains(&"readme.txt"));
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_ls_normalizes_argument() {
    let temp = built_image();
    let output = romfs(temp.path(), &["ls", "app.romfs", "/assets/./icons/../"]);
    assert!(output.status.success());
    let listing = stdout(&output);
    assert!(listing.lines().any(|l| l == "icons/"));
    assert!(listing.lines().any(|l| l == "logo.bin"));
}

#[test]
fn test_ls_long_shows_sizes() {
    let temp = built_image();
    let output = romfs(temp.path(), &["ls", "-l", "app.romfs", "/assets"]);
    assert!(output.status.success());
    let listing = stdout(&output);
    let logo = listing.lines().find(|l| l.contains("logo.bin")).unwrap();
    assert!(logo.starts_with("f "));
    assert!(logo.contains(" 300 "));
}

#[test]
fn test_cat_outputs_file_bytes() {
    let temp = built_image();
    let output = romfs(temp.path(), &["cat", "app.romfs", "/readme.txt"]);
    assert!(output.status.success());
    assert_eq!(output.stdout, b"hello romfs\n");

    let output = romfs(temp.path(), &["cat", "app.romfs", "/assets/logo.bin"]);
    assert_eq!(output.stdout, vec![0xAB; 300]);
}

#[test]
fn test_cat_missing_file_fails() {
    let temp = built_image();
    let output = romfs(temp.path(), &["cat", "app.romfs", "/nope.txt"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no such file"));
}

#[test]
fn test_stat_file_and_directory() {
    let temp = built_image();
    let output = romfs(temp.path(), &["stat", "app.romfs", "/assets/icons/a.ico"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains(": file"));
    assert!(text.contains("size:     3"));

    let output = romfs(temp.path(), &["stat", "app.romfs", "/"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains(": directory"));
    assert!(text.contains("id:       0"));
    assert!(text.contains("parent:   -"));
}

#[test]
fn test_info_reports_layout() {
    let temp = built_image();
    let output = romfs(temp.path(), &["info", "app.romfs"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Header (0x50 bytes)"));
    assert!(text.contains("Directories:"));
    assert!(text.contains("Files:"));
    assert!(text.contains("entries:      4"));
    assert!(text.contains("entries:      3"));
}

#[test]
fn test_open_rejects_non_image() {
    let temp = tempdir().unwrap();
    std::fs::write(temp.path().join("junk"), vec![0xFF; 256]).unwrap();
    let output = romfs(temp.path(), &["info", "junk"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a valid RomFS image"));
}

#[test]
fn test_build_rejects_missing_directory() {
    let temp = tempdir().unwrap();
    let output = romfs(temp.path(), &["build", "missing", "-o", "x.romfs"]);
    assert!(!output.status.success());
}

// ==================== Normalize ====================

#[test]
fn test_normalize_plain() {
    let temp = tempdir().unwrap();
    let output = romfs(temp.path(), &["normalize", "/a/./b/../c//"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim_end(), "/a/c");
}

#[test]
fn test_normalize_flags() {
    let temp = tempdir().unwrap();
    let output = romfs(temp.path(), &["normalize", "--windows", "--backslash", r"C:\x\..\y"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim_end(), "C:/y");

    let output = romfs(temp.path(), &["normalize", "--mount", "rom:/a/b/.."]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim_end(), "rom:/a");

    let output = romfs(temp.path(), &["normalize", "rom:/a"]);
    assert!(!output.status.success());
}

#[test]
fn test_normalize_escape_fails() {
    let temp = tempdir().unwrap();
    let output = romfs(temp.path(), &["normalize", "/../b"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unobtainable"));
}

#[test]
fn test_normalize_buffer_too_small() {
    let temp = tempdir().unwrap();
    let output = romfs(temp.path(), &["normalize", "--max-len", "4", "/abcdef"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("path too long"));
}

#[test]
fn test_normalize_check() {
    let temp = tempdir().unwrap();
    let output = romfs(temp.path(), &["normalize", "--check", "/a/b"]);
    assert_eq!(stdout(&output).trim_end(), "normalized");
    let output = romfs(temp.path(), &["normalize", "--check", "/a/./b"]);
    assert_eq!(stdout(&output).trim_end(), "not normalized");
}

// ==================== Config ====================

#[test]
fn test_config_default_is_valid_toml() {
    let temp = tempdir().unwrap();
    let output = romfs(temp.path(), &["config", "default"]);
    assert!(output.status.success());
    let parsed: Result<romfs_config::Config, _> = toml::from_str(&stdout(&output));
    assert!(parsed.is_ok(), "invalid TOML: {:?}", parsed.err());
}

#[test]
fn test_project_config_applies() {
    let temp = tempdir().unwrap();
    std::fs::create_dir_all(temp.path().join(".romfs")).unwrap();
    std::fs::write(
        temp.path().join(".romfs/config.toml"),
        "[path]\nmount_name = true\n",
    )
    .unwrap();

    let output = romfs(temp.path(), &["normalize", "rom:/x/../y"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim_end(), "rom:/y");

    let output = romfs(temp.path(), &["config", "show"]);
    assert!(stdout(&output).contains("mount_name = true"));
}

#[test]
fn test_config_init_refuses_overwrite() {
    let temp = tempdir().unwrap();
    assert!(romfs(temp.path(), &["config", "init"]).status.success());
    assert!(temp.path().join(".romfs/config.toml").exists());
    assert!(!romfs(temp.path(), &["config", "init"]).status.success());
    assert!(romfs(temp.path(), &["config", "init", "--force"]).status.success());
}
