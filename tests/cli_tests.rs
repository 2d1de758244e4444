use std::process::Command;

fn tunectl() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tunectl"))
}

#[test]
fn test_tunectl_help() {
    let output = tunectl().arg("--help").output().expect("Failed to execute tunectl");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Usage: tunectl"));
}

#[test]
fn test_tunectl_voltage_table() {
    let output = tunectl()
        .args(["voltage", "table", "10", "--min", "9", "--max", "11"])
        .output()
        .expect("Failed to execute tunectl voltage table");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("737.5 mV"));
    assert!(!stdout.contains("750 mV"));
}

#[test]
fn test_tunectl_prefs_and_profiles() {
    let dir = tempfile::tempdir().unwrap();
    let storage = dir.path().to_str().unwrap();

    let set = tunectl()
        .args(["--storage-dir", storage, "prefs", "set", "governor", "powersave"])
        .output()
        .expect("Failed to execute tunectl prefs set");
    assert!(set.status.success());

    let save = tunectl()
        .args(["--storage-dir", storage, "profile", "save", "battery"])
        .output()
        .expect("Failed to execute tunectl profile save");
    assert!(save.status.success());

    let show = tunectl()
        .args(["--storage-dir", storage, "profile", "show", "battery"])
        .output()
        .expect("Failed to execute tunectl profile show");
    assert!(show.status.success());
    let stdout = String::from_utf8(show.stdout).unwrap();
    assert!(stdout.contains("governor: powersave"));
}

#[test]
fn test_tunectl_missing_profile_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = tunectl()
        .args(["--storage-dir", dir.path().to_str().unwrap(), "profile", "apply", "nope"])
        .output()
        .expect("Failed to execute tunectl profile apply");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Profile not found"));
}

#[test]
fn test_tunectl_config_init() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tunectl").join("config.toml");
    let path_arg = path.to_str().unwrap();

    let init = tunectl()
        .args(["config", "init", "--path", path_arg])
        .output()
        .expect("Failed to execute tunectl config init");
    assert!(init.status.success());
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("poll_timeout_ms = 2000"));
    assert!(written.contains("block_device = \"mmcblk0\""));

    // Existing file is left alone without --force
    std::fs::write(&path, "log_level = \"debug\"\n").unwrap();
    let again = tunectl()
        .args(["config", "init", "--path", path_arg])
        .output()
        .expect("Failed to execute tunectl config init");
    assert!(!again.status.success());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "log_level = \"debug\"\n");

    let forced = tunectl()
        .args(["config", "init", "--path", path_arg, "--force"])
        .output()
        .expect("Failed to execute tunectl config init --force");
    assert!(forced.status.success());
    assert!(std::fs::read_to_string(&path).unwrap().contains("poll_timeout_ms"));
}
