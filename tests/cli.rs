use assert_cmd::Command;

#[test]
fn help_describes_the_app() {
    let output = Command::cargo_bin("typometer")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("typing speed test"));
    assert!(stdout.contains("--duration"));
    assert!(stdout.contains("--user"));
}

#[test]
fn rejects_unknown_flags() {
    let output = Command::cargo_bin("typometer")
        .unwrap()
        .arg("--definitely-not-a-flag")
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn refuses_to_run_without_a_tty() {
    let output = Command::cargo_bin("typometer").unwrap().output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("tty"));
}
