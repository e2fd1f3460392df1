use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_help_lists_options() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("admissions"));
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--db-path"))
        .stdout(predicate::str::contains("--gateway-api-key"))
        .stdout(predicate::str::contains("--check-config"));

    Ok(())
}

#[test]
fn test_check_config_reports_missing_gateway_settings() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("admissions"));
    cmd.env_clear().arg("--check-config");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("storage: in-memory"))
        .stdout(predicate::str::contains("admission_period: 2025-2026"))
        .stdout(predicate::str::contains("admission_fee: 20 EGP"))
        .stdout(predicate::str::contains(
            "missing: GEIDEA_API_KEY, GEIDEA_API_PASSWORD, SITE_URL",
        ));

    Ok(())
}

#[test]
fn test_check_config_from_environment() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("admissions"));
    cmd.env_clear()
        .env("GEIDEA_API_KEY", "env-key-value")
        .env("GEIDEA_API_PASSWORD", "env-password-value")
        .env("SITE_URL", "https://school.example/")
        .env("ADMISSION_FEE", "5000")
        .arg("--check-config");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("missing: none"))
        .stdout(predicate::str::contains("admission_fee: 5000 EGP"))
        .stdout(predicate::str::contains(
            "callback_url: https://school.example/payment-callback",
        ))
        .stdout(predicate::str::contains("env-key-value").not())
        .stdout(predicate::str::contains("env-password-value").not());

    Ok(())
}

#[test]
fn test_rejects_invalid_fee() {
    let mut cmd = Command::new(cargo_bin!("admissions"));
    cmd.env_clear().args(["--admission-fee", "abc", "--check-config"]);
    cmd.assert().failure();

    let mut cmd = Command::new(cargo_bin!("admissions"));
    cmd.env_clear().args(["--admission-fee", "0", "--check-config"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("admission fee must be a positive amount"));
}

#[test]
fn test_rejects_half_configured_admin() {
    let mut cmd = Command::new(cargo_bin!("admissions"));
    cmd.env_clear()
        .args(["--admin-email", "admin@school.example", "--check-config"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("must be set together"));
}
