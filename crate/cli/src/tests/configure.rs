use std::fs;

use predicates::prelude::*;

use super::okms;

const V0_CONFIG: &str = "default:
  endpoint: https://eu-west-rbx.okms.ovh.net
  cert: /etc/okms/tls.crt
  key: /etc/okms/tls.key
";

#[test]
fn test_migrate_only() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("okms.yaml");
    fs::write(&config, V0_CONFIG)?;

    okms(&config)?
        .args(["configure", "--migrate-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Migration completed"))
        .stderr(predicate::str::contains("old configuration format"));

    let migrated = fs::read_to_string(&config)?;
    assert!(migrated.contains("version: 1"), "{migrated}");
    assert!(migrated.contains("type: mtls"), "{migrated}");

    // already migrated: no warning anymore
    okms(&config)?
        .args(["config", "--migrate-only"])
        .assert()
        .success()
        .stderr(predicate::str::contains("old configuration format").not());
    Ok(())
}

#[test]
fn test_configure_with_flags() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("okms.yaml");
    fs::write(&config, "version: 1\n")?;
    let cert = dir.path().join("tls.crt");
    let key = dir.path().join("tls.key");
    fs::write(&cert, "cert")?;
    fs::write(&key, "key")?;

    okms(&config)?
        .args(["--profile", "staging", "configure", "--protocol", "kmip"])
        .args(["--endpoint", "127.0.0.1:5696", "--ca", ""])
        .arg("--cert")
        .arg(&cert)
        .arg("--key")
        .arg(&key)
        .arg("--yes")
        .assert()
        .success();

    let written = fs::read_to_string(&config)?;
    assert!(written.contains("staging:"), "{written}");
    assert!(written.contains("127.0.0.1:5696"), "{written}");

    okms(&config)?
        .args(["configure", "--protocol", "kmip", "--endpoint", "no-port"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error: Invalid Endpoint"));
    Ok(())
}

#[test]
fn test_set_profile() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("okms.yaml");
    fs::write(
        &config,
        "version: 1\nprofile: default\nprofiles:\n  default: {}\n  prod: {}\n",
    )?;

    okms(&config)?
        .args(["configure", "set-profile", "prod"])
        .assert()
        .success();
    assert!(fs::read_to_string(&config)?.contains("profile: prod"));

    okms(&config)?
        .args(["configure", "set-profile"])
        .write_stdin("default\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("* prod"));
    assert!(fs::read_to_string(&config)?.contains("profile: default"));

    okms(&config)?
        .args(["configure", "set-profile", "unknown"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not defined"));
    Ok(())
}

#[test]
fn test_missing_endpoint() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("okms.yaml");
    fs::write(&config, "version: 1\nprofiles:\n  default: {}\n")?;

    okms(&config)?
        .args(["keys", "ls"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Error: Missing endpoint address parameter",
        ));
    okms(&config)?
        .args(["kmip", "ls"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Error: Missing endpoint address parameter",
        ));
    Ok(())
}
