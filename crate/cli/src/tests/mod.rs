use std::path::Path;

use assert_cmd::Command;

mod configure;

const PROG_NAME: &str = "okms";

/// Environment variables that would leak the developer's setup into a test
const KMS_ENV: [&str; 16] = [
    "KMS_PROFILE",
    "KMS_CLI_FORMAT",
    "KMS_HTTP_ENDPOINT",
    "KMS_HTTP_CA",
    "KMS_HTTP_AUTH_METHOD",
    "KMS_HTTP_CERT",
    "KMS_HTTP_KEY",
    "KMS_HTTP_TOKEN",
    "KMS_HTTP_OKMSID",
    "KMS_KMIP_ENDPOINT",
    "KMS_KMIP_CA",
    "KMS_KMIP_AUTH_METHOD",
    "KMS_KMIP_CERT",
    "KMS_KMIP_KEY",
    "KMS_KMIP_TOKEN",
    "KMS_KMIP_OKMSID",
];

/// The `okms` binary, using the configuration file at `config`
fn okms(config: &Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(PROG_NAME)?;
    for var in KMS_ENV {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "off");
    cmd.arg("--config").arg(config);
    Ok(cmd)
}
